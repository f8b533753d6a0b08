use anyhow::Context;
use clap::{Parser, Subcommand};
use learnpath::api::{self, AppState};
use learnpath::core::export::roadmap_to_csv;
use learnpath::domain::model::{MentorContext, RoadmapRequest, TopicRequest, UserProfile};
use learnpath::domain::ports::ModuleStore;
use learnpath::utils::error::RoadmapError;
use learnpath::utils::{logger, validation::Validate};
use learnpath::{
    AppConfig, MentorChatService, OpenAiClient, RoadmapEngine, SqliteModuleStore,
    TopicContentService,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "learnpath")]
#[command(about = "Personalized learning roadmap generation backed by an LLM")]
struct Args {
    /// Path to TOML configuration file (defaults are used when absent)
    #[arg(short, long, default_value = "learnpath.toml")]
    config: PathBuf,

    /// Override the database URL from config
    #[arg(long)]
    database_url: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Override the bind address from config
        #[arg(long)]
        bind: Option<String>,

        /// Emit JSON logs
        #[arg(long)]
        log_json: bool,
    },
    /// Generate and store a roadmap for a user
    Generate {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        goal: String,
        #[arg(long, value_delimiter = ',')]
        tech_stack: Vec<String>,
        #[arg(long)]
        timeline_weeks: u32,
        #[arg(long)]
        background: Option<String>,
        #[arg(long)]
        current_role: Option<String>,
        #[arg(long, value_delimiter = ',')]
        skills: Vec<String>,
    },
    /// Generate (or fetch cached) study material for one topic of a module
    Topic {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        module_id: i64,
        #[arg(long)]
        topic: String,
        #[arg(long)]
        target_goal: Option<String>,
    },
    /// Ask the mentor a question
    Chat {
        #[arg(long)]
        message: String,
        #[arg(long)]
        background: Option<String>,
        #[arg(long)]
        module: Option<String>,
    },
    /// Print a user's latest roadmap
    Show {
        #[arg(long)]
        user_id: String,
    },
    /// Export a user's latest roadmap as CSV
    Export {
        #[arg(long)]
        user_id: String,
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match &args.command {
        Command::Serve { log_json: true, .. } => logger::init_json_logger(args.verbose),
        _ => logger::init_cli_logger(args.verbose),
    }

    if let Err(e) = run(args).await {
        match e.downcast_ref::<RoadmapError>() {
            Some(err) => {
                tracing::error!(
                    "❌ {} (Category: {:?}, Severity: {:?})",
                    err,
                    err.category(),
                    err.severity()
                );
                eprintln!("❌ {}", err.user_friendly_message());
                eprintln!("💡 Suggestion: {}", err.recovery_suggestion());

                std::process::exit(err.severity().exit_code());
            }
            None => {
                tracing::error!("❌ {:#}", e);
                eprintln!("❌ {:#}", e);
                std::process::exit(1);
            }
        }
    }
}

fn load_config(args: &Args) -> Result<AppConfig, RoadmapError> {
    // 設定檔不存在時使用預設值
    let mut config = if args.config.exists() {
        tracing::info!("📁 Loading configuration from: {}", args.config.display());
        AppConfig::from_file(&args.config)?
    } else {
        tracing::debug!("No config file at {}, using defaults", args.config.display());
        AppConfig::default()
    };

    config.apply_env_overrides()?;
    if let Some(url) = &args.database_url {
        config.database.url = url.clone();
    }
    if let Command::Serve { bind: Some(bind), .. } = &args.command {
        config.server.bind = bind.clone();
    }

    config.validate()?;
    Ok(config)
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = load_config(&args)?;

    match args.command {
        Command::Serve { .. } => {
            let addr = config.server.socket_addr()?;
            let client = OpenAiClient::new(&config.provider)?;
            let store =
                SqliteModuleStore::connect(&config.database.url, config.database.max_connections)
                    .await?;

            let state = Arc::new(AppState::new(Arc::new(client), Arc::new(store)));
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {}", addr))?;

            tracing::info!("🚀 Listening on {}", addr);
            axum::serve(listener, api::router(state))
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("server error")?;
        }
        Command::Generate {
            user_id,
            goal,
            tech_stack,
            timeline_weeks,
            background,
            current_role,
            skills,
        } => {
            let client = OpenAiClient::new(&config.provider)?;
            let store =
                SqliteModuleStore::connect(&config.database.url, config.database.max_connections)
                    .await?;
            let engine = RoadmapEngine::new(client, store);

            let request = RoadmapRequest {
                user_profile: UserProfile {
                    background,
                    current_role,
                    skills,
                },
                goal,
                tech_stack,
                timeline_weeks,
            };

            let generated = engine.run(&user_id, &request).await?;
            println!("✅ Stored roadmap {} with {} modules", generated.roadmap_id, generated.modules.len());
            println!("{}", serde_json::to_string_pretty(&generated)?);
        }
        Command::Topic {
            user_id,
            module_id,
            topic,
            target_goal,
        } => {
            let client = OpenAiClient::new(&config.provider)?;
            let store =
                SqliteModuleStore::connect(&config.database.url, config.database.max_connections)
                    .await?;
            let service = TopicContentService::new(client, store);

            let request = TopicRequest {
                module_id,
                topic,
                target_goal,
            };
            let content = service.generate(&user_id, &request).await?;
            println!("{}", serde_json::to_string_pretty(&content)?);
        }
        Command::Chat {
            message,
            background,
            module,
        } => {
            let client = OpenAiClient::new(&config.provider)?;
            let mentor = MentorChatService::new(client);
            let context = MentorContext {
                user_background: background,
                current_module_title: module,
            };
            println!("{}", mentor.respond(&message, &context).await?);
        }
        Command::Show { user_id } => {
            let store =
                SqliteModuleStore::connect(&config.database.url, config.database.max_connections)
                    .await?;
            match store.latest_roadmap(&user_id).await? {
                Some(roadmap) => println!("{}", serde_json::to_string_pretty(&roadmap)?),
                None => println!("No roadmap stored for user {}", user_id),
            }
        }
        Command::Export { user_id, output } => {
            let store =
                SqliteModuleStore::connect(&config.database.url, config.database.max_connections)
                    .await?;
            let roadmap = store
                .latest_roadmap(&user_id)
                .await?
                .ok_or_else(|| RoadmapError::invalid_request("user_id", "has no stored roadmap"))?;

            std::fs::write(&output, roadmap_to_csv(&roadmap)?).map_err(RoadmapError::IoError)?;
            println!("📁 Exported {} modules to {}", roadmap.modules.len(), output.display());
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
