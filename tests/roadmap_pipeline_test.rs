use async_trait::async_trait;
use httpmock::prelude::*;
use learnpath::config::ProviderConfig;
use learnpath::domain::model::{Difficulty, RoadmapRequest, UserProfile};
use learnpath::domain::ports::{CompletionClient, CompletionMode, ModuleStore, Prompt};
use learnpath::utils::error::{ErrorCategory, RoadmapError};
use learnpath::{OpenAiClient, RoadmapEngine, SqliteModuleStore};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Returns a canned completion and counts calls.
struct FixedClient {
    reply: std::result::Result<String, String>,
    calls: Arc<AtomicUsize>,
}

impl FixedClient {
    fn ok(reply: impl Into<String>) -> Self {
        Self {
            reply: Ok(reply.into()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl CompletionClient for FixedClient {
    async fn complete(&self, _prompt: &Prompt, mode: CompletionMode) -> learnpath::Result<String> {
        assert_eq!(mode, CompletionMode::Structured);
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().map_err(RoadmapError::completion)
    }
}

fn ml_engineer_request() -> RoadmapRequest {
    RoadmapRequest {
        user_profile: UserProfile {
            background: Some("CS".to_string()),
            ..Default::default()
        },
        goal: "ML Engineer".to_string(),
        tech_stack: vec!["Python".to_string(), "SQL".to_string()],
        timeline_weeks: 12,
    }
}

fn sixteen_module_payload() -> String {
    let modules: Vec<serde_json::Value> = (0..16)
        .map(|i| {
            let difficulty = match i {
                0..=5 => "beginner",
                6..=11 => "intermediate",
                _ => "advanced",
            };
            json!({
                "title": format!("Step {:02}", i),
                "description": format!("Module number {}", i),
                "difficulty": difficulty,
                "estimated_hours": 3.0 + i as f64 * 0.5,
                "learning_objectives": [format!("Understand topic {}", i)]
            })
        })
        .collect();
    json!({ "modules": modules }).to_string()
}

#[tokio::test]
async fn test_sixteen_module_roadmap_is_ingested_in_order() {
    let store = SqliteModuleStore::in_memory().await.unwrap();
    let engine = RoadmapEngine::new(FixedClient::ok(sixteen_module_payload()), store);

    let generated = tokio_test::assert_ok!(engine.run("user-42", &ml_engineer_request()).await);

    assert_eq!(generated.modules.len(), 16);
    for (i, record) in generated.modules.iter().enumerate() {
        assert_eq!(record.sequence_index, i as u32);
        assert_eq!(record.module.title, format!("Step {:02}", i));
        assert_eq!(record.user_id, "user-42");
        assert_eq!(record.roadmap_id, generated.roadmap_id);
    }
    assert_eq!(generated.modules[0].module.difficulty, Difficulty::Beginner);
    assert_eq!(generated.modules[15].module.difficulty, Difficulty::Advanced);

    let stored = engine.latest("user-42").await.unwrap().unwrap();
    assert_eq!(stored.goal, "ML Engineer");
    assert_eq!(stored.modules, generated.modules);
}

#[tokio::test]
async fn test_non_json_completion_persists_nothing() {
    let store = SqliteModuleStore::in_memory().await.unwrap();
    let client = FixedClient::ok("not json");
    let calls = client.calls.clone();
    let engine = RoadmapEngine::new(client, store);

    let err = tokio_test::assert_err!(engine.run("user-42", &ml_engineer_request()).await);

    assert_eq!(err.category(), ErrorCategory::Parse);
    assert!(matches!(err, RoadmapError::ParseError { ref raw, .. } if raw == "not json"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.store().count_modules("user-42").await.unwrap(), 0);
}

#[tokio::test]
async fn test_invalid_module_persists_nothing() {
    let mut payload: serde_json::Value = serde_json::from_str(&sixteen_module_payload()).unwrap();
    payload["modules"][9]["difficulty"] = json!("expert");

    let store = SqliteModuleStore::in_memory().await.unwrap();
    let engine = RoadmapEngine::new(FixedClient::ok(payload.to_string()), store);

    let err = engine.run("user-42", &ml_engineer_request()).await.unwrap_err();

    assert!(matches!(
        err,
        RoadmapError::ModuleValidationError { index: Some(9), ref field, .. } if field == "difficulty"
    ));
    assert_eq!(engine.store().count_modules("user-42").await.unwrap(), 0);
}

#[tokio::test]
async fn test_completion_failure_is_distinguishable() {
    let store = SqliteModuleStore::in_memory().await.unwrap();
    let engine = RoadmapEngine::new(FixedClient::failing("connection reset"), store);

    let err = engine.run("user-42", &ml_engineer_request()).await.unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Completion);
    assert_eq!(engine.store().count_modules("user-42").await.unwrap(), 0);
}

#[tokio::test]
async fn test_zero_week_timeline_never_reaches_provider() {
    let store = SqliteModuleStore::in_memory().await.unwrap();
    let client = FixedClient::ok(sixteen_module_payload());
    let calls = client.calls.clone();
    let engine = RoadmapEngine::new(client, store);

    let mut request = ml_engineer_request();
    request.timeline_weeks = 0;
    let err = engine.run("user-42", &request).await.unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Request);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_end_to_end_with_http_provider_and_file_database() {
    let temp_dir = TempDir::new().unwrap();
    let database_url = format!(
        "sqlite://{}?mode=rwc",
        temp_dir.path().join("learnpath.db").display()
    );

    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .body_contains("Desired Tech Stack: Python, SQL")
            .body_contains("json_object");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": format!("```json\n{}\n```", sixteen_module_payload())
                    }
                }]
            }));
    });

    let provider = ProviderConfig {
        base_url: server.base_url(),
        api_key: Some("sk-test".to_string()),
        ..Default::default()
    };
    let client = OpenAiClient::new(&provider).unwrap();
    let store = SqliteModuleStore::connect(&database_url, 2).await.unwrap();
    let engine = RoadmapEngine::new(client, store);

    let generated = engine.run("user-7", &ml_engineer_request()).await.unwrap();

    api_mock.assert();
    assert_eq!(generated.modules.len(), 16);
    assert_eq!(generated.modules.last().unwrap().sequence_index, 15);

    // 重新連線確認資料已寫入檔案
    let reopened = SqliteModuleStore::connect(&database_url, 1).await.unwrap();
    assert_eq!(reopened.count_modules("user-7").await.unwrap(), 16);
}
