pub mod adapters;
pub mod api;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::adapters::{openai::OpenAiClient, sqlite::SqliteModuleStore};
pub use crate::config::AppConfig;
pub use crate::core::{
    engine::RoadmapEngine, ingest::RoadmapIngestor, mentor::MentorChatService,
    parser::RoadmapParser, prompt::PromptBuilder, topic::TopicContentService,
};
pub use crate::utils::error::{Result, RoadmapError};
