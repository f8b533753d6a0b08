pub mod engine;
pub mod export;
pub mod ingest;
pub mod mentor;
pub mod parser;
pub mod prompt;
pub mod topic;

pub use crate::domain::model::{Difficulty, Module, Roadmap, RoadmapRequest, UserProfile};
pub use crate::domain::ports::{CompletionClient, CompletionMode, ModuleStore, Prompt};
pub use crate::utils::error::Result;
