//! HTTP surface for roadmap generation, topic content and mentor chat.
//!
//! The caller identity is resolved upstream and passed in the `X-User-Id`
//! header of every request.

mod handlers;

use crate::core::engine::RoadmapEngine;
use crate::core::mentor::MentorChatService;
use crate::core::topic::TopicContentService;
use crate::domain::ports::{CompletionClient, ModuleStore};
use crate::utils::error::{ErrorCategory, RoadmapError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

pub const USER_ID_HEADER: &str = "x-user-id";

pub type SharedClient = Arc<dyn CompletionClient>;
pub type SharedStore = Arc<dyn ModuleStore>;

pub struct AppState {
    pub engine: RoadmapEngine<SharedClient, SharedStore>,
    pub mentor: MentorChatService<SharedClient>,
    pub topics: TopicContentService<SharedClient, SharedStore>,
}

impl AppState {
    pub fn new(client: SharedClient, store: SharedStore) -> Self {
        Self {
            engine: RoadmapEngine::new(client.clone(), store.clone()),
            topics: TopicContentService::new(client.clone(), store),
            mentor: MentorChatService::new(client),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/roadmap/generate", post(handlers::generate_roadmap))
        .route("/roadmap", get(handlers::latest_roadmap))
        .route("/topic/generate", post(handlers::generate_topic))
        .route("/topic/{module_id}/{topic}", get(handlers::topic_content))
        .route("/chat", post(handlers::chat))
        .with_state(state)
}

/// 錯誤類型對應 HTTP 狀態碼
pub fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::Completion => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCategory::Parse | ErrorCategory::Validation => StatusCode::BAD_GATEWAY,
        ErrorCategory::Request => StatusCode::BAD_REQUEST,
        ErrorCategory::Ingest | ErrorCategory::Configuration | ErrorCategory::System => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for RoadmapError {
    fn into_response(self) -> Response {
        let category = self.category();
        let status = status_for(category);
        if status.is_server_error() {
            tracing::error!("❌ Request failed ({}): {}", category.as_str(), self);
        } else {
            tracing::warn!("Request rejected ({}): {}", category.as_str(), self);
        }

        let mut body = json!({
            "error": self.to_string(),
            "kind": category.as_str(),
        });
        match &self {
            RoadmapError::ModuleValidationError { index, field, .. } => {
                body["index"] = json!(index);
                body["field"] = json!(field);
            }
            RoadmapError::TopicValidationError { field, .. }
            | RoadmapError::InvalidRequest { field, .. } => {
                body["field"] = json!(field);
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}
