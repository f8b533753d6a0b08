use super::{AppState, USER_ID_HEADER};
use crate::domain::model::{
    GeneratedRoadmap, MentorContext, RoadmapRequest, StoredRoadmap, TopicContent, TopicRequest,
};
use crate::utils::error::{Result, RoadmapError};
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

type JsonBody<T> = std::result::Result<Json<T>, JsonRejection>;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub context: MentorContext,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Serialize)]
pub struct LatestRoadmapResponse {
    pub roadmap: Option<StoredRoadmap>,
}

#[derive(Debug, Serialize)]
pub struct TopicResponse {
    pub content: Option<TopicContent>,
}

fn user_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "User ID required", "kind": "unauthorized" })),
    )
        .into_response()
}

/// 請求本文無法解碼時改回 400 與統一的錯誤格式
fn body_error(rejection: JsonRejection) -> RoadmapError {
    RoadmapError::invalid_request("body", rejection.body_text())
}

fn path_error(rejection: PathRejection) -> RoadmapError {
    RoadmapError::invalid_request("path", rejection.body_text())
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

pub async fn generate_roadmap(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: JsonBody<RoadmapRequest>,
) -> Response {
    let Some(user_id) = user_id(&headers) else {
        return unauthorized();
    };
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => return body_error(rejection).into_response(),
    };

    let result: Result<GeneratedRoadmap> = state.engine.run(user_id, &request).await;
    match result {
        Ok(generated) => (StatusCode::CREATED, Json(generated)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn latest_roadmap(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let Some(user_id) = user_id(&headers) else {
        return unauthorized();
    };

    match state.engine.latest(user_id).await {
        Ok(roadmap) => Json(LatestRoadmapResponse { roadmap }).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn generate_topic(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: JsonBody<TopicRequest>,
) -> Response {
    let Some(user_id) = user_id(&headers) else {
        return unauthorized();
    };
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => return body_error(rejection).into_response(),
    };

    match state.topics.generate(user_id, &request).await {
        Ok(content) => Json(TopicResponse {
            content: Some(content),
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn topic_content(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    path: std::result::Result<Path<(i64, String)>, PathRejection>,
) -> Response {
    let Some(user_id) = user_id(&headers) else {
        return unauthorized();
    };
    let (module_id, topic) = match path {
        Ok(Path(parts)) => parts,
        Err(rejection) => return path_error(rejection).into_response(),
    };

    match state.topics.cached(user_id, module_id, &topic).await {
        Ok(content) => Json(TopicResponse { content }).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    body: JsonBody<ChatRequest>,
) -> std::result::Result<Json<ChatResponse>, RoadmapError> {
    let Json(request) = body.map_err(body_error)?;
    let response = state.mentor.respond(&request.message, &request.context).await?;
    Ok(Json(ChatResponse { response }))
}
