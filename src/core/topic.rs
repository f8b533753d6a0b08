use crate::core::parser::json_candidate;
use crate::core::prompt::PromptBuilder;
use crate::domain::model::{TopicContent, TopicRequest, VideoLink};
use crate::domain::ports::{CompletionClient, CompletionMode, ModuleStore};
use crate::utils::error::{Result, RoadmapError};
use chrono::Utc;
use serde_json::{Map, Value};

const YOUTUBE_SEARCH_URL: &str = "https://www.youtube.com/results?search_query=";

/// Topic material as returned by the model, before it is tied to a module.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TopicDraft {
    pub explanation: String,
    pub key_points: Vec<String>,
    pub applications: Vec<String>,
    pub pitfalls: Vec<String>,
    pub practice_ideas: Vec<String>,
    pub search_queries: Vec<String>,
}

/// 解析主題教材。`explanation` 必填；清單欄位可省略，但出現時必須是字串清單
#[derive(Debug, Clone, Copy, Default)]
pub struct TopicParser;

impl TopicParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, raw_text: &str) -> Result<TopicDraft> {
        let value: Value = serde_json::from_str(json_candidate(raw_text)).map_err(|e| {
            tracing::warn!("⚠️ Provider returned non-JSON topic content ({}): {}", e, raw_text);
            RoadmapError::ParseError {
                message: e.to_string(),
                raw: raw_text.to_string(),
            }
        })?;

        let obj = value.as_object().ok_or_else(|| {
            RoadmapError::topic_validation("explanation", "top-level value must be a JSON object")
        })?;

        let explanation = match obj.get("explanation") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(_) => {
                return Err(RoadmapError::topic_validation(
                    "explanation",
                    "must be a non-empty string",
                ))
            }
            None => return Err(RoadmapError::topic_validation("explanation", "is missing")),
        };

        Ok(TopicDraft {
            explanation,
            key_points: string_list(obj, "keyPoints")?,
            applications: string_list(obj, "applications")?,
            pitfalls: string_list(obj, "pitfalls")?,
            practice_ideas: string_list(obj, "practiceIdeas")?,
            search_queries: string_list(obj, "youtubeSearchQueries")?,
        })
    }
}

fn string_list(obj: &Map<String, Value>, field: &str) -> Result<Vec<String>> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(values)) => values
            .iter()
            .enumerate()
            .map(|(position, value)| match value.as_str() {
                Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
                _ => Err(RoadmapError::topic_validation(
                    field,
                    format!("entry {} must be a non-empty string", position),
                )),
            })
            .collect(),
        Some(_) => Err(RoadmapError::topic_validation(field, "must be a list of strings")),
    }
}

/// YouTube 搜尋連結；查詢字串以 form-urlencoded 編碼
pub fn video_link(query: &str) -> VideoLink {
    let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
    VideoLink {
        title: query.to_string(),
        search_url: format!("{}{}", YOUTUBE_SEARCH_URL, encoded),
        embed_query: query.to_string(),
    }
}

/// Generates and caches study material for one topic of a stored module.
pub struct TopicContentService<C: CompletionClient, S: ModuleStore> {
    client: C,
    store: S,
    prompts: PromptBuilder,
    parser: TopicParser,
}

impl<C: CompletionClient, S: ModuleStore> TopicContentService<C, S> {
    pub fn new(client: C, store: S) -> Self {
        Self {
            client,
            store,
            prompts: PromptBuilder::new(),
            parser: TopicParser::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// 已快取時直接回傳，不會呼叫供應商
    pub async fn generate(&self, user_id: &str, request: &TopicRequest) -> Result<TopicContent> {
        let topic = request.topic.trim();
        if topic.is_empty() {
            return Err(RoadmapError::invalid_request("topic", "must not be empty"));
        }

        let record = self
            .store
            .find_module(user_id, request.module_id)
            .await?
            .ok_or_else(|| {
                RoadmapError::invalid_request("module_id", "does not name a module of this user")
            })?;

        if let Some(cached) = self.store.find_topic(user_id, record.id, topic).await? {
            tracing::info!("✓ Returning cached topic '{}' for module {}", topic, record.id);
            return Ok(cached);
        }

        tracing::info!("🤖 Generating topic '{}' for module {}", topic, record.id);
        let prompt = self.prompts.build_topic_prompt(
            topic,
            &record.module,
            request.target_goal.as_deref(),
        )?;

        let raw = self
            .client
            .complete(&prompt, CompletionMode::Structured)
            .await
            .inspect_err(|e| tracing::error!("❌ Completion failed: {}", e))?;
        let draft = self.parser.parse(&raw)?;

        let content = TopicContent {
            topic: topic.to_string(),
            module_id: record.id,
            module_title: record.module.title.clone(),
            difficulty: record.module.difficulty,
            explanation: draft.explanation,
            key_points: draft.key_points,
            applications: draft.applications,
            pitfalls: draft.pitfalls,
            practice_ideas: draft.practice_ideas,
            youtube_videos: draft.search_queries.iter().map(String::as_str).map(video_link).collect(),
            generated_at: Utc::now(),
        };

        self.store.save_topic(&content).await?;
        tracing::info!("✅ Stored topic '{}' for module {}", topic, record.id);
        Ok(content)
    }

    pub async fn cached(
        &self,
        user_id: &str,
        module_id: i64,
        topic: &str,
    ) -> Result<Option<TopicContent>> {
        self.store.find_topic(user_id, module_id, topic.trim()).await
    }
}
