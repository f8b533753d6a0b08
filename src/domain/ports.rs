use crate::domain::model::{NewModuleRecord, PersistedModuleRecord, StoredRoadmap, TopicContent};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 對話訊息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
}

/// A rendered prompt and the role it is sent under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub role: MessageRole,
    pub text: String,
}

impl Prompt {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            text: text.into(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            text: text.into(),
        }
    }
}

/// Structured 用於路線圖（要求 JSON 輸出），FreeText 用於導師聊天
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionMode {
    Structured,
    FreeText,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &Prompt, mode: CompletionMode) -> Result<String>;
}

#[async_trait]
impl<T: CompletionClient + ?Sized> CompletionClient for Arc<T> {
    async fn complete(&self, prompt: &Prompt, mode: CompletionMode) -> Result<String> {
        (**self).complete(prompt, mode).await
    }
}

/// Persistence for generated roadmaps and their topic content.
///
/// `save_roadmap` must be atomic: either every record is committed or none is.
/// Lookups by module id only see modules owned by the given user.
#[async_trait]
pub trait ModuleStore: Send + Sync {
    async fn save_roadmap(
        &self,
        user_id: &str,
        goal: &str,
        modules: &[NewModuleRecord],
    ) -> Result<Vec<PersistedModuleRecord>>;

    async fn latest_roadmap(&self, user_id: &str) -> Result<Option<StoredRoadmap>>;

    async fn count_modules(&self, user_id: &str) -> Result<i64>;

    async fn find_module(&self, user_id: &str, module_id: i64)
        -> Result<Option<PersistedModuleRecord>>;

    async fn find_topic(
        &self,
        user_id: &str,
        module_id: i64,
        topic: &str,
    ) -> Result<Option<TopicContent>>;

    /// 同一模組下同名主題會被覆寫
    async fn save_topic(&self, content: &TopicContent) -> Result<()>;
}

#[async_trait]
impl<T: ModuleStore + ?Sized> ModuleStore for Arc<T> {
    async fn save_roadmap(
        &self,
        user_id: &str,
        goal: &str,
        modules: &[NewModuleRecord],
    ) -> Result<Vec<PersistedModuleRecord>> {
        (**self).save_roadmap(user_id, goal, modules).await
    }

    async fn latest_roadmap(&self, user_id: &str) -> Result<Option<StoredRoadmap>> {
        (**self).latest_roadmap(user_id).await
    }

    async fn count_modules(&self, user_id: &str) -> Result<i64> {
        (**self).count_modules(user_id).await
    }

    async fn find_module(
        &self,
        user_id: &str,
        module_id: i64,
    ) -> Result<Option<PersistedModuleRecord>> {
        (**self).find_module(user_id, module_id).await
    }

    async fn find_topic(
        &self,
        user_id: &str,
        module_id: i64,
        topic: &str,
    ) -> Result<Option<TopicContent>> {
        (**self).find_topic(user_id, module_id, topic).await
    }

    async fn save_topic(&self, content: &TopicContent) -> Result<()> {
        (**self).save_topic(content).await
    }
}
