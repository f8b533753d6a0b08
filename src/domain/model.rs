use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 使用者背景資料，由帳號服務提供，本核心不負責儲存
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub current_role: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
}

/// One roadmap generation invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadmapRequest {
    #[serde(default)]
    pub user_profile: UserProfile,
    pub goal: String,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    pub timeline_weeks: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [
        Difficulty::Beginner,
        Difficulty::Intermediate,
        Difficulty::Advanced,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            other => Err(format!(
                "'{}' is not one of beginner, intermediate, advanced",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub estimated_hours: f64,
    pub learning_objectives: Vec<String>,
}

/// Ordered modules; position in the list is the progression order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roadmap {
    pub modules: Vec<Module>,
}

impl Roadmap {
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn total_hours(&self) -> f64 {
        self.modules.iter().map(|m| m.estimated_hours).sum()
    }
}

/// 寫入前的模組，已指派順序索引
#[derive(Debug, Clone, PartialEq)]
pub struct NewModuleRecord {
    pub sequence_index: u32,
    pub module: Module,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedModuleRecord {
    pub id: i64,
    pub roadmap_id: i64,
    pub user_id: String,
    pub sequence_index: u32,
    #[serde(flatten)]
    pub module: Module,
    pub created_at: DateTime<Utc>,
    /// 已產生內容的主題名稱，僅在讀取已儲存的路線圖時填入
    #[serde(default)]
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRoadmap {
    pub id: i64,
    pub user_id: String,
    pub goal: String,
    pub created_at: DateTime<Utc>,
    pub modules: Vec<PersistedModuleRecord>,
}

/// Result of one full generation run.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedRoadmap {
    pub roadmap_id: i64,
    pub modules: Vec<PersistedModuleRecord>,
}

/// Request for the study material of one topic inside a stored module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicRequest {
    pub module_id: i64,
    pub topic: String,
    #[serde(default)]
    pub target_goal: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoLink {
    pub title: String,
    pub search_url: String,
    pub embed_query: String,
}

/// 主題教材；以 (module_id, topic) 為鍵快取
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicContent {
    pub topic: String,
    pub module_id: i64,
    pub module_title: String,
    pub difficulty: Difficulty,
    pub explanation: String,
    pub key_points: Vec<String>,
    pub applications: Vec<String>,
    pub pitfalls: Vec<String>,
    pub practice_ideas: Vec<String>,
    pub youtube_videos: Vec<VideoLink>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MentorContext {
    #[serde(default)]
    pub user_background: Option<String>,
    #[serde(default)]
    pub current_module_title: Option<String>,
}
