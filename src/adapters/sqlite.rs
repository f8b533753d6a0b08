use crate::domain::model::{
    Difficulty, Module, NewModuleRecord, PersistedModuleRecord, StoredRoadmap, TopicContent,
};
use crate::domain::ports::ModuleStore;
use crate::utils::error::{Result, RoadmapError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::time::Duration;

const SCHEMA: [&str; 4] = [
    r#"
    CREATE TABLE IF NOT EXISTS roadmaps (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        goal TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS modules (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        roadmap_id INTEGER NOT NULL REFERENCES roadmaps(id) ON DELETE CASCADE,
        user_id TEXT NOT NULL,
        sequence_index INTEGER NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        difficulty TEXT NOT NULL CHECK (difficulty IN ('beginner', 'intermediate', 'advanced')),
        estimated_hours REAL NOT NULL CHECK (estimated_hours > 0),
        learning_objectives TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE (roadmap_id, sequence_index)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_modules_user ON modules (user_id, roadmap_id, sequence_index)",
    r#"
    CREATE TABLE IF NOT EXISTS topics (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        module_id INTEGER NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE (module_id, title)
    )
    "#,
];

/// SQLite 儲存層；整份路線圖在單一交易內寫入
#[derive(Debug, Clone)]
pub struct SqliteModuleStore {
    pool: SqlitePool,
}

impl SqliteModuleStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        tracing::info!("Connecting to database: {}", database_url);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// In-memory database on a single pinned connection, so every query sees
    /// the same data.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::debug!("Database schema ready");
        Ok(())
    }

    async fn modules_for_roadmap(&self, roadmap_id: i64) -> Result<Vec<PersistedModuleRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, roadmap_id, user_id, sequence_index, title, description, difficulty,
                   estimated_hours, learning_objectives, created_at
            FROM modules
            WHERE roadmap_id = ?
            ORDER BY sequence_index ASC
            "#,
        )
        .bind(roadmap_id)
        .fetch_all(&self.pool)
        .await?;
        let mut records = rows.iter().map(record_from_row).collect::<Result<Vec<_>>>()?;

        // 依模組掛上已快取的主題名稱
        let topic_rows = sqlx::query(
            r#"
            SELECT t.module_id, t.title
            FROM topics t
            JOIN modules m ON m.id = t.module_id
            WHERE m.roadmap_id = ?
            ORDER BY t.id ASC
            "#,
        )
        .bind(roadmap_id)
        .fetch_all(&self.pool)
        .await?;

        for row in topic_rows {
            let module_id: i64 = row.try_get("module_id")?;
            if let Some(record) = records.iter_mut().find(|r| r.id == module_id) {
                record.topics.push(row.try_get("title")?);
            }
        }

        Ok(records)
    }
}

fn record_from_row(row: &SqliteRow) -> Result<PersistedModuleRecord> {
    let difficulty: String = row.try_get("difficulty")?;
    let difficulty = difficulty
        .parse::<Difficulty>()
        .map_err(|reason| RoadmapError::IngestError {
            message: format!("stored module has invalid difficulty: {}", reason),
        })?;
    let objectives: String = row.try_get("learning_objectives")?;
    let sequence_index: i64 = row.try_get("sequence_index")?;

    Ok(PersistedModuleRecord {
        id: row.try_get("id")?,
        roadmap_id: row.try_get("roadmap_id")?,
        user_id: row.try_get("user_id")?,
        sequence_index: sequence_index as u32,
        module: Module {
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            difficulty,
            estimated_hours: row.try_get("estimated_hours")?,
            learning_objectives: serde_json::from_str(&objectives)?,
        },
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        topics: Vec::new(),
    })
}

fn ingest_error(context: &str, err: sqlx::Error) -> RoadmapError {
    RoadmapError::IngestError {
        message: format!("{}: {}", context, err),
    }
}

#[async_trait]
impl ModuleStore for SqliteModuleStore {
    async fn save_roadmap(
        &self,
        user_id: &str,
        goal: &str,
        modules: &[NewModuleRecord],
    ) -> Result<Vec<PersistedModuleRecord>> {
        let created_at = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ingest_error("failed to open transaction", e))?;

        let roadmap_id: i64 = sqlx::query(
            "INSERT INTO roadmaps (user_id, goal, created_at) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(user_id)
        .bind(goal)
        .bind(created_at)
        .fetch_one(&mut *tx)
        .await
        .and_then(|row| row.try_get("id"))
        .map_err(|e| ingest_error("failed to insert roadmap", e))?;

        let mut records = Vec::with_capacity(modules.len());
        for new_module in modules {
            let objectives = serde_json::to_string(&new_module.module.learning_objectives)?;

            // 任一筆失敗時 tx 會在離開作用域時回滾
            let id: i64 = sqlx::query(
                r#"
                INSERT INTO modules (
                    roadmap_id, user_id, sequence_index, title, description, difficulty,
                    estimated_hours, learning_objectives, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                RETURNING id
                "#,
            )
            .bind(roadmap_id)
            .bind(user_id)
            .bind(new_module.sequence_index as i64)
            .bind(&new_module.module.title)
            .bind(&new_module.module.description)
            .bind(new_module.module.difficulty.as_str())
            .bind(new_module.module.estimated_hours)
            .bind(&objectives)
            .bind(created_at)
            .fetch_one(&mut *tx)
            .await
            .and_then(|row| row.try_get("id"))
            .map_err(|e| {
                ingest_error(
                    &format!("failed to insert module {}", new_module.sequence_index),
                    e,
                )
            })?;

            records.push(PersistedModuleRecord {
                id,
                roadmap_id,
                user_id: user_id.to_string(),
                sequence_index: new_module.sequence_index,
                module: new_module.module.clone(),
                created_at,
                topics: Vec::new(),
            });
        }

        tx.commit()
            .await
            .map_err(|e| ingest_error("failed to commit roadmap", e))?;

        tracing::debug!(
            "Committed roadmap {} with {} modules for user {}",
            roadmap_id,
            records.len(),
            user_id
        );
        Ok(records)
    }

    async fn latest_roadmap(&self, user_id: &str) -> Result<Option<StoredRoadmap>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, goal, created_at
            FROM roadmaps
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id: i64 = row.try_get("id")?;
        let modules = self.modules_for_roadmap(id).await?;

        Ok(Some(StoredRoadmap {
            id,
            user_id: row.try_get("user_id")?,
            goal: row.try_get("goal")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            modules,
        }))
    }

    async fn count_modules(&self, user_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM modules WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn find_module(
        &self,
        user_id: &str,
        module_id: i64,
    ) -> Result<Option<PersistedModuleRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, roadmap_id, user_id, sequence_index, title, description, difficulty,
                   estimated_hours, learning_objectives, created_at
            FROM modules
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(module_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn find_topic(
        &self,
        user_id: &str,
        module_id: i64,
        topic: &str,
    ) -> Result<Option<TopicContent>> {
        let content: Option<String> = sqlx::query_scalar(
            r#"
            SELECT t.content
            FROM topics t
            JOIN modules m ON m.id = t.module_id
            WHERE t.module_id = ? AND t.title = ? AND m.user_id = ?
            "#,
        )
        .bind(module_id)
        .bind(topic)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        content
            .map(|json| serde_json::from_str(&json).map_err(RoadmapError::from))
            .transpose()
    }

    async fn save_topic(&self, content: &TopicContent) -> Result<()> {
        let json = serde_json::to_string(content)?;

        sqlx::query(
            r#"
            INSERT INTO topics (module_id, title, content, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (module_id, title)
            DO UPDATE SET content = excluded.content, created_at = excluded.created_at
            "#,
        )
        .bind(content.module_id)
        .bind(&content.topic)
        .bind(&json)
        .bind(content.generated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| ingest_error(&format!("failed to save topic '{}'", content.topic), e))?;

        tracing::debug!("Saved topic '{}' for module {}", content.topic, content.module_id);
        Ok(())
    }
}
