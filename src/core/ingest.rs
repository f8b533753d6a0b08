use crate::domain::model::{NewModuleRecord, PersistedModuleRecord, Roadmap};
use crate::domain::ports::ModuleStore;
use crate::utils::error::{Result, RoadmapError};

/// First sequence index assigned to a roadmap's modules.
pub const SEQUENCE_BASE: u32 = 0;

/// Persists validated roadmaps for a user.
///
/// Not idempotent: every call creates a new, independent roadmap even when
/// the same user and goal were ingested before.
pub struct RoadmapIngestor<S: ModuleStore> {
    store: S,
}

impl<S: ModuleStore> RoadmapIngestor<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn ingest(
        &self,
        user_id: &str,
        goal: &str,
        roadmap: &Roadmap,
    ) -> Result<Vec<PersistedModuleRecord>> {
        if user_id.trim().is_empty() {
            return Err(RoadmapError::invalid_request("user_id", "must not be empty"));
        }
        if roadmap.is_empty() {
            return Err(RoadmapError::module_validation(None, "modules", "must not be empty"));
        }

        let records: Vec<NewModuleRecord> = roadmap
            .modules
            .iter()
            .zip(SEQUENCE_BASE..)
            .map(|(module, sequence_index)| NewModuleRecord {
                sequence_index,
                module: module.clone(),
            })
            .collect();

        tracing::debug!("Ingesting {} modules for user {}", records.len(), user_id);
        self.store.save_roadmap(user_id, goal, &records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::SqliteModuleStore;
    use crate::domain::model::{Difficulty, Module};

    fn roadmap(count: usize) -> Roadmap {
        Roadmap {
            modules: (0..count)
                .map(|i| Module {
                    title: format!("Module {}", i),
                    description: format!("Step {}", i),
                    difficulty: if i < count / 2 {
                        Difficulty::Beginner
                    } else {
                        Difficulty::Advanced
                    },
                    estimated_hours: 1.5,
                    learning_objectives: vec![format!("Objective {}", i)],
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_sequence_indices_start_at_zero_and_increase() {
        let store = SqliteModuleStore::in_memory().await.unwrap();
        let ingestor = RoadmapIngestor::new(store);

        let records = ingestor.ingest("user-1", "Rust", &roadmap(6)).await.unwrap();

        assert_eq!(records.len(), 6);
        assert_eq!(records[0].sequence_index, SEQUENCE_BASE);
        for (position, pair) in records.windows(2).enumerate() {
            assert!(pair[0].sequence_index < pair[1].sequence_index);
            assert_eq!(pair[1].module.title, format!("Module {}", position + 1));
        }
        assert!(records.iter().all(|r| r.user_id == "user-1"));
        assert!(records.iter().all(|r| r.roadmap_id == records[0].roadmap_id));
    }

    #[tokio::test]
    async fn test_failure_on_nth_record_commits_nothing() {
        let store = SqliteModuleStore::in_memory().await.unwrap();
        // 在第 4 筆（索引 3）寫入時強制失敗
        sqlx::query(
            r#"
            CREATE TRIGGER fail_fourth_module BEFORE INSERT ON modules
            WHEN NEW.sequence_index = 3
            BEGIN
                SELECT RAISE(ABORT, 'forced failure');
            END
            "#,
        )
        .execute(store.pool())
        .await
        .unwrap();

        let ingestor = RoadmapIngestor::new(store);
        let err = ingestor.ingest("user-1", "Rust", &roadmap(8)).await.unwrap_err();

        assert!(matches!(err, RoadmapError::IngestError { .. }));
        assert!(err.to_string().contains("module 3"));
        assert_eq!(ingestor.store().count_modules("user-1").await.unwrap(), 0);
        assert!(ingestor.store().latest_roadmap("user-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_repeated_ingest_creates_independent_roadmaps() {
        let store = SqliteModuleStore::in_memory().await.unwrap();
        let ingestor = RoadmapIngestor::new(store);

        let first = ingestor.ingest("user-1", "Rust", &roadmap(3)).await.unwrap();
        let second = ingestor.ingest("user-1", "Rust", &roadmap(3)).await.unwrap();

        assert_ne!(first[0].roadmap_id, second[0].roadmap_id);
        assert_eq!(second[0].sequence_index, SEQUENCE_BASE);
        assert_eq!(ingestor.store().count_modules("user-1").await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_blank_user_id_is_rejected() {
        let store = SqliteModuleStore::in_memory().await.unwrap();
        let ingestor = RoadmapIngestor::new(store);

        let err = ingestor.ingest("  ", "Rust", &roadmap(2)).await.unwrap_err();
        assert!(matches!(err, RoadmapError::InvalidRequest { .. }));
    }
}
