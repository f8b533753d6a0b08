use crate::core::ingest::RoadmapIngestor;
use crate::core::parser::RoadmapParser;
use crate::core::prompt::PromptBuilder;
use crate::domain::model::{GeneratedRoadmap, RoadmapRequest, StoredRoadmap};
use crate::domain::ports::{CompletionClient, CompletionMode, ModuleStore};
use crate::utils::error::Result;

/// Runs prompt → completion → parse → ingest for one request.
pub struct RoadmapEngine<C: CompletionClient, S: ModuleStore> {
    client: C,
    prompts: PromptBuilder,
    parser: RoadmapParser,
    ingestor: RoadmapIngestor<S>,
}

impl<C: CompletionClient, S: ModuleStore> RoadmapEngine<C, S> {
    pub fn new(client: C, store: S) -> Self {
        Self {
            client,
            prompts: PromptBuilder::new(),
            parser: RoadmapParser::new(),
            ingestor: RoadmapIngestor::new(store),
        }
    }

    pub fn store(&self) -> &S {
        self.ingestor.store()
    }

    pub async fn run(&self, user_id: &str, request: &RoadmapRequest) -> Result<GeneratedRoadmap> {
        tracing::info!(
            "🚀 Generating roadmap for user {} (goal: {}, {} weeks)",
            user_id,
            request.goal,
            request.timeline_weeks
        );

        // Prompt
        let prompt = self.prompts.build_roadmap_prompt(request)?;
        tracing::debug!("Built roadmap prompt ({} chars)", prompt.text.len());

        // Completion
        let raw = self
            .client
            .complete(&prompt, CompletionMode::Structured)
            .await
            .inspect_err(|e| tracing::error!("❌ Completion failed: {}", e))?;
        tracing::info!("Received completion ({} chars)", raw.len());

        // Parse
        let roadmap = self.parser.parse(&raw)?;
        tracing::info!(
            "Parsed {} modules ({:.1} hours total)",
            roadmap.len(),
            roadmap.total_hours()
        );

        // Ingest
        let modules = self.ingestor.ingest(user_id, &request.goal, &roadmap).await?;
        let roadmap_id = modules.first().map(|m| m.roadmap_id).unwrap_or_default();
        tracing::info!("✅ Stored roadmap {} with {} modules", roadmap_id, modules.len());

        Ok(GeneratedRoadmap {
            roadmap_id,
            modules,
        })
    }

    pub async fn latest(&self, user_id: &str) -> Result<Option<StoredRoadmap>> {
        self.store().latest_roadmap(user_id).await
    }
}
