use crate::core::prompt::PromptBuilder;
use crate::domain::model::MentorContext;
use crate::domain::ports::{CompletionClient, CompletionMode};
use crate::utils::error::{Result, RoadmapError};

/// Socratic mentor chat. Nothing is persisted and the answer is returned as
/// the provider produced it.
pub struct MentorChatService<C: CompletionClient> {
    client: C,
    prompts: PromptBuilder,
}

impl<C: CompletionClient> MentorChatService<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            prompts: PromptBuilder::new(),
        }
    }

    pub async fn respond(&self, question: &str, context: &MentorContext) -> Result<String> {
        if question.trim().is_empty() {
            return Err(RoadmapError::invalid_request("message", "must not be empty"));
        }

        let prompt = self.prompts.build_mentor_prompt(question, context);
        tracing::info!("💬 Mentor question received ({} chars)", question.len());

        let answer = self.client.complete(&prompt, CompletionMode::FreeText).await?;
        tracing::debug!("Mentor answer: {} chars", answer.len());
        Ok(answer)
    }
}
