use std::sync::Arc;

use async_trait::async_trait;
use graph_flow::{Context, NextAction, Result, Task, TaskResult};
use tracing::info;

use super::{session_keys, stage_failed};
use crate::ai::AiClient;
use crate::models::ProcessingStage;
use crate::stages::extract_claim_data;
use crate::validation::validate_claim;

/// Turns the claim text into structured data and validates it locally. Failure is fatal.
pub struct ExtractClaimTask {
    ai: Arc<dyn AiClient>,
    max_chars: usize,
}

impl ExtractClaimTask {
    pub fn new(ai: Arc<dyn AiClient>, max_chars: usize) -> Self {
        Self { ai, max_chars }
    }
}

#[async_trait]
impl Task for ExtractClaimTask {
    fn id(&self) -> &str {
        ProcessingStage::Extracting.as_str()
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let text: String = context.require(session_keys::CLAIM_TEXT).await?;
        info!(task = self.id(), characters = text.chars().count(), "running task");

        let claim = extract_claim_data(self.ai.as_ref(), &text, self.max_chars)
            .await
            .map_err(stage_failed)?;
        let validation = validate_claim(&claim);

        let status = format!(
            "Extracted {} fields, {:.0}% of required fields present",
            claim.extracted_fields.len(),
            validation.completeness * 100.0
        );
        context.set(session_keys::CLAIM_DATA, claim).await?;
        context.set(session_keys::VALIDATION, validation).await?;

        Ok(TaskResult::new_with_status(
            NextAction::ContinueAndExecute,
            Some(status),
        ))
    }
}
