use std::sync::Arc;

use async_trait::async_trait;
use graph_flow::{Context, NextAction, Result, Task, TaskResult};
use tracing::info;

use super::{session_keys, stage_failed};
use crate::ai::AiClient;
use crate::models::{ExtractedClaimData, FraudAssessment, ProcessingStage};
use crate::stages::categorize_claim;

/// Categorizes and routes the claim. Failure is fatal.
pub struct CategorizeClaimTask {
    ai: Arc<dyn AiClient>,
}

impl CategorizeClaimTask {
    pub fn new(ai: Arc<dyn AiClient>) -> Self {
        Self { ai }
    }
}

#[async_trait]
impl Task for CategorizeClaimTask {
    fn id(&self) -> &str {
        ProcessingStage::Categorizing.as_str()
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        info!(task = self.id(), "running task");
        let claim: ExtractedClaimData = context.require(session_keys::CLAIM_DATA).await?;
        let fraud: FraudAssessment = context.require(session_keys::FRAUD_ASSESSMENT).await?;

        let categorization = categorize_claim(self.ai.as_ref(), &claim, &fraud)
            .await
            .map_err(stage_failed)?;

        let status = format!(
            "Routed to {} with {} priority",
            categorization.routing.department, categorization.priority.level
        );
        context.set(session_keys::CATEGORIZATION, categorization).await?;

        Ok(TaskResult::new_with_status(
            NextAction::ContinueAndExecute,
            Some(status),
        ))
    }
}
