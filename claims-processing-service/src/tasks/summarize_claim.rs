use std::sync::Arc;

use async_trait::async_trait;
use graph_flow::{Context, NextAction, Result, Task, TaskResult};
use tracing::info;

use super::{record_fallback, session_keys};
use crate::ai::AiClient;
use crate::fallback;
use crate::models::{ActionPlan, Categorization, ExtractedClaimData, FraudAssessment, ProcessingStage};
use crate::stages::generate_summary;

/// Writes the executive summary, falling back to a templated one.
pub struct SummarizeClaimTask {
    ai: Arc<dyn AiClient>,
}

impl SummarizeClaimTask {
    pub fn new(ai: Arc<dyn AiClient>) -> Self {
        Self { ai }
    }
}

#[async_trait]
impl Task for SummarizeClaimTask {
    fn id(&self) -> &str {
        ProcessingStage::Summarizing.as_str()
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        info!(task = self.id(), "running task");
        let claim: ExtractedClaimData = context.require(session_keys::CLAIM_DATA).await?;
        let fraud: FraudAssessment = context.require(session_keys::FRAUD_ASSESSMENT).await?;
        let categorization: Categorization =
            context.require(session_keys::CATEGORIZATION).await?;
        let plan: ActionPlan = context.require(session_keys::ACTION_PLAN).await?;

        let summary =
            match generate_summary(self.ai.as_ref(), &claim, &fraud, &categorization, &plan).await
            {
                Ok(summary) => summary,
                Err(e) => {
                    let reason = e.to_string();
                    record_fallback(&context, ProcessingStage::Summarizing, reason.as_str())
                        .await?;
                    fallback::summary(&claim, &fraud, &reason)
                }
            };
        context.set(session_keys::SUMMARY, summary).await?;

        Ok(TaskResult::new_with_status(
            NextAction::ContinueAndExecute,
            Some("Summary ready".to_string()),
        ))
    }
}
