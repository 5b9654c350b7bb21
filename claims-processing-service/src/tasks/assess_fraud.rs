use std::sync::Arc;

use async_trait::async_trait;
use graph_flow::{Context, NextAction, Result, Task, TaskResult};
use tracing::info;

use super::{record_fallback, session_keys};
use crate::ai::AiClient;
use crate::fallback;
use crate::models::{ExtractedClaimData, ProcessingStage};
use crate::stages::assess_fraud;

/// Scores fraud risk. Any failure is replaced by a labelled low-risk assessment.
pub struct AssessFraudTask {
    ai: Arc<dyn AiClient>,
}

impl AssessFraudTask {
    pub fn new(ai: Arc<dyn AiClient>) -> Self {
        Self { ai }
    }
}

#[async_trait]
impl Task for AssessFraudTask {
    fn id(&self) -> &str {
        ProcessingStage::AssessingFraud.as_str()
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        info!(task = self.id(), "running task");
        let claim: ExtractedClaimData = context.require(session_keys::CLAIM_DATA).await?;

        let assessment = match assess_fraud(self.ai.as_ref(), &claim).await {
            Ok(assessment) => assessment,
            Err(e) => {
                let reason = e.to_string();
                record_fallback(&context, ProcessingStage::AssessingFraud, reason.as_str()).await?;
                fallback::fraud_assessment(&reason)
            }
        };

        let status = format!(
            "Fraud risk {} ({}/100)",
            assessment.risk_level, assessment.risk_score
        );
        context.set(session_keys::FRAUD_ASSESSMENT, assessment).await?;

        Ok(TaskResult::new_with_status(
            NextAction::ContinueAndExecute,
            Some(status),
        ))
    }
}
