use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use graph_flow::{Context, NextAction, Result, Task, TaskResult};
use tokio::time::timeout;
use tracing::info;

use super::{record_fallback, session_keys};
use crate::ai::AiClient;
use crate::fallback;
use crate::models::{
    ActionPlan, Categorization, ExtractedClaimData, FraudAssessment, ProcessingOptions,
    ProcessingStage,
};
use crate::stages::{generate_customer_response, generate_internal_memo};

/// Writes the customer acknowledgment and the internal memo, the last step of the graph.
///
/// The memo races a timeout; a late completion is dropped and replaced by the templated memo.
pub struct GenerateResponsesTask {
    ai: Arc<dyn AiClient>,
    memo_timeout: Duration,
}

impl GenerateResponsesTask {
    pub fn new(ai: Arc<dyn AiClient>, memo_timeout: Duration) -> Self {
        Self { ai, memo_timeout }
    }
}

#[async_trait]
impl Task for GenerateResponsesTask {
    fn id(&self) -> &str {
        ProcessingStage::GeneratingResponses.as_str()
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        info!(task = self.id(), "running task");
        let options: ProcessingOptions = context.get(session_keys::OPTIONS).await.unwrap_or_default();
        let processing_id: String = context.require(session_keys::PROCESSING_ID).await?;
        let claim: ExtractedClaimData = context.require(session_keys::CLAIM_DATA).await?;
        let fraud: FraudAssessment = context.require(session_keys::FRAUD_ASSESSMENT).await?;
        let categorization: Categorization =
            context.require(session_keys::CATEGORIZATION).await?;
        let plan: ActionPlan = context.require(session_keys::ACTION_PLAN).await?;

        if options.generate_customer_response {
            let response =
                match generate_customer_response(self.ai.as_ref(), &claim, &categorization).await {
                    Ok(response) => response,
                    Err(e) => {
                        let reason = e.to_string();
                        record_fallback(&context, ProcessingStage::GeneratingResponses, reason.as_str())
                            .await?;
                        fallback::customer_response(&claim, &reason)
                    }
                };
            context.set(session_keys::CUSTOMER_RESPONSE, response).await?;
        }

        if options.generate_internal_memo {
            let generation = generate_internal_memo(
                self.ai.as_ref(),
                &processing_id,
                &claim,
                &fraud,
                &categorization,
                &plan,
            );
            let failure = match timeout(self.memo_timeout, generation).await {
                Ok(Ok(memo)) => {
                    context.set(session_keys::INTERNAL_MEMO, memo).await?;
                    None
                }
                Ok(Err(e)) => Some(e.to_string()),
                Err(_) => Some(format!(
                    "internal memo timed out after {} ms",
                    self.memo_timeout.as_millis()
                )),
            };

            if let Some(reason) = failure {
                record_fallback(&context, ProcessingStage::GeneratingResponses, reason.as_str())
                    .await?;
                let memo = fallback::internal_memo(&processing_id, &claim, &fraud, &plan, &reason);
                context.set(session_keys::INTERNAL_MEMO, memo).await?;
            }
        }

        Ok(TaskResult::new_with_status(
            NextAction::End,
            Some("Responses generated".to_string()),
        ))
    }
}
