// Claims processing workflow tasks, one per orchestration stage
pub mod assess_fraud;
pub mod categorize_claim;
pub mod extract_claim;
pub mod generate_responses;
pub mod plan_actions;
pub mod summarize_claim;

pub use assess_fraud::AssessFraudTask;
pub use categorize_claim::CategorizeClaimTask;
pub use extract_claim::ExtractClaimTask;
pub use generate_responses::GenerateResponsesTask;
pub use plan_actions::PlanActionsTask;
pub use summarize_claim::SummarizeClaimTask;

use graph_flow::{Context, GraphError};
use tracing::warn;

use crate::error::StageError;
use crate::models::{FallbackRecord, ProcessingStage};

/// Keys of the values tasks exchange through the session context
pub mod session_keys {
    pub const PROCESSING_ID: &str = "processing_id";
    pub const CLAIM_TEXT: &str = "claim_text";
    pub const OPTIONS: &str = "options";
    pub const CLAIM_DATA: &str = "claim_data";
    pub const VALIDATION: &str = "validation";
    pub const FRAUD_ASSESSMENT: &str = "fraud_assessment";
    pub const CATEGORIZATION: &str = "categorization";
    pub const ACTION_PLAN: &str = "action_plan";
    pub const SUMMARY: &str = "summary";
    pub const CUSTOMER_RESPONSE: &str = "customer_response";
    pub const INTERNAL_MEMO: &str = "internal_memo";
    pub const FALLBACKS: &str = "fallbacks";
}

/// Fatal stage failures abort the graph with the stage's human-readable message.
pub(crate) fn stage_failed(error: StageError) -> GraphError {
    GraphError::TaskExecutionFailed(error.to_string())
}

/// Appends a fallback marker to the session so it surfaces on the final result.
pub(crate) async fn record_fallback(
    context: &Context,
    stage: ProcessingStage,
    reason: impl Into<String>,
) -> graph_flow::Result<()> {
    let reason = reason.into();
    warn!(stage = %stage, reason = %reason, "substituting fallback");

    let mut fallbacks: Vec<FallbackRecord> = context
        .get(session_keys::FALLBACKS)
        .await
        .unwrap_or_default();
    fallbacks.push(FallbackRecord { stage, reason });
    context.set(session_keys::FALLBACKS, fallbacks).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fallbacks_accumulate_in_order() {
        let context = Context::new();
        record_fallback(&context, ProcessingStage::AssessingFraud, "rate limited")
            .await
            .unwrap();
        record_fallback(&context, ProcessingStage::Summarizing, "parse failure")
            .await
            .unwrap();

        let fallbacks: Vec<FallbackRecord> =
            context.require(session_keys::FALLBACKS).await.unwrap();
        let stages: Vec<ProcessingStage> = fallbacks.iter().map(|f| f.stage).collect();
        assert_eq!(
            stages,
            vec![ProcessingStage::AssessingFraud, ProcessingStage::Summarizing]
        );
    }

    #[test]
    fn test_stage_failure_keeps_stage_message() {
        let err = stage_failed(StageError::Shape {
            stage: "categorization",
            message: "missing required keys: routing".to_string(),
        });
        assert!(matches!(err, GraphError::TaskExecutionFailed(ref msg) if msg.contains("routing")));
    }
}
