use async_trait::async_trait;
use graph_flow::{Context, NextAction, Result, Task, TaskResult};
use tracing::info;

use super::session_keys;
use crate::action_plan::build_action_plan;
use crate::models::{
    Categorization, ExtractedClaimData, FraudAssessment, ProcessingStage, ValidationReport,
};

/// Derives the action plan locally; no model call.
pub struct PlanActionsTask;

#[async_trait]
impl Task for PlanActionsTask {
    fn id(&self) -> &str {
        ProcessingStage::Planning.as_str()
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let claim: ExtractedClaimData = context.require(session_keys::CLAIM_DATA).await?;
        let validation: ValidationReport = context.require(session_keys::VALIDATION).await?;
        let fraud: FraudAssessment = context.require(session_keys::FRAUD_ASSESSMENT).await?;
        let categorization: Categorization =
            context.require(session_keys::CATEGORIZATION).await?;

        let plan = build_action_plan(&claim, &validation, &fraud, &categorization);
        info!(task = self.id(), items = plan.items.len(), "action plan built");

        let status = format!("{} action items", plan.items.len());
        context.set(session_keys::ACTION_PLAN, plan).await?;

        Ok(TaskResult::new_with_status(
            NextAction::ContinueAndExecute,
            Some(status),
        ))
    }
}
