use std::sync::Arc;

use graph_flow::{Graph, GraphBuilder, Task};

use crate::ai::AiClient;
use crate::config::PipelineSettings;
use crate::tasks::*;

/// Linear claims graph: extracting -> assessing_fraud -> categorizing -> planning ->
/// summarizing -> generating_responses.
pub fn build_claims_workflow(ai: Arc<dyn AiClient>, settings: &PipelineSettings) -> Graph {
    let extract_task = Arc::new(ExtractClaimTask::new(ai.clone(), settings.extraction_max_chars));
    let extract_id = extract_task.id().to_string();

    let fraud_task = Arc::new(AssessFraudTask::new(ai.clone()));
    let fraud_id = fraud_task.id().to_string();

    let categorize_task = Arc::new(CategorizeClaimTask::new(ai.clone()));
    let categorize_id = categorize_task.id().to_string();

    let plan_task = Arc::new(PlanActionsTask);
    let plan_id = plan_task.id().to_string();

    let summary_task = Arc::new(SummarizeClaimTask::new(ai.clone()));
    let summary_id = summary_task.id().to_string();

    let responses_task = Arc::new(GenerateResponsesTask::new(ai, settings.memo_timeout));
    let responses_id = responses_task.id().to_string();

    GraphBuilder::new("claims_workflow")
        .add_task(extract_task)
        .add_task(fraud_task)
        .add_task(categorize_task)
        .add_task(plan_task)
        .add_task(summary_task)
        .add_task(responses_task)
        .add_edge(&extract_id, &fraud_id)
        .add_edge(&fraud_id, &categorize_id)
        .add_edge(&categorize_id, &plan_id)
        .add_edge(&plan_id, &summary_id)
        .add_edge(&summary_id, &responses_id)
        .set_start_task(&extract_id)
        .build()
}
