use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{lenient, prompt_json, run_json_stage};
use crate::ai::{AiClient, ChatMessage};
use crate::error::StageError;
use crate::models::{
    AssignmentType, Categorization, ClaimPriority, ClaimType, Complexity, Department,
    ExtractedClaimData, FraudAssessment, PriorityLevel, Routing,
};

pub const STAGE: &str = "categorization";

const SYSTEM_PROMPT: &str = r#"You are a claims triage coordinator. Categorize the claim, set its handling priority and route it to the right department.

Route claims with high or critical fraud risk to special_investigations. Respond with ONLY the JSON object, no explanation and no markdown."#;

const DEFAULT_HANDLING_TIME: &str = "5-7 business days";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriorityDetails {
    #[serde(default, deserialize_with = "lenient::opt_label")]
    level: Option<PriorityLevel>,
    #[serde(default, deserialize_with = "lenient::opt_number")]
    score: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    reasoning: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PriorityResponse {
    Detailed(PriorityDetails),
    Label(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoutingResponse {
    #[serde(default, deserialize_with = "lenient::opt_label")]
    department: Option<Department>,
    #[serde(default, deserialize_with = "lenient::opt_label")]
    assignment_type: Option<AssignmentType>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    estimated_handling_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategorizationResponse {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    primary_category: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    secondary_category: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_label")]
    complexity: Option<Complexity>,
    priority: PriorityResponse,
    routing: RoutingResponse,
    #[serde(default, deserialize_with = "lenient::text_list")]
    processing_recommendations: Vec<String>,
    #[serde(default, deserialize_with = "lenient::text_list")]
    next_steps: Vec<String>,
}

pub fn build_messages(claim: &ExtractedClaimData, fraud: &FraudAssessment) -> Vec<ChatMessage> {
    let input = json!({ "claim": claim, "fraudAssessment": fraud });
    let user = format!(
        r#"Categorize and route this claim:

{input}

Return JSON in exactly this shape:
{{
  "primaryCategory": "short category, e.g. collision, water damage, outpatient treatment",
  "secondaryCategory": "string or null",
  "complexity": "{complexity}",
  "priority": {{ "level": "{priority}", "score": 0, "reasoning": "why" }},
  "routing": {{
    "department": "{department}",
    "assignmentType": "{assignment}",
    "estimatedHandlingTime": "e.g. 3-5 business days"
  }},
  "processingRecommendations": ["recommendation"],
  "nextSteps": ["step"]
}}

priority.score runs from 0 (can wait) to 100 (act immediately)."#,
        input = prompt_json(&input),
        complexity = Complexity::choices(),
        priority = PriorityLevel::choices(),
        department = Department::choices(),
        assignment = AssignmentType::choices(),
    );

    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)]
}

/// Categorize, prioritise and route a claim given its data and fraud assessment.
pub async fn categorize_claim(
    client: &dyn AiClient,
    claim: &ExtractedClaimData,
    fraud: &FraudAssessment,
) -> Result<Categorization, StageError> {
    let messages = build_messages(claim, fraud);
    let response: CategorizationResponse = run_json_stage(
        client,
        STAGE,
        &messages,
        &["primaryCategory", "priority", "routing"],
    )
    .await?;
    let categorization = into_categorization(response, claim.claim_type)?;

    info!(
        stage = STAGE,
        category = %categorization.primary_category,
        priority = %categorization.priority.level,
        department = %categorization.routing.department,
        "claim categorized"
    );
    Ok(categorization)
}

fn into_categorization(
    response: CategorizationResponse,
    claim_type: Option<ClaimType>,
) -> Result<Categorization, StageError> {
    let primary_category = response.primary_category.ok_or_else(|| StageError::Shape {
        stage: STAGE,
        message: "primaryCategory is empty".to_string(),
    })?;

    let (level, score, reasoning) = match response.priority {
        PriorityResponse::Detailed(details) => (details.level, details.score, details.reasoning),
        PriorityResponse::Label(label) => (PriorityLevel::try_from(label).ok(), None, None),
    };
    let score = score.map(|s| s.round().clamp(0.0, 100.0) as u8);
    let level = level
        .or_else(|| score.map(level_for_score))
        .unwrap_or(PriorityLevel::Normal);
    let score = score.unwrap_or_else(|| default_score(level));

    let routing = Routing {
        department: response
            .routing
            .department
            .unwrap_or_else(|| department_for(claim_type)),
        assignment_type: response
            .routing
            .assignment_type
            .unwrap_or(AssignmentType::Standard),
        estimated_handling_time: response
            .routing
            .estimated_handling_time
            .unwrap_or_else(|| DEFAULT_HANDLING_TIME.to_string()),
    };

    Ok(Categorization {
        primary_category,
        secondary_category: response.secondary_category,
        complexity: response.complexity.unwrap_or(Complexity::Moderate),
        priority: ClaimPriority {
            level,
            score,
            reasoning: reasoning.unwrap_or_default(),
        },
        routing,
        processing_recommendations: response.processing_recommendations,
        next_steps: response.next_steps,
    })
}

fn level_for_score(score: u8) -> PriorityLevel {
    match score {
        80.. => PriorityLevel::Urgent,
        60..=79 => PriorityLevel::High,
        30..=59 => PriorityLevel::Normal,
        _ => PriorityLevel::Low,
    }
}

fn default_score(level: PriorityLevel) -> u8 {
    match level {
        PriorityLevel::Low => 20,
        PriorityLevel::Normal => 50,
        PriorityLevel::High => 75,
        PriorityLevel::Urgent => 90,
    }
}

/// Department that owns a claim type when the model does not name one.
pub fn department_for(claim_type: Option<ClaimType>) -> Department {
    match claim_type {
        Some(ClaimType::Auto) => Department::AutoClaims,
        Some(ClaimType::Health) => Department::HealthClaims,
        Some(ClaimType::Property) => Department::PropertyClaims,
        Some(ClaimType::Life) => Department::LifeClaims,
        Some(ClaimType::Other) | None => Department::GeneralClaims,
    }
}
