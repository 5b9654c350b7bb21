use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{lenient, prompt_json, run_json_stage};
use crate::ai::{AiClient, ChatMessage};
use crate::error::StageError;
use crate::models::{
    ActionPlan, Categorization, ClaimSummary, CustomerResponse, ExtractedClaimData,
    FraudAssessment, InternalMemo, Provenance,
};

pub const SUMMARY_STAGE: &str = "summary";
pub const CUSTOMER_RESPONSE_STAGE: &str = "customer_response";
pub const INTERNAL_MEMO_STAGE: &str = "internal_memo";

const SUMMARY_PROMPT: &str = r#"You are a senior claims adjuster writing an executive summary for a claims manager. Be factual and concise: three sentences at most for the summary itself.

Respond with ONLY the JSON object, no explanation and no markdown."#;

const CUSTOMER_PROMPT: &str = r#"You write customer communications for an insurance company. Write a short, warm and professional message to the claimant acknowledging their claim and explaining what happens next. Never mention fraud screening, risk scores or internal routing.

Respond with ONLY the JSON object, no explanation and no markdown."#;

const MEMO_PROMPT: &str = r#"You write the internal memo that hands a processed claim over to the assigned adjuster. Cover the claim facts, the risk assessment, the routing decision and the open action items.

Respond with ONLY the JSON object, no explanation and no markdown."#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResponse {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    executive_summary: Option<String>,
    #[serde(default, deserialize_with = "lenient::text_list")]
    key_findings: Vec<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    recommendation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomerResponseBody {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    subject: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemoResponse {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    subject: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    memo: Option<String>,
}

fn required_text(value: Option<String>, stage: &'static str, key: &str) -> Result<String, StageError> {
    value.ok_or_else(|| StageError::Shape {
        stage,
        message: format!("{key} is empty"),
    })
}

fn claim_reference(claim: &ExtractedClaimData) -> &str {
    claim.claim_number.as_deref().unwrap_or("your recent claim")
}

pub async fn generate_summary(
    client: &dyn AiClient,
    claim: &ExtractedClaimData,
    fraud: &FraudAssessment,
    categorization: &Categorization,
    plan: &ActionPlan,
) -> Result<ClaimSummary, StageError> {
    let input = json!({
        "claim": claim,
        "fraudAssessment": fraud,
        "categorization": categorization,
        "actionPlan": plan,
    });
    let user = format!(
        r#"Summarize this processed claim:

{input}

Return JSON in exactly this shape:
{{
  "executiveSummary": "two or three sentences",
  "keyFindings": ["finding"],
  "recommendation": "one sentence"
}}"#,
        input = prompt_json(&input),
    );
    let messages = [ChatMessage::system(SUMMARY_PROMPT), ChatMessage::user(user)];

    let response: SummaryResponse =
        run_json_stage(client, SUMMARY_STAGE, &messages, &["executiveSummary"]).await?;
    let summary = ClaimSummary {
        executive_summary: required_text(
            response.executive_summary,
            SUMMARY_STAGE,
            "executiveSummary",
        )?,
        key_findings: response.key_findings,
        recommendation: response.recommendation.unwrap_or_default(),
        source: Provenance::Ai,
    };

    info!(stage = SUMMARY_STAGE, findings = summary.key_findings.len(), "summary generated");
    Ok(summary)
}

pub async fn generate_customer_response(
    client: &dyn AiClient,
    claim: &ExtractedClaimData,
    categorization: &Categorization,
) -> Result<CustomerResponse, StageError> {
    let input = json!({
        "claimNumber": claim.claim_number,
        "claimantName": claim.claimant_name,
        "claimType": claim.claim_type,
        "incidentDate": claim.incident_date,
        "estimatedHandlingTime": categorization.routing.estimated_handling_time,
        "nextSteps": categorization.next_steps,
    });
    let user = format!(
        r#"Write the acknowledgment message for this claim:

{input}

Return JSON in exactly this shape:
{{
  "subject": "email subject line",
  "message": "the full message to the claimant"
}}"#,
        input = prompt_json(&input),
    );
    let messages = [ChatMessage::system(CUSTOMER_PROMPT), ChatMessage::user(user)];

    let response: CustomerResponseBody =
        run_json_stage(client, CUSTOMER_RESPONSE_STAGE, &messages, &["message"]).await?;
    let customer_response = CustomerResponse {
        subject: response
            .subject
            .unwrap_or_else(|| format!("Update on {}", claim_reference(claim))),
        message: required_text(response.message, CUSTOMER_RESPONSE_STAGE, "message")?,
        source: Provenance::Ai,
    };

    info!(stage = CUSTOMER_RESPONSE_STAGE, "customer response generated");
    Ok(customer_response)
}

pub async fn generate_internal_memo(
    client: &dyn AiClient,
    processing_id: &str,
    claim: &ExtractedClaimData,
    fraud: &FraudAssessment,
    categorization: &Categorization,
    plan: &ActionPlan,
) -> Result<InternalMemo, StageError> {
    let input = json!({
        "processingId": processing_id,
        "claim": claim,
        "fraudAssessment": fraud,
        "categorization": categorization,
        "actionPlan": plan,
    });
    let user = format!(
        r#"Write the internal handover memo for this claim:

{input}

Return JSON in exactly this shape:
{{
  "subject": "memo subject line",
  "memo": "the full memo text"
}}"#,
        input = prompt_json(&input),
    );
    let messages = [ChatMessage::system(MEMO_PROMPT), ChatMessage::user(user)];

    let response: MemoResponse =
        run_json_stage(client, INTERNAL_MEMO_STAGE, &messages, &["memo"]).await?;
    let memo = InternalMemo {
        subject: response
            .subject
            .unwrap_or_else(|| format!("Claim handover {processing_id}")),
        memo: required_text(response.memo, INTERNAL_MEMO_STAGE, "memo")?,
        source: Provenance::Ai,
    };

    info!(stage = INTERNAL_MEMO_STAGE, processing_id, "internal memo generated");
    Ok(memo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AssignmentType, ClaimPriority, ClaimType, Complexity, Confidence, Department,
        PriorityLevel, RiskLevel, Routing,
    };
    use crate::stages::testing::ScriptedAiClient;

    fn fixtures() -> (ExtractedClaimData, FraudAssessment, Categorization) {
        let claim = ExtractedClaimData {
            claim_number: Some("CLM-001".to_string()),
            claimant_name: Some("Jane Doe".to_string()),
            claim_type: Some(ClaimType::Auto),
            ..ExtractedClaimData::default()
        };
        let fraud = FraudAssessment {
            risk_level: RiskLevel::Low,
            risk_score: 12,
            fraud_indicators: vec![],
            legitimacy_indicators: vec![],
            recommended_actions: vec![],
            confidence: Confidence::High,
            source: Provenance::Ai,
        };
        let categorization = Categorization {
            primary_category: "collision".to_string(),
            secondary_category: None,
            complexity: Complexity::Simple,
            priority: ClaimPriority {
                level: PriorityLevel::Normal,
                score: 50,
                reasoning: String::new(),
            },
            routing: Routing {
                department: Department::AutoClaims,
                assignment_type: AssignmentType::Standard,
                estimated_handling_time: "3-5 business days".to_string(),
            },
            processing_recommendations: vec![],
            next_steps: vec![],
        };
        (claim, fraud, categorization)
    }

    #[tokio::test]
    async fn test_summary_requires_executive_summary() {
        let (claim, fraud, categorization) = fixtures();
        let plan = ActionPlan::default();

        let client = ScriptedAiClient::new().reply(
            "executive summary",
            r#"{"executiveSummary": "Low-risk rear-end collision.", "keyFindings": ["Police report"]}"#,
        );
        let summary = generate_summary(&client, &claim, &fraud, &categorization, &plan)
            .await
            .unwrap();
        assert_eq!(summary.executive_summary, "Low-risk rear-end collision.");
        assert_eq!(summary.source, Provenance::Ai);

        let client = ScriptedAiClient::new().reply("executive summary", r#"{"executiveSummary": ""}"#);
        let err = generate_summary(&client, &claim, &fraud, &categorization, &plan)
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Shape { stage: SUMMARY_STAGE, .. }));
    }

    #[tokio::test]
    async fn test_customer_response_defaults_subject_and_hides_risk() {
        let (claim, _fraud, categorization) = fixtures();
        let client = ScriptedAiClient::new().reply(
            "customer communications",
            r#"{"message": "Dear Jane, we have received your claim."}"#,
        );

        let response = generate_customer_response(&client, &claim, &categorization)
            .await
            .unwrap();
        assert_eq!(response.subject, "Update on CLM-001");
        assert!(response.message.starts_with("Dear Jane"));
        assert!(!client.user_turn(0).contains("riskScore"));
    }

    #[tokio::test]
    async fn test_memo_carries_processing_id_in_prompt() {
        let (claim, fraud, categorization) = fixtures();
        let client = ScriptedAiClient::new().reply("internal memo", r#"{"memo": "Handover"}"#);

        let memo = generate_internal_memo(
            &client,
            "proc-42",
            &claim,
            &fraud,
            &categorization,
            &ActionPlan::default(),
        )
        .await
        .unwrap();
        assert_eq!(memo.subject, "Claim handover proc-42");
        assert!(client.user_turn(0).contains("proc-42"));
    }
}
