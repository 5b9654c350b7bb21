use serde::Deserialize;
use tracing::info;

use super::{lenient, prompt_json, run_json_stage};
use crate::ai::{AiClient, ChatMessage};
use crate::error::StageError;
use crate::models::{Confidence, ExtractedClaimData, FraudAssessment, FraudIndicator, Provenance, RiskLevel};

pub const STAGE: &str = "fraud_assessment";

const SYSTEM_PROMPT: &str = r#"You are an experienced insurance fraud analyst. Assess the fraud risk of the claim you are given.

Consider timing (late reporting, recent policy changes), inconsistencies between fields, unusually high or round amounts, missing documentation and vague descriptions. Also list the factors that support the claim being legitimate.

Respond with ONLY the JSON object, no explanation and no markdown."#;

const DEFAULT_SEVERITY: u8 = 5;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IndicatorResponse {
    Detailed {
        #[serde(default, deserialize_with = "lenient::opt_text", alias = "indicator")]
        description: Option<String>,
        #[serde(default, deserialize_with = "lenient::opt_number")]
        severity: Option<f64>,
        #[serde(default, deserialize_with = "lenient::opt_text")]
        explanation: Option<String>,
    },
    Brief(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FraudResponse {
    #[serde(default, deserialize_with = "lenient::opt_label")]
    risk_level: Option<RiskLevel>,
    #[serde(default, deserialize_with = "lenient::opt_number")]
    risk_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient::list_or_null")]
    fraud_indicators: Vec<IndicatorResponse>,
    #[serde(default, deserialize_with = "lenient::text_list")]
    legitimacy_indicators: Vec<String>,
    #[serde(default, deserialize_with = "lenient::text_list")]
    recommended_actions: Vec<String>,
    #[serde(default, deserialize_with = "lenient::opt_label")]
    confidence: Option<Confidence>,
}

pub fn build_messages(claim: &ExtractedClaimData) -> Vec<ChatMessage> {
    let user = format!(
        r#"Assess the fraud risk of this claim:

{claim}

Return JSON in exactly this shape:
{{
  "riskLevel": "{risk_levels}",
  "riskScore": 0,
  "fraudIndicators": [
    {{ "description": "what looks suspicious", "severity": 1, "explanation": "why it matters" }}
  ],
  "legitimacyIndicators": ["factor supporting the claim"],
  "recommendedActions": ["next step for the adjuster"],
  "confidence": "{confidence}"
}}

riskScore runs from 0 (no concern) to 100 (almost certainly fraudulent). severity runs from 1 (minor) to 10 (severe)."#,
        claim = prompt_json(claim),
        risk_levels = RiskLevel::choices(),
        confidence = Confidence::choices(),
    );

    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)]
}

/// Score the fraud risk of extracted claim data.
pub async fn assess_fraud(
    client: &dyn AiClient,
    claim: &ExtractedClaimData,
) -> Result<FraudAssessment, StageError> {
    let messages = build_messages(claim);
    let response: FraudResponse = run_json_stage(client, STAGE, &messages, &["riskLevel"]).await?;
    let assessment = into_assessment(response)?;

    info!(
        stage = STAGE,
        risk_level = %assessment.risk_level,
        risk_score = assessment.risk_score,
        indicators = assessment.fraud_indicators.len(),
        "fraud assessment complete"
    );
    Ok(assessment)
}

fn into_assessment(response: FraudResponse) -> Result<FraudAssessment, StageError> {
    let risk_level = response.risk_level.ok_or_else(|| StageError::Shape {
        stage: STAGE,
        message: format!("riskLevel must be one of {}", RiskLevel::choices()),
    })?;

    let risk_score = response
        .risk_score
        .map(|score| score.round().clamp(0.0, 100.0) as u8)
        .unwrap_or_else(|| risk_level.midpoint_score());

    let fraud_indicators = response
        .fraud_indicators
        .into_iter()
        .filter_map(|indicator| match indicator {
            IndicatorResponse::Detailed {
                description,
                severity,
                explanation,
            } => description.map(|description| FraudIndicator {
                description,
                severity: severity
                    .map(|s| s.round().clamp(1.0, 10.0) as u8)
                    .unwrap_or(DEFAULT_SEVERITY),
                explanation: explanation.unwrap_or_default(),
            }),
            IndicatorResponse::Brief(description) if !description.trim().is_empty() => {
                Some(FraudIndicator {
                    description,
                    severity: DEFAULT_SEVERITY,
                    explanation: String::new(),
                })
            }
            IndicatorResponse::Brief(_) => None,
        })
        .collect();

    Ok(FraudAssessment {
        risk_level,
        risk_score,
        fraud_indicators,
        legitimacy_indicators: response.legitimacy_indicators,
        recommended_actions: response.recommended_actions,
        confidence: response.confidence.unwrap_or_default(),
        source: Provenance::Ai,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::ScriptedAiClient;

    fn claim() -> ExtractedClaimData {
        ExtractedClaimData {
            claim_number: Some("CLM-001".to_string()),
            estimated_amount: Some(2500.0),
            ..ExtractedClaimData::default()
        }
    }

    #[tokio::test]
    async fn test_scores_are_clamped_and_indicators_normalized() {
        let client = ScriptedAiClient::new().reply(
            "fraud analyst",
            r#"{
                "riskLevel": "Medium",
                "riskScore": 140,
                "fraudIndicators": [
                    {"description": "Reported late", "severity": 12, "explanation": "9 days"},
                    "Round amount",
                    {"severity": 3}
                ],
                "legitimacyIndicators": "Police report filed",
                "confidence": "medium"
            }"#,
        );

        let assessment = assess_fraud(&client, &claim()).await.unwrap();
        assert_eq!(assessment.risk_level, RiskLevel::Medium);
        assert_eq!(assessment.risk_score, 100);
        assert_eq!(assessment.fraud_indicators.len(), 2);
        assert_eq!(assessment.fraud_indicators[0].severity, 10);
        assert_eq!(assessment.fraud_indicators[1].description, "Round amount");
        assert_eq!(assessment.legitimacy_indicators, vec!["Police report filed"]);
        assert_eq!(assessment.source, Provenance::Ai);
    }

    #[tokio::test]
    async fn test_missing_score_is_derived_from_level() {
        let client = ScriptedAiClient::new().reply("fraud analyst", r#"{"riskLevel": "critical"}"#);
        let assessment = assess_fraud(&client, &claim()).await.unwrap();
        assert_eq!(assessment.risk_score, RiskLevel::Critical.midpoint_score());
        assert_eq!(assessment.confidence, Confidence::Low);
    }

    #[tokio::test]
    async fn test_unknown_risk_level_is_a_shape_error() {
        let client = ScriptedAiClient::new().reply("fraud analyst", r#"{"riskLevel": "spicy"}"#);
        let err = assess_fraud(&client, &claim()).await.unwrap_err();
        assert!(err.to_string().contains("riskLevel must be one of"));
    }

    #[tokio::test]
    async fn test_prompt_lists_legal_risk_levels_and_claim() {
        let client = ScriptedAiClient::new().reply("fraud analyst", r#"{"riskLevel": "low"}"#);
        assess_fraud(&client, &claim()).await.unwrap();

        let user = client.user_turn(0);
        assert!(user.contains("low|medium|high|critical"));
        assert!(user.contains("CLM-001"));
    }
}
