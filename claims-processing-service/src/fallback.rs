//! Locally computed stand-ins for non-fatal AI stages.
//!
//! Every value produced here is tagged with [`Provenance::Fallback`] so downstream consumers and
//! reviewers can tell it apart from a model answer.

use crate::models::{
    ActionPlan, ClaimSummary, Confidence, CustomerResponse, ExtractedClaimData, FraudAssessment,
    InternalMemo, Provenance, RiskLevel,
};

const FALLBACK_RISK_SCORE: u8 = 20;

fn provenance(reason: &str) -> Provenance {
    Provenance::Fallback {
        reason: reason.to_string(),
    }
}

fn claim_type_label(claim: &ExtractedClaimData) -> &'static str {
    claim.claim_type.map(|t| t.as_str()).unwrap_or("unspecified")
}

fn amount_label(claim: &ExtractedClaimData) -> String {
    claim
        .estimated_amount
        .map(|amount| format!("{amount:.2}"))
        .unwrap_or_else(|| "an unstated amount".to_string())
}

pub fn fraud_assessment(reason: &str) -> FraudAssessment {
    FraudAssessment {
        risk_level: RiskLevel::Low,
        risk_score: FALLBACK_RISK_SCORE,
        fraud_indicators: Vec::new(),
        legitimacy_indicators: Vec::new(),
        recommended_actions: vec![
            "Automated fraud assessment was unavailable; perform a manual fraud screening"
                .to_string(),
        ],
        confidence: Confidence::Low,
        source: provenance(reason),
    }
}

pub fn summary(claim: &ExtractedClaimData, fraud: &FraudAssessment, reason: &str) -> ClaimSummary {
    let claimant = claim.claimant_name.as_deref().unwrap_or("Unknown claimant");
    ClaimSummary {
        executive_summary: format!(
            "{claimant} filed a {} claim for {}. Fraud risk is {} ({}/100).",
            claim_type_label(claim),
            amount_label(claim),
            fraud.risk_level,
            fraud.risk_score,
        ),
        key_findings: claim
            .missing_fields
            .iter()
            .map(|field| format!("Missing {field}"))
            .collect(),
        recommendation: "Review the claim manually; the automated summary was unavailable."
            .to_string(),
        source: provenance(reason),
    }
}

pub fn customer_response(claim: &ExtractedClaimData, reason: &str) -> CustomerResponse {
    let greeting = claim
        .claimant_name
        .as_deref()
        .map(|name| format!("Dear {name},"))
        .unwrap_or_else(|| "Dear Customer,".to_string());
    let reference = claim
        .claim_number
        .as_deref()
        .map(|number| format!(" (reference {number})"))
        .unwrap_or_default();

    CustomerResponse {
        subject: "We have received your claim".to_string(),
        message: format!(
            "{greeting}\n\nThank you for submitting your claim{reference}. It has been received \
             and is being reviewed by our claims team. We will contact you if we need any \
             further information.\n\nKind regards,\nClaims Team"
        ),
        source: provenance(reason),
    }
}

pub fn internal_memo(
    processing_id: &str,
    claim: &ExtractedClaimData,
    fraud: &FraudAssessment,
    plan: &ActionPlan,
    reason: &str,
) -> InternalMemo {
    let mut memo = format!(
        "Processing ID: {processing_id}\nClaim type: {}\nEstimated amount: {}\nFraud risk: {} ({}/100)\n\nAction items:\n",
        claim_type_label(claim),
        amount_label(claim),
        fraud.risk_level,
        fraud.risk_score,
    );
    if plan.items.is_empty() {
        memo.push_str("- none\n");
    }
    for item in &plan.items {
        memo.push_str(&format!("- [{}] {}\n", item.priority, item.action));
    }

    InternalMemo {
        subject: format!("Claim handover {processing_id}"),
        memo,
        source: provenance(reason),
    }
}
