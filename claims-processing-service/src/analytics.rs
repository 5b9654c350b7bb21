//! Aggregate statistics over stored processing runs. Pure reduction, no model calls.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::RiskLevel;
use crate::store::ProcessingSessionRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimAnalytics {
    pub total_claims: usize,
    pub status_distribution: BTreeMap<String, usize>,
    pub review_distribution: BTreeMap<String, usize>,
    pub risk_distribution: BTreeMap<String, usize>,
    pub category_distribution: BTreeMap<String, usize>,
    pub claim_type_distribution: BTreeMap<String, usize>,
    /// Runs where at least one stage fell back to a local substitute
    pub fallback_count: usize,
    /// Runs assessed as high or critical risk
    pub high_risk_count: usize,
    pub total_estimated_amount: f64,
    /// Over runs that stated an amount; 0 when none did
    pub average_estimated_amount: f64,
    /// Milliseconds, over all runs
    pub average_processing_time: f64,
    pub generated_at: DateTime<Utc>,
}

fn bump(map: &mut BTreeMap<String, usize>, key: impl Into<String>) {
    *map.entry(key.into()).or_default() += 1;
}

pub fn compute_analytics(records: &[ProcessingSessionRecord]) -> ClaimAnalytics {
    let mut analytics = ClaimAnalytics {
        total_claims: records.len(),
        status_distribution: BTreeMap::new(),
        review_distribution: BTreeMap::new(),
        risk_distribution: BTreeMap::new(),
        category_distribution: BTreeMap::new(),
        claim_type_distribution: BTreeMap::new(),
        fallback_count: 0,
        high_risk_count: 0,
        total_estimated_amount: 0.0,
        average_estimated_amount: 0.0,
        average_processing_time: 0.0,
        generated_at: Utc::now(),
    };

    let mut amounts = 0usize;
    let mut total_time = 0u64;

    for record in records {
        let result = &record.result;
        bump(&mut analytics.status_distribution, result.status.as_str());
        bump(&mut analytics.review_distribution, record.review_status.as_str());
        total_time += result.processing_time;

        if !result.fallbacks.is_empty() {
            analytics.fallback_count += 1;
        }
        if let Some(fraud) = &result.fraud_assessment {
            bump(&mut analytics.risk_distribution, fraud.risk_level.as_str());
            if matches!(fraud.risk_level, RiskLevel::High | RiskLevel::Critical) {
                analytics.high_risk_count += 1;
            }
        }
        if let Some(categorization) = &result.categorization {
            bump(
                &mut analytics.category_distribution,
                categorization.primary_category.to_lowercase(),
            );
        }
        if let Some(claim) = &result.claim_data {
            let claim_type = claim.claim_type.map(|t| t.as_str()).unwrap_or("unknown");
            bump(&mut analytics.claim_type_distribution, claim_type);
            if let Some(amount) = claim.estimated_amount {
                analytics.total_estimated_amount += amount;
                amounts += 1;
            }
        }
    }

    if amounts > 0 {
        analytics.average_estimated_amount = analytics.total_estimated_amount / amounts as f64;
    }
    if !records.is_empty() {
        analytics.average_processing_time = total_time as f64 / records.len() as f64;
    }
    analytics
}
