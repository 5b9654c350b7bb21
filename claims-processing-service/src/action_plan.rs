//! Deterministic action plan derived from the outputs of the earlier stages.

use crate::models::{
    ActionItem, ActionPlan, ActionPriority, ActionType, AssignmentType, Categorization,
    ExtractedClaimData, FraudAssessment, PriorityLevel, RiskLevel, ValidationReport,
};

pub fn build_action_plan(
    claim: &ExtractedClaimData,
    validation: &ValidationReport,
    fraud: &FraudAssessment,
    categorization: &Categorization,
) -> ActionPlan {
    let mut items = Vec::new();

    if !validation.missing_required.is_empty() {
        items.push(item(
            ActionType::Documentation,
            ActionPriority::High,
            "Request missing claim information from the claimant",
            validation.missing_required.clone(),
        ));
    }

    if !validation.issues.is_empty() {
        items.push(item(
            ActionType::Validation,
            ActionPriority::Medium,
            "Resolve data inconsistencies in the claim",
            validation
                .issues
                .iter()
                .map(|issue| format!("{}: {}", issue.field, issue.message))
                .collect(),
        ));
    }

    match fraud.risk_level {
        RiskLevel::Critical => items.push(item(
            ActionType::Investigation,
            ActionPriority::Critical,
            "Refer the claim to special investigations before any payment",
            fraud_details(fraud),
        )),
        RiskLevel::High => items.push(item(
            ActionType::FraudReview,
            ActionPriority::High,
            "Perform a detailed fraud review",
            fraud_details(fraud),
        )),
        RiskLevel::Medium | RiskLevel::Low => {}
    }

    if fraud.source.is_fallback() {
        items.push(item(
            ActionType::FraudReview,
            ActionPriority::High,
            "Screen the claim for fraud manually, automated assessment was unavailable",
            Vec::new(),
        ));
    }

    let routing = &categorization.routing;
    items.push(item(
        ActionType::Routing,
        routing_priority(categorization.priority.level),
        &format!("Assign to {}", routing.department),
        vec![
            format!("Assignment: {}", assignment_label(routing.assignment_type)),
            format!("Estimated handling time: {}", routing.estimated_handling_time),
        ],
    ));

    if !categorization.processing_recommendations.is_empty() {
        items.push(item(
            ActionType::Processing,
            ActionPriority::Medium,
            "Follow the processing recommendations",
            categorization.processing_recommendations.clone(),
        ));
    }

    let claimant = claim.claimant_name.as_deref().unwrap_or("the claimant");
    items.push(item(
        ActionType::Communication,
        ActionPriority::Low,
        &format!("Send claim acknowledgment to {claimant}"),
        Vec::new(),
    ));

    // Stable, so items of equal priority keep the order above
    items.sort_by_key(|item| item.priority);
    ActionPlan { items }
}

fn item(
    action_type: ActionType,
    priority: ActionPriority,
    action: &str,
    details: Vec<String>,
) -> ActionItem {
    ActionItem {
        action_type,
        priority,
        action: action.to_string(),
        details,
    }
}

fn fraud_details(fraud: &FraudAssessment) -> Vec<String> {
    let mut details = vec![format!("Risk score: {}/100", fraud.risk_score)];
    details.extend(fraud.fraud_indicators.iter().map(|i| i.description.clone()));
    details
}

fn routing_priority(level: PriorityLevel) -> ActionPriority {
    match level {
        PriorityLevel::Urgent => ActionPriority::Critical,
        PriorityLevel::High => ActionPriority::High,
        PriorityLevel::Normal => ActionPriority::Medium,
        PriorityLevel::Low => ActionPriority::Low,
    }
}

fn assignment_label(assignment: AssignmentType) -> &'static str {
    match assignment {
        AssignmentType::Standard => "standard queue",
        AssignmentType::Specialist => "specialist adjuster",
        AssignmentType::SeniorAdjuster => "senior adjuster",
        AssignmentType::Investigation => "investigator",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ClaimPriority, Complexity, Confidence, Department, FraudIndicator, Provenance, Routing,
        ValidationIssue,
    };

    fn fraud(level: RiskLevel, source: Provenance) -> FraudAssessment {
        FraudAssessment {
            risk_level: level,
            risk_score: level.midpoint_score(),
            fraud_indicators: vec![FraudIndicator {
                description: "Reported late".to_string(),
                severity: 6,
                explanation: String::new(),
            }],
            legitimacy_indicators: vec![],
            recommended_actions: vec![],
            confidence: Confidence::Medium,
            source,
        }
    }

    fn categorization(level: PriorityLevel) -> Categorization {
        Categorization {
            primary_category: "collision".to_string(),
            secondary_category: None,
            complexity: Complexity::Simple,
            priority: ClaimPriority {
                level,
                score: 50,
                reasoning: String::new(),
            },
            routing: Routing {
                department: Department::AutoClaims,
                assignment_type: AssignmentType::Standard,
                estimated_handling_time: "3-5 business days".to_string(),
            },
            processing_recommendations: vec!["Verify repair estimate".to_string()],
            next_steps: vec![],
        }
    }

    fn valid() -> ValidationReport {
        ValidationReport {
            is_valid: true,
            missing_required: vec![],
            issues: vec![],
            completeness: 1.0,
        }
    }

    #[test]
    fn test_clean_claim_gets_routing_processing_and_acknowledgment() {
        let plan = build_action_plan(
            &ExtractedClaimData::default(),
            &valid(),
            &fraud(RiskLevel::Low, Provenance::Ai),
            &categorization(PriorityLevel::Normal),
        );
        let types: Vec<ActionType> = plan.items.iter().map(|i| i.action_type).collect();
        assert_eq!(
            types,
            vec![ActionType::Routing, ActionType::Processing, ActionType::Communication]
        );
        assert_eq!(plan.items[0].action, "Assign to auto_claims");
    }

    #[test]
    fn test_items_are_ordered_by_priority() {
        let validation = ValidationReport {
            is_valid: false,
            missing_required: vec!["claimantName".to_string()],
            issues: vec![ValidationIssue {
                field: "claimDate".to_string(),
                message: "before incident".to_string(),
            }],
            completeness: 0.8,
        };
        let plan = build_action_plan(
            &ExtractedClaimData::default(),
            &validation,
            &fraud(RiskLevel::Critical, Provenance::Ai),
            &categorization(PriorityLevel::Low),
        );

        let priorities: Vec<ActionPriority> = plan.items.iter().map(|i| i.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort();
        assert_eq!(priorities, sorted);
        assert_eq!(plan.items[0].action_type, ActionType::Investigation);
        assert!(plan.items[0].details.contains(&"Reported late".to_string()));
        assert_eq!(plan.items[1].action_type, ActionType::Documentation);
    }

    #[test]
    fn test_fallback_fraud_assessment_requests_manual_screening() {
        let plan = build_action_plan(
            &ExtractedClaimData::default(),
            &valid(),
            &fraud(
                RiskLevel::Low,
                Provenance::Fallback {
                    reason: "AI unavailable".to_string(),
                },
            ),
            &categorization(PriorityLevel::Normal),
        );
        assert_eq!(plan.items[0].action_type, ActionType::FraudReview);
        assert!(plan.items[0].action.contains("manually"));
    }
}
