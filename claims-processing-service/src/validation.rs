//! Local, deterministic checks over extracted claim data.

use chrono::{NaiveDate, Utc};

use crate::models::{ExtractedClaimData, ValidationIssue, ValidationReport};

/// Fields a claim needs before an adjuster can act on it, in report order.
pub const REQUIRED_FIELDS: [&str; 5] = [
    "claimantName",
    "incidentDate",
    "claimType",
    "damageDescription",
    "estimatedAmount",
];

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%m/%d/%Y", "%d.%m.%Y", "%B %d, %Y", "%b %d, %Y"];

pub fn parse_claim_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

pub fn validate_claim(data: &ExtractedClaimData) -> ValidationReport {
    validate_claim_on(data, Utc::now().date_naive())
}

/// Same as [`validate_claim`] with "today" pinned, so date rules are testable.
pub fn validate_claim_on(data: &ExtractedClaimData, today: NaiveDate) -> ValidationReport {
    let present = [
        data.claimant_name.is_some(),
        data.incident_date.is_some(),
        data.claim_type.is_some(),
        data.damage_description.is_some(),
        data.estimated_amount.is_some(),
    ];
    let missing_required: Vec<String> = REQUIRED_FIELDS
        .iter()
        .zip(present)
        .filter(|(_, present)| !present)
        .map(|(field, _)| field.to_string())
        .collect();

    let mut issues = Vec::new();

    if let Some(amount) = data.estimated_amount {
        if !amount.is_finite() || amount <= 0.0 {
            issues.push(issue("estimatedAmount", format!("amount must be positive, got {amount}")));
        }
    }

    let incident = dated_field(&mut issues, "incidentDate", data.incident_date.as_deref());
    let filed = dated_field(&mut issues, "claimDate", data.claim_date.as_deref());

    if let Some(incident) = incident {
        if incident > today {
            issues.push(issue("incidentDate", format!("incident date {incident} is in the future")));
        }
    }
    if let (Some(incident), Some(filed)) = (incident, filed) {
        if filed < incident {
            issues.push(issue(
                "claimDate",
                format!("claim date {filed} is before the incident date {incident}"),
            ));
        }
    }

    let completeness =
        (REQUIRED_FIELDS.len() - missing_required.len()) as f64 / REQUIRED_FIELDS.len() as f64;

    ValidationReport {
        is_valid: missing_required.is_empty() && issues.is_empty(),
        missing_required,
        issues,
        completeness,
    }
}

fn dated_field(
    issues: &mut Vec<ValidationIssue>,
    field: &str,
    value: Option<&str>,
) -> Option<NaiveDate> {
    let value = value?;
    let parsed = parse_claim_date(value);
    if parsed.is_none() {
        issues.push(issue(field, format!("unrecognised date {value:?}")));
    }
    parsed
}

fn issue(field: &str, message: String) -> ValidationIssue {
    ValidationIssue {
        field: field.to_string(),
        message,
    }
}
