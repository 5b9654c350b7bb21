use serde::Deserialize;
use tracing::info;

use super::{lenient, run_json_stage};
use crate::ai::{AiClient, ChatMessage};
use crate::error::StageError;
use crate::models::{ClaimType, Confidence, ExtractedClaimData, VehicleInfo};

pub const STAGE: &str = "extraction";

const SYSTEM_PROMPT: &str = r#"You are an insurance claims intake specialist. Extract structured claim information from the document text you are given.

Rules:
- Only report facts stated in the document. Use null for anything that is not stated.
- Dates use YYYY-MM-DD.
- estimatedAmount is a plain number without currency symbols.
- Respond with ONLY the JSON object, no explanation and no markdown."#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VehicleInfoResponse {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    make: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    model: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    year: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    license_plate: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractionResponse {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    claim_number: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    policy_number: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    claimant_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    incident_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    claim_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_label")]
    claim_type: Option<ClaimType>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    incident_location: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    damage_description: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_amount")]
    estimated_amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    witness_info: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    medical_treatment: Option<String>,
    #[serde(default)]
    vehicle_info: Option<VehicleInfoResponse>,
    #[serde(default, deserialize_with = "lenient::opt_label")]
    confidence: Option<Confidence>,
}

/// Longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_for_prompt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

pub fn build_messages(text: &str, max_chars: usize) -> Vec<ChatMessage> {
    let excerpt = truncate_for_prompt(text, max_chars);
    let user = format!(
        r#"Extract the claim information from this document:

"""
{excerpt}
"""

Return JSON in exactly this shape:
{{
  "claimNumber": "string or null",
  "policyNumber": "string or null",
  "claimantName": "string or null",
  "incidentDate": "YYYY-MM-DD or null",
  "claimDate": "YYYY-MM-DD or null",
  "claimType": "{claim_types}",
  "incidentLocation": "string or null",
  "damageDescription": "string or null",
  "estimatedAmount": 0,
  "witnessInfo": "string or null",
  "medicalTreatment": "string or null",
  "vehicleInfo": {{ "make": "string or null", "model": "string or null", "year": "string or null", "licensePlate": "string or null" }},
  "confidence": "{confidence}"
}}"#,
        claim_types = ClaimType::choices(),
        confidence = Confidence::choices(),
    );

    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)]
}

/// Pull structured claim fields out of free-form document text.
pub async fn extract_claim_data(
    client: &dyn AiClient,
    text: &str,
    max_chars: usize,
) -> Result<ExtractedClaimData, StageError> {
    if text.trim().is_empty() {
        return Err(StageError::InvalidInput("claim text is empty".to_string()));
    }

    let messages = build_messages(text, max_chars);
    let response: ExtractionResponse =
        run_json_stage(client, STAGE, &messages, &["claimType"]).await?;

    let data = into_claim_data(response);
    info!(
        stage = STAGE,
        claim_type = ?data.claim_type,
        extracted = data.extracted_fields.len(),
        missing = data.missing_fields.len(),
        "claim data extracted"
    );
    Ok(data)
}

fn into_claim_data(response: ExtractionResponse) -> ExtractedClaimData {
    let vehicle_info = response
        .vehicle_info
        .map(|v| VehicleInfo {
            make: v.make,
            model: v.model,
            year: v.year,
            license_plate: v.license_plate,
        })
        .filter(|v| *v != VehicleInfo::default());

    let mut data = ExtractedClaimData {
        claim_number: response.claim_number,
        policy_number: response.policy_number,
        claimant_name: response.claimant_name,
        incident_date: response.incident_date,
        claim_date: response.claim_date,
        // The key was present but held something we do not recognise
        claim_type: Some(response.claim_type.unwrap_or(ClaimType::Other)),
        incident_location: response.incident_location,
        damage_description: response.damage_description,
        estimated_amount: response.estimated_amount,
        witness_info: response.witness_info,
        medical_treatment: response.medical_treatment,
        vehicle_info,
        extracted_fields: Vec::new(),
        missing_fields: Vec::new(),
        confidence: response.confidence.unwrap_or_default(),
    };
    recompute_field_metadata(&mut data);
    data
}

/// Rebuilds `extractedFields`/`missingFields` from what is actually populated.
pub fn recompute_field_metadata(data: &mut ExtractedClaimData) {
    let fields: [(&str, bool); 12] = [
        ("claimNumber", data.claim_number.is_some()),
        ("policyNumber", data.policy_number.is_some()),
        ("claimantName", data.claimant_name.is_some()),
        ("incidentDate", data.incident_date.is_some()),
        ("claimDate", data.claim_date.is_some()),
        ("claimType", data.claim_type.is_some()),
        ("incidentLocation", data.incident_location.is_some()),
        ("damageDescription", data.damage_description.is_some()),
        ("estimatedAmount", data.estimated_amount.is_some()),
        ("witnessInfo", data.witness_info.is_some()),
        ("medicalTreatment", data.medical_treatment.is_some()),
        ("vehicleInfo", data.vehicle_info.is_some()),
    ];

    let (present, absent): (Vec<_>, Vec<_>) = fields.iter().partition(|(_, present)| *present);
    data.extracted_fields = present.iter().map(|(name, _)| name.to_string()).collect();
    data.missing_fields = absent.iter().map(|(name, _)| name.to_string()).collect();
}
