use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Declares a closed set of lowercase labels shared by prompts, wire JSON and storage.
///
/// Parsing is case-insensitive and treats spaces and dashes as underscores, so model output
/// such as `"High"` or `"special investigations"` lands on the right variant.
macro_rules! labelled_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $label:literal $(| $alias:literal)*),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "&'static str")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            /// Legal values joined with `|`, as embedded in prompt templates
            pub fn choices() -> String {
                Self::ALL
                    .iter()
                    .map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join("|")
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                let normalized = value.trim().to_ascii_lowercase().replace([' ', '-'], "_");
                match normalized.as_str() {
                    $($label $(| $alias)* => Ok($name::$variant),)+
                    _ => Err(format!(
                        "unknown {} {:?}, expected one of {}",
                        stringify!($name),
                        value,
                        Self::choices()
                    )),
                }
            }
        }

        impl From<$name> for &'static str {
            fn from(value: $name) -> Self {
                value.as_str()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

labelled_enum! {
    pub enum ClaimType {
        Auto => "auto" | "car" | "vehicle" | "automobile" | "motor",
        Health => "health" | "medical",
        Property => "property" | "home" | "homeowners" | "apartment" | "renters",
        Life => "life",
        Other => "other",
    }
}

labelled_enum! {
    pub enum Confidence {
        High => "high",
        Medium => "medium" | "moderate",
        Low => "low",
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Confidence::Low
    }
}

labelled_enum! {
    pub enum RiskLevel {
        Low => "low",
        Medium => "medium" | "moderate",
        High => "high",
        Critical => "critical" | "severe",
    }
}

impl RiskLevel {
    /// Representative score used when the model names a level but omits the number
    pub fn midpoint_score(&self) -> u8 {
        match self {
            RiskLevel::Low => 15,
            RiskLevel::Medium => 45,
            RiskLevel::High => 70,
            RiskLevel::Critical => 90,
        }
    }
}

labelled_enum! {
    pub enum Complexity {
        Simple => "simple" | "low",
        Moderate => "moderate" | "medium",
        Complex => "complex" | "high",
    }
}

labelled_enum! {
    pub enum PriorityLevel {
        Low => "low",
        Normal => "normal" | "medium",
        High => "high",
        Urgent => "urgent" | "critical",
    }
}

labelled_enum! {
    pub enum Department {
        AutoClaims => "auto_claims",
        HealthClaims => "health_claims",
        PropertyClaims => "property_claims",
        LifeClaims => "life_claims",
        SpecialInvestigations => "special_investigations" | "siu",
        GeneralClaims => "general_claims",
    }
}

labelled_enum! {
    pub enum AssignmentType {
        Standard => "standard" | "automatic",
        Specialist => "specialist",
        SeniorAdjuster => "senior_adjuster" | "senior",
        Investigation => "investigation",
    }
}

labelled_enum! {
    /// Ordered most urgent first so a plain sort puts critical items on top
    pub enum ActionPriority {
        Critical => "critical",
        High => "high",
        Medium => "medium",
        Low => "low",
    }
}

labelled_enum! {
    pub enum ActionType {
        Documentation => "documentation",
        Validation => "validation",
        Investigation => "investigation",
        FraudReview => "fraud_review",
        Routing => "routing",
        Processing => "processing",
        Communication => "communication",
    }
}

labelled_enum! {
    pub enum ProcessingStatus {
        Completed => "completed",
        Failed => "failed",
    }
}

labelled_enum! {
    pub enum ReviewStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        NeedsInfo => "needs_info",
    }
}

labelled_enum! {
    /// States of one orchestration run, in execution order
    pub enum ProcessingStage {
        Start => "start",
        Extracting => "extracting",
        AssessingFraud => "assessing_fraud",
        Categorizing => "categorizing",
        Planning => "planning",
        Summarizing => "summarizing",
        GeneratingResponses => "generating_responses",
        Persisting => "persisting",
        Completed => "completed",
        Failed => "failed",
    }
}

/// Whether an artifact came from the model or was computed locally after a stage failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Provenance {
    Ai,
    Fallback { reason: String },
}

impl Provenance {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Provenance::Fallback { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleInfo {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<String>,
    pub license_plate: Option<String>,
}

/// Structured claim fields pulled out of free-form document text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedClaimData {
    pub claim_number: Option<String>,
    pub policy_number: Option<String>,
    pub claimant_name: Option<String>,
    pub incident_date: Option<String>,
    pub claim_date: Option<String>,
    pub claim_type: Option<ClaimType>,
    pub incident_location: Option<String>,
    pub damage_description: Option<String>,
    pub estimated_amount: Option<f64>,
    pub witness_info: Option<String>,
    pub medical_treatment: Option<String>,
    pub vehicle_info: Option<VehicleInfo>,
    pub extracted_fields: Vec<String>,
    pub missing_fields: Vec<String>,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudIndicator {
    pub description: String,
    /// 1 (minor) to 10 (severe)
    pub severity: u8,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudAssessment {
    pub risk_level: RiskLevel,
    pub risk_score: u8,
    pub fraud_indicators: Vec<FraudIndicator>,
    pub legitimacy_indicators: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub confidence: Confidence,
    pub source: Provenance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimPriority {
    pub level: PriorityLevel,
    pub score: u8,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Routing {
    pub department: Department,
    pub assignment_type: AssignmentType,
    pub estimated_handling_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Categorization {
    pub primary_category: String,
    pub secondary_category: Option<String>,
    pub complexity: Complexity,
    pub priority: ClaimPriority,
    pub routing: Routing,
    pub processing_recommendations: Vec<String>,
    pub next_steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionItem {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub priority: ActionPriority,
    pub action: String,
    pub details: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPlan {
    pub items: Vec<ActionItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub missing_required: Vec<String>,
    pub issues: Vec<ValidationIssue>,
    /// Share of required fields present, 0.0 to 1.0
    pub completeness: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimSummary {
    pub executive_summary: String,
    pub key_findings: Vec<String>,
    pub recommendation: String,
    pub source: Provenance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerResponse {
    pub subject: String,
    pub message: String,
    pub source: Provenance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalMemo {
    pub subject: String,
    pub memo: String,
    pub source: Provenance,
}

/// A non-fatal stage failure that was papered over with a locally computed value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackRecord {
    pub stage: ProcessingStage,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTiming {
    pub stage: ProcessingStage,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum PersistenceStatus {
    Saved,
    Failed { error: String },
    /// The run failed, so there was nothing to persist
    Skipped,
}

/// Terminal record of one orchestration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub processing_id: String,
    pub timestamp: DateTime<Utc>,
    /// Total wall-clock time of the run in milliseconds
    pub processing_time: u64,
    pub status: ProcessingStatus,
    pub claim_data: Option<ExtractedClaimData>,
    pub validation: Option<ValidationReport>,
    pub fraud_assessment: Option<FraudAssessment>,
    pub categorization: Option<Categorization>,
    pub action_plan: Option<ActionPlan>,
    pub summary: Option<ClaimSummary>,
    pub customer_response: Option<CustomerResponse>,
    pub internal_memo: Option<InternalMemo>,
    pub fallbacks: Vec<FallbackRecord>,
    pub stage_timings: Vec<StageTiming>,
    pub failed_stage: Option<ProcessingStage>,
    pub error: Option<String>,
    pub persistence: PersistenceStatus,
}

impl ProcessingResult {
    pub fn is_completed(&self) -> bool {
        self.status == ProcessingStatus::Completed
    }

    pub fn used_fallback(&self, stage: ProcessingStage) -> bool {
        self.fallbacks.iter().any(|f| f.stage == stage)
    }
}

fn default_true() -> bool {
    true
}

/// Caller-supplied knobs for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingOptions {
    pub user_id: Option<String>,
    #[serde(default = "default_true")]
    pub generate_customer_response: bool,
    #[serde(default = "default_true")]
    pub generate_internal_memo: bool,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            user_id: None,
            generate_customer_response: true,
            generate_internal_memo: true,
        }
    }
}

impl ProcessingOptions {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn owner(&self) -> &str {
        self.user_id.as_deref().unwrap_or("anonymous")
    }
}
