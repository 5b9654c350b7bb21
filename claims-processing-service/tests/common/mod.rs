#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use claims_processing_service::ai::{AiClient, ChatMessage, ConnectionStatus, Role};
use claims_processing_service::error::{AiError, ExtractError, StoreError};
use claims_processing_service::extractor::{OcrEngine, OcrLoader, TextExtractor};
use claims_processing_service::store::{
    InMemoryRecordStore, ProcessingSessionRecord, RecordFilter, RecordStore, ReviewUpdate,
};
use claims_processing_service::{ClaimsOrchestrator, PipelineSettings};

pub const EXTRACTION: &str = "intake specialist";
pub const FRAUD: &str = "fraud analyst";
pub const CATEGORIZATION: &str = "triage coordinator";
pub const SUMMARY: &str = "executive summary";
pub const CUSTOMER: &str = "customer communications";
pub const MEMO: &str = "internal memo";

pub const JANE_DOE_CLAIM: &str = "Claim CLM-001. Policy POL-123. Claimant: Jane Doe. \
On 2024-01-15 my car was rear-ended on Main St. Estimated repair cost $2,500.";

#[derive(Clone)]
pub enum Reply {
    Text(String),
    Fail(AiError),
    Slow(Duration, String),
}

/// AI fake that answers by matching a keyword against the system turn of each prompt.
#[derive(Default)]
pub struct FakeAiClient {
    replies: Vec<(&'static str, Reply)>,
    pub calls: Mutex<Vec<&'static str>>,
}

impl FakeAiClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Well-formed answers for every stage of the Jane Doe claim
    pub fn jane_doe() -> Self {
        Self::new()
            .reply(
                EXTRACTION,
                r#"```json
{
  "claimNumber": "CLM-001",
  "policyNumber": "POL-123",
  "claimantName": "Jane Doe",
  "incidentDate": "2024-01-15",
  "claimDate": "2024-01-16",
  "claimType": "auto",
  "incidentLocation": "Main St",
  "damageDescription": "Rear-end collision, bumper damage",
  "estimatedAmount": "$2,500",
  "vehicleInfo": {"make": "Toyota", "model": "Camry", "year": "2020", "licensePlate": null},
  "confidence": "high"
}
```"#,
            )
            .reply(
                FRAUD,
                r#"{"riskLevel": "low", "riskScore": 12, "fraudIndicators": [],
                    "legitimacyIndicators": ["Prompt reporting"], "confidence": "high"}"#,
            )
            .reply(
                CATEGORIZATION,
                r#"{'primaryCategory': 'collision', 'complexity': 'simple',
                    'priority': {'level': 'normal', 'score': 40, 'reasoning': 'Routine repair'},
                    'routing': {'department': 'auto_claims', 'assignmentType': 'standard',
                                'estimatedHandlingTime': '3-5 business days'},
                    'nextSteps': ['Obtain repair estimate'],}"#,
            )
            .reply(
                SUMMARY,
                r#"Here you go: {"executiveSummary": "Jane Doe reports a low-risk rear-end collision.",
                    "keyFindings": ["Police report available"], "recommendation": "Fast-track"}"#,
            )
            .reply(
                CUSTOMER,
                r#"{"subject": "Your claim CLM-001", "message": "Dear Jane, we received your claim."}"#,
            )
            .reply(MEMO, r#"{"subject": "CLM-001 handover", "memo": "Routine auto claim."}"#)
    }

    /// Replaces any earlier reply registered for the same keyword
    pub fn reply(self, keyword: &'static str, text: &str) -> Self {
        self.with(keyword, Reply::Text(text.to_string()))
    }

    pub fn fail(self, keyword: &'static str, error: AiError) -> Self {
        self.with(keyword, Reply::Fail(error))
    }

    pub fn slow(self, keyword: &'static str, delay: Duration, text: &str) -> Self {
        self.with(keyword, Reply::Slow(delay, text.to_string()))
    }

    fn with(mut self, keyword: &'static str, reply: Reply) -> Self {
        self.replies.retain(|(k, _)| *k != keyword);
        self.replies.push((keyword, reply));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl AiClient for FakeAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AiError> {
        let system = messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let (keyword, reply) = self
            .replies
            .iter()
            .find(|(keyword, _)| system.contains(keyword))
            .cloned()
            .ok_or_else(|| AiError::Provider("no fake reply registered".to_string()))?;
        self.calls.lock().unwrap().push(keyword);

        match reply {
            Reply::Text(text) => Ok(text),
            Reply::Fail(error) => Err(error),
            Reply::Slow(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
        }
    }

    async fn test_connection(&self) -> ConnectionStatus {
        ConnectionStatus {
            connected: true,
            model: "fake".to_string(),
            latency_ms: 0,
            error: None,
            credentials_rejected: false,
        }
    }

    fn model(&self) -> &str {
        "fake"
    }
}

/// Store whose writes always fail; reads see nothing.
pub struct BrokenStore;

#[async_trait]
impl RecordStore for BrokenStore {
    async fn create(&self, record: ProcessingSessionRecord) -> Result<(), StoreError> {
        Err(StoreError::Duplicate(record.id))
    }

    async fn get(&self, _id: &str) -> Result<Option<ProcessingSessionRecord>, StoreError> {
        Ok(None)
    }

    async fn list(&self, _filter: &RecordFilter) -> Result<Vec<ProcessingSessionRecord>, StoreError> {
        Ok(Vec::new())
    }

    async fn update(&self, id: &str, _update: ReviewUpdate) -> Result<ProcessingSessionRecord, StoreError> {
        Err(StoreError::NotFound(id.to_string()))
    }
}

pub fn no_ocr() -> Arc<dyn OcrLoader> {
    Arc::new(move || -> Result<Arc<dyn OcrEngine>, ExtractError> {
        Err(ExtractError::OcrUnavailable("tesseract feature disabled".to_string()))
    })
}

pub struct Harness {
    pub orchestrator: ClaimsOrchestrator,
    pub ai: Arc<FakeAiClient>,
    pub store: Arc<InMemoryRecordStore>,
}

pub fn harness(ai: FakeAiClient) -> Harness {
    harness_with(ai, PipelineSettings::default())
}

pub fn harness_with(ai: FakeAiClient, settings: PipelineSettings) -> Harness {
    let ai = Arc::new(ai);
    let store = Arc::new(InMemoryRecordStore::new());
    let orchestrator = ClaimsOrchestrator::new(
        ai.clone(),
        store.clone(),
        TextExtractor::new(no_ocr()),
        &settings,
    );
    Harness {
        orchestrator,
        ai,
        store,
    }
}
