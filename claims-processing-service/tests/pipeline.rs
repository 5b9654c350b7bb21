mod common;

use std::time::{Duration, Instant};

use claims_processing_service::error::AiError;
use claims_processing_service::store::{RecordFilter, RecordStore};
use claims_processing_service::{
    ClaimDocument, ClaimType, ClaimsOrchestrator, Department, InMemoryRecordStore,
    PersistenceStatus, PipelineSettings, ProcessingOptions, ProcessingStage, ProcessingStatus,
    Provenance, RiskLevel, TextExtractor,
};
use common::*;
use std::sync::Arc;

#[tokio::test]
async fn test_jane_doe_claim_end_to_end() {
    let h = harness(FakeAiClient::jane_doe());
    let result = h
        .orchestrator
        .process_claim_complete(JANE_DOE_CLAIM, &ProcessingOptions::for_user("adjuster-7"))
        .await;

    assert_eq!(result.status, ProcessingStatus::Completed, "{:?}", result.error);
    let claim = result.claim_data.as_ref().unwrap();
    assert_eq!(claim.claim_number.as_deref(), Some("CLM-001"));
    assert_eq!(claim.claimant_name.as_deref(), Some("Jane Doe"));
    assert_eq!(claim.claim_type, Some(ClaimType::Auto));
    assert_eq!(claim.estimated_amount, Some(2500.0));

    assert!(result.validation.as_ref().unwrap().is_valid);
    assert_eq!(result.fraud_assessment.as_ref().unwrap().risk_score, 12);
    assert_eq!(
        result.categorization.as_ref().unwrap().routing.department,
        Department::AutoClaims
    );
    assert!(!result.action_plan.as_ref().unwrap().items.is_empty());
    assert_eq!(result.summary.as_ref().unwrap().source, Provenance::Ai);
    assert_eq!(result.customer_response.as_ref().unwrap().subject, "Your claim CLM-001");
    assert_eq!(result.internal_memo.as_ref().unwrap().memo, "Routine auto claim.");
    assert!(result.fallbacks.is_empty());
    assert_eq!(result.persistence, PersistenceStatus::Saved);

    let stages: Vec<ProcessingStage> = result.stage_timings.iter().map(|t| t.stage).collect();
    assert_eq!(
        stages,
        vec![
            ProcessingStage::Extracting,
            ProcessingStage::AssessingFraud,
            ProcessingStage::Categorizing,
            ProcessingStage::Planning,
            ProcessingStage::Summarizing,
            ProcessingStage::GeneratingResponses,
            ProcessingStage::Persisting,
        ]
    );

    let record = h.store.get(&result.processing_id).await.unwrap().unwrap();
    assert_eq!(record.user_id, "adjuster-7");
    assert_eq!(record.result.claim_data, result.claim_data);
    assert_eq!(record.result.persistence, PersistenceStatus::Saved);
    assert!(record.result.processing_time <= result.processing_time);
}

#[tokio::test]
async fn test_result_serializes_with_camel_case_fields() {
    let h = harness(FakeAiClient::jane_doe());
    let result = h
        .orchestrator
        .process_claim_complete(JANE_DOE_CLAIM, &ProcessingOptions::default())
        .await;

    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["status"], "completed");
    assert_eq!(value["claimData"]["claimNumber"], "CLM-001");
    assert_eq!(value["fraudAssessment"]["riskLevel"], "low");
    assert_eq!(value["fraudAssessment"]["source"]["kind"], "ai");
    assert!(value["processingTime"].is_u64());
}

#[tokio::test]
async fn test_fraud_failure_falls_back_to_low_risk() {
    let ai = FakeAiClient::jane_doe().fail(FRAUD, AiError::RateLimited("429".to_string()));
    let h = harness(ai);
    let result = h
        .orchestrator
        .process_claim_complete(JANE_DOE_CLAIM, &ProcessingOptions::default())
        .await;

    assert_eq!(result.status, ProcessingStatus::Completed);
    let fraud = result.fraud_assessment.as_ref().unwrap();
    assert_eq!(fraud.risk_level, RiskLevel::Low);
    assert!(fraud.source.is_fallback());
    assert!(result.used_fallback(ProcessingStage::AssessingFraud));
    assert_eq!(result.fallbacks.len(), 1);
}

#[tokio::test]
async fn test_extraction_failure_yields_failed_result_with_null_payloads() {
    let ai = FakeAiClient::jane_doe().fail(EXTRACTION, AiError::Network("connection refused".to_string()));
    let h = harness(ai);
    let result = h
        .orchestrator
        .process_claim_complete(JANE_DOE_CLAIM, &ProcessingOptions::default())
        .await;

    assert_eq!(result.status, ProcessingStatus::Failed);
    assert_eq!(result.failed_stage, Some(ProcessingStage::Extracting));
    assert!(result.error.as_deref().unwrap().contains("Unable to reach the AI service"));
    assert!(result.claim_data.is_none());
    assert!(result.fraud_assessment.is_none());
    assert!(result.categorization.is_none());
    assert!(result.summary.is_none());
    assert_eq!(h.ai.call_count(), 1);
    assert!(h.store.list(&RecordFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_categorization_failure_is_fatal() {
    let ai = FakeAiClient::jane_doe().reply(CATEGORIZATION, r#"{"primaryCategory": "collision"}"#);
    let h = harness(ai);
    let result = h
        .orchestrator
        .process_claim_complete(JANE_DOE_CLAIM, &ProcessingOptions::default())
        .await;

    assert_eq!(result.status, ProcessingStatus::Failed);
    assert_eq!(result.failed_stage, Some(ProcessingStage::Categorizing));
    assert!(result.error.as_deref().unwrap().contains("missing required keys"));
    assert_eq!(result.stage_timings.len(), 3);
}

#[tokio::test]
async fn test_summary_and_customer_failures_use_templates() {
    let ai = FakeAiClient::jane_doe()
        .reply(SUMMARY, "Sorry, I can't summarise this.")
        .fail(CUSTOMER, AiError::Provider("blocked".to_string()));
    let h = harness(ai);
    let result = h
        .orchestrator
        .process_claim_complete(JANE_DOE_CLAIM, &ProcessingOptions::default())
        .await;

    assert_eq!(result.status, ProcessingStatus::Completed);
    let summary = result.summary.as_ref().unwrap();
    assert!(summary.source.is_fallback());
    assert!(summary.executive_summary.contains("auto claim for 2500.00"));
    let response = result.customer_response.as_ref().unwrap();
    assert!(response.message.starts_with("Dear Jane Doe,"));
    assert_eq!(result.internal_memo.as_ref().unwrap().source, Provenance::Ai);
    assert_eq!(result.fallbacks.len(), 2);
}

#[tokio::test]
async fn test_memo_timeout_substitutes_templated_memo() {
    let ai = FakeAiClient::jane_doe().slow(MEMO, Duration::from_secs(30), r#"{"memo": "late"}"#);
    let settings = PipelineSettings {
        memo_timeout: Duration::from_millis(50),
        ..PipelineSettings::default()
    };
    let h = harness_with(ai, settings);

    let started = Instant::now();
    let result = h
        .orchestrator
        .process_claim_complete(JANE_DOE_CLAIM, &ProcessingOptions::default())
        .await;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(result.status, ProcessingStatus::Completed);
    let memo = result.internal_memo.as_ref().unwrap();
    assert!(memo.source.is_fallback());
    assert!(memo.memo.starts_with(&format!("Processing ID: {}", result.processing_id)));
    assert!(result.fallbacks[0].reason.contains("timed out"));
}

#[tokio::test]
async fn test_disabled_artifacts_are_absent_without_fallbacks() {
    let h = harness(FakeAiClient::jane_doe());
    let options = ProcessingOptions {
        generate_customer_response: false,
        generate_internal_memo: false,
        ..ProcessingOptions::default()
    };
    let result = h.orchestrator.process_claim_complete(JANE_DOE_CLAIM, &options).await;

    assert_eq!(result.status, ProcessingStatus::Completed);
    assert!(result.customer_response.is_none());
    assert!(result.internal_memo.is_none());
    assert!(result.fallbacks.is_empty());
    assert_eq!(h.ai.call_count(), 4);
}

#[tokio::test]
async fn test_persistence_failure_keeps_completed_status() {
    let orchestrator = ClaimsOrchestrator::new(
        Arc::new(FakeAiClient::jane_doe()),
        Arc::new(BrokenStore),
        TextExtractor::new(no_ocr()),
        &PipelineSettings::default(),
    );
    let result = orchestrator
        .process_claim_complete(JANE_DOE_CLAIM, &ProcessingOptions::default())
        .await;

    assert!(result.is_completed());
    assert!(matches!(result.persistence, PersistenceStatus::Failed { .. }));
    assert_eq!(
        result.stage_timings.last().map(|t| t.stage),
        Some(ProcessingStage::Persisting)
    );
}

#[tokio::test]
async fn test_processing_time_reflects_elapsed_time() {
    let ai = FakeAiClient::jane_doe().slow(
        FRAUD,
        Duration::from_millis(40),
        r#"{"riskLevel": "medium"}"#,
    );
    let h = harness(ai);
    let result = h
        .orchestrator
        .process_claim_complete(JANE_DOE_CLAIM, &ProcessingOptions::default())
        .await;

    assert!(result.processing_time >= 40);
    let fraud_timing = result
        .stage_timings
        .iter()
        .find(|t| t.stage == ProcessingStage::AssessingFraud)
        .unwrap();
    assert!(fraud_timing.elapsed_ms >= 40);
    assert!(result.processing_time >= result.stage_timings.iter().map(|t| t.elapsed_ms).sum::<u64>());
}

#[tokio::test]
async fn test_runs_get_distinct_ids_and_feed_analytics() {
    let store = Arc::new(InMemoryRecordStore::new());
    let orchestrator = ClaimsOrchestrator::new(
        Arc::new(FakeAiClient::jane_doe().fail(FRAUD, AiError::Disabled)),
        store.clone(),
        TextExtractor::new(no_ocr()),
        &PipelineSettings::default(),
    );

    let first = orchestrator
        .process_claim_complete(JANE_DOE_CLAIM, &ProcessingOptions::default())
        .await;
    let second = orchestrator
        .process_claim_complete(JANE_DOE_CLAIM, &ProcessingOptions::default())
        .await;
    assert_ne!(first.processing_id, second.processing_id);

    let analytics = orchestrator.generate_analytics().await.unwrap();
    assert_eq!(analytics.total_claims, 2);
    assert_eq!(analytics.fallback_count, 2);
    assert_eq!(analytics.category_distribution.get("collision"), Some(&2));
    assert_eq!(analytics.total_estimated_amount, 5000.0);
}

#[tokio::test]
async fn test_document_processing_extracts_then_processes() {
    let h = harness(FakeAiClient::jane_doe());
    let document = ClaimDocument::new("claim.txt", Some("text/plain"), JANE_DOE_CLAIM.as_bytes());
    let result = h
        .orchestrator
        .process_document(&document, &ProcessingOptions::default())
        .await;
    assert_eq!(result.status, ProcessingStatus::Completed);

    let unsupported = ClaimDocument::new("claim.exe", Some("application/x-msdownload"), vec![0u8; 4]);
    let result = h
        .orchestrator
        .process_document(&unsupported, &ProcessingOptions::default())
        .await;
    assert_eq!(result.status, ProcessingStatus::Failed);
    assert_eq!(result.failed_stage, Some(ProcessingStage::Start));
    assert!(result.error.unwrap().contains("Unsupported document format"));
}
