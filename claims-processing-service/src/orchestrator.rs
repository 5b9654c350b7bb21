//! Entry points of the claims pipeline.
//!
//! [`ClaimsOrchestrator::process_claim_complete`] never returns an error: fatal stage failures
//! come back as a `failed` [`ProcessingResult`] naming the stage, non-fatal ones are replaced by
//! labelled fallbacks inside the workflow tasks.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use graph_flow::{Graph, GraphError, Session, TaskTiming};
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::ai::AiClient;
use crate::analytics::{ClaimAnalytics, compute_analytics};
use crate::config::PipelineSettings;
use crate::error::{ExtractError, StoreError};
use crate::extractor::{ClaimDocument, TextExtractor};
use crate::models::{
    FallbackRecord, PersistenceStatus, ProcessingOptions, ProcessingResult, ProcessingStage,
    ProcessingStatus, StageTiming,
};
use crate::store::{ProcessingSessionRecord, RecordFilter, RecordStore};
use crate::tasks::session_keys;
use crate::workflow::build_claims_workflow;

pub struct ClaimsOrchestrator {
    graph: Arc<Graph>,
    extractor: TextExtractor,
    store: Arc<dyn RecordStore>,
}

/// Timing and identity of one run, threaded through result assembly
struct RunClock {
    processing_id: String,
    timestamp: DateTime<Utc>,
    started: Instant,
}

impl RunClock {
    fn start() -> Self {
        Self {
            processing_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            started: Instant::now(),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

impl ClaimsOrchestrator {
    pub fn new(
        ai: Arc<dyn AiClient>,
        store: Arc<dyn RecordStore>,
        extractor: TextExtractor,
        settings: &PipelineSettings,
    ) -> Self {
        let graph = Arc::new(build_claims_workflow(ai, settings));
        Self {
            graph,
            extractor,
            store,
        }
    }

    /// Run the full pipeline over claim text and persist the outcome.
    pub async fn process_claim_complete(
        &self,
        text: &str,
        options: &ProcessingOptions,
    ) -> ProcessingResult {
        let clock = RunClock::start();
        let span = info_span!("process_claim", processing_id = %clock.processing_id);
        self.run(text, options, clock).instrument(span).await
    }

    /// Extract text from an uploaded document, then process it.
    pub async fn process_document(
        &self,
        document: &ClaimDocument,
        options: &ProcessingOptions,
    ) -> ProcessingResult {
        let clock = RunClock::start();
        let span = info_span!(
            "process_document",
            processing_id = %clock.processing_id,
            document = %document.name
        );

        async {
            match self.extractor.extract_text(document).await {
                Ok(text) => self.run(&text, options, clock).await,
                Err(e) => {
                    error!(error = %e, "document text extraction failed");
                    failed_result(clock, ProcessingStage::Start, e.to_string(), Vec::new())
                }
            }
        }
        .instrument(span)
        .await
    }

    pub async fn extract_text_from_file(&self, document: &ClaimDocument) -> Result<String, ExtractError> {
        self.extractor.extract_text(document).await
    }

    pub async fn generate_analytics(&self) -> Result<ClaimAnalytics, StoreError> {
        let records = self.store.list(&RecordFilter::default()).await?;
        Ok(compute_analytics(&records))
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Release the OCR engine. Later OCR requests load it again.
    pub async fn cleanup(&self) {
        self.extractor.cleanup().await;
    }

    async fn run(&self, text: &str, options: &ProcessingOptions, clock: RunClock) -> ProcessingResult {
        if text.trim().is_empty() {
            warn!("rejecting empty claim text");
            return failed_result(
                clock,
                ProcessingStage::Start,
                "Claim text is empty".to_string(),
                Vec::new(),
            );
        }

        info!(characters = text.chars().count(), user = options.owner(), "processing claim");
        let mut session = Session::new_from_task(
            clock.processing_id.clone(),
            ProcessingStage::Extracting.as_str(),
        );
        if let Err(e) = seed_session(&session, &clock.processing_id, text, options).await {
            return failed_result(clock, ProcessingStage::Start, e.to_string(), Vec::new());
        }

        let outcome = self.graph.execute_session(&mut session).await;
        let timings = stage_timings(&session.task_timings);

        let failure = match outcome {
            Ok(_) => None,
            Err(GraphError::TaskExecutionFailed(message)) => Some(message),
            Err(e) => Some(e.to_string()),
        };
        if let Some(message) = failure {
            let stage = ProcessingStage::try_from(session.current_task_id.clone())
                .unwrap_or(ProcessingStage::Failed);
            error!(stage = %stage, error = %message, "claim processing failed");
            return failed_result(clock, stage, message, timings);
        }

        let mut result = completed_result(&session, &clock, timings);
        self.persist(&mut result, options, &clock).await;

        info!(
            processing_time = result.processing_time,
            fallbacks = result.fallbacks.len(),
            "claim processing completed"
        );
        result
    }

    /// Stores the result, then stamps the returned copy with the persisting step's timing and
    /// the final processing time. The stored copy carries the timings up to the write.
    async fn persist(
        &self,
        result: &mut ProcessingResult,
        options: &ProcessingOptions,
        clock: &RunClock,
    ) {
        let started = Instant::now();
        result.persistence = PersistenceStatus::Saved;

        let record = ProcessingSessionRecord::new(options.owner(), result.clone());
        let outcome = self.store.create(record).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(()) => info!(
                stage = %ProcessingStage::Persisting,
                elapsed_ms,
                "processing session saved"
            ),
            Err(e) => {
                warn!(
                    stage = %ProcessingStage::Persisting,
                    error = %e,
                    "partial failure: result computed but not persisted"
                );
                result.persistence = PersistenceStatus::Failed {
                    error: e.to_string(),
                };
            }
        }

        result.stage_timings.push(StageTiming {
            stage: ProcessingStage::Persisting,
            elapsed_ms,
        });
        result.processing_time = clock.elapsed_ms();
    }
}

async fn seed_session(
    session: &Session,
    processing_id: &str,
    text: &str,
    options: &ProcessingOptions,
) -> graph_flow::Result<()> {
    session
        .context
        .set(session_keys::PROCESSING_ID, processing_id)
        .await?;
    session.context.set(session_keys::CLAIM_TEXT, text).await?;
    session.context.set(session_keys::OPTIONS, options).await
}

fn stage_timings(timings: &[TaskTiming]) -> Vec<StageTiming> {
    timings
        .iter()
        .filter_map(|timing| {
            ProcessingStage::try_from(timing.task_id.clone())
                .ok()
                .map(|stage| StageTiming {
                    stage,
                    elapsed_ms: timing.elapsed_ms,
                })
        })
        .collect()
}

fn completed_result(session: &Session, clock: &RunClock, timings: Vec<StageTiming>) -> ProcessingResult {
    let context = &session.context;
    let fallbacks: Vec<FallbackRecord> = context
        .get_sync(session_keys::FALLBACKS)
        .unwrap_or_default();

    ProcessingResult {
        processing_id: clock.processing_id.clone(),
        timestamp: clock.timestamp,
        // Restamped once persistence finishes
        processing_time: clock.elapsed_ms(),
        status: ProcessingStatus::Completed,
        claim_data: context.get_sync(session_keys::CLAIM_DATA),
        validation: context.get_sync(session_keys::VALIDATION),
        fraud_assessment: context.get_sync(session_keys::FRAUD_ASSESSMENT),
        categorization: context.get_sync(session_keys::CATEGORIZATION),
        action_plan: context.get_sync(session_keys::ACTION_PLAN),
        summary: context.get_sync(session_keys::SUMMARY),
        customer_response: context.get_sync(session_keys::CUSTOMER_RESPONSE),
        internal_memo: context.get_sync(session_keys::INTERNAL_MEMO),
        fallbacks,
        stage_timings: timings,
        failed_stage: None,
        error: None,
        persistence: PersistenceStatus::Skipped,
    }
}

fn failed_result(
    clock: RunClock,
    stage: ProcessingStage,
    error: String,
    timings: Vec<StageTiming>,
) -> ProcessingResult {
    ProcessingResult {
        processing_time: clock.elapsed_ms(),
        processing_id: clock.processing_id,
        timestamp: clock.timestamp,
        status: ProcessingStatus::Failed,
        claim_data: None,
        validation: None,
        fraud_assessment: None,
        categorization: None,
        action_plan: None,
        summary: None,
        customer_response: None,
        internal_memo: None,
        fallbacks: Vec::new(),
        stage_timings: timings,
        failed_stage: Some(stage),
        error: Some(error),
        persistence: PersistenceStatus::Skipped,
    }
}
