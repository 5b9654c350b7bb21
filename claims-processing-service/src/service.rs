use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::Json,
    routing::{get, patch, post},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info};
use uuid::Uuid;

use crate::ai::ConnectionStatus;
use crate::analytics::ClaimAnalytics;
use crate::error::{ExtractError, StoreError};
use crate::extractor::ClaimDocument;
use crate::models::{ProcessingOptions, ProcessingResult};
use crate::orchestrator::ClaimsOrchestrator;
use crate::store::{ProcessingSessionRecord, RecordFilter, ReviewUpdate};

type ApiError = (StatusCode, Json<Value>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "id": id
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn store_error(message: &str, id: &str, e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound(_) => not_found_error(message, id),
        other => {
            error!(id = %id, error = %other, "record store failure");
            internal_error("Record store failure", &other.to_string())
        }
    }
}

fn extract_error(e: ExtractError) -> ApiError {
    match e {
        ExtractError::UnsupportedFormat(_)
        | ExtractError::PdfProcessing(_)
        | ExtractError::DocxProcessing(_) => bad_request_error(&e.to_string()),
        ExtractError::OcrUnavailable(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": e.to_string() })),
        ),
        ExtractError::OcrFailed(_) | ExtractError::Interrupted(_) => {
            internal_error("Text extraction failed", &e.to_string())
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ClaimsOrchestrator>,
    /// Result of the startup connectivity check; `/health` reports it without calling the model
    pub ai_status: Arc<ConnectionStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessClaimRequest {
    pub text: String,
    pub user_id: Option<String>,
    #[serde(default)]
    pub options: Option<ProcessingOptions>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentUpload {
    pub file_name: String,
    pub media_type: Option<String>,
    pub content_base64: String,
    pub user_id: Option<String>,
    #[serde(default)]
    pub options: Option<ProcessingOptions>,
}

impl DocumentUpload {
    fn decode(&self) -> Result<ClaimDocument, ApiError> {
        if self.file_name.trim().is_empty() {
            return Err(bad_request_error("fileName is required"));
        }
        let content = BASE64
            .decode(self.content_base64.trim())
            .map_err(|e| bad_request_error(&format!("contentBase64 is not valid base64: {e}")))?;
        Ok(ClaimDocument::new(
            self.file_name.clone(),
            self.media_type.as_deref(),
            content,
        ))
    }
}

fn merge_options(options: Option<ProcessingOptions>, user_id: Option<String>) -> ProcessingOptions {
    let mut options = options.unwrap_or_default();
    if user_id.is_some() {
        options.user_id = user_id;
    }
    options
}

/// Middleware to add correlation ID to all requests
async fn correlation_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> axum::response::Response {
    let correlation_id = Uuid::new_v4().to_string();

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/claims/process", post(process_claim))
        .route("/claims/process-document", post(process_document))
        .route("/documents/extract", post(extract_document))
        .route("/claims", get(list_claims))
        .route("/claims/{id}", get(get_claim))
        .route("/claims/{id}/review", patch(review_claim))
        .route("/analytics", get(analytics))
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Claims Processing Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "AI-assisted claim intake: extraction, fraud scoring, routing and summaries",
        "endpoints": {
            "POST /claims/process": "Process claim text",
            "POST /claims/process-document": "Extract text from an uploaded document and process it",
            "POST /documents/extract": "Extract plain text from an uploaded document",
            "GET /claims": "List processing sessions",
            "GET /claims/{id}": "Get one processing session",
            "PATCH /claims/{id}/review": "Record a staff review decision",
            "GET /analytics": "Aggregate statistics over processed claims",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "ai": state.ai_status.as_ref(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn process_claim(
    State(state): State<AppState>,
    Json(request): Json<ProcessClaimRequest>,
) -> ApiResult<ProcessingResult> {
    if request.text.trim().is_empty() {
        return Err(bad_request_error("Claim text is required"));
    }

    let options = merge_options(request.options, request.user_id);
    info!(user = options.owner(), characters = request.text.len(), "processing claim text");

    Ok(Json(
        state
            .orchestrator
            .process_claim_complete(&request.text, &options)
            .await,
    ))
}

async fn process_document(
    State(state): State<AppState>,
    Json(upload): Json<DocumentUpload>,
) -> ApiResult<ProcessingResult> {
    let document = upload.decode()?;
    let options = merge_options(upload.options, upload.user_id);
    info!(user = options.owner(), file_name = %document.name, "processing claim document");

    Ok(Json(
        state.orchestrator.process_document(&document, &options).await,
    ))
}

async fn extract_document(
    State(state): State<AppState>,
    Json(upload): Json<DocumentUpload>,
) -> ApiResult<Value> {
    let document = upload.decode()?;
    let text = state
        .orchestrator
        .extract_text_from_file(&document)
        .await
        .map_err(extract_error)?;

    Ok(Json(json!({
        "fileName": document.name,
        "characters": text.chars().count(),
        "text": text
    })))
}

async fn list_claims(
    State(state): State<AppState>,
    Query(filter): Query<RecordFilter>,
) -> ApiResult<Vec<ProcessingSessionRecord>> {
    state
        .orchestrator
        .store()
        .list(&filter)
        .await
        .map(Json)
        .map_err(|e| store_error("Failed to list claims", "*", e))
}

async fn get_claim(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ProcessingSessionRecord> {
    match state.orchestrator.store().get(&id).await {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(not_found_error("Claim not found", &id)),
        Err(e) => Err(store_error("Failed to load claim", &id, e)),
    }
}

async fn review_claim(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<ReviewUpdate>,
) -> ApiResult<ProcessingSessionRecord> {
    info!(id = %id, review_status = %update.review_status, "recording review decision");
    state
        .orchestrator
        .store()
        .update(&id, update)
        .await
        .map(Json)
        .map_err(|e| store_error("Claim not found", &id, e))
}

async fn analytics(State(state): State<AppState>) -> ApiResult<ClaimAnalytics> {
    state
        .orchestrator
        .generate_analytics()
        .await
        .map(Json)
        .map_err(|e| store_error("Failed to compute analytics", "*", e))
}
