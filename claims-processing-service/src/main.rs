use std::sync::Arc;

use claims_processing_service::ai::verify_client;
use claims_processing_service::extractor::default_ocr_loader;
use claims_processing_service::{
    AiClient, AppConfig, AppState, ClaimsOrchestrator, DisabledAiClient, GeminiClient,
    InMemoryRecordStore, PostgresRecordStore, RecordStore, TextExtractor, build_router,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured JSON tracing based on environment variables
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "claims_processing_service=debug,graph_flow=debug,tower_http=debug".into()
    });

    match log_format.as_str() {
        "pretty" => {
            // Human-readable logging for development
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            // Structured JSON logging for production
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

fn create_ai_client(config: &AppConfig) -> Arc<dyn AiClient> {
    match GeminiClient::new(config.gemini.clone()) {
        Ok(client) => {
            info!(model = %config.gemini.model, "using Gemini AI client");
            Arc::new(client)
        }
        Err(e) => {
            warn!(error = %e, "AI processing disabled");
            Arc::new(DisabledAiClient)
        }
    }
}

async fn create_record_store(config: &AppConfig) -> Arc<dyn RecordStore> {
    // Use PostgreSQL when DATABASE_URL is set, otherwise in-memory
    match &config.database_url {
        Some(database_url) => {
            info!("Using PostgreSQL record store");
            match PostgresRecordStore::connect(database_url).await {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    error!(
                        error = %e,
                        "Failed to connect to PostgreSQL. Falling back to in-memory storage."
                    );
                    Arc::new(InMemoryRecordStore::new())
                }
            }
        }
        None => {
            info!("Using in-memory record store (set DATABASE_URL to use PostgreSQL)");
            Arc::new(InMemoryRecordStore::new())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let (ai, status) = verify_client(create_ai_client(&config)).await;
    if status.connected {
        info!(model = %status.model, latency_ms = status.latency_ms, "AI service reachable");
    } else {
        warn!(model = %status.model, error = ?status.error, "AI service not reachable");
    }

    let store = create_record_store(&config).await;
    let extractor = TextExtractor::new(default_ocr_loader(&config.ocr_languages));
    let orchestrator = Arc::new(ClaimsOrchestrator::new(ai, store, extractor, &config.pipeline));

    let app = build_router(AppState {
        orchestrator: orchestrator.clone(),
        ai_status: Arc::new(status),
    });
    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    let addr = listener.local_addr()?;
    info!("Claims Processing Service running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    orchestrator.cleanup().await;
    info!("shutdown complete");
    Ok(())
}
