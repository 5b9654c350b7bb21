pub mod action_plan;
pub mod ai;
pub mod analytics;
pub mod config;
pub mod error;
pub mod extractor;
pub mod fallback;
pub mod models;
pub mod orchestrator;
pub mod parser;
pub mod service;
pub mod stages;
pub mod store;
pub mod tasks;
pub mod validation;
pub mod workflow;

pub use ai::{AiClient, ChatMessage, DisabledAiClient, GeminiClient, GeminiConfig};
pub use analytics::ClaimAnalytics;
pub use config::{AppConfig, PipelineSettings};
pub use extractor::{ClaimDocument, TextExtractor};
pub use orchestrator::ClaimsOrchestrator;
pub use parser::parse_ai_response;
pub use service::{AppState, build_router};
pub use store::{InMemoryRecordStore, PostgresRecordStore, RecordStore};
pub use models::*;
