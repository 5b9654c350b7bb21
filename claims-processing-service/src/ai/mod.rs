pub mod gemini;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AiError;

pub use gemini::{GeminiClient, GeminiConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged turn of a chat prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Outcome of a connectivity self-test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub connected: bool,
    pub model: String,
    pub latency_ms: u64,
    pub error: Option<String>,
    /// The provider refused the API key, so retrying cannot succeed
    #[serde(default)]
    pub credentials_rejected: bool,
}

/// A generative model that turns a chat prompt into raw completion text.
#[async_trait]
pub trait AiClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AiError>;

    /// Minimal round trip; failures are reported in the status, never raised.
    async fn test_connection(&self) -> ConnectionStatus;

    fn model(&self) -> &str;
}

/// Stand-in used when no usable API key is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledAiClient;

#[async_trait]
impl AiClient for DisabledAiClient {
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, AiError> {
        Err(AiError::Disabled)
    }

    async fn test_connection(&self) -> ConnectionStatus {
        ConnectionStatus {
            connected: false,
            model: self.model().to_string(),
            latency_ms: 0,
            error: Some(AiError::Disabled.to_string()),
            credentials_rejected: false,
        }
    }

    fn model(&self) -> &str {
        "disabled"
    }
}

/// Startup self-test of the configured client.
///
/// A client whose credentials are rejected is replaced by [`DisabledAiClient`], so stages fail
/// fast into their fallbacks instead of calling the provider on every claim.
pub async fn verify_client(client: Arc<dyn AiClient>) -> (Arc<dyn AiClient>, ConnectionStatus) {
    let status = client.test_connection().await;
    if status.credentials_rejected {
        warn!(model = %status.model, "AI credentials rejected, AI processing disabled");
        return (Arc::new(DisabledAiClient), status);
    }
    (client, status)
}
