//! AI-backed pipeline stages.
//!
//! Every stage follows the same shape: build a system and a user turn (the user turn embeds
//! the serialized input and a JSON template listing legal values), call the model, recover
//! JSON from the completion, check required keys, then deserialize into a lenient response
//! schema and convert it into the public model type.

pub mod categorization;
pub mod extraction;
pub mod fraud;
pub mod lenient;
pub mod responses;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::ai::{AiClient, ChatMessage};
use crate::error::StageError;
use crate::parser::parse_ai_response;

pub use categorization::categorize_claim;
pub use extraction::extract_claim_data;
pub use fraud::assess_fraud;
pub use responses::{generate_customer_response, generate_internal_memo, generate_summary};

/// Call the model, recover JSON and deserialize it into `T` after checking `required_keys`.
pub(crate) async fn run_json_stage<T: DeserializeOwned>(
    client: &dyn AiClient,
    stage: &'static str,
    messages: &[ChatMessage],
    required_keys: &[&str],
) -> Result<T, StageError> {
    let raw = client
        .complete(messages)
        .await
        .map_err(|source| StageError::Ai { stage, source })?;
    debug!(stage, completion_chars = raw.len(), "received AI completion");

    let value = parse_ai_response(&raw).map_err(|source| StageError::Parse { stage, source })?;

    let Some(object) = value.as_object() else {
        return Err(StageError::Shape {
            stage,
            message: format!("expected a JSON object but got {}", json_kind(&value)),
        });
    };

    let missing: Vec<&str> = required_keys
        .iter()
        .copied()
        .filter(|key| object.get(*key).is_none_or(Value::is_null))
        .collect();
    if !missing.is_empty() {
        return Err(StageError::Shape {
            stage,
            message: format!("missing required keys: {}", missing.join(", ")),
        });
    }

    serde_json::from_value(value).map_err(|e| StageError::Shape {
        stage,
        message: e.to_string(),
    })
}

/// Pretty JSON for embedding a typed input in a prompt.
pub(crate) fn prompt_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::ai::{AiClient, ChatMessage, ConnectionStatus, Role};
    use crate::error::AiError;

    /// Answers each prompt with the reply registered for the first keyword found in its
    /// system turn, and records every prompt it saw.
    #[derive(Default)]
    pub(crate) struct ScriptedAiClient {
        replies: Vec<(&'static str, Result<String, AiError>)>,
        pub(crate) prompts: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedAiClient {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn reply(mut self, keyword: &'static str, reply: impl Into<String>) -> Self {
            self.replies.push((keyword, Ok(reply.into())));
            self
        }

        pub(crate) fn fail(mut self, keyword: &'static str, error: AiError) -> Self {
            self.replies.push((keyword, Err(error)));
            self
        }

        pub(crate) fn user_turn(&self, index: usize) -> String {
            self.prompts.lock().unwrap()[index]
                .iter()
                .find(|m| m.role == Role::User)
                .map(|m| m.content.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl AiClient for ScriptedAiClient {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AiError> {
            self.prompts.lock().unwrap().push(messages.to_vec());
            let system = messages
                .iter()
                .find(|m| m.role == Role::System)
                .map(|m| m.content.as_str())
                .unwrap_or_default();

            self.replies
                .iter()
                .find(|(keyword, _)| system.contains(keyword))
                .map(|(_, reply)| reply.clone())
                .unwrap_or_else(|| Err(AiError::Provider("no scripted reply".to_string())))
        }

        async fn test_connection(&self) -> ConnectionStatus {
            ConnectionStatus {
                connected: true,
                model: "scripted".to_string(),
                latency_ms: 0,
                error: None,
                credentials_rejected: false,
            }
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }
}
