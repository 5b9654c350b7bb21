use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::{AiClient, ChatMessage, ConnectionStatus, Role};
use crate::error::AiError;

/// Recognised placeholder shipped in sample `.env` files; treated as "no key".
pub const PLACEHOLDER_API_KEY: &str = "your_gemini_api_key_here";

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

const ERROR_EXCERPT_CHARS: usize = 300;

#[derive(Debug, Clone, PartialEq)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    pub top_k: u32,
    pub safety_threshold: String,
    pub request_timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            temperature: 0.1,
            max_output_tokens: 2048,
            top_p: 0.8,
            top_k: 40,
            safety_threshold: "BLOCK_MEDIUM_AND_ABOVE".to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl GeminiConfig {
    /// The configured key, unless it is missing, blank or the placeholder.
    pub fn usable_api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty() && *key != PLACEHOLDER_API_KEY)
    }
}

/// Gemini `generateContent` transport
pub struct GeminiClient {
    http: Client,
    api_key: String,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, AiError> {
        let api_key = config
            .usable_api_key()
            .ok_or(AiError::Disabled)?
            .to_string();
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AiError::Provider(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key,
            config,
        })
    }

    fn endpoint(&self) -> Result<Url, AiError> {
        let raw = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        Url::parse_with_params(&raw, &[("key", self.api_key.as_str())])
            .map_err(|e| AiError::Provider(format!("invalid endpoint {raw}: {e}")))
    }

    fn request_body(&self, messages: &[ChatMessage]) -> Value {
        let safety_settings: Vec<Value> = HARM_CATEGORIES
            .iter()
            .map(|category| {
                json!({
                    "category": category,
                    "threshold": self.config.safety_threshold,
                })
            })
            .collect();

        json!({
            "contents": fold_messages(messages),
            "generationConfig": {
                "temperature": self.config.temperature,
                "maxOutputTokens": self.config.max_output_tokens,
                "topP": self.config.top_p,
                "topK": self.config.top_k,
            },
            "safetySettings": safety_settings,
        })
    }
}

/// Gemini has no system role here: system turns are prepended to the first user turn and
/// assistant turns are sent as `model`.
fn fold_messages(messages: &[ChatMessage]) -> Vec<Value> {
    let system_text = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut pending_system = (!system_text.is_empty()).then_some(system_text);
    let mut contents = Vec::with_capacity(messages.len());

    for message in messages.iter().filter(|m| m.role != Role::System) {
        let (role, text) = match message.role {
            Role::User => match pending_system.take() {
                Some(system) => ("user", format!("{system}\n\n{}", message.content)),
                None => ("user", message.content.clone()),
            },
            _ => ("model", message.content.clone()),
        };
        contents.push(json!({ "role": role, "parts": [{ "text": text }] }));
    }

    if let Some(system) = pending_system {
        contents.insert(0, json!({ "role": "user", "parts": [{ "text": system }] }));
    }
    contents
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

fn completion_text(response: GenerateContentResponse) -> Result<String, AiError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(AiError::Provider(format!("the prompt was blocked ({reason})")));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AiError::Provider("the response contained no candidates".to_string()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
        return Err(AiError::Provider(format!(
            "the response contained no text (finish reason: {reason})"
        )));
    }
    Ok(text)
}

/// The request URL carries the API key, so it is stripped before the error is kept.
fn classify_transport(e: reqwest::Error) -> AiError {
    let e = e.without_url();
    if e.is_timeout() || e.is_connect() || e.is_request() {
        AiError::Network(e.to_string())
    } else {
        AiError::Provider(e.to_string())
    }
}

fn classify_status(status: StatusCode, body: &str) -> AiError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.chars().take(ERROR_EXCERPT_CHARS).collect());
    let detail = format!("HTTP {}: {message}", status.as_u16());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AiError::Authentication(detail),
        StatusCode::BAD_REQUEST
            if body.contains("API_KEY_INVALID") || body.contains("API key not valid") =>
        {
            AiError::Authentication(detail)
        }
        StatusCode::TOO_MANY_REQUESTS => AiError::RateLimited(detail),
        _ => AiError::Provider(detail),
    }
}

#[async_trait]
impl AiClient for GeminiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AiError> {
        let url = self.endpoint()?;
        let body = self.request_body(messages);
        debug!(model = %self.config.model, turns = messages.len(), "sending generateContent request");

        let started = Instant::now();
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        let text = response.text().await.map_err(classify_transport)?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if !status.is_success() {
            let error = classify_status(status, &text);
            warn!(model = %self.config.model, status = status.as_u16(), elapsed_ms, error = ?error, "AI request failed");
            return Err(error);
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text)
            .map_err(|e| AiError::Provider(format!("malformed response body: {e}")))?;
        let completion = completion_text(parsed)?;

        info!(
            model = %self.config.model,
            elapsed_ms,
            completion_chars = completion.len(),
            "AI request completed"
        );
        Ok(completion)
    }

    async fn test_connection(&self) -> ConnectionStatus {
        let started = Instant::now();
        let outcome = self
            .complete(&[ChatMessage::user("Reply with the single word OK.")])
            .await;

        let credentials_rejected = matches!(outcome, Err(AiError::Authentication(_)));
        ConnectionStatus {
            connected: outcome.is_ok(),
            model: self.config.model.clone(),
            latency_ms: started.elapsed().as_millis() as u64,
            error: outcome.err().map(|e| e.to_string()),
            credentials_rejected,
        }
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
