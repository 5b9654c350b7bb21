use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::ai::GeminiConfig;
use crate::error::ConfigError;

const SAFETY_THRESHOLDS: [&str; 4] = [
    "BLOCK_NONE",
    "BLOCK_ONLY_HIGH",
    "BLOCK_MEDIUM_AND_ABOVE",
    "BLOCK_LOW_AND_ABOVE",
];

/// Knobs of the orchestration run itself
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Characters of document text embedded in the extraction prompt
    pub extraction_max_chars: usize,
    pub memo_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            extraction_max_chars: 8000,
            memo_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub gemini: GeminiConfig,
    pub pipeline: PipelineSettings,
    /// Tesseract language codes joined with `+`
    pub ocr_languages: String,
    pub database_url: Option<String>,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; unset keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = GeminiConfig::default();
        let pipeline_defaults = PipelineSettings::default();

        let temperature: f32 = parse_or(&lookup, "AI_TEMPERATURE", defaults.temperature)?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(invalid("AI_TEMPERATURE", temperature, "must be between 0.0 and 2.0"));
        }

        let max_output_tokens: u32 =
            parse_or(&lookup, "AI_MAX_OUTPUT_TOKENS", defaults.max_output_tokens)?;
        if max_output_tokens == 0 {
            return Err(invalid("AI_MAX_OUTPUT_TOKENS", 0, "must be positive"));
        }

        let safety_threshold = text_or(&lookup, "AI_SAFETY_THRESHOLD", &defaults.safety_threshold);
        if !SAFETY_THRESHOLDS.contains(&safety_threshold.as_str()) {
            return Err(invalid(
                "AI_SAFETY_THRESHOLD",
                &safety_threshold,
                &format!("must be one of {}", SAFETY_THRESHOLDS.join(", ")),
            ));
        }

        let request_timeout_secs: u64 = parse_or(
            &lookup,
            "AI_REQUEST_TIMEOUT_SECS",
            defaults.request_timeout.as_secs(),
        )?;
        let memo_timeout_secs: u64 = parse_or(
            &lookup,
            "MEMO_TIMEOUT_SECS",
            pipeline_defaults.memo_timeout.as_secs(),
        )?;
        if memo_timeout_secs == 0 {
            return Err(invalid("MEMO_TIMEOUT_SECS", 0, "must be positive"));
        }

        let extraction_max_chars: usize = parse_or(
            &lookup,
            "EXTRACTION_MAX_CHARS",
            pipeline_defaults.extraction_max_chars,
        )?;
        if extraction_max_chars == 0 {
            return Err(invalid("EXTRACTION_MAX_CHARS", 0, "must be positive"));
        }

        Ok(Self {
            gemini: GeminiConfig {
                api_key: lookup("GEMINI_API_KEY").filter(|v| !v.trim().is_empty()),
                model: text_or(&lookup, "GEMINI_MODEL", &defaults.model),
                base_url: text_or(&lookup, "GEMINI_BASE_URL", &defaults.base_url),
                temperature,
                max_output_tokens,
                safety_threshold,
                request_timeout: Duration::from_secs(request_timeout_secs),
                ..defaults
            },
            pipeline: PipelineSettings {
                extraction_max_chars,
                memo_timeout: Duration::from_secs(memo_timeout_secs),
            },
            ocr_languages: text_or(&lookup, "OCR_LANGUAGES", "eng"),
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            port: parse_or(&lookup, "PORT", 3000)?,
        })
    }

    pub fn ai_enabled(&self) -> bool {
        self.gemini.usable_api_key().is_some()
    }
}

fn text_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn invalid(key: &'static str, value: impl Display, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
