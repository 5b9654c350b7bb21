use thiserror::Error;

/// Failures of the generative-AI transport, already phrased for end users.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AiError {
    #[error("Unable to reach the AI service. Check the network connection and try again.")]
    Network(String),

    #[error("The AI service rejected the configured credentials. Check the API key.")]
    Authentication(String),

    #[error("The AI service is receiving too many requests. Please wait a moment and try again.")]
    RateLimited(String),

    #[error("The AI service could not complete the request: {0}")]
    Provider(String),

    #[error("AI processing is disabled because no API key is configured.")]
    Disabled,
}

/// Raised when no recovery strategy produced valid JSON from a model completion.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("The AI response was empty.")]
    EmptyResponse,

    #[error(
        "Could not parse the AI response as JSON after {attempts} strategies \
         (last error: {last_error}; {content_length} characters, starting with {preview:?})"
    )]
    Unrecoverable {
        attempts: usize,
        last_error: String,
        content_length: usize,
        preview: String,
    },
}

#[derive(Error, Debug, Clone)]
pub enum StageError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{stage} failed: {source}")]
    Ai {
        stage: &'static str,
        #[source]
        source: AiError,
    },

    #[error("{stage} failed: {source}")]
    Parse {
        stage: &'static str,
        #[source]
        source: ParseError,
    },

    #[error("{stage} returned an unexpected response: {message}")]
    Shape { stage: &'static str, message: String },
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to process PDF: {0}")]
    PdfProcessing(String),

    #[error("Failed to process Word document: {0}")]
    DocxProcessing(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("OCR is unavailable: {0}")]
    OcrUnavailable(String),

    #[error("Text extraction was interrupted: {0}")]
    Interrupted(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Record already exists: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to encode record: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}
