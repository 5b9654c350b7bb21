//! File-to-text conversion feeding the claims pipeline.

pub mod docx;
pub mod ocr;
pub mod pdf;

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::ExtractError;

pub use ocr::{LazyOcr, OcrEngine, OcrLoader, default_ocr_loader};

const DOCX_MEDIA_TYPE: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// An uploaded file; lives only for the duration of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimDocument {
    pub name: String,
    pub media_type: Option<String>,
    pub content: Vec<u8>,
}

impl ClaimDocument {
    pub fn new(name: impl Into<String>, media_type: Option<&str>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.map(str::to_string),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    PlainText,
    Pdf,
    Word,
    Image,
    Json,
    Csv,
}

impl DocumentKind {
    fn from_media_type(media_type: &str) -> Option<Self> {
        match media_type {
            "text/plain" | "text/markdown" => Some(DocumentKind::PlainText),
            "application/pdf" => Some(DocumentKind::Pdf),
            DOCX_MEDIA_TYPE => Some(DocumentKind::Word),
            "application/json" | "text/json" => Some(DocumentKind::Json),
            "text/csv" | "application/csv" => Some(DocumentKind::Csv),
            other if other.starts_with("image/") => Some(DocumentKind::Image),
            _ => None,
        }
    }

    /// Uses the declared media type, falling back to the file-name extension when the
    /// declaration is missing or generic.
    pub fn detect(document: &ClaimDocument) -> Result<Self, ExtractError> {
        let declared = document
            .media_type
            .as_deref()
            .map(|m| {
                m.split(';')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_ascii_lowercase()
            })
            .filter(|m| !m.is_empty() && m != "application/octet-stream");

        if let Some(declared) = &declared {
            if let Some(kind) = Self::from_media_type(declared) {
                return Ok(kind);
            }
        }

        let guessed = mime_guess::from_path(&document.name).first();
        if let Some(kind) = guessed.as_ref().and_then(|m| Self::from_media_type(m.essence_str())) {
            return Ok(kind);
        }

        let described = declared
            .or_else(|| guessed.map(|m| m.essence_str().to_string()))
            .unwrap_or_else(|| format!("unknown type of {}", document.name));
        Err(ExtractError::UnsupportedFormat(described))
    }
}

/// Converts uploaded documents to plain text.
///
/// PDF and Word parsing is statically linked; OCR goes through a lazily created engine that
/// stays cached until [`TextExtractor::cleanup`].
pub struct TextExtractor {
    ocr: LazyOcr,
}

impl TextExtractor {
    pub fn new(ocr_loader: Arc<dyn OcrLoader>) -> Self {
        Self {
            ocr: LazyOcr::new(ocr_loader),
        }
    }

    pub async fn extract_text(&self, document: &ClaimDocument) -> Result<String, ExtractError> {
        let kind = DocumentKind::detect(document)?;
        info!(
            file_name = %document.name,
            kind = ?kind,
            bytes = document.content.len(),
            "extracting text from document"
        );

        match kind {
            DocumentKind::PlainText => Ok(String::from_utf8_lossy(&document.content).into_owned()),
            DocumentKind::Json => Ok(json_text(&document.name, &document.content)),
            DocumentKind::Csv => Ok(csv_text(&document.content)),
            DocumentKind::Pdf => {
                let bytes = document.content.clone();
                run_blocking(move || pdf::extract_pdf_text(&bytes)).await
            }
            DocumentKind::Word => {
                let bytes = document.content.clone();
                run_blocking(move || docx::extract_docx_text(&bytes)).await
            }
            DocumentKind::Image => self.ocr_text(document).await,
        }
    }

    async fn ocr_text(&self, document: &ClaimDocument) -> Result<String, ExtractError> {
        let engine = self.ocr.engine().await?;
        let text = engine.recognize(&document.content).await?;
        let text = text.trim();
        if text.is_empty() {
            warn!(file_name = %document.name, "OCR produced no text");
            return Ok(String::new());
        }
        Ok(text.to_string())
    }

    pub async fn ocr_loaded(&self) -> bool {
        self.ocr.is_loaded().await
    }

    /// Releases the OCR engine; the next image extraction loads a fresh one.
    pub async fn cleanup(&self) {
        self.ocr.cleanup().await;
    }
}

async fn run_blocking<F>(job: F) -> Result<String, ExtractError>
where
    F: FnOnce() -> Result<String, ExtractError> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| ExtractError::Interrupted(e.to_string()))?
}

fn json_text(name: &str, content: &[u8]) -> String {
    match serde_json::from_slice::<serde_json::Value>(content) {
        Ok(value) => serde_json::to_string_pretty(&value)
            .unwrap_or_else(|_| String::from_utf8_lossy(content).into_owned()),
        Err(e) => {
            warn!(file_name = %name, error = %e, "invalid JSON document, passing raw text through");
            String::from_utf8_lossy(content).into_owned()
        }
    }
}

fn csv_text(content: &[u8]) -> String {
    let raw = String::from_utf8_lossy(content);
    let mut lines = raw.lines().filter(|l| !l.trim().is_empty());
    let columns: Vec<&str> = lines
        .next()
        .map(|header| header.split(',').map(str::trim).collect())
        .unwrap_or_default();
    let rows = lines.count();

    format!(
        "CSV Data\nColumns: {}\nRows: {rows}\n\n{}",
        columns.join(", "),
        raw.trim_end()
    )
}
