use lopdf::{Dictionary, Document, Object};
use tracing::debug;

use crate::error::ExtractError;

/// Text layer of every page, prefixed with title, author and page count.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let _span = tracing::info_span!("extractor.pdf").entered();

    let doc = Document::load_mem(bytes)
        .map_err(|e| ExtractError::PdfProcessing(format!("failed to load PDF: {e}")))?;

    let pages = doc.get_pages();
    let info = info_dictionary(&doc);
    let title = info
        .and_then(|d| info_text(d, b"Title"))
        .unwrap_or_else(|| "Unknown".to_string());
    let author = info
        .and_then(|d| info_text(d, b"Author"))
        .unwrap_or_else(|| "Unknown".to_string());

    let mut text = format!(
        "PDF Document\nTitle: {title}\nAuthor: {author}\nPages: {}\n",
        pages.len()
    );

    for page_num in pages.keys() {
        match doc.extract_text(&[*page_num]) {
            Ok(page_text) => {
                text.push_str(&format!("\n--- Page {page_num} ---\n"));
                text.push_str(page_text.trim_end());
                text.push('\n');
            }
            Err(e) => debug!(page = page_num, error = %e, "no extractable text on PDF page"),
        }
    }

    Ok(text)
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn info_text(dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key).ok()? {
        Object::String(bytes, _) => {
            let decoded = decode_pdf_string(bytes);
            let trimmed = decoded.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        _ => None,
    }
}

/// PDF text strings are either UTF-16BE with a byte-order mark or a single-byte encoding.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    String::from_utf8_lossy(bytes).into_owned()
}
