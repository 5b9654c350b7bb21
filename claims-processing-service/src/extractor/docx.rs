use std::io::{Cursor, Read, Seek};

use quick_xml::Reader;
use quick_xml::events::Event;
use zip::ZipArchive;

use crate::error::ExtractError;

#[derive(Debug, Default, PartialEq)]
struct CoreProperties {
    title: Option<String>,
    author: Option<String>,
}

/// Raw paragraph text of a `.docx`, prefixed with title, author and file size.
pub fn extract_docx_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let _span = tracing::info_span!("extractor.docx").entered();

    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractError::DocxProcessing(format!("failed to open DOCX: {e}")))?;

    let body = read_entry(&mut archive, "word/document.xml")?
        .ok_or_else(|| ExtractError::DocxProcessing("word/document.xml is missing".to_string()))?;
    let text = parse_document_xml(&body)?;

    // Metadata is optional; a broken core.xml should not cost us the body text
    let properties = read_entry(&mut archive, "docProps/core.xml")
        .ok()
        .flatten()
        .and_then(|xml| parse_core_xml(&xml).ok())
        .unwrap_or_default();

    Ok(format!(
        "Word Document\nTitle: {}\nAuthor: {}\nSize: {} bytes\n\n{}",
        properties.title.as_deref().unwrap_or("Unknown"),
        properties.author.as_deref().unwrap_or("Unknown"),
        bytes.len(),
        text.trim_end()
    ))
}

fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, ExtractError> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => {
            return Err(ExtractError::DocxProcessing(format!(
                "failed to open {name}: {e}"
            )));
        }
    };

    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|e| ExtractError::DocxProcessing(format!("failed to read {name}: {e}")))?;
    Ok(Some(content))
}

fn parse_document_xml(xml: &str) -> Result<String, ExtractError> {
    let mut reader = Reader::from_str(xml);

    let mut text = String::new();
    let mut in_text_element = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"t" => in_text_element = true,
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text_element = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"tab" => text.push('\t'),
                b"br" | b"cr" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text_element => {
                let decoded = e.unescape().unwrap_or_default();
                text.push_str(&decoded);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractError::DocxProcessing(format!(
                    "XML parsing error: {e}"
                )));
            }
            _ => {}
        }
    }

    Ok(text)
}

fn parse_core_xml(xml: &str) -> Result<CoreProperties, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut properties = CoreProperties::default();
    let mut current: Option<Vec<u8>> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => current = Some(e.local_name().as_ref().to_vec()),
            Event::End(_) => current = None,
            Event::Text(e) => {
                let value = e.unescape().unwrap_or_default().trim().to_string();
                if value.is_empty() {
                    continue;
                }
                match current.as_deref() {
                    Some(b"title") => properties.title = Some(value),
                    Some(b"creator") => properties.author = Some(value),
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(properties)
}
