//! Plain text and Markdown reader.
//!
//! No structure is inferred: paragraphs are runs of non-blank lines, and
//! consecutive paragraphs are packed into units up to a word budget.

use encoding_rs::WINDOWS_1252;

use super::Extractor;
use crate::cancel::CancellationToken;
use crate::config::ExtractionOptions;
use crate::html::{count_words, escape_text};
use crate::model::{
    ContentUnit, ExtractionRequest, ExtractionResult, SourceFormat, TextSource, WarningCode,
};

pub struct TextExtractor {
    format: SourceFormat,
    options: ExtractionOptions,
}

impl TextExtractor {
    pub fn new(format: SourceFormat, options: ExtractionOptions) -> Self {
        Self { format, options }
    }
}

impl Extractor for TextExtractor {
    fn supported_format(&self) -> SourceFormat {
        self.format
    }

    fn extract(&self, request: &ExtractionRequest, cancel: &CancellationToken) -> ExtractionResult {
        let mut result = ExtractionResult::empty(self.format, request.file_name());
        let text = decode_text(request.bytes());
        let paragraphs = split_paragraphs(&text);
        let groups = pack_paragraphs(&paragraphs, self.options.text_unit_max_words);

        let stem = request.file_stem();
        let stem = if stem.is_empty() { "Untitled".to_string() } else { stem };
        let numbered = groups.len() > 1;
        for (i, group) in groups.iter().enumerate() {
            if cancel.is_cancelled() {
                log::info!("text extraction cancelled after {} units", result.units.len());
                break;
            }
            let html = group
                .iter()
                .map(|p| format!("<p>{}</p>", escape_text(p)))
                .collect::<Vec<_>>()
                .join("\n");
            let plain_text = group.join("\n\n");
            let title = if numbered {
                format!("{} (part {})", stem, i + 1)
            } else {
                stem.clone()
            };
            result.units.push(ContentUnit::chapter(i, title, html, plain_text));
        }

        if result.units.is_empty() {
            if !cancel.is_cancelled() {
                result
                    .diagnostics
                    .warn(WarningCode::EmptyContent, "text file contains no words");
            }
        } else {
            result.diagnostics.text_source = TextSource::NativeText;
            result.metadata.title = Some(stem);
        }
        result
    }
}

/// UTF-8 (BOM stripped) when valid, windows-1252 otherwise.
fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            log::debug!("input is not UTF-8, decoding as windows-1252");
            WINDOWS_1252.decode_without_bom_handling(bytes).0.into_owned()
        }
    }
}

/// Blank-line separated paragraphs with their lines joined by single spaces.
fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }
    paragraphs
}

/// Greedily pack paragraphs into groups of at most `max_words` words. A
/// paragraph longer than the budget is cut at word boundaries.
fn pack_paragraphs(paragraphs: &[String], max_words: usize) -> Vec<Vec<String>> {
    let max_words = max_words.max(1);
    let mut groups = Vec::new();
    let mut group: Vec<String> = Vec::new();
    let mut words = 0;

    for paragraph in paragraphs {
        let pieces: Vec<String> = if count_words(paragraph) > max_words {
            paragraph
                .split_whitespace()
                .collect::<Vec<_>>()
                .chunks(max_words)
                .map(|chunk| chunk.join(" "))
                .collect()
        } else {
            vec![paragraph.clone()]
        };
        for piece in pieces {
            let n = count_words(&piece);
            if words + n > max_words && !group.is_empty() {
                groups.push(std::mem::take(&mut group));
                words = 0;
            }
            words += n;
            group.push(piece);
        }
    }
    if !group.is_empty() {
        groups.push(group);
    }
    groups
}
