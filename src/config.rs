//! Tunable limits for extraction.

use serde::Serialize;

/// Limits and heuristics thresholds used by the extractors.
///
/// The defaults are the values the ingestion service runs with; the CLI
/// exposes a few of them as flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionOptions {
    /// PDF pages beyond this are ignored (with a `PartialExtraction` warning)
    pub max_pdf_pages: usize,
    /// Pages sampled to decide whether a PDF has a text layer at all
    pub text_layer_sample_pages: usize,
    /// Chapter size used when a PDF has neither outline nor headings
    pub pages_per_fallback_chapter: usize,
    /// PDF images smaller than this are treated as decoration and dropped
    pub inline_image_min_bytes: usize,
    /// EPUB spine documents with fewer words are boilerplate
    pub min_unit_words: usize,
    /// Word budget for one unit of a plain-text book
    pub text_unit_max_words: usize,
    /// Largest uncompressed ZIP entry an EPUB or `.fb2.zip` may hold
    pub max_entry_bytes: u64,
    pub filter_watermarks: bool,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            max_pdf_pages: 2_000,
            text_layer_sample_pages: 10,
            pages_per_fallback_chapter: 15,
            inline_image_min_bytes: 2_048,
            min_unit_words: 10,
            text_unit_max_words: 5_000,
            max_entry_bytes: 256 * 1024 * 1024,
            filter_watermarks: true,
        }
    }
}

impl ExtractionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_pdf_pages(mut self, pages: usize) -> Self {
        self.max_pdf_pages = pages.max(1);
        self
    }

    pub fn with_text_layer_sample_pages(mut self, pages: usize) -> Self {
        self.text_layer_sample_pages = pages.max(1);
        self
    }

    pub fn with_pages_per_fallback_chapter(mut self, pages: usize) -> Self {
        self.pages_per_fallback_chapter = pages.max(1);
        self
    }

    pub fn with_inline_image_min_bytes(mut self, bytes: usize) -> Self {
        self.inline_image_min_bytes = bytes;
        self
    }

    pub fn with_min_unit_words(mut self, words: usize) -> Self {
        self.min_unit_words = words;
        self
    }

    pub fn with_text_unit_max_words(mut self, words: usize) -> Self {
        self.text_unit_max_words = words.max(1);
        self
    }

    pub fn with_max_entry_bytes(mut self, bytes: u64) -> Self {
        self.max_entry_bytes = bytes;
        self
    }

    pub fn with_watermark_filter(mut self, enabled: bool) -> Self {
        self.filter_watermarks = enabled;
        self
    }
}
