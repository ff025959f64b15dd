//! Text-processing pipeline applied to every extracted unit.
//!
//! Stages run in a fixed order: spelling, typography, semantic markup and
//! soft hyphenation. Later stages rely on the output of earlier ones (the
//! semantic pass expects the no-break spaces typography puts after
//! honorifics, hyphenation must not split words inside `<abbr>`), so the
//! order is not configurable; individual stages can only be switched off.

mod hyphenation;
mod semantic;
mod spelling;
mod typography;

use serde::Serialize;

use crate::cancel::CancellationToken;
use crate::html::{count_words, to_plain_text};
use crate::model::{ContentUnit, ExtractionResult};

pub use hyphenation::{hyphenate_word, HyphenationStage};
pub(crate) use semantic::is_roman_numeral;
pub use semantic::{add_semantics, SemanticStage};
pub use spelling::SpellingStage;
pub use typography::TypographyStage;

/// Stage toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessingOptions {
    pub spelling: bool,
    pub typography: bool,
    pub semantics: bool,
    pub soft_hyphenation: bool,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            spelling: true,
            typography: true,
            semantics: true,
            soft_hyphenation: true,
        }
    }
}

/// Per-book settings handed to every stage. Stages never mutate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingContext {
    /// BCP 47 language tag of the book, e.g. `en-GB`
    pub language: String,
    pub options: ProcessingOptions,
}

impl Default for ProcessingContext {
    fn default() -> Self {
        Self::new("en")
    }
}

impl ProcessingContext {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            options: ProcessingOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ProcessingOptions) -> Self {
        self.options = options;
        self
    }

    /// Context for a book, using its declared language (English when absent).
    pub fn for_result(result: &ExtractionResult) -> Self {
        Self::new(result.metadata.language.as_deref().unwrap_or("en"))
    }

    pub fn is_english(&self) -> bool {
        let lang = self.language.trim().to_ascii_lowercase();
        lang.is_empty() || lang == "en" || lang == "eng" || lang.starts_with("en-") || lang.starts_with("en_")
    }
}

/// One pipeline stage: a pure rewrite of a unit's HTML.
pub trait Processor: Send + Sync {
    fn name(&self) -> &'static str;

    fn enabled(&self, ctx: &ProcessingContext) -> bool;

    fn process(&self, html: &str, ctx: &ProcessingContext) -> String;
}

/// Output of [`Pipeline::process`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedText {
    pub html: String,
    pub plain_text: String,
    pub word_count: usize,
}

pub struct Pipeline {
    stages: Vec<Box<dyn Processor>>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            stages: vec![
                Box::new(SpellingStage),
                Box::new(TypographyStage),
                Box::new(SemanticStage),
                Box::new(HyphenationStage),
            ],
        }
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every enabled stage over `html`, then derive the plain text and
    /// word count from the result.
    pub fn process(&self, html: &str, ctx: &ProcessingContext) -> ProcessedText {
        let mut html = html.to_string();
        for stage in &self.stages {
            if stage.enabled(ctx) {
                html = stage.process(&html, ctx);
            }
        }
        let plain_text = to_plain_text(&html);
        let word_count = count_words(&plain_text);
        ProcessedText {
            html,
            plain_text,
            word_count,
        }
    }

    pub fn process_unit(&self, unit: &mut ContentUnit, ctx: &ProcessingContext) {
        let processed = self.process(&unit.html, ctx);
        unit.html = processed.html;
        unit.plain_text = processed.plain_text;
        unit.word_count = processed.word_count;
    }

    /// Process every unit of a result in reading order. Stops early, leaving
    /// the remaining units unprocessed, when `cancel` fires.
    pub fn process_result(
        &self,
        result: &mut ExtractionResult,
        ctx: &ProcessingContext,
        cancel: &CancellationToken,
    ) {
        for unit in &mut result.units {
            if cancel.is_cancelled() {
                log::info!("pipeline cancelled at unit {}", unit.order_index);
                return;
            }
            self.process_unit(unit, ctx);
            log::debug!("processed unit {} ({} words)", unit.order_index, unit.word_count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order_is_fixed() {
        assert_eq!(
            Pipeline::default().stage_names(),
            vec!["spelling", "typography", "semantic", "soft-hyphenation"]
        );
    }

    #[test]
    fn honorific_is_bound_then_marked_up() {
        let out = Pipeline::new().process("<p>Mr. Smith</p>", &ProcessingContext::default());
        assert_eq!(
            out.html,
            "<p><abbr epub:type=\"z3998:name-title\">Mr.</abbr>\u{00A0}Smith</p>"
        );
        assert_eq!(out.plain_text, "Mr. Smith");
        assert_eq!(out.word_count, 2);
    }

    #[test]
    fn disabled_stages_are_skipped() {
        let ctx = ProcessingContext::default().with_options(ProcessingOptions {
            spelling: false,
            typography: false,
            semantics: false,
            soft_hyphenation: false,
        });
        let html = "<p>\"to-day\" -- Mr. Smith</p>";
        assert_eq!(Pipeline::new().process(html, &ctx).html, html);
    }

    #[test]
    fn plain_text_hides_invisible_marks() {
        let out = Pipeline::new().process(
            "<p>A wonderful afternoon... -- yes</p>",
            &ProcessingContext::default(),
        );
        assert!(out.html.contains('\u{00AD}'));
        assert_eq!(out.plain_text, "A wonderful afternoon\u{2026}\u{2014}yes");
    }

    #[test]
    fn english_detection() {
        assert!(ProcessingContext::new("en-GB").is_english());
        assert!(ProcessingContext::new("").is_english());
        assert!(!ProcessingContext::new("fr").is_english());
    }
}
