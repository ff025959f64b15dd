//! Ebook ingestion core.
//!
//! [`extract`] turns the bytes of an EPUB, PDF, FB2, plain-text or Markdown
//! book into chapter-sized [`ContentUnit`]s with metadata, images and
//! diagnostics. [`Pipeline`] then applies spelling, typography, semantic
//! markup and soft hyphenation to each unit, and [`Linter`] reports quality
//! issues in the result.

pub mod cancel;
pub mod config;
pub mod error;
pub mod extract;
pub mod html;
pub mod image;
pub mod lint;
pub mod markdown;
pub mod metadata;
pub mod model;
pub mod pipeline;
pub mod typography;
mod xml;

use std::panic::{catch_unwind, AssertUnwindSafe};

pub use cancel::CancellationToken;
pub use config::ExtractionOptions;
pub use error::{Error, Result};
pub use extract::{extractor_for, Extractor};
pub use lint::{LintIssue, Linter, Severity};
pub use model::{
    ContentUnit, Diagnostics, ExtractedImage, ExtractionRequest, ExtractionResult,
    ExtractionWarning, Metadata, SourceFormat, TextSource, TocEntry, UnitKind, WarningCode,
};
pub use pipeline::{Pipeline, ProcessingContext, ProcessingOptions};

/// Extract a book with the extractor for the request's format.
///
/// Never fails and never panics: an unreadable input yields an empty result
/// with a `ParseError` warning.
pub fn extract(
    request: &ExtractionRequest,
    options: &ExtractionOptions,
    cancel: &CancellationToken,
) -> ExtractionResult {
    let format = request.format();
    let extractor = extractor_for(format, options);
    log::debug!("extracting {} as {format}", request.file_name());

    let mut result = match catch_unwind(AssertUnwindSafe(|| extractor.extract(request, cancel))) {
        Ok(result) => result,
        Err(_) => {
            log::error!("extractor panicked on {}", request.file_name());
            let mut result = ExtractionResult::empty(format, request.file_name());
            result
                .diagnostics
                .warn(WarningCode::ParseError, "parser panicked");
            result
        }
    };
    result.normalize_order();

    log::info!(
        "{}: {} units, {} words, {} images, {} warnings",
        result.file_name,
        result.units.len(),
        result.total_words(),
        result.images.len(),
        result.diagnostics.warnings.len()
    );
    result
}
