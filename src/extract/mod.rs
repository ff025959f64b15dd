//! Format extractors.
//!
//! Every format implements [`Extractor`]. Extractors never fail: a broken
//! container yields an empty result carrying a `ParseError` warning, a broken
//! chapter or page is skipped with its own warning.

mod archive;
pub mod epub;
pub mod fb2;
pub mod pdf;
pub mod text;

use crate::cancel::CancellationToken;
use crate::config::ExtractionOptions;
use crate::model::{ExtractionRequest, ExtractionResult, SourceFormat};

pub use epub::EpubExtractor;
pub use fb2::Fb2Extractor;
pub use pdf::PdfExtractor;
pub use text::TextExtractor;

/// Turns the raw bytes of one book format into an [`ExtractionResult`].
pub trait Extractor: Send + Sync {
    fn supported_format(&self) -> SourceFormat;

    /// Extract everything the input yields. Must not panic or fail; problems
    /// are reported through the result's diagnostics.
    fn extract(&self, request: &ExtractionRequest, cancel: &CancellationToken) -> ExtractionResult;
}

/// Extractor for formats the service does not read.
pub struct UnsupportedExtractor;

impl Extractor for UnsupportedExtractor {
    fn supported_format(&self) -> SourceFormat {
        SourceFormat::Unsupported
    }

    fn extract(&self, request: &ExtractionRequest, _cancel: &CancellationToken) -> ExtractionResult {
        log::debug!("no extractor for {}", request.file_name());
        ExtractionResult::empty(SourceFormat::Unsupported, request.file_name())
    }
}

/// The extractor responsible for `format`.
pub fn extractor_for(format: SourceFormat, options: &ExtractionOptions) -> Box<dyn Extractor> {
    match format {
        SourceFormat::Epub => Box::new(EpubExtractor::new(options.clone())),
        SourceFormat::Pdf => Box::new(PdfExtractor::new(options.clone())),
        SourceFormat::Fb2 => Box::new(Fb2Extractor::new(options.clone())),
        SourceFormat::Txt | SourceFormat::Markdown => {
            Box::new(TextExtractor::new(format, options.clone()))
        }
        SourceFormat::Unsupported => Box::new(UnsupportedExtractor),
    }
}
