//! Internal error type.
//!
//! Extraction never surfaces these to callers directly: every fallible step
//! returns `Result<T>` and the extractor turns the error into an
//! [`ExtractionWarning`](crate::model::ExtractionWarning) at the unit, page or
//! container boundary where it was caught.

use std::io;

/// Result type alias for internal operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The container is structurally broken (missing OPF, no body, ...)
    #[error("invalid structure: {0}")]
    InvalidStructure(String),

    /// A file referenced by the container is absent from the archive
    #[error("missing file in archive: {0}")]
    MissingFile(String),

    /// An archive entry is larger than the configured cap
    #[error("archive entry {name} holds {size} bytes, over the {limit} byte limit")]
    EntryTooLarge { name: String, size: u64, limit: u64 },

    #[error("failed to parse XML: {0}")]
    Xml(String),

    #[error("failed to read ZIP archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("failed to parse PDF: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The caller's cancellation token fired
    #[error("extraction cancelled")]
    Cancelled,
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}
