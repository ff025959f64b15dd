//! Shared data model for extraction results.
//!
//! Every format extractor produces the same [`ExtractionResult`]: metadata,
//! ordered [`ContentUnit`]s, embedded [`ExtractedImage`]s and the
//! [`Diagnostics`] describing what went wrong along the way.

use std::fmt;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use crate::error::Error;
use crate::html::count_words;

/// Container format of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Epub,
    Pdf,
    Fb2,
    Txt,
    Markdown,
    Unsupported,
}

impl SourceFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceFormat::Epub => "epub",
            SourceFormat::Pdf => "pdf",
            SourceFormat::Fb2 => "fb2",
            SourceFormat::Txt => "txt",
            SourceFormat::Markdown => "markdown",
            SourceFormat::Unsupported => "unsupported",
        }
    }

    /// Guess the format from a file name's extension.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let lower = file_name.to_ascii_lowercase();
        if lower.ends_with(".fb2.zip") {
            return Some(SourceFormat::Fb2);
        }
        let ext = Path::new(&lower).extension()?.to_str()?.to_string();
        match ext.as_str() {
            "epub" => Some(SourceFormat::Epub),
            "pdf" => Some(SourceFormat::Pdf),
            "fb2" => Some(SourceFormat::Fb2),
            "txt" | "text" => Some(SourceFormat::Txt),
            "md" | "markdown" => Some(SourceFormat::Markdown),
            _ => None,
        }
    }

    /// Guess the format from magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        let head = &bytes[..bytes.len().min(1024)];
        if head.windows(5).any(|w| w == b"%PDF-") {
            return Some(SourceFormat::Pdf);
        }
        // EPUB OCF: the first entry is an uncompressed `mimetype` file
        if head.starts_with(b"PK\x03\x04")
            && head
                .windows(20)
                .any(|w| w == b"application/epub+zip")
        {
            return Some(SourceFormat::Epub);
        }
        if head.windows(12).any(|w| w == b"<FictionBook") {
            return Some(SourceFormat::Fb2);
        }
        None
    }

    /// Extension first, then magic bytes, then [`SourceFormat::Unsupported`].
    pub fn detect(file_name: &str, bytes: &[u8]) -> Self {
        Self::from_file_name(file_name)
            .or_else(|| Self::sniff(bytes))
            .unwrap_or(SourceFormat::Unsupported)
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw input for one extraction call.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    bytes: Vec<u8>,
    file_name: String,
    declared_format: Option<SourceFormat>,
}

impl ExtractionRequest {
    pub fn new(bytes: Vec<u8>, file_name: impl Into<String>) -> Self {
        Self {
            bytes,
            file_name: file_name.into(),
            declared_format: None,
        }
    }

    /// Read the whole stream once. This is the only blocking I/O an
    /// extraction performs.
    pub fn from_reader<R: Read>(mut reader: R, file_name: impl Into<String>) -> std::io::Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(Self::new(bytes, file_name))
    }

    /// Override format detection with a format declared by the caller.
    pub fn with_format(mut self, format: SourceFormat) -> Self {
        self.declared_format = Some(format);
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// File name without directories or extension ("book.fb2.zip" -> "book").
    pub fn file_stem(&self) -> String {
        let name = Path::new(&self.file_name)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        match name.find('.') {
            Some(idx) if idx > 0 => name[..idx].to_string(),
            _ => name,
        }
    }

    pub fn format(&self) -> SourceFormat {
        self.declared_format
            .unwrap_or_else(|| SourceFormat::detect(&self.file_name, &self.bytes))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub description: Option<String>,
    pub long_description: Option<String>,
    pub language: Option<String>,
    pub publisher: Option<String>,
    #[serde(skip)]
    pub cover_image: Option<Vec<u8>>,
    pub cover_mime_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Chapter,
}

/// One chapter-equivalent block of a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentUnit {
    pub kind: UnitKind,
    pub title: String,
    pub html: String,
    pub plain_text: String,
    /// 0-based position in reading order
    pub order_index: usize,
    pub word_count: usize,
}

impl ContentUnit {
    pub fn chapter(
        order_index: usize,
        title: impl Into<String>,
        html: impl Into<String>,
        plain_text: impl Into<String>,
    ) -> Self {
        let plain_text = plain_text.into();
        Self {
            kind: UnitKind::Chapter,
            title: title.into(),
            html: html.into(),
            word_count: count_words(&plain_text),
            plain_text,
            order_index,
        }
    }

    /// Recompute `word_count` from `plain_text`.
    pub fn recount(&mut self) {
        self.word_count = count_words(&self.plain_text);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedImage {
    pub original_path: String,
    #[serde(skip)]
    pub data: Vec<u8>,
    pub mime_type: String,
    pub is_cover: bool,
}

impl ExtractedImage {
    pub fn new(original_path: impl Into<String>, data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            original_path: original_path.into(),
            data,
            mime_type: mime_type.into(),
            is_cover: false,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WarningCode {
    ParseError,
    ChapterParseError,
    PageParseError,
    NoTextLayer,
    EmptyContent,
    PartialExtraction,
    CoverExtractionFailed,
    ContentFiltered,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionWarning {
    pub code: WarningCode,
    pub message: String,
}

/// Where the text of a result came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum TextSource {
    #[default]
    None,
    NativeText,
    Ocr,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub text_source: TextSource,
    pub ocr_confidence: Option<f32>,
    pub warnings: Vec<ExtractionWarning>,
}

impl Diagnostics {
    /// Record a warning and log it.
    pub fn warn(&mut self, code: WarningCode, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{code:?}: {message}");
        self.warnings.push(ExtractionWarning { code, message });
    }

    pub fn count(&self, code: WarningCode) -> usize {
        self.warnings.iter().filter(|w| w.code == code).count()
    }

    pub fn has(&self, code: WarningCode) -> bool {
        self.count(code) > 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    pub label: String,
    pub href: String,
    pub children: Vec<TocEntry>,
}

impl TocEntry {
    pub fn new(label: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            href: href.into(),
            children: Vec::new(),
        }
    }

    /// Build a tree from entries listed in document order with their depth.
    /// An entry deeper than its predecessor becomes that entry's descendant.
    pub fn nest(entries: impl IntoIterator<Item = (usize, TocEntry)>) -> Vec<TocEntry> {
        fn insert(siblings: &mut Vec<TocEntry>, depth: usize, entry: TocEntry) {
            if depth > 0 {
                if let Some(parent) = siblings.last_mut() {
                    return insert(&mut parent.children, depth - 1, entry);
                }
            }
            siblings.push(entry);
        }

        let mut roots = Vec::new();
        for (depth, entry) in entries {
            insert(&mut roots, depth, entry);
        }
        roots
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub source_format: SourceFormat,
    pub file_name: String,
    pub metadata: Metadata,
    pub units: Vec<ContentUnit>,
    pub images: Vec<ExtractedImage>,
    pub diagnostics: Diagnostics,
    pub toc: Option<Vec<TocEntry>>,
}

impl ExtractionResult {
    pub fn empty(source_format: SourceFormat, file_name: impl Into<String>) -> Self {
        Self {
            source_format,
            file_name: file_name.into(),
            metadata: Metadata::default(),
            units: Vec::new(),
            images: Vec::new(),
            diagnostics: Diagnostics::default(),
            toc: None,
        }
    }

    /// Result for an unreadable container: no text, one `ParseError`.
    pub fn failed(source_format: SourceFormat, file_name: impl Into<String>, err: &Error) -> Self {
        let mut result = Self::empty(source_format, file_name);
        result
            .diagnostics
            .warn(WarningCode::ParseError, format!("failed to read {source_format}: {err}"));
        result
    }

    pub fn cover_image(&self) -> Option<&ExtractedImage> {
        self.images.iter().find(|img| img.is_cover)
    }

    /// Flag the image at `index` as the cover, clearing any previous flag,
    /// and mirror it into the metadata.
    pub fn set_cover(&mut self, index: usize) {
        for (i, image) in self.images.iter_mut().enumerate() {
            image.is_cover = i == index;
        }
        if let Some(image) = self.images.get(index) {
            self.metadata.cover_image = Some(image.data.clone());
            self.metadata.cover_mime_type = Some(image.mime_type.clone());
        }
    }

    pub fn total_words(&self) -> usize {
        self.units.iter().map(|u| u.word_count).sum()
    }

    /// Restore the `order_index` ordering and renumber densely from 0.
    pub fn normalize_order(&mut self) {
        self.units.sort_by_key(|u| u.order_index);
        for (i, unit) in self.units.iter_mut().enumerate() {
            unit.order_index = i;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_by_extension() {
        assert_eq!(SourceFormat::detect("Book.EPUB", b""), SourceFormat::Epub);
        assert_eq!(SourceFormat::detect("a/b/c.pdf", b""), SourceFormat::Pdf);
        assert_eq!(SourceFormat::detect("novel.fb2.zip", b"PK"), SourceFormat::Fb2);
        assert_eq!(SourceFormat::detect("notes.md", b""), SourceFormat::Markdown);
        assert_eq!(SourceFormat::detect("notes.txt", b""), SourceFormat::Txt);
    }

    #[test]
    fn toc_nests_by_depth() {
        let toc = TocEntry::nest([
            (0, TocEntry::new("Part I", "a")),
            (1, TocEntry::new("One", "b")),
            (2, TocEntry::new("Deep", "c")),
            (1, TocEntry::new("Two", "d")),
            (0, TocEntry::new("Part II", "e")),
        ]);
        assert_eq!(toc.len(), 2);
        assert_eq!(toc[0].children.len(), 2);
        assert_eq!(toc[0].children[0].children[0].label, "Deep");
        assert_eq!(toc[0].children[1].label, "Two");
        assert_eq!(toc[1].label, "Part II");
        assert_eq!(TocEntry::nest([(3, TocEntry::new("Orphan", ""))])[0].label, "Orphan");
    }

    #[test]
    fn declared_format_wins() {
        let request = ExtractionRequest::new(b"%PDF-1.7\n".to_vec(), "scan.pdf")
            .with_format(SourceFormat::Txt);
        assert_eq!(request.format(), SourceFormat::Txt);
    }

    #[test]
    fn detect_by_magic_bytes() {
        assert_eq!(SourceFormat::detect("upload", b"%PDF-1.7\n"), SourceFormat::Pdf);
        assert_eq!(
            SourceFormat::detect("upload", b"<?xml version=\"1.0\"?><FictionBook>"),
            SourceFormat::Fb2
        );
        let mut epub = b"PK\x03\x04".to_vec();
        epub.extend_from_slice(&[0u8; 26]);
        epub.extend_from_slice(b"mimetypeapplication/epub+zip");
        assert_eq!(SourceFormat::detect("upload.bin", &epub), SourceFormat::Epub);
        assert_eq!(SourceFormat::detect("upload.docx", b"PK\x03\x04"), SourceFormat::Unsupported);
    }

    #[test]
    fn file_stem_strips_all_extensions() {
        let req = ExtractionRequest::new(Vec::new(), "dir/war-and-peace.fb2.zip");
        assert_eq!(req.file_stem(), "war-and-peace");
    }

    #[test]
    fn word_count_follows_plain_text() {
        let mut unit = ContentUnit::chapter(0, "One", "<p>a b c</p>", "a b c");
        assert_eq!(unit.word_count, 3);
        unit.plain_text.push_str(" d");
        unit.recount();
        assert_eq!(unit.word_count, 4);
    }

    #[test]
    fn set_cover_keeps_a_single_flag() {
        let mut result = ExtractionResult::empty(SourceFormat::Epub, "x.epub");
        result.images.push(ExtractedImage::new("a.jpg", vec![1], "image/jpeg"));
        result.images.push(ExtractedImage::new("b.png", vec![2, 3], "image/png"));
        result.set_cover(0);
        result.set_cover(1);
        assert_eq!(result.images.iter().filter(|i| i.is_cover).count(), 1);
        assert_eq!(result.metadata.cover_mime_type.as_deref(), Some("image/png"));
        assert_eq!(result.metadata.cover_image, Some(vec![2, 3]));
    }
}
