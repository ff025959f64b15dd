//! EPUB 2 and 3 reader.
//!
//! `rbook` parses the container, package, spine and navigation documents.
//! On top of it this module decides which spine documents are chapters,
//! which image is the cover, and where chapter images point in the archive.

use std::io::Cursor;

use rbook::prelude::*;
use rbook::prelude::{Metadata as _, TocEntry as _};
use rbook::Epub;
use zip::ZipArchive;

use super::archive::check_declared_sizes;
use super::Extractor;
use crate::cancel::CancellationToken;
use crate::config::ExtractionOptions;
use crate::error::{Error, Result};
use crate::html::{clean_html, count_words, first_heading, rewrite_image_sources, to_plain_text};
use crate::image::{mime_from_path, sniff_mime};
use crate::model::{
    ContentUnit, ExtractedImage, ExtractionRequest, ExtractionResult, Metadata, SourceFormat,
    TextSource, TocEntry, WarningCode,
};

/// Spine documents whose file name contains one of these words are front or
/// back matter, not chapters.
const SKIPPED_DOCUMENTS: &[&str] = &[
    "colophon",
    "titlepage",
    "imprint",
    "uncopyright",
    "dedication",
    "introduction",
    "preface",
    "foreword",
    "afterword",
    "appendix",
    "endnotes",
    "halftitlepage",
    "frontispiece",
    "loi",
];

pub struct EpubExtractor {
    options: ExtractionOptions,
}

impl EpubExtractor {
    pub fn new(options: ExtractionOptions) -> Self {
        Self { options }
    }
}

impl Extractor for EpubExtractor {
    fn supported_format(&self) -> SourceFormat {
        SourceFormat::Epub
    }

    fn extract(&self, request: &ExtractionRequest, cancel: &CancellationToken) -> ExtractionResult {
        let mut result = ExtractionResult::empty(SourceFormat::Epub, request.file_name());
        let epub = match open(request.bytes(), self.options.max_entry_bytes) {
            Ok(epub) => epub,
            Err(err) => return ExtractionResult::failed(SourceFormat::Epub, request.file_name(), &err),
        };

        result.metadata = metadata(&epub);
        result.toc = table_of_contents(&epub);
        let (images, property_cover) = images(&epub);
        result.images = images;
        let library_cover = epub
            .manifest()
            .cover_image()
            .and_then(|entry| entry.resource().key().value().map(archive_path));
        if let Some(cover) = cover_index(&result.images, property_cover.as_deref(), library_cover.as_deref()) {
            result.set_cover(cover);
        }
        let cancelled = self.chapters(&epub, cancel, &mut result);

        result.diagnostics.text_source = if result.units.is_empty() {
            TextSource::None
        } else {
            TextSource::NativeText
        };
        if result.units.is_empty() && !cancelled {
            result
                .diagnostics
                .warn(WarningCode::EmptyContent, "no chapters with text in the spine");
        }
        result
    }
}

impl EpubExtractor {
    /// Walk the spine in reading order, keeping documents that are neither
    /// front/back matter nor too short. Returns whether `cancel` fired.
    fn chapters(&self, epub: &Epub, cancel: &CancellationToken, result: &mut ExtractionResult) -> bool {
        let mut reader = epub.reader();
        loop {
            if cancel.is_cancelled() {
                log::info!("EPUB extraction cancelled after {} units", result.units.len());
                return true;
            }
            let Some(next) = reader.read_next() else { return false };
            let data = match next {
                Ok(data) => data,
                Err(err) => {
                    result
                        .diagnostics
                        .warn(WarningCode::ChapterParseError, format!("skipped spine document: {err}"));
                    continue;
                }
            };

            let path = data
                .manifest_entry()
                .resource()
                .key()
                .value()
                .map(archive_path)
                .unwrap_or_default();
            if is_skipped_document(&path) {
                log::debug!("skipping front/back matter {path}");
                continue;
            }
            let raw = data.content().to_string();
            let Some((html, plain_text)) = chapter_text(&raw, &path) else {
                result
                    .diagnostics
                    .warn(WarningCode::ChapterParseError, format!("skipped {path}: empty document"));
                continue;
            };
            let words = count_words(&plain_text);
            if words < self.options.min_unit_words {
                log::debug!("skipping {path} ({words} words)");
                continue;
            }
            let order_index = result.units.len();
            let title = first_heading(&html).unwrap_or_else(|| format!("Chapter {}", order_index + 1));
            result
                .units
                .push(ContentUnit::chapter(order_index, title, html, plain_text));
        }
    }
}

/// Check the archive's declared sizes, then hand it to `rbook`.
fn open(bytes: &[u8], max_entry_bytes: u64) -> Result<Epub> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    check_declared_sizes(&mut archive, max_entry_bytes)?;
    Epub::options()
        .strict(false)
        .read(Cursor::new(bytes.to_vec()))
        .map_err(|e| Error::InvalidStructure(format!("unreadable EPUB: {e}")))
}

fn metadata(epub: &Epub) -> Metadata {
    let meta = epub.metadata();
    Metadata {
        title: meta.title().map(|t| t.value().trim().to_string()),
        authors: meta
            .creators()
            .map(|c| c.value().trim().to_string())
            .filter(|c| !c.is_empty())
            .collect(),
        description: meta.descriptions().next().map(|d| d.value().trim().to_string()),
        long_description: meta
            .by_property("se:long-description")
            .next()
            .map(|d| d.value().trim().to_string()),
        language: meta.languages().next().map(|l| l.value().trim().to_string()),
        publisher: meta.publishers().next().map(|p| p.value().trim().to_string()),
        ..Metadata::default()
    }
}

/// Every manifest image, plus the path of the one flagged `cover-image`.
fn images(epub: &Epub) -> (Vec<ExtractedImage>, Option<String>) {
    let mut images = Vec::new();
    let mut property_cover = None;
    for entry in epub.manifest().images() {
        let path = archive_path(entry.resource().key().value().unwrap_or("unknown"));
        let data = match entry.read_bytes() {
            Ok(data) => data,
            Err(err) => {
                log::warn!("cannot read image {path}: {err}");
                continue;
            }
        };
        if property_cover.is_none() && entry.properties().has_property("cover-image") {
            property_cover = Some(path.clone());
        }
        let mime = sniff_mime(&data)
            .or_else(|| mime_from_path(&path))
            .unwrap_or("application/octet-stream");
        images.push(ExtractedImage::new(path, data, mime));
    }
    (images, property_cover)
}

/// Cover priority: the `cover-image` manifest property, then an image whose
/// file name contains "cover", then the cover `rbook` resolves itself.
fn cover_index(images: &[ExtractedImage], property_cover: Option<&str>, library_cover: Option<&str>) -> Option<usize> {
    let index_of = |path: &str| images.iter().position(|img| img.original_path == path);

    property_cover
        .and_then(index_of)
        .or_else(|| {
            images
                .iter()
                .position(|img| file_name(&img.original_path).to_ascii_lowercase().contains("cover"))
        })
        .or_else(|| library_cover.and_then(index_of))
}

/// The navigation document (or NCX) flattened by `rbook`, nested again by depth.
fn table_of_contents(epub: &Epub) -> Option<Vec<TocEntry>> {
    let root = epub.toc().contents()?;
    let entries: Vec<(usize, TocEntry)> = root
        .children()
        .flatten()
        .filter(|entry| !entry.label().trim().is_empty())
        .map(|entry| {
            let href = entry
                .manifest_entry()
                .and_then(|m| m.resource().key().value().map(archive_path))
                .unwrap_or_default();
            (entry.depth(), TocEntry::new(entry.label().trim(), href))
        })
        .collect();
    let shallowest = entries.iter().map(|(depth, _)| *depth).min()?;
    let toc = TocEntry::nest(entries.into_iter().map(|(depth, entry)| (depth - shallowest, entry)));
    (!toc.is_empty()).then_some(toc)
}

/// Cleaned HTML and plain text of a spine document, with image sources
/// resolved to archive paths. `None` for an empty document.
fn chapter_text(raw: &str, path: &str) -> Option<(String, String)> {
    if raw.trim().is_empty() {
        return None;
    }
    let base = parent_dir(path);
    let html = rewrite_image_sources(&clean_html(raw), |src| {
        (!src.contains("://") && !src.starts_with("data:")).then(|| resolve_href(base, src))
    });
    let plain_text = to_plain_text(&html);
    Some((html, plain_text))
}

fn is_skipped_document(path: &str) -> bool {
    let name = file_name(path).to_ascii_lowercase();
    let stem = name.split('.').next().unwrap_or("");
    stem.split(|c: char| !c.is_ascii_alphanumeric())
        .any(|token| SKIPPED_DOCUMENTS.contains(&token))
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn parent_dir(path: &str) -> &str {
    path.rfind('/').map_or("", |i| &path[..i])
}

/// Archive path of an `rbook` resource key, which may be absolute.
fn archive_path(key: &str) -> String {
    resolve_href("", key)
}

/// Resolve an href relative to `base` into a normalised archive path,
/// dropping any fragment and decoding percent escapes.
pub(crate) fn resolve_href(base: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or("");
    let href = percent_decode(href);
    let mut parts: Vec<&str> = if href.starts_with('/') {
        Vec::new()
    } else {
        base.split('/').filter(|p| !p.is_empty()).collect()
    };
    for segment in href.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

fn percent_decode(input: &str) -> String {
    if !input.contains('%') {
        return input.to_string();
    }
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = |b: u8| (b as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
