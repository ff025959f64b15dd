//! PDF reader.
//!
//! Pages are interpreted into positioned text runs and image placements,
//! rebuilt into lines and paragraphs, then grouped into chapters from the
//! outline, from headings at the top of pages, or by fixed page ranges.

mod chapters;
mod content;
mod document;
mod fonts;
mod layout;
mod watermark;

use super::Extractor;
use crate::cancel::CancellationToken;
use crate::config::ExtractionOptions;
use crate::html::{first_heading, to_plain_text};
use crate::model::{
    ContentUnit, ExtractedImage, ExtractionRequest, ExtractionResult, SourceFormat, TextSource,
    TocEntry, WarningCode,
};

use chapters::{detect_chapters, page_heading, ChapterCandidate};
use content::{interpret_page, ImagePlacement};
use document::{OutlineEntry, PdfDocument};
use layout::{body_font_size, build_lines, render_page, Line, Placed};
use watermark::find_watermark;

pub struct PdfExtractor {
    options: ExtractionOptions,
}

impl PdfExtractor {
    pub fn new(options: ExtractionOptions) -> Self {
        Self { options }
    }
}

/// A page after interpretation.
struct Page<'a> {
    lines: Vec<Line>,
    images: Vec<ImagePlacement<'a>>,
}

impl Extractor for PdfExtractor {
    fn supported_format(&self) -> SourceFormat {
        SourceFormat::Pdf
    }

    fn extract(&self, request: &ExtractionRequest, cancel: &CancellationToken) -> ExtractionResult {
        let mut result = ExtractionResult::empty(SourceFormat::Pdf, request.file_name());
        let doc = match PdfDocument::load(request.bytes()) {
            Ok(doc) => doc,
            Err(err) => return ExtractionResult::failed(SourceFormat::Pdf, request.file_name(), &err),
        };
        result.metadata = doc.metadata();

        let total_pages = doc.page_count();
        if total_pages == 0 {
            result.diagnostics.warn(WarningCode::EmptyContent, "document has no pages");
            return result;
        }
        let page_count = total_pages.min(self.options.max_pdf_pages.max(1));
        if page_count < total_pages {
            result.diagnostics.warn(
                WarningCode::PartialExtraction,
                format!("only the first {page_count} of {total_pages} pages were read"),
            );
        }

        self.extract_cover(&doc, &mut result);

        if !self.has_text_layer(&doc, page_count) {
            result
                .diagnostics
                .warn(WarningCode::NoTextLayer, "sampled pages carry no extractable text");
            result.diagnostics.text_source = TextSource::None;
            return result;
        }

        let mut pages: Vec<Option<Page<'_>>> = Vec::with_capacity(page_count);
        let mut runs = Vec::new();
        for number in 1..=page_count {
            if cancel.is_cancelled() {
                log::info!("PDF extraction cancelled after {} pages", pages.len());
                break;
            }
            match interpret_page(&doc, number) {
                Ok(content) => {
                    runs.push(content.runs.clone());
                    pages.push(Some(Page {
                        lines: build_lines(content.runs),
                        images: content.images,
                    }));
                }
                Err(err) => {
                    result
                        .diagnostics
                        .warn(WarningCode::PageParseError, format!("skipped page {number}: {err}"));
                    pages.push(None);
                }
            }
        }
        let body_size = body_font_size(runs.iter().flatten());
        log::debug!("body font size {body_size:.1}pt");

        let outline = doc.outline();
        result.toc = toc_from_outline(&outline);

        let headings: Vec<(usize, String)> = pages
            .iter()
            .enumerate()
            .filter_map(|(i, page)| {
                let page = page.as_ref()?;
                page_heading(&page.lines, body_size).map(|title| (i + 1, title))
            })
            .collect();
        let chapters = detect_chapters(
            &outline,
            &headings,
            pages.len(),
            self.options.pages_per_fallback_chapter,
        );

        for chapter in &chapters {
            self.add_chapter(&doc, &pages, chapter, body_size, &mut result);
        }

        prefer_page_one_cover(&mut result);

        if result.units.is_empty() {
            if !cancel.is_cancelled() {
                result
                    .diagnostics
                    .warn(WarningCode::EmptyContent, "no chapter produced any text");
            }
        } else {
            result.diagnostics.text_source = TextSource::NativeText;
        }
        result
    }
}

impl PdfExtractor {
    /// Store the largest image drawn on page 1 as the cover.
    fn extract_cover(&self, doc: &PdfDocument, result: &mut ExtractionResult) {
        let content = match interpret_page(doc, 1) {
            Ok(content) => content,
            Err(err) => {
                result
                    .diagnostics
                    .warn(WarningCode::CoverExtractionFailed, format!("cannot read page 1: {err}"));
                return;
            }
        };
        let mut largest = None;
        for placement in &content.images {
            match doc.image(placement.stream) {
                Ok(Some(image)) => {
                    if largest.as_ref().map_or(true, |l: &document::ImageData| image.data.len() > l.data.len()) {
                        largest = Some(image);
                    }
                }
                Ok(None) => {}
                Err(err) => log::debug!("unreadable image on page 1: {err}"),
            }
        }
        if let Some(image) = largest {
            result.images.push(ExtractedImage::new(
                format!("cover.{}", image.extension),
                image.data,
                image.mime,
            ));
            result.set_cover(result.images.len() - 1);
        }
    }

    /// Count words on up to `text_layer_sample_pages` pages spread evenly
    /// over the document.
    fn has_text_layer(&self, doc: &PdfDocument, page_count: usize) -> bool {
        let samples = self.options.text_layer_sample_pages.clamp(1, page_count);
        let words: usize = (0..samples)
            .map(|i| 1 + i * page_count / samples)
            .filter_map(|page| interpret_page(doc, page).ok())
            .map(|content| content.word_count())
            .sum();
        log::debug!("{words} words on {samples} sampled pages");
        words > 0
    }

    fn add_chapter(
        &self,
        doc: &PdfDocument,
        pages: &[Option<Page<'_>>],
        chapter: &ChapterCandidate,
        body_size: f32,
        result: &mut ExtractionResult,
    ) {
        let mut images = Vec::new();
        let mut parts = Vec::new();
        for number in chapter.pages() {
            let Some(Some(page)) = pages.get(number - 1) else { continue };
            let mut placed = Vec::new();
            for (i, placement) in page.images.iter().enumerate() {
                match doc.image(placement.stream) {
                    Ok(Some(image)) if image.data.len() >= self.options.inline_image_min_bytes => {
                        let name = format!("page-{number}-{}.{}", i + 1, image.extension);
                        placed.push(Placed {
                            top: placement.top,
                            html: format!("<img src=\"{name}\" alt=\"\"/>"),
                        });
                        images.push(ExtractedImage::new(name, image.data, image.mime));
                    }
                    Ok(_) => {}
                    Err(err) => log::debug!("unreadable image on page {number}: {err}"),
                }
            }
            let html = render_page(&page.lines, placed, body_size);
            if !html.is_empty() {
                parts.push(html);
            }
        }

        let html = parts.join("\n");
        let plain_text = to_plain_text(&html);
        if plain_text.split_whitespace().next().is_none() {
            log::debug!("pages {}-{} have no text", chapter.start_page, chapter.end_page);
            return;
        }
        if self.options.filter_watermarks {
            if let Some(phrase) = find_watermark(&plain_text) {
                result.diagnostics.warn(
                    WarningCode::ContentFiltered,
                    format!(
                        "dropped pages {}-{}: contains \"{phrase}\"",
                        chapter.start_page, chapter.end_page
                    ),
                );
                return;
            }
        }

        let title = chapter
            .title
            .clone()
            .or_else(|| first_heading(&html))
            .unwrap_or_else(|| chapter.range_title());
        let order = result.units.len();
        result.units.push(ContentUnit::chapter(order, title, html, plain_text));
        result.images.append(&mut images);
    }
}

/// Replace the standalone cover with the largest inline image from page 1
/// when that image is bigger.
fn prefer_page_one_cover(result: &mut ExtractionResult) {
    let Some((index, size)) = result
        .images
        .iter()
        .enumerate()
        .filter(|(_, img)| img.original_path.starts_with("page-1-"))
        .map(|(i, img)| (i, img.size()))
        .max_by_key(|(_, size)| *size)
    else {
        return;
    };
    let current = result.images.iter().position(|img| img.is_cover);
    let current_size = current.map_or(0, |i| result.images[i].size());
    if size <= current_size {
        return;
    }
    let mut index = index;
    if let Some(current) = current {
        result.images.remove(current);
        if current < index {
            index -= 1;
        }
    }
    result.set_cover(index);
}

/// Outline entries nested by level, each pointing at `#page-{n}`.
fn toc_from_outline(outline: &[OutlineEntry]) -> Option<Vec<TocEntry>> {
    let toc = TocEntry::nest(outline.iter().map(|item| {
        let href = item.page.map(|p| format!("#page-{p}")).unwrap_or_default();
        (item.level, TocEntry::new(item.title.clone(), href))
    }));
    (!toc.is_empty()).then_some(toc)
}
