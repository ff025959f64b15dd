mod common;

use std::time::{Duration, Instant};

use bookmill::{
    extract, CancellationToken, ExtractionOptions, ExtractionRequest, ExtractionResult,
    SourceFormat, TextSource, WarningCode,
};
use common::{noise, PdfBuilder};

fn run(bytes: Vec<u8>) -> ExtractionResult {
    run_with(bytes, &ExtractionOptions::default())
}

fn run_with(bytes: Vec<u8>, options: &ExtractionOptions) -> ExtractionResult {
    extract(
        &ExtractionRequest::new(bytes, "book.pdf"),
        options,
        &CancellationToken::new(),
    )
}

fn prose_pages(mut builder: PdfBuilder, count: usize) -> PdfBuilder {
    for n in 0..count {
        let first = format!("Page {n} of the long road north.");
        builder = builder.text_page(&[&first, "It rained again today and nobody complained about it."]);
    }
    builder
}

#[test]
fn thirty_plain_pages_split_into_two_chapters() {
    let result = run(prose_pages(PdfBuilder::new(), 30).build());

    assert_eq!(result.source_format, SourceFormat::Pdf);
    assert_eq!(result.diagnostics.text_source, TextSource::NativeText);
    assert!(result.diagnostics.warnings.is_empty(), "{:?}", result.diagnostics.warnings);
    let titles: Vec<&str> = result.units.iter().map(|u| u.title.as_str()).collect();
    assert_eq!(titles, ["Pages 1–15", "Pages 16–30"]);
    assert!(result.units[0].plain_text.starts_with("Page 0 of the long road north."));
    assert!(result.units[1].plain_text.contains("Page 15 of the long road north."));
    assert_eq!(result.units[1].order_index, 1);
}

#[test]
fn info_dictionary_feeds_metadata() {
    let result = run(prose_pages(PdfBuilder::new(), 2).build());
    assert_eq!(result.metadata.title.as_deref(), Some("Generated Book"));
    assert_eq!(result.metadata.authors, ["Ada Lovelace", "Charles Babbage"]);
}

#[test]
fn outline_defines_chapters_and_toc() {
    let builder = prose_pages(PdfBuilder::new(), 4)
        .bookmark("Opening", 1)
        .bookmark("Closing", 3);
    let result = run(builder.build());

    let titles: Vec<&str> = result.units.iter().map(|u| u.title.as_str()).collect();
    assert_eq!(titles, ["Opening", "Closing"]);
    assert!(result.units[1].plain_text.starts_with("Page 2 "));

    let toc = result.toc.expect("outline becomes the toc");
    let hrefs: Vec<&str> = toc.iter().map(|e| e.href.as_str()).collect();
    assert_eq!(hrefs, ["#page-1", "#page-3"]);
}

#[test]
fn chapter_headings_split_without_outline() {
    let body = "The wind moved slowly over the empty fields that evening.";
    let builder = PdfBuilder::new()
        .sized_text_page(&[(20.0, "CHAPTER I"), (12.0, body)])
        .text_page(&[body])
        .text_page(&[body])
        .sized_text_page(&[(20.0, "CHAPTER II"), (12.0, body)])
        .text_page(&[body])
        .text_page(&[body]);
    let result = run(builder.build());

    let titles: Vec<&str> = result.units.iter().map(|u| u.title.as_str()).collect();
    assert_eq!(titles, ["CHAPTER I", "CHAPTER II"]);
    assert!(result.units[0].html.starts_with("<h2>CHAPTER I</h2>"), "{}", result.units[0].html);
    assert_eq!(result.units[0].word_count, 2 + 3 * 10);
}

#[test]
fn image_only_document_bails_out_early() {
    let mut builder = PdfBuilder::new();
    for _ in 0..40 {
        builder = builder.vector_page();
    }
    let bytes = builder.build();

    let started = Instant::now();
    let result = run(bytes);
    assert!(started.elapsed() < Duration::from_secs(10));

    assert!(result.units.is_empty());
    assert_eq!(result.diagnostics.text_source, TextSource::None);
    assert_eq!(result.diagnostics.count(WarningCode::NoTextLayer), 1);
    assert_eq!(result.diagnostics.warnings.len(), 1);
    assert!(result.cover_image().is_none());
    assert!(result.metadata.cover_image.is_none());
}

#[test]
fn small_page_one_image_is_the_cover() {
    let builder = PdfBuilder::new().image_page(8, 8, vec![200; 8 * 8 * 3], "A small caption under the picture.");
    let result = run(prose_pages(builder, 2).build());

    assert_eq!(result.images.len(), 1);
    let cover = result.cover_image().expect("cover");
    assert_eq!(cover.original_path, "cover.png");
    assert_eq!(result.metadata.cover_mime_type.as_deref(), Some("image/png"));
    assert!(!result.units[0].html.contains("<img"));
}

#[test]
fn large_page_one_image_is_inline_and_stays_the_cover() {
    let builder = PdfBuilder::new().image_page(64, 64, noise(64 * 64 * 3), "A caption under the picture for the reader.");
    let result = run(prose_pages(builder, 2).build());

    let paths: Vec<&str> = result.images.iter().map(|i| i.original_path.as_str()).collect();
    assert_eq!(paths, ["cover.png", "page-1-1.png"]);
    let cover = result.cover_image().expect("cover");
    assert_eq!(cover.original_path, "cover.png");
    assert_eq!(cover.size(), result.images[1].size());
    assert!(cover.size() >= 2048);
    let html = &result.units[0].html;
    assert!(html.starts_with("<img src=\"page-1-1.png\" alt=\"\"/>"), "{html}");
    assert!(html.contains("A caption under the picture for the reader."));
}

#[test]
fn unreadable_page_is_skipped_alone() {
    let builder = PdfBuilder::new()
        .text_page(&["The first page reads fine."])
        .text_page(&["So does the second page."])
        .broken_page()
        .text_page(&["The fourth page survives the damage."])
        .text_page(&["And the fifth closes the chapter."]);
    let result = run(builder.build());

    assert_eq!(result.diagnostics.count(WarningCode::PageParseError), 1, "{:?}", result.diagnostics.warnings);
    assert!(!result.diagnostics.has(WarningCode::ParseError));
    assert_eq!(result.units.len(), 1);
    let text = &result.units[0].plain_text;
    assert!(text.contains("second page"), "{text}");
    assert!(text.contains("fourth page survives"), "{text}");
    assert!(text.contains("fifth closes"), "{text}");
    assert_eq!(result.units[0].title, "Pages 1–5");
}

#[test]
fn cancellation_mid_run_keeps_pages_already_read() {
    let cancel = CancellationToken::with_check_budget(2);
    let bytes = prose_pages(PdfBuilder::new(), 5).build();
    let result = extract(&ExtractionRequest::new(bytes, "book.pdf"), &ExtractionOptions::default(), &cancel);

    assert!(cancel.is_cancelled());
    assert_eq!(result.units.len(), 1);
    assert_eq!(result.units[0].title, "Pages 1–2");
    assert!(result.units[0].plain_text.contains("Page 1 of the long road north."));
    assert!(!result.units[0].plain_text.contains("Page 2 of the long road north."));
    assert_eq!(result.diagnostics.text_source, TextSource::NativeText);
}

#[test]
fn huge_vector_document_bails_out_on_samples() {
    let mut builder = PdfBuilder::new();
    for _ in 0..2000 {
        builder = builder.vector_page();
    }
    let bytes = builder.build();

    let started = Instant::now();
    let result = run(bytes);
    assert!(started.elapsed() < Duration::from_secs(10), "took {:?}", started.elapsed());

    assert!(result.units.is_empty());
    assert_eq!(result.diagnostics.text_source, TextSource::None);
    assert_eq!(result.diagnostics.count(WarningCode::NoTextLayer), 1);
    assert_eq!(result.diagnostics.warnings.len(), 1);
    assert!(result.cover_image().is_none());
}

#[test]
fn scanned_document_still_gets_a_cover() {
    let mut builder = PdfBuilder::new().scan_page(16, 16, noise(16 * 16 * 3));
    for _ in 0..199 {
        builder = builder.vector_page();
    }
    let result = run(builder.build());

    assert!(result.units.is_empty());
    assert_eq!(result.diagnostics.text_source, TextSource::None);
    assert_eq!(result.diagnostics.count(WarningCode::NoTextLayer), 1);
    let cover = result.cover_image().expect("page 1 scan is the cover");
    assert_eq!(cover.original_path, "cover.png");
    assert_eq!(result.metadata.cover_mime_type.as_deref(), Some("image/png"));
}

#[test]
fn watermarked_chapter_is_dropped() {
    let builder = PdfBuilder::new()
        .text_page(&["The first chapter is perfectly ordinary prose."])
        .text_page(&["Downloaded from OceanofPDF.com for free."])
        .bookmark("One", 1)
        .bookmark("Two", 2);
    let bytes = builder.build();

    let result = run(bytes.clone());
    assert_eq!(result.units.len(), 1);
    assert_eq!(result.units[0].title, "One");
    assert_eq!(result.diagnostics.count(WarningCode::ContentFiltered), 1);

    let unfiltered = run_with(bytes, &ExtractionOptions::default().with_watermark_filter(false));
    assert_eq!(unfiltered.units.len(), 2);
}

#[test]
fn page_cap_reports_partial_extraction() {
    let options = ExtractionOptions::default().with_max_pdf_pages(3);
    let result = run_with(prose_pages(PdfBuilder::new(), 5).build(), &options);

    assert_eq!(result.diagnostics.count(WarningCode::PartialExtraction), 1);
    assert_eq!(result.units.len(), 1);
    assert_eq!(result.units[0].title, "Pages 1–3");
    assert!(!result.units[0].plain_text.contains("Page 3 "));
}

#[test]
fn garbage_is_a_parse_error() {
    let result = run(b"%PDF-1.7\nthis is not really a pdf".to_vec());
    assert!(result.units.is_empty());
    assert_eq!(result.diagnostics.text_source, TextSource::None);
    assert!(
        result.diagnostics.has(WarningCode::ParseError) || result.diagnostics.has(WarningCode::EmptyContent),
        "{:?}",
        result.diagnostics.warnings
    );
}

#[test]
fn cancelled_before_pages_yields_nothing() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let bytes = prose_pages(PdfBuilder::new(), 3).build();
    let result = extract(&ExtractionRequest::new(bytes, "book.pdf"), &ExtractionOptions::default(), &cancel);
    assert!(result.units.is_empty());
    assert!(!result.diagnostics.has(WarningCode::EmptyContent));
}
