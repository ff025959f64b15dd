mod common;

use bookmill::{
    extract, CancellationToken, ExtractionOptions, ExtractionRequest, ExtractionResult,
    SourceFormat, TextSource, WarningCode,
};
use common::{epub, inflate_declared_sizes, sample_epub, xhtml, CONTAINER_XML};

fn run(bytes: Vec<u8>, name: &str) -> ExtractionResult {
    extract(
        &ExtractionRequest::new(bytes, name),
        &ExtractionOptions::default(),
        &CancellationToken::new(),
    )
}

#[test]
fn chapters_follow_the_spine() {
    let result = run(sample_epub(), "voyage.epub");

    assert_eq!(result.source_format, SourceFormat::Epub);
    assert_eq!(result.diagnostics.text_source, TextSource::NativeText);
    let titles: Vec<&str> = result.units.iter().map(|u| u.title.as_str()).collect();
    assert_eq!(titles, ["Chapter One", "Chapter Two"]);
    let orders: Vec<usize> = result.units.iter().map(|u| u.order_index).collect();
    assert_eq!(orders, [0, 1]);
    assert!(result.units[0].plain_text.starts_with("Chapter One\n\nAs the streets"));
    assert!(result.units.iter().all(|u| u.word_count >= 10));
}

#[test]
fn metadata_cover_and_toc() {
    let result = run(sample_epub(), "voyage.epub");

    assert_eq!(result.metadata.title.as_deref(), Some("The Voyage Out"));
    assert_eq!(result.metadata.authors, ["Virginia Woolf"]);
    assert_eq!(result.metadata.language.as_deref(), Some("en"));
    assert_eq!(result.metadata.description.as_deref(), Some("A first novel."));

    assert_eq!(result.images.len(), 2);
    let cover = result.cover_image().expect("cover image");
    assert_eq!(cover.original_path, "OEBPS/images/front.png");
    assert_eq!(cover.mime_type, "image/png");
    assert_eq!(result.metadata.cover_mime_type.as_deref(), Some("image/png"));

    let toc = result.toc.expect("nav document");
    let labels: Vec<&str> = toc.iter().map(|e| e.label.as_str()).collect();
    assert_eq!(labels, ["Chapter One", "Chapter Two", "Chapter Three"]);
}

#[test]
fn image_sources_point_into_the_archive() {
    let result = run(sample_epub(), "voyage.epub");
    assert!(
        result.units[0].html.contains(r#"src="OEBPS/images/map.png""#),
        "{}",
        result.units[0].html
    );
}

#[test]
fn missing_chapter_is_skipped_with_a_warning() {
    let opf = r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>Gaps</dc:title></metadata>
  <manifest>
    <item id="a" href="a.xhtml" media-type="application/xhtml+xml"/>
    <item id="b" href="b.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine><itemref idref="a"/><itemref idref="b"/></spine>
</package>"#;
    let chapter = xhtml(
        "Present",
        &["This chapter exists and has more than enough words to be kept as a unit."],
    );
    let bytes = epub(&[
        ("META-INF/container.xml", CONTAINER_XML.as_bytes()),
        ("OEBPS/content.opf", opf.as_bytes()),
        ("OEBPS/a.xhtml", chapter.as_bytes()),
    ]);
    let result = run(bytes, "gaps.epub");

    assert_eq!(result.units.len(), 1);
    assert_eq!(result.units[0].title, "Present");
    assert_eq!(result.diagnostics.count(WarningCode::ChapterParseError), 1);
}

#[test]
fn not_a_zip_is_a_parse_error() {
    let result = run(b"definitely not a zip archive".to_vec(), "broken.epub");
    assert!(result.units.is_empty());
    assert_eq!(result.diagnostics.text_source, TextSource::None);
    assert_eq!(result.diagnostics.count(WarningCode::ParseError), 1);
}

#[test]
fn format_is_sniffed_without_extension() {
    let result = run(sample_epub(), "upload.bin");
    assert_eq!(result.source_format, SourceFormat::Epub);
    assert_eq!(result.units.len(), 2);
}

#[test]
fn oversized_entries_are_refused_before_reading() {
    let result = run(inflate_declared_sizes(sample_epub()), "voyage.epub");
    assert!(result.units.is_empty());
    assert!(result.images.is_empty());
    assert_eq!(result.diagnostics.text_source, TextSource::None);
    assert_eq!(result.diagnostics.count(WarningCode::ParseError), 1);
    assert!(result.diagnostics.warnings[0].message.contains("byte limit"));
}

#[test]
fn entry_cap_is_configurable() {
    let options = ExtractionOptions::default().with_max_entry_bytes(64);
    let result = extract(
        &ExtractionRequest::new(sample_epub(), "voyage.epub"),
        &options,
        &CancellationToken::new(),
    );
    assert!(result.units.is_empty());
    assert_eq!(result.diagnostics.count(WarningCode::ParseError), 1);
}

#[test]
fn cancellation_mid_spine_keeps_finished_chapters() {
    let result = extract(
        &ExtractionRequest::new(sample_epub(), "voyage.epub"),
        &ExtractionOptions::default(),
        &CancellationToken::with_check_budget(2),
    );
    let titles: Vec<&str> = result.units.iter().map(|u| u.title.as_str()).collect();
    assert_eq!(titles, ["Chapter One"]);
    assert_eq!(result.diagnostics.text_source, TextSource::NativeText);
    assert_eq!(result.diagnostics.count(WarningCode::EmptyContent), 0);
}
