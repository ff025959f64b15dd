mod common;

use std::io::{Cursor, Write};

use bookmill::{
    extract, CancellationToken, ExtractionOptions, ExtractionRequest, ExtractionResult,
    SourceFormat, TextSource, WarningCode,
};
use common::{inflate_declared_sizes, sample_fb2};

fn zipped(xml: &str) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("steppe.fb2", zip::write::SimpleFileOptions::default())
        .unwrap();
    zip.write_all(xml.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

fn run(bytes: Vec<u8>, name: &str) -> ExtractionResult {
    extract(
        &ExtractionRequest::new(bytes, name),
        &ExtractionOptions::default(),
        &CancellationToken::new(),
    )
}

#[test]
fn sections_become_chapters() {
    let result = run(sample_fb2().into_bytes(), "steppe.fb2");

    assert_eq!(result.source_format, SourceFormat::Fb2);
    assert_eq!(result.diagnostics.text_source, TextSource::NativeText);
    let titles: Vec<&str> = result.units.iter().map(|u| u.title.as_str()).collect();
    assert_eq!(titles, ["I", "II"]);
    assert!(result.units[0].plain_text.contains("shabby covered chaise"));
    assert!(result.units.iter().all(|u| !u.plain_text.contains("not a chapter")));
}

#[test]
fn title_info_and_cover() {
    let result = run(sample_fb2().into_bytes(), "steppe.fb2");

    assert_eq!(result.metadata.title.as_deref(), Some("The Steppe"));
    assert_eq!(result.metadata.authors, ["Anton Chekhov"]);
    assert_eq!(result.metadata.language.as_deref(), Some("en"));
    assert_eq!(result.metadata.description.as_deref(), Some("The story of a journey."));

    let cover = result.cover_image().expect("coverpage binary");
    assert_eq!(cover.mime_type, "image/jpeg");
    assert!(cover.data.starts_with(&[0xFF, 0xD8, 0xFF]));
}

#[test]
fn zipped_book_is_unpacked() {
    let result = run(zipped(&sample_fb2()), "steppe.fb2.zip");
    assert_eq!(result.source_format, SourceFormat::Fb2);
    assert_eq!(result.units.len(), 2);
}

#[test]
fn zipped_book_with_lying_sizes_is_refused() {
    let result = run(inflate_declared_sizes(zipped(&sample_fb2())), "steppe.fb2.zip");
    assert!(result.units.is_empty());
    assert_eq!(result.diagnostics.text_source, TextSource::None);
    assert_eq!(result.diagnostics.count(WarningCode::ParseError), 1);
    assert!(result.diagnostics.warnings[0].message.contains("steppe.fb2"));
}

#[test]
fn sniffed_without_extension() {
    let result = run(sample_fb2().into_bytes(), "download");
    assert_eq!(result.source_format, SourceFormat::Fb2);
    assert_eq!(result.metadata.title.as_deref(), Some("The Steppe"));
}
