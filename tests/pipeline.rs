use std::time::{Duration, Instant};

use bookmill::pipeline::add_semantics;
use bookmill::{
    extract, CancellationToken, ExtractionOptions, ExtractionRequest, Linter, Pipeline,
    ProcessingContext, ProcessingOptions,
};

fn typography_only() -> ProcessingContext {
    ProcessingContext::default().with_options(ProcessingOptions {
        spelling: false,
        typography: true,
        semantics: false,
        soft_hyphenation: false,
    })
}

#[test]
fn stage_order_is_pinned() {
    assert_eq!(
        Pipeline::new().stage_names(),
        ["spelling", "typography", "semantic", "soft-hyphenation"]
    );
}

#[test]
fn typography_examples() {
    let pipeline = Pipeline::new();
    let ctx = typography_only();
    let run = |html: &str| pipeline.process(html, &ctx).html;

    assert_eq!(run("<p>don't</p>"), "<p>don\u{2019}t</p>");
    assert_eq!(run("<p>\"Hello\"</p>"), "<p>\u{201C}Hello\u{201D}</p>");
    assert_eq!(run("<p>1/2</p>"), "<p>\u{00BD}</p>");
    assert_eq!(run("<p>Mr. Smith</p>"), "<p>Mr.\u{00A0}Smith</p>");
    assert_eq!(run("<p>O.K.</p>"), "<p>OK</p>");
}

#[test]
fn semantic_markup() {
    let out = Pipeline::new().process("<p>Mr. Smith met Henry IV.</p>", &ProcessingContext::default());
    assert!(
        out.html.contains("<abbr epub:type=\"z3998:name-title\">Mr.</abbr>"),
        "{}",
        out.html
    );
    assert!(out.html.contains("<span epub:type=\"z3998:roman\">IV</span>"), "{}", out.html);

    let untouched = add_semantics("<p>MI and DI</p>");
    assert_eq!(untouched, "<p>MI and DI</p>");
}

#[test]
fn semantic_markup_never_nests() {
    let once = add_semantics("<abbr>Mr.</abbr> Smith");
    assert_eq!(add_semantics(&once), once);
    assert_eq!(once.matches("<abbr").count(), 1);
}

#[test]
fn extracted_text_through_pipeline_and_linter() {
    let text = "\"Don't go,\" said Mr. Smith -- twice.\n\nIt was the the last time.";
    let mut result = extract(
        &ExtractionRequest::new(text.as_bytes().to_vec(), "scene.txt"),
        &ExtractionOptions::default(),
        &CancellationToken::new(),
    );
    let ctx = ProcessingContext::for_result(&result);
    Pipeline::new().process_result(&mut result, &ctx, &CancellationToken::new());

    let unit = &result.units[0];
    assert!(unit.html.contains('\u{201C}'), "{}", unit.html);
    assert!(unit.html.contains("Don\u{2019}t"), "{}", unit.html);
    assert!(unit.plain_text.contains("Mr. Smith"), "{}", unit.plain_text);
    assert_eq!(unit.word_count, unit.plain_text.split_whitespace().count());

    let issues = Linter::new().check_book(&result.units);
    let repeated: Vec<_> = issues.iter().filter(|i| i.code == "C003").collect();
    assert_eq!(repeated.len(), 1, "{issues:?}");
    assert_eq!(repeated[0].chapter_number, Some(1));
    assert!(issues.iter().all(|i| i.code != "T001"), "{issues:?}");
}

#[test]
fn cancelled_pipeline_leaves_units_untouched() {
    let mut result = extract(
        &ExtractionRequest::new(b"don't panic".to_vec(), "a.txt"),
        &ExtractionOptions::default(),
        &CancellationToken::new(),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();
    Pipeline::new().process_result(&mut result, &ProcessingContext::default(), &cancel);
    assert_eq!(result.units[0].html, "<p>don't panic</p>");
}

#[test]
fn stress_five_thousand_sentences() {
    let sentence = "<p>\"Well,\" said Mr. Jones to Dr. Watson -- at 5 p.m. on the 3rd... It's 1/2 past IV, isn't it?</p>\n";
    let html = sentence.repeat(5000);

    let started = Instant::now();
    let out = Pipeline::new().process(&html, &ProcessingContext::default());
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_secs(60), "took {elapsed:?}");
    assert_eq!(out.html.matches("<p>").count(), 5000);
    assert!(!out.html.contains("--"));
}
