//! FictionBook 2 reader.
//!
//! FB2 is a single XML document: `<description>` carries the metadata, the
//! first unnamed `<body>` the text, a `<body name="notes">` the footnotes and
//! `<binary>` elements the base64 encoded images. Top-level sections of the
//! main body become chapters; nested sections are folded into their chapter
//! with lower-level headings.

use std::io::Cursor;
use std::sync::LazyLock;

use base64::Engine;
use encoding_rs::{Encoding, UTF_8};
use quick_xml::events::{BytesStart, Event};
use regex::Regex;
use zip::ZipArchive;

use super::archive::{check_declared_sizes, read_capped};
use super::Extractor;
use crate::cancel::CancellationToken;
use crate::config::ExtractionOptions;
use crate::error::{Error, Result};
use crate::html::{clean_html, count_words, escape_text, to_plain_text};
use crate::image::sniff_mime;
use crate::model::{
    ContentUnit, ExtractedImage, ExtractionRequest, ExtractionResult, Metadata, SourceFormat,
    TextSource, TocEntry, WarningCode,
};
use crate::xml::{attr, lenient_reader, local_name, squash, text};

static RE_XML_ENCODING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<\?xml[^>]*\bencoding\s*=\s*["']([A-Za-z0-9._:-]+)["']"#)
        .expect("valid xml encoding regex")
});

/// Bodies with one of these names hold notes or comments, not the book text.
const AUXILIARY_BODIES: &[&str] = &["notes", "comments", "footnotes"];

#[derive(Default)]
pub struct Fb2Extractor {
    options: ExtractionOptions,
}

impl Fb2Extractor {
    pub fn new(options: ExtractionOptions) -> Self {
        Self { options }
    }
}

impl Extractor for Fb2Extractor {
    fn supported_format(&self) -> SourceFormat {
        SourceFormat::Fb2
    }

    fn extract(&self, request: &ExtractionRequest, cancel: &CancellationToken) -> ExtractionResult {
        let parsed = load_document(request.bytes(), self.options.max_entry_bytes)
            .and_then(|xml| parse_book(&xml, cancel));
        let book = match parsed {
            Ok(book) => book,
            Err(err) => return ExtractionResult::failed(SourceFormat::Fb2, request.file_name(), &err),
        };

        let mut result = ExtractionResult::empty(SourceFormat::Fb2, request.file_name());
        result.metadata = book.metadata;
        result.images = book.images;
        if let Some(href) = book.cover_href.as_deref() {
            match result.images.iter().position(|img| img.original_path == href) {
                Some(index) => result.set_cover(index),
                None => log::debug!("coverpage references missing binary {href}"),
            }
        }

        let mut toc = Vec::new();
        for chapter in book.chapters {
            let html = clean_html(&chapter.html);
            let plain_text = to_plain_text(&html);
            if count_words(&plain_text) == 0 {
                continue;
            }
            let order_index = result.units.len();
            let title = chapter
                .title
                .unwrap_or_else(|| format!("Chapter {}", order_index + 1));
            let href = match chapter.id {
                Some(id) => format!("#{id}"),
                None => format!("#chapter-{}", order_index + 1),
            };
            let mut entry = TocEntry::new(title.clone(), href.clone());
            entry.children = chapter
                .subtitles
                .into_iter()
                .map(|label| TocEntry::new(label, href.clone()))
                .collect();
            toc.push(entry);
            result
                .units
                .push(ContentUnit::chapter(order_index, title, html, plain_text));
        }

        if let Some(message) = book.truncated {
            result.diagnostics.warn(WarningCode::ChapterParseError, message);
        }
        if !toc.is_empty() {
            result.toc = Some(toc);
        }
        if result.units.is_empty() {
            if !cancel.is_cancelled() {
                result
                    .diagnostics
                    .warn(WarningCode::EmptyContent, "FB2 body contains no text");
            }
        } else {
            result.diagnostics.text_source = TextSource::NativeText;
        }
        result
    }
}

/// Unzip `.fb2.zip` containers and decode the declared character encoding.
fn load_document(bytes: &[u8], max_entry_bytes: u64) -> Result<String> {
    if bytes.starts_with(b"PK\x03\x04") {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        check_declared_sizes(&mut archive, max_entry_bytes)?;
        for i in 0..archive.len() {
            let file = archive.by_index(i)?;
            if file.name().to_ascii_lowercase().ends_with(".fb2") {
                let name = file.name().to_string();
                let data = read_capped(file, &name, max_entry_bytes)?;
                return Ok(decode_xml(&data));
            }
        }
        return Err(Error::MissingFile("*.fb2".to_string()));
    }
    Ok(decode_xml(bytes))
}

fn decode_xml(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(256)]);
    let encoding = RE_XML_ENCODING
        .captures(&head)
        .and_then(|caps| Encoding::for_label(caps[1].as_bytes()));
    match encoding {
        Some(encoding) if encoding != UTF_8 => {
            log::debug!("decoding FB2 as {}", encoding.name());
            encoding.decode_without_bom_handling(bytes).0.into_owned()
        }
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

#[derive(Debug, Default)]
struct Chapter {
    id: Option<String>,
    title: Option<String>,
    /// Titles of nested sections
    subtitles: Vec<String>,
    html: String,
}

#[derive(Debug, Default)]
struct Book {
    metadata: Metadata,
    cover_href: Option<String>,
    chapters: Vec<Chapter>,
    images: Vec<ExtractedImage>,
    /// Set when the XML broke off after some chapters were read
    truncated: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Outside,
    Main,
    Auxiliary,
}

#[derive(Debug, Default)]
struct AuthorName {
    first: String,
    middle: String,
    last: String,
    nickname: String,
}

impl AuthorName {
    fn display(&self) -> String {
        let full = squash(&format!("{} {} {}", self.first, self.middle, self.last));
        if full.is_empty() {
            squash(&self.nickname)
        } else {
            full
        }
    }
}

struct Binary {
    id: String,
    content_type: String,
    payload: String,
}

/// Streaming state while walking the document.
struct Walker<'c> {
    cancel: &'c CancellationToken,
    book: Book,
    path: Vec<String>,
    field: String,
    annotation: Option<String>,
    author: Option<AuthorName>,
    body: BodyKind,
    seen_main_body: bool,
    depth: usize,
    current: Option<Chapter>,
    /// Main body content outside any section
    loose: String,
    title: Option<String>,
    closers: Vec<&'static str>,
    binary: Option<Binary>,
}

fn parse_book(xml: &str, cancel: &CancellationToken) -> Result<Book> {
    let mut reader = lenient_reader(xml);
    let mut buf = Vec::new();
    let mut walker = Walker::new(cancel);
    let mut saw_root = false;

    loop {
        let event = match reader.read_event_into(&mut buf) {
            Ok(event) => event,
            Err(err) if walker.has_content() => {
                let at = walker.book.chapters.len() + 1;
                walker.book.truncated = Some(format!("XML error in chapter {at}: {err}"));
                walker.finish_chapter();
                break;
            }
            Err(err) => return Err(err.into()),
        };
        match event {
            Event::Start(e) => {
                saw_root |= local_name(&e) == "fictionbook";
                if !walker.start(&e) {
                    break;
                }
            }
            Event::Empty(e) => walker.empty(&e),
            Event::Text(t) => walker.text(&text(&t)),
            Event::CData(t) => walker.text(&String::from_utf8_lossy(&t)),
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_ascii_lowercase();
                walker.end(&name);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(Error::InvalidStructure("missing <FictionBook> root".to_string()));
    }
    Ok(walker.finish())
}

impl<'c> Walker<'c> {
    fn new(cancel: &'c CancellationToken) -> Self {
        Self {
            cancel,
            book: Book::default(),
            path: Vec::new(),
            field: String::new(),
            annotation: None,
            author: None,
            body: BodyKind::Outside,
            seen_main_body: false,
            depth: 0,
            current: None,
            loose: String::new(),
            title: None,
            closers: Vec::new(),
            binary: None,
        }
    }

    fn has_content(&self) -> bool {
        !self.book.chapters.is_empty() || self.current.is_some()
    }

    fn in_path(&self, name: &str) -> bool {
        self.path.iter().any(|p| p == name)
    }

    fn in_title_info(&self) -> bool {
        self.in_path("title-info") && self.in_path("description")
    }

    /// Returns false when the walk should stop (cancellation).
    fn start(&mut self, e: &BytesStart<'_>) -> bool {
        let name = local_name(e);
        let keep_going = match self.body {
            BodyKind::Main => self.start_in_body(&name, e),
            BodyKind::Auxiliary => true,
            BodyKind::Outside => {
                self.start_outside(&name, e);
                true
            }
        };
        self.path.push(name);
        keep_going
    }

    fn start_outside(&mut self, name: &str, e: &BytesStart<'_>) {
        match name {
            "body" => {
                let named = attr(e, b"name").map(|n| n.to_ascii_lowercase());
                self.body = match named.as_deref() {
                    Some(n) if AUXILIARY_BODIES.contains(&n) => BodyKind::Auxiliary,
                    _ if self.seen_main_body => BodyKind::Auxiliary,
                    _ => {
                        self.seen_main_body = true;
                        BodyKind::Main
                    }
                };
            }
            "binary" => {
                self.binary = Some(Binary {
                    id: attr(e, b"id").unwrap_or_default(),
                    content_type: attr(e, b"content-type").unwrap_or_default(),
                    payload: String::new(),
                });
            }
            "annotation" if self.in_title_info() => self.annotation = Some(String::new()),
            "p" if self.annotation.as_ref().is_some_and(|a| !a.is_empty()) => {
                if let Some(annotation) = self.annotation.as_mut() {
                    annotation.push('\n');
                }
            }
            "author" if self.in_title_info() => self.author = Some(AuthorName::default()),
            "image" if self.in_path("coverpage") => self.cover_image(e),
            _ => self.field.clear(),
        }
    }

    fn start_in_body(&mut self, name: &str, e: &BytesStart<'_>) -> bool {
        match name {
            "section" => {
                self.depth += 1;
                if self.depth == 1 {
                    if self.cancel.is_cancelled() {
                        log::info!("FB2 extraction cancelled after {} chapters", self.book.chapters.len());
                        return false;
                    }
                    self.current = Some(Chapter {
                        id: attr(e, b"id"),
                        ..Chapter::default()
                    });
                }
            }
            "title" => self.title = Some(String::new()),
            "p" if self.title.is_some() => {
                if let Some(title) = self.title.as_mut() {
                    title.push(' ');
                }
            }
            _ if self.title.is_some() => {}
            "image" => {
                let src = image_reference(e);
                self.push_html(&format!("<img src=\"{}\" alt=\"\"/>", escape_text(&src)));
                self.closers.push("");
            }
            _ => {
                let (open, close) = html_for(name, self.depth);
                self.push_html(open);
                self.closers.push(close);
            }
        }
        true
    }

    fn empty(&mut self, e: &BytesStart<'_>) {
        let name = local_name(e);
        match self.body {
            BodyKind::Main => match name.as_str() {
                "image" => {
                    let src = image_reference(e);
                    self.push_html(&format!("<img src=\"{}\" alt=\"\"/>", escape_text(&src)));
                }
                "empty-line" => self.push_html("<br/>"),
                _ => {}
            },
            BodyKind::Auxiliary => {}
            BodyKind::Outside => {
                if name == "image" && self.in_path("coverpage") {
                    self.cover_image(e);
                }
            }
        }
    }

    fn text(&mut self, value: &str) {
        if let Some(binary) = self.binary.as_mut() {
            binary.payload.push_str(value);
            return;
        }
        match self.body {
            BodyKind::Main => {
                if let Some(title) = self.title.as_mut() {
                    title.push_str(value);
                } else {
                    self.push_html(&escape_text(value));
                }
            }
            BodyKind::Auxiliary => {}
            BodyKind::Outside => {
                if let Some(annotation) = self.annotation.as_mut() {
                    annotation.push_str(value);
                } else {
                    self.field.push_str(value);
                }
            }
        }
    }

    fn end(&mut self, name: &str) {
        self.path.pop();
        match self.body {
            BodyKind::Main => self.end_in_body(name),
            BodyKind::Auxiliary => {
                if name == "body" && !self.in_path("body") {
                    self.body = BodyKind::Outside;
                }
            }
            BodyKind::Outside => self.end_outside(name),
        }
    }

    fn end_outside(&mut self, name: &str) {
        let value = squash(&std::mem::take(&mut self.field));
        let in_title_info = self.in_title_info();
        match name {
            "binary" => self.finish_binary(),
            "annotation" if in_title_info => {
                if let Some(annotation) = self.annotation.take() {
                    let annotation = annotation
                        .lines()
                        .map(squash)
                        .filter(|l| !l.is_empty())
                        .collect::<Vec<_>>()
                        .join("\n\n");
                    if !annotation.is_empty() {
                        self.book.metadata.description = Some(annotation);
                    }
                }
            }
            "first-name" | "middle-name" | "last-name" | "nickname" => {
                if let Some(author) = self.author.as_mut() {
                    let slot = match name {
                        "first-name" => &mut author.first,
                        "middle-name" => &mut author.middle,
                        "last-name" => &mut author.last,
                        _ => &mut author.nickname,
                    };
                    *slot = value;
                }
            }
            "author" => {
                if let Some(author) = self.author.take() {
                    let display = author.display();
                    if !display.is_empty() {
                        self.book.metadata.authors.push(display);
                    }
                }
            }
            "book-title" if in_title_info && !value.is_empty() => {
                self.book.metadata.title.get_or_insert(value);
            }
            "lang" if in_title_info && !value.is_empty() => {
                self.book.metadata.language.get_or_insert(value);
            }
            "publisher" if self.in_path("publish-info") && !value.is_empty() => {
                self.book.metadata.publisher.get_or_insert(value);
            }
            _ => {}
        }
    }

    fn end_in_body(&mut self, name: &str) {
        match name {
            "body" => {
                self.body = BodyKind::Outside;
                self.finish_chapter();
            }
            "section" => {
                self.depth = self.depth.saturating_sub(1);
                if self.depth == 0 {
                    self.finish_chapter();
                }
            }
            "title" => {
                let Some(title) = self.title.take() else { return };
                let title = squash(&title);
                if title.is_empty() || self.depth == 0 {
                    return;
                }
                let level = (self.depth + 1).min(6);
                self.push_html(&format!("<h{level}>{}</h{level}>", escape_text(&title)));
                if let Some(chapter) = self.current.as_mut() {
                    if self.depth == 1 && chapter.title.is_none() {
                        chapter.title = Some(title);
                    } else if self.depth == 2 {
                        chapter.subtitles.push(title);
                    }
                }
            }
            _ if self.title.is_some() => {}
            _ => {
                if let Some(close) = self.closers.pop() {
                    self.push_html(close);
                }
            }
        }
    }

    fn push_html(&mut self, fragment: &str) {
        match self.current.as_mut() {
            Some(chapter) => chapter.html.push_str(fragment),
            None => self.loose.push_str(fragment),
        }
    }

    fn finish_chapter(&mut self) {
        if let Some(chapter) = self.current.take() {
            self.book.chapters.push(chapter);
        }
        self.closers.clear();
        self.depth = 0;
    }

    fn cover_image(&mut self, e: &BytesStart<'_>) {
        if self.in_title_info() && self.book.cover_href.is_none() {
            self.book.cover_href = Some(image_reference(e));
        }
    }

    fn finish_binary(&mut self) {
        let Some(binary) = self.binary.take() else { return };
        let payload: String = binary.payload.split_whitespace().collect();
        match base64::engine::general_purpose::STANDARD.decode(payload.as_bytes()) {
            Ok(data) => {
                let mime = sniff_mime(&data)
                    .map(str::to_string)
                    .unwrap_or(binary.content_type);
                self.book.images.push(ExtractedImage::new(binary.id, data, mime));
            }
            Err(err) => log::warn!("skipping binary {}: {}", binary.id, Error::from(err)),
        }
    }

    fn finish(mut self) -> Book {
        self.finish_chapter();
        if self.book.chapters.is_empty() && !to_plain_text(&self.loose).is_empty() {
            self.book.chapters.push(Chapter {
                title: self.book.metadata.title.clone(),
                html: std::mem::take(&mut self.loose),
                ..Chapter::default()
            });
        }
        self.book
    }
}

/// `l:href="#pic1"` -> `pic1`
fn image_reference(e: &BytesStart<'_>) -> String {
    attr(e, b"href")
        .map(|href| href.trim_start_matches('#').to_string())
        .unwrap_or_default()
}

/// Opening and closing HTML for an FB2 body element. Unknown elements are
/// transparent.
fn html_for(name: &str, depth: usize) -> (&'static str, &'static str) {
    match name {
        "p" | "v" => ("<p>", "</p>"),
        "emphasis" => ("<em>", "</em>"),
        "strong" => ("<strong>", "</strong>"),
        "strikethrough" => ("<s>", "</s>"),
        "sub" => ("<sub>", "</sub>"),
        "sup" => ("<sup>", "</sup>"),
        "code" => ("<code>", "</code>"),
        "subtitle" => match depth {
            0 | 1 => ("<h3>", "</h3>"),
            2 => ("<h4>", "</h4>"),
            3 => ("<h5>", "</h5>"),
            _ => ("<h6>", "</h6>"),
        },
        "epigraph" | "cite" => ("<blockquote>", "</blockquote>"),
        "poem" => ("<div class=\"poem\">", "</div>"),
        "stanza" => ("<div class=\"stanza\">", "</div>"),
        "text-author" => ("<p class=\"text-author\">", "</p>"),
        "table" => ("<table>", "</table>"),
        "tr" => ("<tr>", "</tr>"),
        "td" => ("<td>", "</td>"),
        "th" => ("<th>", "</th>"),
        "empty-line" => ("<br/>", ""),
        _ => ("", ""),
    }
}
