//! HTML helpers shared by the extractors, the pipeline and the linter.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use scraper::{Html, Selector};

static RE_BODY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<body\b[^>]*>(.*)</body\s*>").expect("valid body regex"));
static RE_HEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<head\b[^>]*>.*?</head\s*>").expect("valid head regex"));
static RE_SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<script\b[^>]*/>").expect("valid script regex")
});
static RE_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>|<link\b[^>]*>").expect("valid style regex")
});
static RE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment regex"));
static RE_PROLOG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<\?xml[^>]*\?>|<!DOCTYPE[^>]*>|</?html\b[^>]*>").expect("valid prolog regex")
});
static RE_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\r\n\x0C]+").expect("valid whitespace regex"));
static RE_BLOCK_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*(</(?:p|div|h[1-6]|li|ul|ol|blockquote|section|article|table|tr|figure|header|footer|aside|pre)>|<hr\b[^>]*/?>)\s*")
        .expect("valid block end regex")
});
static RE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\b[^>]*/?>").expect("valid br regex"));
static RE_BLOCK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(?:p|div|h[1-6]|li|ul|ol|blockquote|section|article|table|tr|td|th|figure|figcaption|header|footer|aside|pre|dt|dd)\b[^>]*>|<hr\b[^>]*/?>")
        .expect("valid block tag regex")
});
static RE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static RE_ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]{1,6}|#[0-9]{1,7}|[a-zA-Z][a-zA-Z0-9]{1,10});").expect("valid entity regex")
});
static RE_LINE_SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("valid spaces regex"));
static RE_BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid blank lines regex"));
static RE_IMG_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(<(?:img|image)\b[^>]*?\s(?:src|xlink:href)\s*=\s*)(["'])([^"']*)(["'])"#)
        .expect("valid img src regex")
});
static HEADING_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").expect("valid heading selector"));

/// Characters the pipeline inserts that carry no meaning in plain text.
pub const INVISIBLE_FORMATTING: [char; 3] = ['\u{00AD}', '\u{2060}', '\u{200A}'];

/// Reduce an (X)HTML document to the cleaned inner HTML of its body.
///
/// Drops the prolog, `<head>`, scripts, styles and comments and collapses
/// whitespace runs; block-level closing tags end a line so the output stays
/// diffable.
pub fn clean_html(raw: &str) -> String {
    let body = RE_BODY
        .captures(raw)
        .and_then(|c| c.get(1))
        .map_or(raw, |m| m.as_str());

    let html = RE_HEAD.replace_all(body, "");
    let html = RE_SCRIPT.replace_all(&html, "");
    let html = RE_STYLE.replace_all(&html, "");
    let html = RE_COMMENT.replace_all(&html, "");
    let html = RE_PROLOG.replace_all(&html, "");
    let html = RE_WHITESPACE.replace_all(&html, " ");
    let html = RE_BLOCK_END.replace_all(&html, "$1\n");

    html.trim().to_string()
}

/// Convert HTML to plain text suitable for search indexing.
///
/// Blocks become paragraphs separated by a blank line, entities are decoded
/// and the invisible characters added by the typography pipeline are removed.
pub fn to_plain_text(html: &str) -> String {
    let text = RE_BREAK.replace_all(html, "\n");
    let text = RE_BLOCK_TAG.replace_all(&text, "\n\n");
    let text = RE_TAG.replace_all(&text, "");
    let text = decode_entities(&text);

    let text: String = text
        .chars()
        .filter(|c| !INVISIBLE_FORMATTING.contains(c))
        .map(|c| if c == '\u{00A0}' { ' ' } else { c })
        .collect();

    let lines: Vec<String> = text
        .lines()
        .map(|line| RE_LINE_SPACES.replace_all(line.trim(), " ").to_string())
        .collect();
    let joined = lines.join("\n");

    RE_BLANK_LINES
        .replace_all(&joined, "\n\n")
        .trim()
        .to_string()
}

/// Whitespace-delimited token count.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Text of the first `<h1>`–`<h6>` in document order.
pub fn first_heading(html: &str) -> Option<String> {
    let fragment = Html::parse_fragment(html);
    fragment.select(&HEADING_SELECTOR).find_map(|element| {
        let text = element.text().collect::<Vec<_>>().join(" ");
        let text = RE_WHITESPACE.replace_all(text.trim(), " ").to_string();
        let text: String = text.chars().filter(|c| !INVISIBLE_FORMATTING.contains(c)).collect();
        (!text.is_empty()).then_some(text)
    })
}

/// Decode named and numeric character references.
///
/// Unknown named entities are left as they are.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    RE_ENTITY
        .replace_all(text, |caps: &Captures| {
            let body = &caps[1];
            let decoded = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(body)
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .to_string()
}

fn named_entity(name: &str) -> Option<char> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{00A0}',
        "shy" => '\u{00AD}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "hellip" => '\u{2026}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201C}',
        "rdquo" => '\u{201D}',
        "laquo" => '\u{00AB}',
        "raquo" => '\u{00BB}',
        "copy" => '\u{00A9}',
        "reg" => '\u{00AE}',
        "trade" => '\u{2122}',
        "pound" => '\u{00A3}',
        "euro" => '\u{20AC}',
        "deg" => '\u{00B0}',
        "frac12" => '\u{00BD}',
        "frac14" => '\u{00BC}',
        "frac34" => '\u{00BE}',
        "times" => '\u{00D7}',
        "eacute" => '\u{00E9}',
        "egrave" => '\u{00E8}',
        "aacute" => '\u{00E1}',
        "agrave" => '\u{00E0}',
        "ccedil" => '\u{00E7}',
        "uuml" => '\u{00FC}',
        "ouml" => '\u{00F6}',
        "auml" => '\u{00E4}',
        "szlig" => '\u{00DF}',
        "aelig" => '\u{00E6}',
        "oelig" => '\u{0153}',
        "thinsp" => '\u{2009}',
        "hairsp" => '\u{200A}',
        "zwj" => '\u{200D}',
        "zwnj" => '\u{200C}',
        _ => return None,
    };
    Some(c)
}

/// Escape text for inclusion in HTML element content.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Rewrite the `src` (or SVG `xlink:href`) of every image with `map`.
/// Sources for which `map` returns `None` are left untouched.
pub fn rewrite_image_sources<F>(html: &str, mut map: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    RE_IMG_SRC
        .replace_all(html, |caps: &Captures| match map(&caps[3]) {
            Some(new_src) => format!("{}{}{}{}", &caps[1], &caps[2], new_src, &caps[4]),
            None => caps[0].to_string(),
        })
        .to_string()
}

/// All image sources referenced by the document, in order.
pub fn image_sources(html: &str) -> Vec<String> {
    RE_IMG_SRC
        .captures_iter(html)
        .map(|caps| caps[3].to_string())
        .collect()
}
