use std::sync::LazyLock;

use regex::Regex;

use super::{ProcessingContext, Processor};

const SOFT_HYPHEN: char = '\u{00AD}';
const MIN_WORD_LEN: usize = 7;
const MIN_FRAGMENT: usize = 3;

static RE_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[A-Za-z\u{00AD}]{7,}").expect("valid word regex"));

const DIGRAPHS: &[&str] = &["ch", "ck", "gh", "ng", "ph", "qu", "sh", "th", "wh", "wr"];

/// Insert soft hyphens into long words of body text.
pub struct HyphenationStage;

impl Processor for HyphenationStage {
    fn name(&self) -> &'static str {
        "soft-hyphenation"
    }

    fn enabled(&self, ctx: &ProcessingContext) -> bool {
        ctx.options.soft_hyphenation
    }

    fn process(&self, html: &str, ctx: &ProcessingContext) -> String {
        if ctx.is_english() {
            hyphenate_html(html)
        } else {
            html.to_string()
        }
    }
}

fn is_vowel(c: u8) -> bool {
    matches!(c.to_ascii_lowercase(), b'a' | b'e' | b'i' | b'o' | b'u' | b'y')
}

/// Break a word between two consonants that sit between vowels (VC-CV),
/// keeping at least three letters on each side and never splitting a
/// digraph. Existing soft hyphens are discarded first.
pub fn hyphenate_word(word: &str) -> String {
    let letters: String = word.chars().filter(|&c| c != SOFT_HYPHEN).collect();
    let bytes = letters.as_bytes();
    if bytes.len() < MIN_WORD_LEN || !letters.is_ascii() {
        return letters;
    }

    let mut out = String::with_capacity(letters.len() + 4);
    let mut last_break = 0;
    for i in 2..bytes.len() - 1 {
        let boundary = is_vowel(bytes[i - 2])
            && !is_vowel(bytes[i - 1])
            && !is_vowel(bytes[i])
            && is_vowel(bytes[i + 1]);
        if !boundary || i - last_break < MIN_FRAGMENT || bytes.len() - i < MIN_FRAGMENT {
            continue;
        }
        let pair = letters[i - 1..=i].to_ascii_lowercase();
        if DIGRAPHS.contains(&pair.as_str()) {
            continue;
        }
        out.push_str(&letters[last_break..i]);
        out.push(SOFT_HYPHEN);
        last_break = i;
    }
    out.push_str(&letters[last_break..]);
    out
}

/// Hyphenate text content, skipping headings, `<abbr>` elements and tags.
pub fn hyphenate_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len() + html.len() / 16);
    let mut skip_depth = 0usize;
    let mut rest = html;

    while !rest.is_empty() {
        let text_end = rest.find('<').unwrap_or(rest.len());
        let text = &rest[..text_end];
        if skip_depth == 0 {
            out.push_str(&RE_WORD.replace_all(text, |caps: &regex::Captures| hyphenate_word(&caps[0])));
        } else {
            out.push_str(text);
        }
        rest = &rest[text_end..];
        if rest.is_empty() {
            break;
        }

        let tag_end = rest.find('>').map_or(rest.len(), |i| i + 1);
        let tag = &rest[..tag_end];
        if let Some(opens) = skipped_element(tag) {
            if opens {
                skip_depth += 1;
            } else {
                skip_depth = skip_depth.saturating_sub(1);
            }
        }
        out.push_str(tag);
        rest = &rest[tag_end..];
    }
    out
}

/// `Some(true)` for an opening heading/abbr tag, `Some(false)` for a closing
/// one, `None` for anything else.
fn skipped_element(tag: &str) -> Option<bool> {
    let inner = tag.trim_start_matches('<');
    let (closing, inner) = match inner.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, inner),
    };
    if inner.trim_end_matches('>').ends_with('/') {
        return None;
    }
    let name: String = inner
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    let skipped = matches!(name.as_str(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "abbr");
    skipped.then_some(!closing)
}
