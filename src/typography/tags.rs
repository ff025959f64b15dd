//! Tag awareness for regex rewrites over HTML.
//!
//! Rewrites must never touch markup. A position is inside a tag when the
//! last `<` before it comes after the last `>` before it; [`TagIndex`]
//! answers that with two binary searches instead of rescanning the prefix
//! for every match.

use std::ops::Range;

use regex::{Captures, Regex};

pub struct TagIndex {
    opens: Vec<usize>,
    closes: Vec<usize>,
}

impl TagIndex {
    pub fn new(html: &str) -> Self {
        let mut opens = Vec::new();
        let mut closes = Vec::new();
        for (i, b) in html.bytes().enumerate() {
            match b {
                b'<' => opens.push(i),
                b'>' => closes.push(i),
                _ => {}
            }
        }
        Self { opens, closes }
    }

    /// Whether the byte just before `pos` belongs to a tag.
    pub fn inside_tag(&self, pos: usize) -> bool {
        match (last_before(&self.opens, pos), last_before(&self.closes, pos)) {
            (Some(open), Some(close)) => open > close,
            (Some(_), None) => true,
            _ => false,
        }
    }

    /// Whether a match spanning `range` lies in text content.
    pub fn in_text(&self, range: &Range<usize>) -> bool {
        !self.inside_tag(range.start + 1) && !self.inside_tag(range.end)
    }
}

fn last_before(positions: &[usize], pos: usize) -> Option<usize> {
    let idx = positions.partition_point(|&p| p < pos);
    idx.checked_sub(1).map(|i| positions[i])
}

/// Replace every match of `re` that lies in text content with `f(caps)`.
pub fn replace_outside_tags<F>(re: &Regex, html: &str, f: F) -> String
where
    F: FnMut(&Captures) -> String,
{
    replace_guarded(re, html, &[], f)
}

/// Like [`replace_outside_tags`], also leaving alone matches that overlap
/// any of the `protected` byte ranges.
pub fn replace_guarded<F>(re: &Regex, html: &str, protected: &[Range<usize>], mut f: F) -> String
where
    F: FnMut(&Captures) -> String,
{
    if !re.is_match(html) {
        return html.to_string();
    }
    let tags = TagIndex::new(html);
    let mut out = String::with_capacity(html.len() + 64);
    let mut last = 0;

    for caps in re.captures_iter(html) {
        let Some(m) = caps.get(0) else { continue };
        let range = m.range();
        if range.is_empty() || !tags.in_text(&range) || overlaps(protected, &range) {
            continue;
        }
        out.push_str(&html[last..range.start]);
        out.push_str(&f(&caps));
        last = range.end;
    }
    out.push_str(&html[last..]);
    out
}

/// Byte ranges of every element matched by `re` (which should match a
/// whole element, open tag to close tag). Sorted by start.
pub fn element_ranges(re: &Regex, html: &str) -> Vec<Range<usize>> {
    re.find_iter(html).map(|m| m.range()).collect()
}

fn overlaps(protected: &[Range<usize>], range: &Range<usize>) -> bool {
    // `protected` is sorted and non-overlapping
    let idx = protected.partition_point(|p| p.end <= range.start);
    protected
        .get(idx)
        .is_some_and(|p| p.start < range.end)
}

/// Apply `f` to every run of text between tags, leaving tags untouched.
pub fn map_text<F>(html: &str, mut f: F) -> String
where
    F: FnMut(&str) -> String,
{
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(open) = rest.find('<') {
        out.push_str(&f(&rest[..open]));
        match rest[open..].find('>') {
            Some(close) => {
                out.push_str(&rest[open..open + close + 1]);
                rest = &rest[open + close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(&f(rest));
    out
}

/// A visible character or a structural break, as seen by scanners that need
/// the neighbours of a character across inline markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Char { pos: usize, ch: char },
    Boundary,
}

const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "b", "cite", "em", "i", "small", "span", "strong", "sub", "sup", "u",
];

/// Tokenize the text content of `html`. Inline tags are transparent; any
/// other tag becomes a [`Token::Boundary`].
pub fn text_tokens(html: &str) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(html.len());
    let mut chars = html.char_indices();
    while let Some((pos, ch)) = chars.next() {
        if ch != '<' {
            tokens.push(Token::Char { pos, ch });
            continue;
        }
        let mut tag = String::new();
        for (_, c) in chars.by_ref() {
            if c == '>' {
                break;
            }
            tag.push(c);
        }
        if !is_inline_tag(&tag) {
            tokens.push(Token::Boundary);
        }
    }
    tokens
}

fn is_inline_tag(tag: &str) -> bool {
    let name: String = tag
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    INLINE_TAGS.contains(&name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_positions_inside_tags() {
        let html = r#"<p class="a">text</p>"#;
        let tags = TagIndex::new(html);
        assert!(tags.inside_tag(3));
        assert!(!tags.inside_tag(14));
        assert!(tags.inside_tag(html.len() - 1));
    }

    #[test]
    fn replacement_skips_attributes() {
        let re = Regex::new("--").unwrap();
        let html = r#"<a title="a--b">c--d</a>"#;
        let out = replace_outside_tags(&re, html, |_| "\u{2014}".to_string());
        assert_eq!(out, "<a title=\"a--b\">c\u{2014}d</a>");
    }

    #[test]
    fn replacement_skips_protected_ranges() {
        let re = Regex::new(r"Mr\.").unwrap();
        let html = "<abbr>Mr.</abbr> and Mr.";
        let protected = vec![0..16];
        let out = replace_guarded(&re, html, &protected, |_| "X".to_string());
        assert_eq!(out, "<abbr>Mr.</abbr> and X");
    }

    #[test]
    fn map_text_leaves_tags_alone() {
        let out = map_text("<p a='x'>ab</p>cd", |t| t.to_uppercase());
        assert_eq!(out, "<p a='x'>AB</p>CD");
    }

    #[test]
    fn inline_tags_are_transparent() {
        let tokens = text_tokens("a<em>b</em><p>c");
        let visible: Vec<Option<char>> = tokens
            .iter()
            .map(|t| match t {
                Token::Char { ch, .. } => Some(*ch),
                Token::Boundary => None,
            })
            .collect();
        assert_eq!(visible, vec![Some('a'), Some('b'), None, Some('c')]);
    }
}
