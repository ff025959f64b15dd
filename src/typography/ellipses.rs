use std::sync::LazyLock;

use regex::Regex;

use super::tags::{map_text, replace_outside_tags};

pub const ELLIPSIS: char = '\u{2026}';
const HAIR_SPACE: char = '\u{200A}';
const WORD_JOINER: char = '\u{2060}';

static RE_DOTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("\\.[ \u{00A0}]?\\.[ \u{00A0}]?\\.").expect("valid dots regex")
});
static RE_ELLIPSIS_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("\u{2026}([.,!?;:])").expect("valid ellipsis punctuation regex"));

/// `...` and `. . .` to U+2026, then normalise spacing: an ellipsis after a
/// word is preceded by a word joiner and a hair space, and punctuation
/// directly after it gets a hair space.
pub fn normalize_ellipses(html: &str) -> String {
    let html = replace_outside_tags(&RE_DOTS, html, |_| ELLIPSIS.to_string());
    let html = space_ellipses(&html);
    replace_outside_tags(&RE_ELLIPSIS_PUNCT, &html, |caps| {
        format!("{}{}{}", ELLIPSIS, HAIR_SPACE, &caps[1])
    })
}

fn space_ellipses(html: &str) -> String {
    if !html.contains(ELLIPSIS) {
        return html.to_string();
    }
    map_text(html, |text| {
        let mut out = String::with_capacity(text.len() + 8);
        for c in text.chars() {
            if c == ELLIPSIS {
                while out.ends_with(HAIR_SPACE) || out.ends_with(WORD_JOINER) {
                    out.pop();
                }
                if out.chars().next_back().is_some_and(|p| !p.is_whitespace()) {
                    out.push(WORD_JOINER);
                    out.push(HAIR_SPACE);
                }
            }
            out.push(c);
        }
        out
    })
}
