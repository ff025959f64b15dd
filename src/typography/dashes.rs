use std::sync::LazyLock;

use regex::Regex;

use super::tags::{map_text, replace_outside_tags};

pub const WORD_JOINER: char = '\u{2060}';
pub const EM_DASH: char = '\u{2014}';
pub const THREE_EM_DASH: char = '\u{2E3B}';
pub const EN_DASH: char = '\u{2013}';

static RE_TRIPLE_HYPHEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("---").expect("valid triple hyphen regex"));
static RE_DOUBLE_HYPHEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("--").expect("valid double hyphen regex"));
static RE_SPACED_HYPHEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("([\\p{L},;:!?.\u{2019}\u{201D}])[ \u{00A0}]+-[ \u{00A0}]+([\\p{L}\u{2018}\u{201C}])")
        .expect("valid spaced hyphen regex")
});
static RE_SPACED_EM_DASH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("[ \u{00A0}]*\u{2014}[ \u{00A0}]*").expect("valid spaced em dash regex")
});

/// Normalise dashes: `---` to a three-em dash, `--` and U+2015 to an em
/// dash, a hyphen with spaces on both sides between words to an em dash.
/// Spaces around em dashes are removed.
pub fn normalize_dashes(html: &str) -> String {
    let html = replace_outside_tags(&RE_TRIPLE_HYPHEN, html, |_| THREE_EM_DASH.to_string());
    let html = replace_outside_tags(&RE_DOUBLE_HYPHEN, &html, |_| EM_DASH.to_string());
    let html = map_text(&html, |text| text.replace('\u{2015}', "\u{2014}"));
    let html = replace_outside_tags(&RE_SPACED_HYPHEN, &html, |caps| {
        format!("{}{}{}", &caps[1], EM_DASH, &caps[2])
    });
    replace_outside_tags(&RE_SPACED_EM_DASH, &html, |_| EM_DASH.to_string())
}

/// Put a word joiner before every em and three-em dash that directly
/// follows text, so a line never starts with the dash.
pub fn join_dashes(html: &str) -> String {
    map_text(html, |text| {
        let mut out = String::with_capacity(text.len() + 8);
        let mut prev: Option<char> = None;
        for c in text.chars() {
            if (c == EM_DASH || c == THREE_EM_DASH)
                && prev.is_some_and(|p| !p.is_whitespace() && p != WORD_JOINER)
            {
                out.push(WORD_JOINER);
            }
            out.push(c);
            prev = Some(c);
        }
        out
    })
}

/// Wrap en dashes between digits in word joiners (`1914–1918`).
pub fn join_number_ranges(html: &str) -> String {
    if !html.contains(EN_DASH) {
        return html.to_string();
    }
    map_text(html, |text| {
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len() + 8);
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if c == EN_DASH {
                let before = out.trim_end_matches(WORD_JOINER).chars().next_back();
                let mut after = i + 1;
                while chars.get(after) == Some(&WORD_JOINER) {
                    after += 1;
                }
                if before.is_some_and(|b| b.is_ascii_digit())
                    && chars.get(after).is_some_and(char::is_ascii_digit)
                {
                    let keep = out.trim_end_matches(WORD_JOINER).len();
                    out.truncate(keep);
                    out.push(WORD_JOINER);
                    out.push(EN_DASH);
                    out.push(WORD_JOINER);
                    i = after;
                    continue;
                }
            }
            out.push(c);
            i += 1;
        }
        out
    })
}
