//! Straight to curly quotes.

use std::sync::LazyLock;

use regex::Regex;

use super::tags::{replace_outside_tags, text_tokens, Token};

static RE_DOUBLE_TICKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"``|''").expect("valid double tick regex"));
static RE_SINGLE_TICK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[`\u{00B4}]").expect("valid single tick regex"));

/// Fold typewriter quote substitutes into plain straight quotes so the
/// curling pass sees one alphabet: ``` `` ``` and `''` become `"`, a backtick
/// or acute accent used as a quote becomes `'`.
pub fn normalize_quote_styles(html: &str) -> String {
    let html = replace_outside_tags(&RE_DOUBLE_TICKS, html, |_| "\"".to_string());
    replace_outside_tags(&RE_SINGLE_TICK, &html, |_| "'".to_string())
}

fn opens_quote(prev: Option<char>) -> bool {
    match prev {
        None => true,
        Some(c) => {
            c.is_whitespace()
                || matches!(
                    c,
                    '(' | '[' | '{' | '\u{2014}' | '\u{2013}' | '\u{2018}' | '\u{201C}' | '\u{2060}'
                )
        }
    }
}

/// Curl every straight quote in text content.
///
/// A quote opens when the previous visible character is absent, whitespace,
/// an opening bracket, a dash or another opening quote; otherwise it closes.
/// A single quote between two letters is an apostrophe, as is one in front
/// of a digit (`'90s`). Inline markup is looked through when finding the
/// neighbours; block markup counts as a boundary.
pub fn curl_quotes(html: &str) -> String {
    if !html.contains(['"', '\'']) {
        return html.to_string();
    }
    let mut tokens = text_tokens(html);
    let mut replacements: Vec<(usize, char)> = Vec::new();

    for i in 0..tokens.len() {
        let Token::Char { pos, ch } = tokens[i] else { continue };
        if ch != '"' && ch != '\'' {
            continue;
        }
        let prev = i
            .checked_sub(1)
            .and_then(|j| match tokens[j] {
                Token::Char { ch, .. } => Some(ch),
                Token::Boundary => None,
            });
        let next = match tokens.get(i + 1) {
            Some(Token::Char { ch, .. }) => Some(*ch),
            _ => None,
        };

        let curled = if ch == '"' {
            if opens_quote(prev) && !next.is_some_and(char::is_whitespace) {
                '\u{201C}'
            } else {
                '\u{201D}'
            }
        } else if prev.is_some_and(char::is_alphanumeric) && next.is_some_and(char::is_alphabetic) {
            '\u{2019}'
        } else if opens_quote(prev) && next.is_some_and(|c| c.is_ascii_digit()) {
            '\u{2019}'
        } else if opens_quote(prev) && !next.is_some_and(char::is_whitespace) {
            '\u{2018}'
        } else {
            '\u{2019}'
        };
        // later quotes see this one already curled
        tokens[i] = Token::Char { pos, ch: curled };
        replacements.push((pos, curled));
    }

    let mut out = String::with_capacity(html.len() + replacements.len() * 2);
    let mut last = 0;
    for (pos, curled) in replacements {
        out.push_str(&html[last..pos]);
        out.push(curled);
        last = pos + 1;
    }
    out.push_str(&html[last..]);
    out
}
