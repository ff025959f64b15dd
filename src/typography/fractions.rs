use std::sync::LazyLock;

use regex::Regex;

use super::tags::TagIndex;

static RE_FRACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,4})/(\d{1,4})").expect("valid fraction regex"));

const FRACTION_SLASH: char = '\u{2044}';
const SUPERSCRIPTS: [char; 10] = ['⁰', '¹', '²', '³', '⁴', '⁵', '⁶', '⁷', '⁸', '⁹'];
const SUBSCRIPTS: [char; 10] = ['₀', '₁', '₂', '₃', '₄', '₅', '₆', '₇', '₈', '₉'];

fn precomposed(numerator: &str, denominator: &str) -> Option<char> {
    let glyph = match (numerator, denominator) {
        ("1", "2") => '½',
        ("1", "3") => '⅓',
        ("2", "3") => '⅔',
        ("1", "4") => '¼',
        ("3", "4") => '¾',
        ("1", "5") => '⅕',
        ("2", "5") => '⅖',
        ("3", "5") => '⅗',
        ("4", "5") => '⅘',
        ("1", "6") => '⅙',
        ("5", "6") => '⅚',
        ("1", "7") => '⅐',
        ("1", "8") => '⅛',
        ("3", "8") => '⅜',
        ("5", "8") => '⅝',
        ("7", "8") => '⅞',
        ("1", "9") => '⅑',
        ("1", "10") => '⅒',
        _ => return None,
    };
    Some(glyph)
}

fn scripted(digits: &str, table: &[char; 10]) -> String {
    digits
        .bytes()
        .map(|b| table[usize::from(b - b'0')])
        .collect()
}

/// Rewrite `n/d` as a fraction glyph. Common fractions map to precomposed
/// characters; others become superscript digits, U+2044 and subscript
/// digits. Slashes that are part of a longer run (dates such as
/// `12/25/1890`, paths) are left alone.
pub fn convert_fractions(html: &str) -> String {
    if !html.contains('/') {
        return html.to_string();
    }
    let tags = TagIndex::new(html);
    let bytes = html.as_bytes();
    let mut out = String::with_capacity(html.len());
    let mut last = 0;

    for caps in RE_FRACTION.captures_iter(html) {
        let Some(m) = caps.get(0) else { continue };
        let before = m.start().checked_sub(1).map(|i| bytes[i]);
        let after = bytes.get(m.end()).copied();
        let standalone = !before.is_some_and(|b| b.is_ascii_digit() || b == b'/')
            && !after.is_some_and(|b| b.is_ascii_digit() || b == b'/');
        if !standalone || !tags.in_text(&m.range()) {
            continue;
        }
        let (num, den) = (&caps[1], &caps[2]);
        out.push_str(&html[last..m.start()]);
        match precomposed(num, den) {
            Some(glyph) => out.push(glyph),
            None => {
                out.push_str(&scripted(num, &SUPERSCRIPTS));
                out.push(FRACTION_SLASH);
                out.push_str(&scripted(den, &SUBSCRIPTS));
            }
        }
        last = m.end();
    }
    out.push_str(&html[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_fractions_are_precomposed() {
        assert_eq!(convert_fractions("1/2"), "½");
        assert_eq!(convert_fractions("add 3/4 cup and 1/10"), "add ¾ cup and ⅒");
    }

    #[test]
    fn other_fractions_use_scripts() {
        assert_eq!(convert_fractions("17/32 inch"), "¹⁷⁄₃₂ inch");
    }

    #[test]
    fn dates_and_paths_are_left_alone() {
        assert_eq!(convert_fractions("on 12/25/1890"), "on 12/25/1890");
        assert_eq!(convert_fractions(r#"<img src="a/1/2.png"/>"#), r#"<img src="a/1/2.png"/>"#);
    }
}
