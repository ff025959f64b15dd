use std::ops::Range;
use std::sync::LazyLock;

use regex::{Match, Regex};

use super::{context_around, LineIndex, LintIssue, LintRule, Severity};
use crate::pipeline::is_roman_numeral;
use crate::typography::tags::{element_ranges, TagIndex};

pub static RULES: &[LintRule] = &[
    LintRule {
        code: "E001",
        description: "mojibake: UTF-8 decoded as Latin-1 or Windows-1252",
        severity: Severity::Error,
        check: mojibake,
    },
    LintRule {
        code: "E002",
        description: "U+FFFD replacement character",
        severity: Severity::Error,
        check: replacement_char,
    },
    LintRule {
        code: "U001",
        description: "control characters",
        severity: Severity::Warning,
        check: control_chars,
    },
    LintRule {
        code: "U002",
        description: "unusual invisible characters",
        severity: Severity::Info,
        check: invisible_chars,
    },
    LintRule {
        code: "T001",
        description: "straight quotes in text",
        severity: Severity::Warning,
        check: straight_quotes,
    },
    LintRule {
        code: "T002",
        description: "double hyphen or spaced hyphen used as a dash",
        severity: Severity::Warning,
        check: wrong_dash,
    },
    LintRule {
        code: "T003",
        description: "multiple consecutive spaces",
        severity: Severity::Info,
        check: multiple_spaces,
    },
    LintRule {
        code: "T004",
        description: "double space after sentence punctuation",
        severity: Severity::Info,
        check: sentence_double_space,
    },
    LintRule {
        code: "T005",
        description: "em dash without a preceding word joiner",
        severity: Severity::Warning,
        check: unjoined_em_dash,
    },
    LintRule {
        code: "T006",
        description: "straight and curly quotes mixed in one chapter",
        severity: Severity::Warning,
        check: mixed_quotes,
    },
    LintRule {
        code: "H001",
        description: "empty element",
        severity: Severity::Warning,
        check: empty_element,
    },
    LintRule {
        code: "H002",
        description: "heading level skipped",
        severity: Severity::Warning,
        check: heading_skip,
    },
    LintRule {
        code: "C001",
        description: "common OCR scanno",
        severity: Severity::Warning,
        check: scannos,
    },
    LintRule {
        code: "C002",
        description: "space before comma or period",
        severity: Severity::Info,
        check: space_before_punctuation,
    },
    LintRule {
        code: "C003",
        description: "repeated word",
        severity: Severity::Warning,
        check: repeated_word,
    },
    LintRule {
        code: "S001",
        description: "roman numeral without semantic markup",
        severity: Severity::Info,
        check: unmarked_roman,
    },
];

// Windows-1252 renderings of UTF-8 continuation bytes 0x80-0xBF
const CONTINUATION: &str = "\u{0080}-\u{00BF}\u{0152}\u{0153}\u{0160}\u{0161}\u{0178}\u{017D}\u{017E}\u{0192}\u{02C6}\u{02DC}\u{2013}\u{2014}\u{2018}-\u{201E}\u{2020}-\u{2022}\u{2026}\u{2030}\u{2039}\u{203A}\u{20AC}\u{2122}";

static RE_MOJIBAKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("[ÃÂÅÄ][{c}]|â€[{c}]", c = CONTINUATION)).expect("valid mojibake regex")
});
static RE_REPLACEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("\u{FFFD}+").expect("valid replacement regex"));
static RE_CONTROL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("[\\x00-\\x08\\x0B\\x0C\\x0E-\\x1F\\x7F\u{0080}-\u{009F}]").expect("valid control regex")
});
static RE_INVISIBLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("[\u{200B}\u{FEFF}\u{E000}-\u{F8FF}]").expect("valid invisible regex")
});
static RE_STRAIGHT_QUOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["']"#).expect("valid straight quote regex"));
static RE_CURLY_QUOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[\u{201C}\u{201D}\u{2018}]").expect("valid curly quote regex"));
static RE_WRONG_DASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("--|[ \u{00A0}]-[ \u{00A0}]").expect("valid dash regex"));
static RE_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(" {2,}").expect("valid spaces regex"));
static RE_SENTENCE_SPACES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("[.!?][\u{201D}\u{2019}\"']? {2,}").expect("valid sentence spaces regex")
});
static RE_UNJOINED_DASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^\\s\u{2060}>]\u{2014}").expect("valid unjoined dash regex"));
static RE_EMPTY_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(p|h[1-6]|li|blockquote|em|strong|i|b|span|div)\b[^>]*>(?:\s|&nbsp;|&#160;)*</([a-z0-9]+)\s*>")
        .expect("valid empty element regex")
});
static RE_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<h([1-6])\b").expect("valid heading regex"));
static RE_SCANNO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i:\b(?:tbe|tbat|tlie|tliat|tliis|wliich|wlien|wlio|liis|liim|liave|aud|iu)\b)|\bl\b")
        .expect("valid scanno regex")
});
static RE_SPACE_BEFORE_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(" +[,.]").expect("valid space before punctuation regex"));
static RE_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("[\\p{L}\\p{N}\u{00AD}\u{2019}']+").expect("valid word regex")
});
static RE_ROMAN_CANDIDATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[IVXLCDM]{2,}\b").expect("valid roman candidate regex"));
static RE_ROMAN_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<span\b[^>]*z3998:roman[^>]*>.*?</span\s*>"#).expect("valid roman span regex")
});

/// Words whose doubling is normal English.
const REPEAT_ALLOWED: &[&str] = &[
    "had", "that", "ha", "ho", "he", "hee", "tut", "bye", "no", "so", "yes", "there", "knock",
    "pooh", "dear", "now", "very", "well", "far", "hear", "come", "oh", "ah", "aye", "boo", "hush",
];

type Issues<'a> = Box<dyn Iterator<Item = LintIssue> + 'a>;

/// Per-chapter lookup tables shared by a rule's iterator.
struct Scope<'a> {
    html: &'a str,
    chapter: Option<usize>,
    lines: LineIndex,
    tags: TagIndex,
}

impl<'a> Scope<'a> {
    fn new(html: &'a str, chapter: Option<usize>) -> Self {
        Self {
            html,
            chapter,
            lines: LineIndex::new(html),
            tags: TagIndex::new(html),
        }
    }

    fn issue(
        &self,
        code: &'static str,
        severity: Severity,
        message: String,
        range: Range<usize>,
    ) -> LintIssue {
        LintIssue {
            code,
            severity,
            message,
            chapter_number: self.chapter,
            line_number: Some(self.lines.line_of(range.start)),
            context: Some(context_around(self.html, range.start, range.end)),
        }
    }

    fn char_before(&self, pos: usize) -> Option<char> {
        self.html[..pos].chars().next_back()
    }

    fn char_after(&self, pos: usize) -> Option<char> {
        self.html[pos..].chars().next()
    }
}

/// Issues for every match of `re`, restricted to text content when
/// `text_only`. `describe` may veto a match by returning `None`.
fn scan<'a, F>(
    re: &'static Regex,
    html: &'a str,
    chapter: Option<usize>,
    (code, severity): (&'static str, Severity),
    text_only: bool,
    mut describe: F,
) -> Issues<'a>
where
    F: FnMut(&Scope<'a>, &Match<'a>) -> Option<String> + 'a,
{
    let scope = Scope::new(html, chapter);
    Box::new(re.find_iter(html).filter_map(move |m| {
        if text_only && !scope.tags.in_text(&m.range()) {
            return None;
        }
        let message = describe(&scope, &m)?;
        Some(scope.issue(code, severity, message, m.range()))
    }))
}

fn mojibake(html: &str, chapter: Option<usize>) -> Issues<'_> {
    scan(&RE_MOJIBAKE, html, chapter, ("E001", Severity::Error), false, |_, m| {
        Some(format!("mojibake sequence \"{}\"", m.as_str()))
    })
}

fn replacement_char(html: &str, chapter: Option<usize>) -> Issues<'_> {
    scan(&RE_REPLACEMENT, html, chapter, ("E002", Severity::Error), false, |_, _| {
        Some("replacement character U+FFFD".to_string())
    })
}

fn control_chars(html: &str, chapter: Option<usize>) -> Issues<'_> {
    scan(&RE_CONTROL, html, chapter, ("U001", Severity::Warning), false, |_, m| {
        let c = m.as_str().chars().next()?;
        Some(format!("control character U+{:04X}", c as u32))
    })
}

fn invisible_chars(html: &str, chapter: Option<usize>) -> Issues<'_> {
    scan(&RE_INVISIBLE, html, chapter, ("U002", Severity::Info), false, |_, m| {
        let c = m.as_str().chars().next()?;
        Some(format!("invisible character U+{:04X}", c as u32))
    })
}

fn straight_quotes(html: &str, chapter: Option<usize>) -> Issues<'_> {
    scan(&RE_STRAIGHT_QUOTE, html, chapter, ("T001", Severity::Warning), true, |_, m| {
        Some(format!("straight quote {}", m.as_str()))
    })
}

fn wrong_dash(html: &str, chapter: Option<usize>) -> Issues<'_> {
    scan(&RE_WRONG_DASH, html, chapter, ("T002", Severity::Warning), true, |_, m| {
        Some(if m.as_str() == "--" {
            "double hyphen used as a dash".to_string()
        } else {
            "spaced hyphen used as a dash".to_string()
        })
    })
}

fn is_indentation(scope: &Scope<'_>, m: &Match<'_>) -> bool {
    matches!(scope.char_before(m.start()), None | Some('\n') | Some('>'))
        || matches!(scope.char_after(m.end()), None | Some('\n') | Some('<'))
}

fn multiple_spaces(html: &str, chapter: Option<usize>) -> Issues<'_> {
    scan(&RE_SPACES, html, chapter, ("T003", Severity::Info), true, |scope, m| {
        let after_sentence = matches!(
            scope.char_before(m.start()),
            Some('.' | '!' | '?' | '"' | '\'' | '\u{201D}' | '\u{2019}')
        );
        (!after_sentence && !is_indentation(scope, m))
            .then(|| format!("{} consecutive spaces", m.as_str().len()))
    })
}

fn sentence_double_space(html: &str, chapter: Option<usize>) -> Issues<'_> {
    scan(&RE_SENTENCE_SPACES, html, chapter, ("T004", Severity::Info), true, |scope, m| {
        (!matches!(scope.char_after(m.end()), None | Some('\n') | Some('<')))
            .then(|| "double space after sentence".to_string())
    })
}

fn unjoined_em_dash(html: &str, chapter: Option<usize>) -> Issues<'_> {
    scan(&RE_UNJOINED_DASH, html, chapter, ("T005", Severity::Warning), true, |_, _| {
        Some("em dash without a preceding word joiner".to_string())
    })
}

fn mixed_quotes(html: &str, chapter: Option<usize>) -> Issues<'_> {
    let scope = Scope::new(html, chapter);
    let first_straight = RE_STRAIGHT_QUOTE
        .find_iter(html)
        .find(|m| scope.tags.in_text(&m.range()));
    let has_curly = RE_CURLY_QUOTE.is_match(html);
    let issue = match first_straight {
        Some(m) if has_curly => Some(scope.issue(
            "T006",
            Severity::Warning,
            "straight and curly quotes are mixed".to_string(),
            m.range(),
        )),
        _ => None,
    };
    Box::new(issue.into_iter())
}

fn empty_element(html: &str, chapter: Option<usize>) -> Issues<'_> {
    let scope = Scope::new(html, chapter);
    Box::new(RE_EMPTY_ELEMENT.captures_iter(html).filter_map(move |caps| {
        let m = caps.get(0)?;
        let open = caps.get(1)?.as_str();
        let close = caps.get(2)?.as_str();
        open.eq_ignore_ascii_case(close).then(|| {
            scope.issue(
                "H001",
                Severity::Warning,
                format!("empty <{}> element", open.to_ascii_lowercase()),
                m.range(),
            )
        })
    }))
}

fn heading_skip(html: &str, chapter: Option<usize>) -> Issues<'_> {
    let scope = Scope::new(html, chapter);
    let mut previous: Option<u32> = None;
    Box::new(RE_HEADING.captures_iter(html).filter_map(move |caps| {
        let m = caps.get(0)?;
        let level = caps.get(1)?.as_str().parse::<u32>().ok()?;
        let skipped = previous.filter(|&prev| level > prev + 1);
        previous = Some(level);
        skipped.map(|prev| {
            scope.issue(
                "H002",
                Severity::Warning,
                format!("heading jumps from h{} to h{}", prev, level),
                m.range(),
            )
        })
    }))
}

fn scannos(html: &str, chapter: Option<usize>) -> Issues<'_> {
    scan(&RE_SCANNO, html, chapter, ("C001", Severity::Warning), true, |scope, m| {
        if m.as_str() == "l" {
            // l' as in French, l. for line
            let before = scope.char_before(m.start());
            let after = scope.char_after(m.end());
            if matches!(before, Some('\'' | '\u{2019}' | '-'))
                || matches!(after, Some('\'' | '\u{2019}' | '.' | '-'))
            {
                return None;
            }
        }
        Some(format!("possible scanno \"{}\"", m.as_str()))
    })
}

fn space_before_punctuation(html: &str, chapter: Option<usize>) -> Issues<'_> {
    scan(&RE_SPACE_BEFORE_PUNCT, html, chapter, ("C002", Severity::Info), true, |scope, m| {
        let after = scope.char_after(m.end());
        let before = scope.char_before(m.start());
        let spaced_ellipsis = scope.html[m.end()..].trim_start_matches(' ').starts_with('.');
        // decimals (.5), spaced ellipses and line-initial punctuation are fine
        if after.is_some_and(|c| c.is_ascii_digit())
            || spaced_ellipsis
            || matches!(before, None | Some('\n' | '>' | '.'))
        {
            return None;
        }
        Some("space before punctuation".to_string())
    })
}

fn repeated_word(html: &str, chapter: Option<usize>) -> Issues<'_> {
    let scope = Scope::new(html, chapter);
    let mut previous: Option<(String, usize)> = None;
    Box::new(RE_WORD.find_iter(html).filter_map(move |m| {
        if !scope.tags.in_text(&m.range()) {
            previous = None;
            return None;
        }
        let word: String = m.as_str().chars().filter(|&c| c != '\u{00AD}').collect::<String>().to_lowercase();
        let repeated = previous.as_ref().and_then(|(prev, prev_end)| {
            let gap = &html[*prev_end..m.start()];
            let adjacent = !gap.is_empty() && gap.chars().all(char::is_whitespace);
            (adjacent && *prev == word && !REPEAT_ALLOWED.contains(&word.as_str())).then_some(())
        });
        previous = Some((word.clone(), m.end()));
        repeated.map(|_| {
            scope.issue(
                "C003",
                Severity::Warning,
                format!("repeated word \"{}\"", word),
                m.range(),
            )
        })
    }))
}

fn unmarked_roman(html: &str, chapter: Option<usize>) -> Issues<'_> {
    let marked = element_ranges(&RE_ROMAN_SPAN, html);
    scan(&RE_ROMAN_CANDIDATE, html, chapter, ("S001", Severity::Info), true, move |scope, m| {
        if marked.iter().any(|r| r.start <= m.start() && m.end() <= r.end) {
            return None;
        }
        is_roman_numeral(m.as_str(), &scope.html[..m.start()])
            .then(|| format!("roman numeral {} is not marked up", m.as_str()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(code: &str, html: &str) -> Vec<LintIssue> {
        let rule = RULES.iter().find(|r| r.code == code).unwrap();
        rule.run(html, Some(1)).collect()
    }

    #[test]
    fn mojibake_sequences() {
        assert_eq!(run("E001", "<p>cafÃ© and donâ€™t</p>").len(), 2);
        assert!(run("E001", "<p>café and don’t</p>").is_empty());
    }

    #[test]
    fn control_and_invisible() {
        assert_eq!(run("U001", "a\u{0007}b\u{0085}").len(), 2);
        assert!(run("U001", "a\tb\r\n").is_empty());
        assert_eq!(run("U002", "a\u{200B}b\u{FEFF}").len(), 2);
    }

    #[test]
    fn straight_quotes_in_text_only() {
        assert_eq!(run("T001", r#"<p class="x">it's</p>"#).len(), 1);
    }

    #[test]
    fn dashes() {
        assert_eq!(run("T002", "<p>a--b and c - d</p>").len(), 2);
        assert!(run("T002", r#"<p class="a--b">well-known</p>"#).is_empty());
        assert_eq!(run("T005", "<p>a\u{2014}b</p>").len(), 1);
        assert!(run("T005", "<p>a\u{2060}\u{2014}b</p><p>\u{2014}c</p>").is_empty());
    }

    #[test]
    fn spacing() {
        assert_eq!(run("T003", "<p>a  b</p>").len(), 1);
        assert!(run("T003", "<p>End.  Next</p>").is_empty());
        assert_eq!(run("T004", "<p>End.  Next</p>").len(), 1);
        assert!(run("T003", "<div>\n    <p>x</p>\n</div>").is_empty());
    }

    #[test]
    fn mixed_quotes_reported_once() {
        let html = "<p>\u{201C}One\u{201D} and \"two\" and \"three\"</p>";
        assert_eq!(run("T006", html).len(), 1);
        assert!(run("T006", "<p>\"plain\"</p>").is_empty());
    }

    #[test]
    fn empty_elements() {
        assert_eq!(run("H001", "<p></p><p> &nbsp; </p><em>x</em>").len(), 2);
        assert!(run("H001", "<p><em></p>").is_empty());
    }

    #[test]
    fn scannos_found() {
        let issues = run("C001", "<p>tbe cat and tlie dog, l said</p>");
        assert_eq!(issues.len(), 3);
        assert!(run("C001", "<p>l'homme and l. 5</p>").is_empty());
    }

    #[test]
    fn space_before_punctuation() {
        assert_eq!(run("C002", "<p>word , next .</p>").len(), 2);
        assert!(run("C002", "<p>costs .5 and . . .</p>").is_empty());
    }

    #[test]
    fn repeated_words() {
        assert_eq!(run("C003", "<p>the the cat</p>").len(), 1);
        assert_eq!(run("C003", "<p>The the cat</p>").len(), 1);
        assert!(run("C003", "<p>had had that that</p>").is_empty());
        assert!(run("C003", "<p>the <em>the</em></p>").is_empty());
        assert!(run("C003", "<p>the</p><p>the</p>").is_empty());
    }

    #[test]
    fn unmarked_roman_numerals() {
        assert_eq!(run("S001", "<p>Henry IV and George III</p>").len(), 2);
        assert!(run("S001", r#"<p>Henry <span epub:type="z3998:roman">IV</span></p>"#).is_empty());
        assert!(run("S001", "<p>MI DI MIX</p>").is_empty());
    }
}
