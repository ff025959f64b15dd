//! Rule-based quality linter over processed chapter HTML.
//!
//! Rules are stateless descriptors in a static registry; each one scans a
//! chapter and yields issues lazily. The linter only reports, it never
//! rewrites content and never fails.

mod rules;

use std::fmt;

use serde::Serialize;

use crate::model::ContentUnit;

pub use rules::RULES;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintIssue {
    pub code: &'static str,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter_number: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl fmt::Display for LintIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.code, self.severity)?;
        if let Some(chapter) = self.chapter_number {
            write!(f, " chapter {}", chapter)?;
        }
        if let Some(line) = self.line_number {
            write!(f, " line {}", line)?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(context) = &self.context {
            write!(f, " ({})", context)?;
        }
        Ok(())
    }
}

pub type CheckFn = for<'a> fn(&'a str, Option<usize>) -> Box<dyn Iterator<Item = LintIssue> + 'a>;

/// A registered lint rule.
pub struct LintRule {
    pub code: &'static str,
    pub description: &'static str,
    pub severity: Severity,
    pub check: CheckFn,
}

impl LintRule {
    pub fn run<'a>(&self, html: &'a str, chapter: Option<usize>) -> Box<dyn Iterator<Item = LintIssue> + 'a> {
        (self.check)(html, chapter)
    }
}

impl fmt::Debug for LintRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LintRule")
            .field("code", &self.code)
            .field("severity", &self.severity)
            .finish()
    }
}

/// Runs a set of rules over chapters.
#[derive(Debug, Clone, Copy)]
pub struct Linter {
    rules: &'static [LintRule],
}

impl Default for Linter {
    fn default() -> Self {
        Self { rules: RULES }
    }
}

impl Linter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rules(&self) -> &'static [LintRule] {
        self.rules
    }

    /// Every issue found in one chapter.
    pub fn check(&self, html: &str, chapter_number: Option<usize>) -> Vec<LintIssue> {
        self.rules
            .iter()
            .flat_map(|rule| rule.run(html, chapter_number))
            .collect()
    }

    /// Lint every unit; chapter numbers are 1-based reading order.
    pub fn check_book(&self, units: &[ContentUnit]) -> Vec<LintIssue> {
        let issues: Vec<LintIssue> = units
            .iter()
            .flat_map(|unit| self.check(&unit.html, Some(unit.order_index + 1)))
            .collect();
        log::info!("lint: {} issues across {} chapters", issues.len(), units.len());
        issues
    }
}

/// Byte offsets of line starts, for turning a match offset into a line.
pub(crate) struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub(crate) fn new(text: &str) -> Self {
        let starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { starts }
    }

    /// 1-based line of the byte at `offset`.
    pub(crate) fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&s| s <= offset)
    }
}

const CONTEXT_CHARS: usize = 40;

/// About 40 characters of `html` centred on the match, on one line.
pub(crate) fn context_around(html: &str, start: usize, end: usize) -> String {
    let half = CONTEXT_CHARS / 2;
    let before: String = {
        let chars: Vec<char> = html[..start].chars().rev().take(half).collect();
        chars.into_iter().rev().collect()
    };
    let matched: String = html[start..end].chars().take(CONTEXT_CHARS).collect();
    let after: String = html[end..].chars().take(half).collect();
    format!("{before}{matched}{after}")
        .replace(['\n', '\r'], " ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(issues: &[LintIssue]) -> Vec<&'static str> {
        issues.iter().map(|i| i.code).collect()
    }

    #[test]
    fn registry_codes_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for rule in RULES {
            assert!(seen.insert(rule.code), "duplicate rule {}", rule.code);
        }
        assert_eq!(RULES.len(), 16);
    }

    #[test]
    fn clean_text_has_no_issues() {
        let html = "<h1>One</h1>\n<p>It was a bright cold day in April.</p>";
        assert!(Linter::new().check(html, Some(1)).is_empty());
    }

    #[test]
    fn repeated_word_once() {
        let issues = Linter::new().check("<p>the the cat</p>", Some(1));
        assert_eq!(codes(&issues), vec!["C003"]);
        assert_eq!(issues[0].chapter_number, Some(1));
        assert_eq!(issues[0].line_number, Some(1));
    }

    #[test]
    fn allowed_repetition() {
        assert!(Linter::new().check("<p>He had had enough.</p>", None).is_empty());
    }

    #[test]
    fn heading_skip_once() {
        let issues = Linter::new().check("<h1>Title</h1><h3>Section</h3>", None);
        assert_eq!(codes(&issues), vec!["H002"]);
    }

    #[test]
    fn book_numbers_chapters_from_one() {
        let units = vec![
            ContentUnit::chapter(0, "A", "<p>fine</p>", "fine"),
            ContentUnit::chapter(1, "B", "<p>bad \u{FFFD}</p>", "bad"),
        ];
        let issues = Linter::new().check_book(&units);
        assert_eq!(codes(&issues), vec!["E002"]);
        assert_eq!(issues[0].chapter_number, Some(2));
        assert_eq!(issues[0].severity, Severity::Error);
    }

    #[test]
    fn line_index() {
        let index = LineIndex::new("a\nbb\nccc");
        assert_eq!(index.line_of(0), 1);
        assert_eq!(index.line_of(2), 2);
        assert_eq!(index.line_of(7), 3);
    }

    #[test]
    fn context_is_bounded() {
        let text = "x".repeat(100) + "BAD" + &"y".repeat(100);
        let ctx = context_around(&text, 100, 103);
        assert_eq!(ctx.chars().count(), 43);
        assert!(ctx.contains("BAD"));
    }
}
