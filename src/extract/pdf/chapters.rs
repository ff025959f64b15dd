//! Chapter boundaries for a PDF.
//!
//! First match wins: a usable outline, then headings found at the top of
//! pages, then fixed-size page ranges.

use std::sync::LazyLock;

use regex::Regex;

use super::document::OutlineEntry;
use super::layout::Line;

/// Only this many lines from the top of a page are considered for headings.
const HEADING_SCAN_LINES: usize = 3;

/// A heading found by size or weight alone may have at most this many words.
const SHORT_HEADING_MAX_WORDS: usize = 10;

/// Size ratio against the body font for a size-only heading.
const LARGE_HEADING_RATIO: f32 = 1.5;

static RE_CHAPTER_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(chapter|part|book)\s+(\d+|[ivxlcdm]+|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|thirteen|fourteen|fifteen|sixteen|seventeen|eighteen|nineteen|twenty|first|second|third|fourth|fifth|sixth|seventh|eighth|ninth|tenth)\b",
    )
    .expect("valid regex")
});

/// A range of 1-based pages forming one chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChapterCandidate {
    pub start_page: usize,
    pub end_page: usize,
    pub title: Option<String>,
}

impl ChapterCandidate {
    pub fn pages(&self) -> std::ops::RangeInclusive<usize> {
        self.start_page..=self.end_page
    }

    /// Title used when neither the boundary nor the text provide one.
    pub fn range_title(&self) -> String {
        format!("Pages {}–{}", self.start_page, self.end_page)
    }
}

/// Heading text at the top of a page, if the page opens a chapter.
pub(crate) fn page_heading(lines: &[Line], body_size: f32) -> Option<String> {
    for line in lines.iter().take(HEADING_SCAN_LINES) {
        let text = line.text();
        if RE_CHAPTER_HEADING.is_match(&text) {
            return Some(text);
        }
        let words = text.split_whitespace().count();
        if !(1..=SHORT_HEADING_MAX_WORDS).contains(&words) {
            continue;
        }
        if line.size >= body_size * LARGE_HEADING_RATIO || line.is_bold() {
            return Some(text);
        }
    }
    None
}

/// Chapter ranges covering `1..=page_count` exactly. `headings` lists the
/// 1-based pages whose top carries a chapter heading.
pub(crate) fn detect_chapters(
    outline: &[OutlineEntry],
    headings: &[(usize, String)],
    page_count: usize,
    pages_per_chapter: usize,
) -> Vec<ChapterCandidate> {
    if page_count == 0 {
        return Vec::new();
    }
    if let Some(chapters) = from_outline(outline, page_count) {
        log::debug!("{} chapters from the outline", chapters.len());
        return chapters;
    }
    if let Some(chapters) = from_boundaries(headings.to_vec(), page_count) {
        log::debug!("{} chapters from page headings", chapters.len());
        return chapters;
    }
    let chapters = uniform(page_count, pages_per_chapter);
    log::debug!("{} fixed-size chapters", chapters.len());
    chapters
}

fn from_outline(outline: &[OutlineEntry], page_count: usize) -> Option<Vec<ChapterCandidate>> {
    let mut boundaries = Vec::new();
    for entry in outline.iter().filter(|e| e.level == 0) {
        let page = entry.page.filter(|p| (1..=page_count).contains(p))?;
        boundaries.push((page, entry.title.clone()));
    }
    if !boundaries.windows(2).all(|w| w[0].0 < w[1].0) {
        return None;
    }
    from_boundaries(boundaries, page_count)
}

/// Ranges between at least two increasing start pages. The first range is
/// extended back to page 1.
fn from_boundaries(boundaries: Vec<(usize, String)>, page_count: usize) -> Option<Vec<ChapterCandidate>> {
    if boundaries.len() < 2 || !boundaries.windows(2).all(|w| w[0].0 < w[1].0) {
        return None;
    }
    let starts: Vec<usize> = boundaries.iter().map(|(page, _)| *page).collect();
    let chapters = boundaries
        .into_iter()
        .enumerate()
        .map(|(i, (start, title))| ChapterCandidate {
            start_page: if i == 0 { 1 } else { start },
            end_page: starts.get(i + 1).map_or(page_count, |next| next - 1),
            title: Some(title).filter(|t| !t.trim().is_empty()),
        })
        .collect();
    Some(chapters)
}

fn uniform(page_count: usize, pages_per_chapter: usize) -> Vec<ChapterCandidate> {
    let size = pages_per_chapter.max(1);
    (0..page_count.div_ceil(size))
        .map(|i| ChapterCandidate {
            start_page: i * size + 1,
            end_page: ((i + 1) * size).min(page_count),
            title: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::content::TextRun;
    use super::*;

    fn entry(title: &str, level: usize, page: Option<usize>) -> OutlineEntry {
        OutlineEntry {
            title: title.to_string(),
            level,
            page,
        }
    }

    fn line(text: &str, size: f32) -> Line {
        styled_line(text, size, false)
    }

    fn styled_line(text: &str, size: f32, bold: bool) -> Line {
        Line {
            runs: vec![TextRun {
                text: text.to_string(),
                x: 0.0,
                y: 700.0,
                width: 100.0,
                size,
                bold,
                italic: false,
            }],
            y: 700.0,
            size,
        }
    }

    #[test]
    fn uniform_split_covers_all_pages() {
        let chapters = detect_chapters(&[], &[], 30, 15);
        assert_eq!(chapters.len(), 2);
        assert_eq!((chapters[0].start_page, chapters[0].end_page), (1, 15));
        assert_eq!((chapters[1].start_page, chapters[1].end_page), (16, 30));
        assert_eq!(chapters[1].range_title(), "Pages 16–30");

        let chapters = detect_chapters(&[], &[], 31, 15);
        assert_eq!(chapters.len(), 3);
        assert_eq!((chapters[2].start_page, chapters[2].end_page), (31, 31));
    }

    #[test]
    fn outline_with_increasing_pages() {
        let outline = vec![
            entry("One", 0, Some(3)),
            entry("One.1", 1, Some(4)),
            entry("Two", 0, Some(10)),
        ];
        let chapters = detect_chapters(&outline, &[], 20, 15);
        assert_eq!(
            chapters,
            vec![
                ChapterCandidate { start_page: 1, end_page: 9, title: Some("One".into()) },
                ChapterCandidate { start_page: 10, end_page: 20, title: Some("Two".into()) },
            ]
        );
    }

    #[test]
    fn unusable_outline_falls_through() {
        let decreasing = vec![entry("B", 0, Some(10)), entry("A", 0, Some(2))];
        let single = vec![entry("Only", 0, Some(1))];
        let unresolved = vec![entry("A", 0, Some(1)), entry("B", 0, None)];
        for outline in [decreasing, single, unresolved] {
            let chapters = detect_chapters(&outline, &[], 20, 15);
            assert_eq!(chapters.len(), 2);
            assert_eq!(chapters[0].title, None);
        }
    }

    #[test]
    fn headings_define_boundaries() {
        let headings = vec![(2, "Chapter 1".to_string()), (8, "Chapter 2".to_string())];
        let chapters = detect_chapters(&[], &headings, 12, 15);
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].pages(), 1..=7);
        assert_eq!(chapters[1].pages(), 8..=12);
        assert_eq!(chapters[1].title.as_deref(), Some("Chapter 2"));
    }

    #[test]
    fn heading_patterns() {
        assert_eq!(
            page_heading(&[line("CHAPTER XII", 11.0), line("It was dark.", 11.0)], 11.0),
            Some("CHAPTER XII".to_string())
        );
        assert_eq!(page_heading(&[line("Part Two", 11.0)], 11.0), Some("Part Two".to_string()));
        assert_eq!(page_heading(&[line("The Return", 20.0)], 11.0), Some("The Return".to_string()));
        assert_eq!(page_heading(&[line("Chapters of life are long.", 11.0)], 11.0), None);
        let body = vec![line("a", 11.0), line("b", 11.0), line("c", 11.0), line("Chapter 4", 11.0)];
        assert_eq!(page_heading(&body, 11.0), None);
    }

    #[test]
    fn bold_body_size_heading() {
        let top = [styled_line("The Return", 11.0, true), line("It was dark.", 11.0)];
        assert_eq!(page_heading(&top, 11.0), Some("The Return".to_string()));

        let long = styled_line("A bold sentence that runs on for far too many words to be a title", 11.0, true);
        assert_eq!(page_heading(&[long], 11.0), None);
    }
}
