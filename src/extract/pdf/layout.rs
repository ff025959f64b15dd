//! Turn positioned text runs into HTML.
//!
//! Runs sharing a baseline form a line; lines form paragraphs until the
//! vertical gap grows past the page's usual line spacing. Font size relative
//! to the document's body size decides headings, and the bold and italic
//! flags of the runs become `<strong>` and `<em>`.

use crate::html::escape_text;

use super::content::TextRun;

/// Size ratios against the body font size.
const H2_RATIO: f32 = 1.5;
const H3_RATIO: f32 = 1.2;

/// A bold line with at most this many words may be a heading.
const BOLD_HEADING_MAX_WORDS: usize = 12;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Line {
    pub runs: Vec<TextRun>,
    pub y: f32,
    pub size: f32,
}

impl Line {
    fn new(run: TextRun) -> Self {
        Line {
            y: run.y,
            size: run.size,
            runs: vec![run],
        }
    }

    /// Text of the line with spaces restored between separated runs.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for (i, run) in self.runs.iter().enumerate() {
            if i > 0 && needs_space(&self.runs[i - 1], run) {
                text.push(' ');
            }
            text.push_str(&run.text);
        }
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    pub fn is_bold(&self) -> bool {
        self.runs
            .iter()
            .filter(|r| !r.text.trim().is_empty())
            .all(|r| r.bold)
    }

    fn word_count(&self) -> usize {
        self.runs.iter().map(|r| r.text.split_whitespace().count()).sum()
    }
}

fn needs_space(prev: &TextRun, next: &TextRun) -> bool {
    if prev.text.ends_with(char::is_whitespace) || next.text.starts_with(char::is_whitespace) {
        return false;
    }
    let gap = next.x - (prev.x + prev.width);
    gap > prev.size.max(next.size) * 0.15
}

/// Group runs into lines, top of the page first.
pub(crate) fn build_lines(mut runs: Vec<TextRun>) -> Vec<Line> {
    runs.retain(|r| !r.text.trim().is_empty() || r.text.contains(' '));
    runs.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let mut lines: Vec<Line> = Vec::new();
    for run in runs {
        match lines.last_mut() {
            Some(line) if (line.y - run.y).abs() <= line.size.max(run.size) * 0.5 => {
                line.size = line.size.max(run.size);
                line.runs.push(run);
            }
            _ => lines.push(Line::new(run)),
        }
    }
    for line in &mut lines {
        line.runs.sort_by(|a, b| a.x.total_cmp(&b.x));
    }
    lines.retain(|line| !line.text().is_empty());
    lines
}

/// Character-weighted median font size of the runs, 12pt when there are
/// none.
pub(crate) fn body_font_size<'a>(runs: impl IntoIterator<Item = &'a TextRun>) -> f32 {
    let mut sizes: Vec<(f32, usize)> = runs
        .into_iter()
        .map(|r| (r.size, r.text.chars().filter(|c| !c.is_whitespace()).count()))
        .filter(|(size, chars)| *chars > 0 && *size > 0.0)
        .collect();
    if sizes.is_empty() {
        return 12.0;
    }
    sizes.sort_by(|a, b| a.0.total_cmp(&b.0));
    let total: usize = sizes.iter().map(|(_, c)| c).sum();
    let mut seen = 0;
    for (size, chars) in &sizes {
        seen += chars;
        if seen * 2 >= total {
            return *size;
        }
    }
    sizes[sizes.len() - 1].0
}

/// Heading level of a line, if it reads as one.
pub(crate) fn heading_level(line: &Line, body_size: f32) -> Option<u8> {
    if line.size >= body_size * H2_RATIO {
        Some(2)
    } else if line.size >= body_size * H3_RATIO {
        Some(3)
    } else if line.is_bold() && line.word_count() <= BOLD_HEADING_MAX_WORDS {
        Some(3)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Segment {
    text: String,
    bold: bool,
    italic: bool,
}

#[derive(Debug)]
enum Block {
    Heading { level: u8, text: String },
    Paragraph(Vec<Segment>),
}

impl Block {
    fn to_html(&self) -> String {
        match self {
            Block::Heading { level, text } => {
                format!("<h{level}>{}</h{level}>", escape_text(text))
            }
            Block::Paragraph(segments) => {
                let mut html = String::from("<p>");
                for segment in merge_segments(segments) {
                    let text = escape_text(&segment.text);
                    match (segment.bold, segment.italic) {
                        (true, true) => html.push_str(&format!("<strong><em>{text}</em></strong>")),
                        (true, false) => html.push_str(&format!("<strong>{text}</strong>")),
                        (false, true) => html.push_str(&format!("<em>{text}</em>")),
                        (false, false) => html.push_str(&text),
                    }
                }
                html.push_str("</p>");
                html
            }
        }
    }
}

/// Join adjacent segments of the same style and keep boundary spaces
/// outside the inline elements.
fn merge_segments(segments: &[Segment]) -> Vec<Segment> {
    let mut merged: Vec<Segment> = Vec::new();
    for segment in segments {
        match merged.last_mut() {
            Some(last) if last.bold == segment.bold && last.italic == segment.italic => {
                last.text.push_str(&segment.text);
            }
            _ => merged.push(segment.clone()),
        }
    }
    let mut out: Vec<Segment> = Vec::new();
    for segment in merged {
        let styled = segment.bold || segment.italic;
        if !styled {
            out.push(segment);
            continue;
        }
        let trimmed = segment.text.trim();
        if trimmed.is_empty() {
            out.push(Segment { bold: false, italic: false, ..segment });
            continue;
        }
        if segment.text.starts_with(char::is_whitespace) {
            out.push(plain(" "));
        }
        out.push(Segment {
            text: trimmed.to_string(),
            ..segment.clone()
        });
        if segment.text.ends_with(char::is_whitespace) {
            out.push(plain(" "));
        }
    }
    let mut html_segments = out;
    if let Some(first) = html_segments.first_mut() {
        first.text = first.text.trim_start().to_string();
    }
    if let Some(last) = html_segments.last_mut() {
        last.text = last.text.trim_end().to_string();
    }
    html_segments.retain(|s| !s.text.is_empty());
    html_segments
}

fn plain(text: &str) -> Segment {
    Segment {
        text: text.to_string(),
        bold: false,
        italic: false,
    }
}

fn line_segments(line: &Line) -> Vec<Segment> {
    let mut segments = Vec::new();
    for (i, run) in line.runs.iter().enumerate() {
        if i > 0 && needs_space(&line.runs[i - 1], run) {
            segments.push(plain(" "));
        }
        let text = run.text.split_whitespace().collect::<Vec<_>>().join(" ");
        let lead = run.text.starts_with(char::is_whitespace) && i > 0;
        let trail = run.text.ends_with(char::is_whitespace);
        let mut piece = String::new();
        if lead {
            piece.push(' ');
        }
        piece.push_str(&text);
        if trail && !text.is_empty() {
            piece.push(' ');
        }
        segments.push(Segment {
            text: piece,
            bold: run.bold,
            italic: run.italic,
        });
    }
    segments
}

/// Append a line to a paragraph, rejoining a word hyphenated across the
/// line break.
fn append_line(paragraph: &mut Vec<Segment>, line: &Line) {
    let mut next = line_segments(line);
    if let Some(last) = paragraph.last_mut() {
        let trimmed_len = last.text.trim_end().len();
        last.text.truncate(trimmed_len);
        let next_starts_lower = next
            .first()
            .and_then(|s| s.text.trim_start().chars().next())
            .is_some_and(char::is_lowercase);
        let mut tail = last.text.chars().rev();
        let hyphenated = tail.next() == Some('-') && tail.next().is_some_and(char::is_alphabetic);
        if hyphenated && next_starts_lower {
            last.text.pop();
            if let Some(first) = next.first_mut() {
                first.text = first.text.trim_start().to_string();
            }
        } else {
            last.text.push(' ');
        }
    }
    paragraph.append(&mut next);
}

fn typical_spacing(lines: &[Line], body_size: f32) -> f32 {
    let mut gaps: Vec<f32> = lines
        .windows(2)
        .map(|w| w[0].y - w[1].y)
        .filter(|gap| *gap > 0.0 && *gap < body_size * 3.0)
        .collect();
    if gaps.is_empty() {
        return body_size * 1.2;
    }
    gaps.sort_by(|a, b| a.total_cmp(b));
    gaps[gaps.len() / 2]
}

/// An element placed on the page: a block of text or a rendered image.
pub(crate) struct Placed {
    pub top: f32,
    pub html: String,
}

/// HTML for one page. `images` carry their own markup and are merged with
/// the text by vertical position, top of the page first.
pub(crate) fn render_page(lines: &[Line], images: Vec<Placed>, body_size: f32) -> String {
    let spacing = typical_spacing(lines, body_size);
    let mut placed: Vec<Placed> = Vec::new();
    let mut current: Option<(f32, Block)> = None;
    let mut prev: Option<&Line> = None;

    for line in lines {
        let level = heading_level(line, body_size);
        let gap = prev.map_or(0.0, |p| p.y - line.y);
        let breaks = gap > spacing * 1.5 || gap < 0.0;

        current = match (current.take(), level) {
            (Some((top, Block::Heading { level: l, mut text })), Some(level)) if l == level && !breaks => {
                text.push(' ');
                text.push_str(&line.text());
                Some((top, Block::Heading { level: l, text }))
            }
            (Some((top, Block::Paragraph(mut segments))), None) if !breaks => {
                append_line(&mut segments, line);
                Some((top, Block::Paragraph(segments)))
            }
            (finished, level) => {
                if let Some((top, block)) = finished {
                    placed.push(Placed { top, html: block.to_html() });
                }
                let top = line.y + line.size;
                Some(match level {
                    Some(level) => (top, Block::Heading { level, text: line.text() }),
                    None => {
                        let mut segments = Vec::new();
                        append_line(&mut segments, line);
                        (top, Block::Paragraph(segments))
                    }
                })
            }
        };
        prev = Some(line);
    }
    if let Some((top, block)) = current {
        placed.push(Placed { top, html: block.to_html() });
    }

    placed.extend(images);
    placed.sort_by(|a, b| b.top.total_cmp(&a.top));
    placed
        .into_iter()
        .map(|p| p.html)
        .collect::<Vec<_>>()
        .join("\n")
}
