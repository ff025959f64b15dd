//! Markdown export of processed chapter HTML.

use crate::html::{rewrite_image_sources, INVISIBLE_FORMATTING};
use crate::image::ImageMap;

/// Convert chapter HTML to Markdown, pointing images at their stored paths.
///
/// Soft hyphens, word joiners and hair spaces inserted by the pipeline are
/// removed; they only make sense to an HTML renderer.
pub fn html_to_markdown(html: &str, image_map: &ImageMap) -> String {
    let html = rewrite_image_sources(html, |src| image_map.get(src).cloned());
    let md = html2md::parse_html(&html);
    let md: String = md.chars().filter(|c| !INVISIBLE_FORMATTING.contains(c)).collect();
    clean_markdown(&md)
}

fn clean_markdown(md: &str) -> String {
    let mut result = md.to_string();

    // Collapse 3+ consecutive blank lines to 2
    while result.contains("\n\n\n") {
        result = result.replace("\n\n\n", "\n\n");
    }

    result = result
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n");

    let trimmed = result.trim_end().to_string();
    if trimmed.is_empty() {
        String::new()
    } else {
        trimmed + "\n"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_collapses_blank_lines() {
        assert_eq!(clean_markdown("a  \n\n\n\n\nb\n\n"), "a\n\nb\n");
        assert_eq!(clean_markdown(" \n\n"), "");
    }

    #[test]
    fn images_point_at_stored_files() {
        let mut map = ImageMap::new();
        map.insert("OEBPS/img/fig.png".to_string(), "images/fig.png".to_string());
        let md = html_to_markdown(r#"<p>See</p><img src="OEBPS/img/fig.png" alt="fig"/>"#, &map);
        assert!(md.contains("images/fig.png"), "{md}");
        assert!(!md.contains("OEBPS"), "{md}");
    }

    #[test]
    fn invisible_characters_are_dropped() {
        let md = html_to_markdown("<p>extra\u{00AD}ordinary\u{2060}</p>", &ImageMap::new());
        assert_eq!(md, "extraordinary\n");
    }
}
