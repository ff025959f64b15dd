use std::sync::LazyLock;

use regex::Regex;

use super::tags::replace_outside_tags;

// The leading apostrophe may have been curled the wrong way (‘tis) or still
// be straight when the curling pass was skipped.
static RE_ELIDED_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        "(?i)(^|[\\s>(\\[\u{2014}\u{201C}\"\u{2060}])['\u{2018}](tis|twas|twere|twould|twill|twon|em|cause|cos|til|neath|gainst|bout|nuff|scuse|spose)\\b",
    )
    .expect("valid elided start regex")
});
static RE_OCLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("\\b([oO])['\u{2018}]clock\\b").expect("valid o'clock regex"));

/// Repair apostrophes in archaic and colloquial contractions (`’tis`,
/// `’twas`, `’em`, `o’clock`) to U+2019.
pub fn repair_contractions(html: &str) -> String {
    let html = replace_outside_tags(&RE_ELIDED_START, html, |caps| {
        format!("{}\u{2019}{}", &caps[1], &caps[2])
    });
    replace_outside_tags(&RE_OCLOCK, &html, |caps| format!("{}\u{2019}clock", &caps[1]))
}
