use std::sync::LazyLock;

use regex::Regex;

use super::tags::replace_outside_tags;

static RE_POUND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bL(\d)").expect("valid pound regex"));
static RE_OLD_MONEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d)[ \u{00A0}]+(s\.|d\.|shillings?\b|pence\b|guineas?\b)")
        .expect("valid shillings regex")
});

/// Historical sterling: `L20` becomes `£20`, and amounts in shillings,
/// pence and guineas are tied to their unit with a no-break space.
pub fn normalize_currency(html: &str) -> String {
    let html = replace_outside_tags(&RE_POUND, html, |caps| format!("£{}", &caps[1]));
    replace_outside_tags(&RE_OLD_MONEY, &html, |caps| {
        format!("{}\u{00A0}{}", &caps[1], &caps[2])
    })
}
