use std::sync::LazyLock;

use regex::Regex;

use super::tags::replace_outside_tags;

/// Abbreviated titles that precede a name.
pub const HONORIFICS: &[&str] = &[
    "Mr", "Mrs", "Ms", "Dr", "St", "Messrs", "Mme", "Mlle", "Prof", "Rev", "Capt", "Col", "Gen",
    "Lt", "Sgt", "Hon", "Sr", "Jr",
];

static RE_MAC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("(^|[\\s>(\u{201C}\u{2018}\"\u{2014}])M['\u{2018}\u{2019}](\\p{Lu}\\p{Ll})")
        .expect("valid Mc regex")
});
static RE_O_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("\\bO['\u{2018}](\\p{Lu})").expect("valid O' regex"));
static RE_HONORIFIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b({})\.[ ]+(\p{{Lu}})", HONORIFICS.join("|")))
        .expect("valid honorific regex")
});
static RE_WORD_INITIALISM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(O\.K\.|S\.O\.S\.|T\.N\.T\.|R\.S\.V\.P\.)").expect("valid initialism regex")
});

/// `M'Gregor` to `McGregor` and a straight or opening quote in `O'Brien` to
/// U+2019.
pub fn normalize_names(html: &str) -> String {
    let html = replace_outside_tags(&RE_MAC, html, |caps| format!("{}Mc{}", &caps[1], &caps[2]));
    replace_outside_tags(&RE_O_NAME, &html, |caps| format!("O\u{2019}{}", &caps[1]))
}

/// Tie an abbreviated title to the following name with U+00A0.
pub fn bind_honorifics(html: &str) -> String {
    replace_outside_tags(&RE_HONORIFIC, html, |caps| {
        format!("{}.\u{00A0}{}", &caps[1], &caps[2])
    })
}

/// Collapse dotted initialisms that are read as words (`O.K.` to `OK`).
pub fn collapse_word_initialisms(html: &str) -> String {
    replace_outside_tags(&RE_WORD_INITIALISM, html, |caps| caps[1].replace('.', ""))
}
