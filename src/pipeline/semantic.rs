//! Semantic inflection: wraps abbreviations, numerals and units in
//! `<abbr>`/`<span>` elements carrying an `epub:type`.
//!
//! Each rule skips text that is already inside such an element, so running
//! the stage twice never nests markup.

use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::{ProcessingContext, Processor};
use crate::typography::names::HONORIFICS;
use crate::typography::tags::{element_ranges, replace_guarded};

static RE_MARKED_UP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<abbr\b[^>]*>.*?</abbr\s*>|<span\b[^>]*epub:type[^>]*>.*?</span\s*>"#)
        .expect("valid marked-up regex")
});
static RE_NAME_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b({})\.", HONORIFICS.join("|"))).expect("valid name title regex")
});
static RE_ERA_BEFORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("\\b(AD|A\\.D\\.)[ \u{00A0}]+(\\d)").expect("valid era regex")
});
static RE_ERA_AFTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("(\\d)[ \u{00A0}]+(?:(BC|AD)\\b|(B\\.C\\.|A\\.D\\.))").expect("valid era regex")
});
static RE_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("(\\d)[ \u{00A0}]?([apAP])\\.[ \u{00A0}]?[mM]\\.").expect("valid time regex")
});
static RE_COMPASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[NSEW]\.[NSEW]\.(?:[NSEW]\.)?").expect("valid compass regex")
});
static RE_INITIALISM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\p{Lu}\.){2,}").expect("valid initialism regex"));
static RE_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("(\\d)[ \u{00A0}]?(?:(mm|cm|km|kg|mg|ml|lbs?|oz|ft|yds?|cwt|mph)\\b|(in\\.))")
        .expect("valid unit regex")
});
static RE_ROMAN_CANDIDATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[IVXLCDM]+\b").expect("valid roman candidate regex"));
static RE_ROMAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^M{0,4}(?:CM|CD|D?C{0,3})(?:XC|XL|L?X{0,3})(?:IX|IV|V?I{0,3})$")
        .expect("valid roman regex")
});

/// Valid numerals that are far more often words, names or abbreviations.
const ROMAN_FALSE_POSITIVES: &[&str] = &[
    "I", "MI", "DI", "MIX", "DIX", "CD", "DC", "CM", "MM", "MC", "CC", "LI", "XL", "CIV", "DIV",
    "MD",
];

/// Words after which even a one-letter or ambiguous numeral is a number.
const ROMAN_TRIGGERS: &[&str] = &[
    "chapter", "book", "part", "volume", "vol", "act", "scene", "canto", "section", "appendix",
    "no", "letter", "stave",
];

pub struct SemanticStage;

impl Processor for SemanticStage {
    fn name(&self) -> &'static str {
        "semantic"
    }

    fn enabled(&self, ctx: &ProcessingContext) -> bool {
        ctx.options.semantics
    }

    fn process(&self, html: &str, _ctx: &ProcessingContext) -> String {
        add_semantics(html)
    }
}

/// Apply every semantic rule in turn.
pub fn add_semantics(html: &str) -> String {
    let html = wrap(&RE_NAME_TITLE, html, |_, caps| {
        Some(format!(r#"<abbr epub:type="z3998:name-title">{}.</abbr>"#, &caps[1]))
    });
    let html = wrap(&RE_ERA_BEFORE, &html, |_, caps| {
        Some(format!(
            "<abbr epub:type=\"se:era\">AD</abbr>\u{00A0}{}",
            &caps[2]
        ))
    });
    let html = wrap(&RE_ERA_AFTER, &html, |_, caps| {
        let era = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str().replace('.', ""))?;
        Some(format!("{}\u{00A0}<abbr epub:type=\"se:era\">{}</abbr>", &caps[1], era))
    });
    let html = wrap(&RE_TIME, &html, |_, caps| {
        Some(format!(
            "{}\u{00A0}<abbr epub:type=\"se:time\">{}.m.</abbr>",
            &caps[1],
            caps[2].to_lowercase()
        ))
    });
    let html = wrap(&RE_COMPASS, &html, |source, caps| {
        // "W.E. Johnson" is a pair of initials
        let m = caps.get(0)?;
        (!followed_by_capital(source, m.end()))
            .then(|| format!(r#"<abbr epub:type="se:compass">{}</abbr>"#, m.as_str()))
    });
    let html = wrap(&RE_INITIALISM, &html, |_, caps| {
        Some(format!(r#"<abbr epub:type="z3998:initialism">{}</abbr>"#, &caps[0]))
    });
    let html = wrap(&RE_UNIT, &html, |_, caps| {
        let unit = caps.get(2).or_else(|| caps.get(3))?.as_str();
        Some(format!("{}\u{00A0}<abbr epub:type=\"se:unit\">{}</abbr>", &caps[1], unit))
    });
    wrap(&RE_ROMAN_CANDIDATE, &html, |source, caps| {
        let m = caps.get(0)?;
        is_roman_numeral(m.as_str(), &source[..m.start()])
            .then(|| format!(r#"<span epub:type="z3998:roman">{}</span>"#, m.as_str()))
    })
}

/// Replace matches of `re` outside tags and outside existing semantic
/// markup. `f` receives the whole source text and the match, and returns
/// `None` to keep the match as it is.
fn wrap<F>(re: &Regex, html: &str, mut f: F) -> String
where
    F: FnMut(&str, &Captures) -> Option<String>,
{
    let protected: Vec<Range<usize>> = element_ranges(&RE_MARKED_UP, html);
    replace_guarded(re, html, &protected, |caps| {
        f(html, caps).unwrap_or_else(|| caps[0].to_string())
    })
}

fn followed_by_capital(source: &str, pos: usize) -> bool {
    source[pos..]
        .trim_start_matches([' ', '\u{00A0}'])
        .chars()
        .next()
        .is_some_and(char::is_uppercase)
}

/// Whether `candidate` should be marked up as a roman numeral given the text
/// `before` it.
pub(crate) fn is_roman_numeral(candidate: &str, before: &str) -> bool {
    if !RE_ROMAN.is_match(candidate) {
        return false;
    }
    let previous_word = before
        .trim_end_matches(|c: char| c.is_whitespace() || c == '.')
        .rsplit(|c: char| !c.is_alphanumeric())
        .next()
        .unwrap_or("")
        .to_lowercase();
    if ROMAN_TRIGGERS.contains(&previous_word.as_str()) {
        return true;
    }
    candidate.chars().count() > 1 && !ROMAN_FALSE_POSITIVES.contains(&candidate)
}
