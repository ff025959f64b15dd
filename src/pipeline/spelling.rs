use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::{ProcessingContext, Processor};
use crate::typography::tags::{map_text, replace_outside_tags};

const ARCHAIC: &[(&str, &str)] = &[
    ("to-day", "today"),
    ("to-morrow", "tomorrow"),
    ("to-night", "tonight"),
    ("connexion", "connection"),
    ("connexions", "connections"),
    ("reflexion", "reflection"),
    ("inflexion", "inflection"),
    ("shew", "show"),
    ("shews", "shows"),
    ("shewn", "shown"),
    ("shewed", "showed"),
    ("shewing", "showing"),
    ("chuse", "choose"),
    ("surprize", "surprise"),
    ("surprized", "surprised"),
    ("compleat", "complete"),
    ("musick", "music"),
    ("publick", "public"),
    ("ancle", "ankle"),
    ("segar", "cigar"),
    ("intreat", "entreat"),
    ("intreated", "entreated"),
    ("inclose", "enclose"),
    ("inclosed", "enclosed"),
    ("teaze", "tease"),
    ("visiter", "visitor"),
    ("visiters", "visitors"),
    ("sopha", "sofa"),
    ("phantasy", "fantasy"),
    ("despatch", "dispatch"),
    ("despatched", "dispatched"),
];

static MODERN: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| ARCHAIC.iter().copied().collect());

static RE_ARCHAIC: LazyLock<Regex> = LazyLock::new(|| {
    let words: Vec<String> = ARCHAIC.iter().map(|(old, _)| regex::escape(old)).collect();
    Regex::new(&format!(r"(?i)\b(?:{})\b", words.join("|"))).expect("valid archaic spelling regex")
});

/// Modernise archaic spellings and decompose ligature glyphs.
pub struct SpellingStage;

impl Processor for SpellingStage {
    fn name(&self) -> &'static str {
        "spelling"
    }

    fn enabled(&self, ctx: &ProcessingContext) -> bool {
        ctx.options.spelling
    }

    fn process(&self, html: &str, ctx: &ProcessingContext) -> String {
        let html = decompose_ligatures(html);
        if ctx.is_english() {
            modernize(&html)
        } else {
            html
        }
    }
}

pub(crate) fn decompose_ligatures(html: &str) -> String {
    if !html.contains(['\u{FB00}', '\u{FB01}', '\u{FB02}', '\u{FB03}', '\u{FB04}']) {
        return html.to_string();
    }
    map_text(html, |text| {
        text.replace('\u{FB00}', "ff")
            .replace('\u{FB01}', "fi")
            .replace('\u{FB02}', "fl")
            .replace('\u{FB03}', "ffi")
            .replace('\u{FB04}', "ffl")
    })
}

pub(crate) fn modernize(html: &str) -> String {
    replace_outside_tags(&RE_ARCHAIC, html, |caps: &Captures| {
        let old = &caps[0];
        match MODERN.get(old.to_lowercase().as_str()) {
            Some(modern) => match_case(old, modern),
            None => old.to_string(),
        }
    })
}

fn match_case(original: &str, replacement: &str) -> String {
    let letters: Vec<char> = original.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() > 1 && letters.iter().all(|c| c.is_uppercase()) {
        replacement.to_uppercase()
    } else if letters.first().is_some_and(|c| c.is_uppercase()) {
        let mut chars = replacement.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    } else {
        replacement.to_string()
    }
}
