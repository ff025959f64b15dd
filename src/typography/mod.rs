//! Typography primitives.
//!
//! Each function is a pure rewrite of an HTML fragment that leaves markup
//! alone. [`typogrify`] applies them in the order they depend on each other.

pub mod contractions;
pub mod currency;
pub mod dashes;
pub mod ellipses;
pub mod fractions;
pub mod names;
pub mod quotes;
pub mod tags;

use std::sync::LazyLock;

use regex::Regex;

pub use contractions::repair_contractions;
pub use currency::normalize_currency;
pub use dashes::{join_dashes, join_number_ranges, normalize_dashes};
pub use ellipses::normalize_ellipses;
pub use fractions::convert_fractions;
pub use names::{bind_honorifics, collapse_word_initialisms, normalize_names};
pub use quotes::{curl_quotes, normalize_quote_styles};

static RE_SPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" {2,}").expect("valid space run regex"));

/// Remove every U+2060. Joiners are reinserted where they belong by the
/// dash and ellipsis passes.
pub fn strip_word_joiners(html: &str) -> String {
    if html.contains('\u{2060}') {
        html.replace('\u{2060}', "")
    } else {
        html.to_string()
    }
}

pub fn collapse_spaces(html: &str) -> String {
    tags::replace_outside_tags(&RE_SPACE_RUN, html, |_| " ".to_string())
}

/// Run every typography rewrite in dependency order.
pub fn typogrify(html: &str) -> String {
    let html = strip_word_joiners(html);
    let html = normalize_quote_styles(&html);
    let html = normalize_dashes(&html);
    let html = normalize_ellipses(&html);
    let html = curl_quotes(&html);
    let html = repair_contractions(&html);
    let html = normalize_names(&html);
    let html = convert_fractions(&html);
    let html = normalize_currency(&html);
    let html = collapse_word_initialisms(&html);
    let html = collapse_spaces(&html);
    let html = bind_honorifics(&html);
    let html = join_dashes(&html);
    join_number_ranges(&html)
}
