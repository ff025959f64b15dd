//! Small helpers over `quick_xml` events.

use quick_xml::events::BytesStart;
use quick_xml::Reader;

/// A lenient reader: XHTML in the wild has mismatched end tags.
pub(crate) fn lenient_reader(xml: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(xml);
    reader.check_end_names(false);
    reader
}

/// Value of the attribute whose local name is `name` (`epub:type` matches
/// `type`).
pub(crate) fn attr(element: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name || a.key.as_ref() == name)
        .map(|a| match a.unescape_value() {
            Ok(value) => value.into_owned(),
            Err(_) => String::from_utf8_lossy(&a.value).into_owned(),
        })
}

/// Raw text bytes as a string, with entities decoded the HTML way so that
/// `&nbsp;` and friends do not abort parsing.
pub(crate) fn text(bytes: &[u8]) -> String {
    crate::html::decode_entities(&String::from_utf8_lossy(bytes))
}

pub(crate) fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).to_ascii_lowercase()
}

/// Collapse whitespace runs and trim.
pub(crate) fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
