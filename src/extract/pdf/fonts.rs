//! Font dictionaries: glyph code to Unicode mapping, glyph widths and the
//! bold/italic flags used by the layout heuristics.

use std::collections::HashMap;

use encoding_rs::WINDOWS_1252;
use lopdf::{Dictionary, Object};

use super::document::{number, stream_bytes, PdfDocument};

/// Width assumed for glyphs the font does not describe, in 1/1000 em.
const DEFAULT_WIDTH: f32 = 500.0;

/// FontDescriptor `/Flags` bits.
const FLAG_ITALIC: i64 = 1 << 6;
const FLAG_FORCE_BOLD: i64 = 1 << 18;

/// Parsed `/ToUnicode` CMap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ToUnicode {
    map: HashMap<u32, String>,
    code_bytes: usize,
}

impl ToUnicode {
    /// Parse the `bfchar` and `bfrange` sections of a CMap program. The code
    /// width comes from the first codespace range.
    pub fn parse(data: &[u8]) -> Self {
        let text = String::from_utf8_lossy(data);
        let mut cmap = ToUnicode {
            map: HashMap::new(),
            code_bytes: 0,
        };

        for section in sections(&text, "begincodespacerange", "endcodespacerange") {
            if let Some(low) = hex_tokens(section).next() {
                cmap.code_bytes = (low.len() / 2).clamp(1, 4);
                break;
            }
        }
        for section in sections(&text, "beginbfchar", "endbfchar") {
            let tokens: Vec<&str> = hex_tokens(section).collect();
            for pair in tokens.chunks_exact(2) {
                cmap.note_width(pair[0]);
                if let (Some(code), Some(value)) = (parse_code(pair[0]), utf16_hex(pair[1])) {
                    cmap.map.insert(code, value);
                }
            }
        }
        for section in sections(&text, "beginbfrange", "endbfrange") {
            cmap.parse_ranges(section);
        }
        if cmap.code_bytes == 0 {
            cmap.code_bytes = 1;
        }
        cmap
    }

    fn note_width(&mut self, code: &str) {
        if self.code_bytes == 0 {
            self.code_bytes = (code.len() / 2).clamp(1, 4);
        }
    }

    /// `<lo> <hi> <dst>` increments the last UTF-16 unit of `dst`;
    /// `<lo> <hi> [<d0> <d1> ...]` lists every destination.
    fn parse_ranges(&mut self, section: &str) {
        let mut rest = section;
        loop {
            let Some((lo, after)) = next_hex(rest) else { break };
            let Some((hi, after)) = next_hex(after) else { break };
            self.note_width(lo);
            let (Some(lo), Some(hi)) = (parse_code(lo), parse_code(hi)) else { break };
            let after = after.trim_start();
            if let Some(array) = after.strip_prefix('[') {
                let end = array.find(']').unwrap_or(array.len());
                for (offset, dst) in hex_tokens(&array[..end]).enumerate() {
                    if let Some(value) = utf16_hex(dst) {
                        self.map.insert(lo + offset as u32, value);
                    }
                }
                rest = &array[end.min(array.len())..];
                rest = rest.strip_prefix(']').unwrap_or(rest);
            } else {
                let Some((dst, after)) = next_hex(after) else { break };
                if let Some(units) = utf16_units(dst) {
                    for code in lo..=hi.min(lo.saturating_add(0xFFFF)) {
                        let mut units = units.clone();
                        if let Some(last) = units.last_mut() {
                            *last = last.wrapping_add((code - lo) as u16);
                        }
                        self.map.insert(code, String::from_utf16_lossy(&units));
                    }
                }
                rest = after;
            }
        }
    }

    pub fn lookup(&self, code: u32) -> Option<&str> {
        self.map.get(&code).map(String::as_str)
    }

    pub fn code_bytes(&self) -> usize {
        self.code_bytes.max(1)
    }
}

fn sections<'a>(text: &'a str, begin: &'a str, end: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    let mut from = 0;
    std::iter::from_fn(move || {
        let start = from + text.get(from..)?.find(begin)? + begin.len();
        let stop = start + text.get(start..)?.find(end)?;
        from = stop + end.len();
        Some(&text[start..stop])
    })
}

fn next_hex(text: &str) -> Option<(&str, &str)> {
    let start = text.find('<')?;
    let len = text[start + 1..].find('>')?;
    let hex = &text[start + 1..start + 1 + len];
    Some((hex, &text[start + 2 + len..]))
}

fn hex_tokens(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        let (hex, after) = next_hex(rest)?;
        rest = after;
        Some(hex)
    })
}

fn parse_code(hex: &str) -> Option<u32> {
    let hex: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    u32::from_str_radix(&hex, 16).ok()
}

fn utf16_units(hex: &str) -> Option<Vec<u16>> {
    let hex: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    let hex = if hex.len() == 2 { format!("00{hex}") } else { hex };
    if hex.is_empty() || hex.len() % 4 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(4)
        .map(|i| u16::from_str_radix(&hex[i..i + 4], 16).ok())
        .collect()
}

fn utf16_hex(hex: &str) -> Option<String> {
    utf16_units(hex).map(|units| String::from_utf16_lossy(&units))
}

/// Decoded text of one string operand and its advance in 1/1000 em.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Decoded {
    pub text: String,
    pub width: f32,
    /// Number of single-byte 32 codes, which receive word spacing
    pub spaces: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Font {
    to_unicode: Option<ToUnicode>,
    /// Type0 (composite) fonts use two-byte codes
    composite: bool,
    differences: HashMap<u8, String>,
    widths: HashMap<u32, f32>,
    default_width: f32,
    pub bold: bool,
    pub italic: bool,
}

impl Default for Font {
    fn default() -> Self {
        Self {
            to_unicode: None,
            composite: false,
            differences: HashMap::new(),
            widths: HashMap::new(),
            default_width: DEFAULT_WIDTH,
            bold: false,
            italic: false,
        }
    }
}

impl Font {
    pub fn load(doc: &PdfDocument, dict: &Dictionary) -> Self {
        let mut font = Font {
            composite: dict.get(b"Subtype").and_then(Object::as_name).ok() == Some(b"Type0".as_slice()),
            ..Font::default()
        };

        let base_font = dict
            .get(b"BaseFont")
            .and_then(Object::as_name)
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .unwrap_or_default();
        let (bold, italic) = style_from_name(&base_font);
        font.bold = bold;
        font.italic = italic;

        if let Some(stream) = dict.get(b"ToUnicode").ok().and_then(|o| doc.stream(o)) {
            match stream_bytes(stream) {
                Ok(data) => font.to_unicode = Some(ToUnicode::parse(&data)),
                Err(err) => log::debug!("unreadable ToUnicode for {base_font}: {err}"),
            }
        }

        if font.composite {
            let descendant = dict
                .get(b"DescendantFonts")
                .ok()
                .map(|o| doc.resolve(o))
                .and_then(|o| o.as_array().ok())
                .and_then(|a| a.first())
                .and_then(|o| doc.dict(o));
            if let Some(descendant) = descendant {
                font.default_width = descendant.get(b"DW").ok().and_then(number).unwrap_or(1000.0);
                if let Ok(w) = descendant.get(b"W") {
                    font.widths = cid_widths(doc, doc.resolve(w));
                }
                font.apply_descriptor(doc, descendant);
            }
        } else {
            if let Some(encoding) = dict.get(b"Encoding").ok().and_then(|o| doc.dict(o)) {
                if let Ok(diffs) = encoding.get(b"Differences").and_then(Object::as_array) {
                    font.differences = differences(diffs);
                }
            }
            let first = dict.get(b"FirstChar").ok().and_then(number).unwrap_or(0.0) as u32;
            if let Some(widths) = dict.get(b"Widths").ok().map(|o| doc.resolve(o)).and_then(|o| o.as_array().ok()) {
                for (i, w) in widths.iter().enumerate() {
                    if let Some(w) = number(doc.resolve(w)) {
                        font.widths.insert(first + i as u32, w);
                    }
                }
            }
            font.apply_descriptor(doc, dict);
        }
        font
    }

    fn apply_descriptor(&mut self, doc: &PdfDocument, dict: &Dictionary) {
        let Some(descriptor) = doc.dict_entry(dict, b"FontDescriptor") else { return };
        let flags = descriptor.get(b"Flags").and_then(Object::as_i64).unwrap_or(0);
        self.italic |= flags & FLAG_ITALIC != 0
            || descriptor.get(b"ItalicAngle").ok().and_then(number).is_some_and(|a| a.abs() > 1.0);
        self.bold |= flags & FLAG_FORCE_BOLD != 0
            || descriptor.get(b"FontWeight").ok().and_then(number).is_some_and(|w| w >= 600.0);
        if !self.composite {
            if let Some(missing) = descriptor.get(b"MissingWidth").ok().and_then(number) {
                if missing > 0.0 {
                    self.default_width = missing;
                }
            }
        }
    }

    fn code_bytes(&self) -> usize {
        match &self.to_unicode {
            Some(cmap) if !self.composite => cmap.code_bytes().min(2),
            _ if self.composite => 2,
            _ => 1,
        }
    }

    /// Decode a string operand.
    pub fn decode(&self, bytes: &[u8]) -> Decoded {
        if self.to_unicode.is_none() && bytes.starts_with(&[0xFE, 0xFF]) {
            let units: Vec<u16> = bytes[2..]
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            let text = String::from_utf16_lossy(&units);
            let width = text.chars().count() as f32 * self.default_width;
            let spaces = text.matches(' ').count();
            return Decoded { text, width, spaces };
        }

        let step = self.code_bytes();
        let mut decoded = Decoded {
            text: String::new(),
            width: 0.0,
            spaces: 0,
        };
        for chunk in bytes.chunks(step) {
            let code = chunk.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
            decoded.width += self.widths.get(&code).copied().unwrap_or(self.default_width);
            if step == 1 && code == 32 {
                decoded.spaces += 1;
            }
            if let Some(mapped) = self.to_unicode.as_ref().and_then(|cmap| cmap.lookup(code)) {
                decoded.text.push_str(mapped);
            } else if step == 1 {
                decoded.text.push_str(&self.simple_char(chunk[0]));
            } else if let Some(c) = char::from_u32(code).filter(|c| !c.is_control()) {
                decoded.text.push(c);
            }
        }
        decoded
    }

    fn simple_char(&self, code: u8) -> String {
        if let Some(mapped) = self.differences.get(&code) {
            return mapped.clone();
        }
        let bytes = [code];
        let (text, _) = WINDOWS_1252.decode_without_bom_handling(&bytes);
        text.chars().filter(|c| !c.is_control() || *c == '\t').collect()
    }
}

/// Fonts of a resource dictionary keyed by resource name.
pub(crate) fn load_fonts(doc: &PdfDocument, resources: Option<&Dictionary>) -> HashMap<Vec<u8>, Font> {
    let mut fonts = HashMap::new();
    let Some(font_dict) = resources.and_then(|r| doc.dict_entry(r, b"Font")) else {
        return fonts;
    };
    for (name, object) in font_dict.iter() {
        if let Some(dict) = doc.dict(object) {
            fonts.insert(name.clone(), Font::load(doc, dict));
        }
    }
    fonts
}

/// Bold and italic flags from a base font name such as `ABCDEF+Garamond-BoldItalic`.
pub(crate) fn style_from_name(base_font: &str) -> (bool, bool) {
    let name = base_font
        .split_once('+')
        .map_or(base_font, |(_, rest)| rest)
        .to_ascii_lowercase();
    let bold = ["bold", "black", "heavy", "semibold", "demi"]
        .iter()
        .any(|w| name.contains(w));
    let italic = name.contains("italic") || name.contains("oblique");
    (bold, italic)
}

/// `/Differences [code /name /name code /name ...]`
fn differences(items: &[Object]) -> HashMap<u8, String> {
    let mut map = HashMap::new();
    let mut code: Option<u32> = None;
    for item in items {
        match item {
            Object::Integer(i) => code = u32::try_from(*i).ok(),
            Object::Name(name) => {
                if let Some(c) = code {
                    if let (Ok(byte), Some(text)) = (u8::try_from(c), glyph_text(&String::from_utf8_lossy(name))) {
                        map.insert(byte, text);
                    }
                    code = Some(c + 1);
                }
            }
            _ => {}
        }
    }
    map
}

/// Composite font `/W`: `c [w1 w2 ...]` or `c_first c_last w`.
fn cid_widths(doc: &PdfDocument, w: &Object) -> HashMap<u32, f32> {
    let mut widths = HashMap::new();
    let Ok(items) = w.as_array() else { return widths };
    let mut i = 0;
    while i < items.len() {
        let Some(first) = number(doc.resolve(&items[i])).map(|n| n as u32) else { break };
        match items.get(i + 1).map(|o| doc.resolve(o)) {
            Some(Object::Array(list)) => {
                for (offset, w) in list.iter().enumerate() {
                    if let Some(w) = number(w) {
                        widths.insert(first + offset as u32, w);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let (Some(last), Some(w)) = (number(last), items.get(i + 2).and_then(number)) else { break };
                for code in first..=(last as u32).min(first.saturating_add(0xFFFF)) {
                    widths.insert(code, w);
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

/// Text for an Adobe glyph name.
fn glyph_text(name: &str) -> Option<String> {
    if let Some(hex) = name.strip_prefix("uni") {
        if hex.len() == 4 {
            return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32).map(String::from);
        }
    }
    if name.len() == 1 && name.chars().all(|c| c.is_ascii_alphabetic()) {
        return Some(name.to_string());
    }
    let text = match name {
        "space" => " ",
        "zero" => "0",
        "one" => "1",
        "two" => "2",
        "three" => "3",
        "four" => "4",
        "five" => "5",
        "six" => "6",
        "seven" => "7",
        "eight" => "8",
        "nine" => "9",
        "period" => ".",
        "comma" => ",",
        "colon" => ":",
        "semicolon" => ";",
        "exclam" => "!",
        "question" => "?",
        "hyphen" => "-",
        "parenleft" => "(",
        "parenright" => ")",
        "bracketleft" => "[",
        "bracketright" => "]",
        "slash" => "/",
        "ampersand" => "&",
        "quotesingle" => "'",
        "quotedbl" => "\"",
        "quoteleft" => "\u{2018}",
        "quoteright" => "\u{2019}",
        "quotedblleft" => "\u{201C}",
        "quotedblright" => "\u{201D}",
        "endash" => "\u{2013}",
        "emdash" => "\u{2014}",
        "ellipsis" => "\u{2026}",
        "bullet" => "\u{2022}",
        "fi" => "fi",
        "fl" => "fl",
        "ff" => "ff",
        "ffi" => "ffi",
        "ffl" => "ffl",
        _ => return None,
    };
    Some(text.to_string())
}
