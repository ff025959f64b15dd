//! Content stream interpreter.
//!
//! Runs the text and XObject operators of a page and records positioned
//! text runs and image placements. Path painting, colour and clipping are
//! ignored.

use std::collections::HashMap;

use lopdf::content::Content;
use lopdf::{Dictionary, Object, Stream};

use super::document::{number, stream_bytes, PdfDocument};
use super::fonts::{load_fonts, Font};
use crate::error::Result;

/// Nested form XObjects deeper than this are not followed.
const MAX_FORM_DEPTH: usize = 8;

/// TJ adjustments beyond this many 1/1000 em read as a word gap.
const TJ_SPACE_THRESHOLD: f32 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Matrix([f32; 6]);

impl Matrix {
    pub const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translate(tx: f32, ty: f32) -> Self {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() < 6 {
            return None;
        }
        let mut m = [0.0; 6];
        for (slot, operand) in m.iter_mut().zip(operands) {
            *slot = number(operand)?;
        }
        Some(Matrix(m))
    }

    /// `self × other`
    fn then(&self, other: &Matrix) -> Matrix {
        let [a, b, c, d, e, f] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a * a2 + b * c2,
            a * b2 + b * d2,
            c * a2 + d * c2,
            c * b2 + d * d2,
            e * a2 + f * c2 + e2,
            e * b2 + f * d2 + f2,
        ])
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }

    fn horizontal_scale(&self) -> f32 {
        (self.0[0] * self.0[0] + self.0[1] * self.0[1]).sqrt()
    }

    fn vertical_scale(&self) -> f32 {
        (self.0[2] * self.0[2] + self.0[3] * self.0[3]).sqrt()
    }
}

/// A string shown by one text operator, in page space.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TextRun {
    pub text: String,
    /// Left end of the baseline
    pub x: f32,
    /// Baseline height, growing upwards
    pub y: f32,
    pub width: f32,
    /// Rendered font size
    pub size: f32,
    pub bold: bool,
    pub italic: bool,
}

/// An image XObject drawn on the page.
#[derive(Debug, Clone)]
pub(crate) struct ImagePlacement<'a> {
    pub stream: &'a Stream,
    /// Top edge of the image in page space
    pub top: f32,
}

#[derive(Debug, Default)]
pub(crate) struct PageContent<'a> {
    pub runs: Vec<TextRun>,
    pub images: Vec<ImagePlacement<'a>>,
}

impl PageContent<'_> {
    pub fn word_count(&self) -> usize {
        self.runs.iter().map(|r| r.text.split_whitespace().count()).sum()
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Option<Vec<u8>>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scaling: f32,
    leading: f32,
    rise: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            font: None,
            font_size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

/// Interpret the content streams of the 1-based `page`.
pub(crate) fn interpret_page(doc: &PdfDocument, page: usize) -> Result<PageContent<'_>> {
    let page_id = doc.page_id(page)?;
    let data = doc.page_content(page_id)?;
    let resources = doc.page_resources(page_id);
    let mut out = PageContent::default();
    let mut interpreter = Interpreter {
        doc,
        out: &mut out,
        font_cache: HashMap::new(),
    };
    interpreter.run(&data, resources, GraphicsState::default(), 0)?;
    Ok(out)
}

struct Interpreter<'a, 'o> {
    doc: &'a PdfDocument,
    out: &'o mut PageContent<'a>,
    /// Fonts per resource dictionary, keyed by its address
    font_cache: HashMap<usize, HashMap<Vec<u8>, Font>>,
}

impl<'a> Interpreter<'a, '_> {
    fn run(
        &mut self,
        data: &[u8],
        resources: Option<&'a Dictionary>,
        initial: GraphicsState,
        depth: usize,
    ) -> Result<()> {
        let content = Content::decode(data)?;
        let cache_key = resources.map_or(0, |r| r as *const Dictionary as usize);
        if !self.font_cache.contains_key(&cache_key) {
            let fonts = load_fonts(self.doc, resources);
            self.font_cache.insert(cache_key, fonts);
        }

        let mut state = initial;
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut tm = Matrix::IDENTITY;
        let mut tlm = Matrix::IDENTITY;

        for op in &content.operations {
            let operands = &op.operands;
            let num = |i: usize| operands.get(i).and_then(number);
            match op.operator.as_str() {
                "q" => stack.push(state.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        state = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        state.ctm = m.then(&state.ctm);
                    }
                }
                "BT" => {
                    tm = Matrix::IDENTITY;
                    tlm = Matrix::IDENTITY;
                }
                "Tf" => {
                    state.font = operands.first().and_then(|o| o.as_name().ok()).map(<[u8]>::to_vec);
                    if let Some(size) = num(1) {
                        state.font_size = size;
                    }
                }
                "Tc" => state.char_spacing = num(0).unwrap_or(0.0),
                "Tw" => state.word_spacing = num(0).unwrap_or(0.0),
                "Tz" => state.horizontal_scaling = num(0).unwrap_or(100.0) / 100.0,
                "TL" => state.leading = num(0).unwrap_or(0.0),
                "Ts" => state.rise = num(0).unwrap_or(0.0),
                "Td" | "TD" => {
                    let (tx, ty) = (num(0).unwrap_or(0.0), num(1).unwrap_or(0.0));
                    if op.operator == "TD" {
                        state.leading = -ty;
                    }
                    tlm = Matrix::translate(tx, ty).then(&tlm);
                    tm = tlm;
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        tlm = m;
                        tm = m;
                    }
                }
                "T*" => {
                    tlm = Matrix::translate(0.0, -state.leading).then(&tlm);
                    tm = tlm;
                }
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(bytes, &state, &mut tm, cache_key);
                    }
                }
                "'" | "\"" => {
                    if op.operator == "\"" {
                        state.word_spacing = num(0).unwrap_or(state.word_spacing);
                        state.char_spacing = num(1).unwrap_or(state.char_spacing);
                    }
                    tlm = Matrix::translate(0.0, -state.leading).then(&tlm);
                    tm = tlm;
                    if let Some(Object::String(bytes, _)) = operands.last() {
                        self.show(bytes, &state, &mut tm, cache_key);
                    }
                }
                "TJ" => {
                    let Some(Ok(items)) = operands.first().map(Object::as_array) else { continue };
                    for item in items {
                        match item {
                            Object::String(bytes, _) => self.show(bytes, &state, &mut tm, cache_key),
                            other => {
                                let Some(adjust) = number(other) else { continue };
                                let tx = -adjust / 1000.0 * state.font_size * state.horizontal_scaling;
                                tm = Matrix::translate(tx, 0.0).then(&tm);
                                if adjust < -TJ_SPACE_THRESHOLD {
                                    self.mark_gap();
                                }
                            }
                        }
                    }
                }
                "Do" => {
                    let Some(name) = operands.first().and_then(|o| o.as_name().ok()) else { continue };
                    self.draw_xobject(name, resources, &state, depth);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn show(&mut self, bytes: &[u8], state: &GraphicsState, tm: &mut Matrix, cache_key: usize) {
        let font = state
            .font
            .as_ref()
            .and_then(|name| self.font_cache.get(&cache_key)?.get(name));
        let fallback = Font::default();
        let font = font.unwrap_or(&fallback);
        let decoded = font.decode(bytes);

        let advance = (decoded.width / 1000.0 * state.font_size
            + bytes.len() as f32 * state.char_spacing
            + decoded.spaces as f32 * state.word_spacing)
            * state.horizontal_scaling;
        let rendering = tm.then(&state.ctm);
        let (x, y) = rendering.apply(0.0, state.rise);
        let size = state.font_size * rendering.vertical_scale();
        let width = advance * rendering.horizontal_scale();
        *tm = Matrix::translate(advance, 0.0).then(tm);

        if decoded.text.is_empty() {
            return;
        }
        self.out.runs.push(TextRun {
            text: decoded.text,
            x,
            y,
            width,
            size: size.abs(),
            bold: font.bold,
            italic: font.italic,
        });
    }

    /// Record an explicit word gap produced by a TJ offset.
    fn mark_gap(&mut self) {
        if let Some(last) = self.out.runs.last_mut() {
            if !last.text.ends_with(char::is_whitespace) {
                last.text.push(' ');
            }
        }
    }

    fn draw_xobject(&mut self, name: &[u8], resources: Option<&'a Dictionary>, state: &GraphicsState, depth: usize) {
        let Some(xobjects) = resources.and_then(|r| self.doc.dict_entry(r, b"XObject")) else { return };
        let Some(stream) = xobjects.get(name).ok().and_then(|o| self.doc.stream(o)) else { return };
        let subtype = stream.dict.get(b"Subtype").and_then(Object::as_name).unwrap_or(b"");
        match subtype {
            b"Image" => {
                let (_, top) = state.ctm.apply(0.0, 1.0);
                self.out.images.push(ImagePlacement { stream, top });
            }
            b"Form" if depth < MAX_FORM_DEPTH => {
                let data = match stream_bytes(stream) {
                    Ok(data) => data,
                    Err(err) => {
                        log::debug!("unreadable form XObject: {err}");
                        return;
                    }
                };
                let mut inner = state.clone();
                if let Some(m) = stream.dict.get(b"Matrix").ok().and_then(|o| o.as_array().ok()).and_then(|a| Matrix::from_operands(a)) {
                    inner.ctm = m.then(&state.ctm);
                }
                let form_resources = self.doc.dict_entry(&stream.dict, b"Resources").or(resources);
                if let Err(err) = self.run(&data, form_resources, inner, depth + 1) {
                    log::debug!("skipping form XObject: {err}");
                }
            }
            _ => {}
        }
    }
}
