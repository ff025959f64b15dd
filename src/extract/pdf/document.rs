//! Thin layer over `lopdf::Document`: page lookup, inherited resources,
//! content streams, the `/Info` dictionary and the outline.

use std::collections::{BTreeMap, HashSet};
use std::io::Cursor;

use lopdf::{Dictionary, Object, ObjectId, Stream};

use crate::error::{Error, Result};
use crate::model::Metadata;

/// Guard against cyclic `/Parent` or `/Next` chains.
const MAX_CHAIN: usize = 10_000;

pub(crate) struct PdfDocument {
    inner: lopdf::Document,
    page_ids: Vec<ObjectId>,
}

/// One outline (bookmark) item. `page` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OutlineEntry {
    pub title: String,
    pub level: usize,
    pub page: Option<usize>,
}

/// Raw pixels or an encoded image file pulled out of an image XObject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ImageData {
    pub data: Vec<u8>,
    pub mime: &'static str,
    pub extension: &'static str,
}

impl PdfDocument {
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let inner = lopdf::Document::load_mem(bytes)?;
        if inner.is_encrypted() {
            return Err(Error::InvalidStructure("document is encrypted".to_string()));
        }
        let page_ids = inner.get_pages().into_values().collect();
        Ok(Self { inner, page_ids })
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Object id of the 1-based `page`.
    pub fn page_id(&self, page: usize) -> Result<ObjectId> {
        page.checked_sub(1)
            .and_then(|i| self.page_ids.get(i))
            .copied()
            .ok_or_else(|| Error::InvalidStructure(format!("no page {page}")))
    }

    pub fn resolve<'a>(&'a self, object: &'a Object) -> &'a Object {
        match object {
            Object::Reference(id) => self.inner.get_object(*id).unwrap_or(object),
            other => other,
        }
    }

    pub fn dict<'a>(&'a self, object: &'a Object) -> Option<&'a Dictionary> {
        self.resolve(object).as_dict().ok()
    }

    pub fn dict_entry<'a>(&'a self, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
        dict.get(key).ok().and_then(|o| self.dict(o))
    }

    pub fn stream<'a>(&'a self, object: &'a Object) -> Option<&'a Stream> {
        self.resolve(object).as_stream().ok()
    }

    /// Look `key` up on the page, then up the page tree via `/Parent`.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut current = page_id;
        for _ in 0..MAX_CHAIN {
            let dict = self.inner.get_object(current).ok()?.as_dict().ok()?;
            if let Ok(value) = dict.get(key) {
                return Some(value);
            }
            current = dict.get(b"Parent").ok()?.as_reference().ok()?;
        }
        None
    }

    pub fn page_resources(&self, page_id: ObjectId) -> Option<&Dictionary> {
        self.inherited(page_id, b"Resources").and_then(|o| self.dict(o))
    }

    /// Concatenated, decompressed content streams of a page.
    pub fn page_content(&self, page_id: ObjectId) -> Result<Vec<u8>> {
        let page = self.inner.get_object(page_id)?.as_dict()?;
        let contents = match page.get(b"Contents") {
            Ok(contents) => self.resolve(contents),
            Err(_) => return Ok(Vec::new()),
        };
        match contents {
            Object::Stream(stream) => stream_bytes(stream),
            Object::Array(parts) => {
                let mut content = Vec::new();
                for part in parts {
                    let stream = self
                        .stream(part)
                        .ok_or_else(|| Error::InvalidStructure("/Contents item is not a stream".to_string()))?;
                    if !content.is_empty() {
                        content.push(b'\n');
                    }
                    content.extend(stream_bytes(stream)?);
                }
                Ok(content)
            }
            _ => Err(Error::InvalidStructure("/Contents is not a stream".to_string())),
        }
    }

    /// Metadata from the `/Info` dictionary and the catalog's `/Lang`.
    pub fn metadata(&self) -> Metadata {
        let mut metadata = Metadata::default();
        if let Some(info) = self.inner.trailer.get(b"Info").ok().and_then(|o| self.dict(o)) {
            metadata.title = self.text_entry(info, b"Title");
            metadata.authors = self
                .text_entry(info, b"Author")
                .map(|a| {
                    a.split([';', '&'])
                        .map(str::trim)
                        .filter(|a| !a.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            metadata.description = self.text_entry(info, b"Subject");
        }
        if let Some(catalog) = self.catalog() {
            metadata.language = self.text_entry(catalog, b"Lang");
        }
        metadata
    }

    fn catalog(&self) -> Option<&Dictionary> {
        self.inner.trailer.get(b"Root").ok().and_then(|o| self.dict(o))
    }

    fn text_entry(&self, dict: &Dictionary, key: &[u8]) -> Option<String> {
        let value = match self.resolve(dict.get(key).ok()?) {
            Object::String(bytes, _) => decode_text_string(bytes),
            Object::Name(name) => String::from_utf8_lossy(name).into_owned(),
            _ => return None,
        };
        let value = value.trim().to_string();
        (!value.is_empty()).then_some(value)
    }

    /// Walk `/Outlines` depth-first through `/First` and `/Next`.
    pub fn outline(&self) -> Vec<OutlineEntry> {
        let mut entries = Vec::new();
        let Some(root) = self.catalog().and_then(|c| self.dict_entry(c, b"Outlines")) else {
            return entries;
        };
        let Ok(first) = root.get(b"First").and_then(Object::as_reference) else {
            return entries;
        };
        let pages: BTreeMap<ObjectId, usize> = self
            .page_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i + 1))
            .collect();
        let mut visited = HashSet::new();
        self.walk_outline(first, 0, &pages, &mut visited, &mut entries);
        entries
    }

    fn walk_outline(
        &self,
        first: ObjectId,
        level: usize,
        pages: &BTreeMap<ObjectId, usize>,
        visited: &mut HashSet<ObjectId>,
        entries: &mut Vec<OutlineEntry>,
    ) {
        if level > 32 {
            return;
        }
        let mut current = Some(first);
        while let Some(id) = current {
            if !visited.insert(id) || visited.len() > MAX_CHAIN {
                break;
            }
            let Some(node) = self.inner.get_object(id).ok().and_then(|o| o.as_dict().ok()) else {
                break;
            };
            entries.push(OutlineEntry {
                title: self.text_entry(node, b"Title").unwrap_or_default(),
                level,
                page: self.outline_page(node, pages),
            });
            if let Ok(child) = node.get(b"First").and_then(Object::as_reference) {
                self.walk_outline(child, level + 1, pages, visited, entries);
            }
            current = node.get(b"Next").and_then(Object::as_reference).ok();
        }
    }

    /// Page of an outline item's `/Dest` or GoTo `/A` action.
    fn outline_page(&self, node: &Dictionary, pages: &BTreeMap<ObjectId, usize>) -> Option<usize> {
        let dest = match node.get(b"Dest") {
            Ok(dest) => dest,
            Err(_) => {
                let action = self.dict(node.get(b"A").ok()?)?;
                if action.get(b"S").ok()?.as_name().ok()? != b"GoTo" {
                    return None;
                }
                action.get(b"D").ok()?
            }
        };
        let dest = match self.resolve(dest) {
            Object::Dictionary(d) => d.get(b"D").ok().map(|d| self.resolve(d))?,
            other => other,
        };
        match dest {
            Object::Array(items) => {
                let page_ref = items.first()?.as_reference().ok()?;
                pages.get(&page_ref).copied()
            }
            Object::String(name, _) => self.named_destination_page(name, pages),
            Object::Name(name) => self.named_destination_page(name, pages),
            _ => None,
        }
    }

    /// Resolve a named destination through the catalog's `/Dests` dictionary
    /// or the flat `/Names` leaf of the `/Dests` name tree.
    fn named_destination_page(&self, name: &[u8], pages: &BTreeMap<ObjectId, usize>) -> Option<usize> {
        let catalog = self.catalog()?;
        let target = if let Some(dests) = self.dict_entry(catalog, b"Dests") {
            dests.get(name).ok().map(|d| self.resolve(d))
        } else {
            let tree = self.dict_entry(catalog, b"Names").and_then(|n| self.dict_entry(n, b"Dests"))?;
            self.name_tree_lookup(tree, name, 0)
        }?;
        let target = match target {
            Object::Dictionary(d) => self.resolve(d.get(b"D").ok()?),
            other => other,
        };
        let page_ref = target.as_array().ok()?.first()?.as_reference().ok()?;
        pages.get(&page_ref).copied()
    }

    fn name_tree_lookup<'a>(&'a self, node: &'a Dictionary, name: &[u8], depth: usize) -> Option<&'a Object> {
        if depth > 16 {
            return None;
        }
        if let Ok(names) = node.get(b"Names").and_then(Object::as_array) {
            for pair in names.chunks(2) {
                if let [Object::String(key, _), value] = pair {
                    if key.as_slice() == name {
                        return Some(self.resolve(value));
                    }
                }
            }
        }
        let kids = node.get(b"Kids").ok()?.as_array().ok()?;
        kids.iter()
            .filter_map(|kid| self.dict(kid))
            .find_map(|kid| self.name_tree_lookup(kid, name, depth + 1))
    }

    /// Pull an image XObject out as a file. JPEG and JPEG 2000 streams are
    /// passed through; 8-bit gray and RGB pixel data is encoded as PNG.
    /// Other encodings yield `None`.
    pub fn image(&self, stream: &Stream) -> Result<Option<ImageData>> {
        let filters = self.filters(stream);
        let last = filters.last().map(String::as_str);
        let passthrough = match last {
            Some("DCTDecode") => Some(("image/jpeg", "jpg")),
            Some("JPXDecode") => Some(("image/jp2", "jp2")),
            Some("JBIG2Decode") | Some("CCITTFaxDecode") => return Ok(None),
            _ => None,
        };
        if let Some((mime, extension)) = passthrough {
            let data = if filters.len() == 1 {
                stream.content.clone()
            } else {
                stream.decompressed_content()?
            };
            return Ok(Some(ImageData { data, mime, extension }));
        }

        let width = stream.dict.get(b"Width").and_then(Object::as_i64).unwrap_or(0);
        let height = stream.dict.get(b"Height").and_then(Object::as_i64).unwrap_or(0);
        let bits = stream.dict.get(b"BitsPerComponent").and_then(Object::as_i64).unwrap_or(8);
        let (Ok(width), Ok(height)) = (u32::try_from(width), u32::try_from(height)) else {
            return Ok(None);
        };
        if width == 0 || height == 0 || bits != 8 {
            return Ok(None);
        }
        let color_space = stream
            .dict
            .get(b"ColorSpace")
            .ok()
            .map(|cs| self.resolve(cs))
            .and_then(|cs| match cs {
                Object::Name(name) => Some(name.clone()),
                Object::Array(items) => items.first().and_then(|o| o.as_name().ok()).map(<[u8]>::to_vec),
                _ => None,
            })
            .unwrap_or_default();

        let pixels = if filters.is_empty() {
            stream.content.clone()
        } else {
            stream.decompressed_content()?
        };
        let encoded = match color_space.as_slice() {
            b"DeviceRGB" | b"CalRGB" => image::RgbImage::from_raw(width, height, pixels)
                .map(|img| encode_png(&image::DynamicImage::ImageRgb8(img))),
            b"DeviceGray" | b"CalGray" => image::GrayImage::from_raw(width, height, pixels)
                .map(|img| encode_png(&image::DynamicImage::ImageLuma8(img))),
            _ => None,
        };
        match encoded {
            Some(data) => Ok(Some(ImageData {
                data: data?,
                mime: "image/png",
                extension: "png",
            })),
            None => Ok(None),
        }
    }

    fn filters(&self, stream: &Stream) -> Vec<String> {
        match stream.dict.get(b"Filter").map(|f| self.resolve(f)) {
            Ok(Object::Name(name)) => vec![String::from_utf8_lossy(name).into_owned()],
            Ok(Object::Array(items)) => items
                .iter()
                .filter_map(|item| self.resolve(item).as_name().ok())
                .map(|name| String::from_utf8_lossy(name).into_owned())
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn encode_png(image: &image::DynamicImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| Error::InvalidStructure(format!("cannot encode image: {e}")))?;
    Ok(out.into_inner())
}

pub(crate) fn stream_bytes(stream: &Stream) -> Result<Vec<u8>> {
    if stream.dict.get(b"Filter").is_ok() {
        Ok(stream.decompressed_content()?)
    } else {
        Ok(stream.content.clone())
    }
}

/// PDF text strings are UTF-16BE with a BOM, or PDFDocEncoding which agrees
/// with Latin-1 for printable characters.
pub(crate) fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    bytes.iter().map(|&b| b as char).collect()
}

pub(crate) fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}
