use crate::error::Result;
use crate::model::ExtractedImage;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Maps original image paths to their stored relative paths
pub type ImageMap = HashMap<String, String>;

/// Storage collaborator for extracted images.
pub trait ImageStore {
    /// Persist `content` under `relative_path` for `owner_id`, returning the
    /// storage path the content can later be fetched from.
    fn save(&self, owner_id: &str, relative_path: &str, content: &[u8]) -> Result<String>;
}

/// Stores images as plain files below a root directory.
pub struct FsImageStore {
    root: PathBuf,
}

impl FsImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ImageStore for FsImageStore {
    fn save(&self, owner_id: &str, relative_path: &str, content: &[u8]) -> Result<String> {
        let dest = if owner_id.is_empty() {
            self.root.join(relative_path)
        } else {
            self.root.join(owner_id).join(relative_path)
        };
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&dest, content)?;
        Ok(dest.to_string_lossy().to_string())
    }
}

/// Save every image through `store` under `images/` and return the map from
/// original path to the relative path it was stored at.
pub fn store_images(
    store: &dyn ImageStore,
    owner_id: &str,
    images: &[ExtractedImage],
) -> Result<ImageMap> {
    let mut image_map = ImageMap::new();
    let mut used = HashSet::new();

    for img in images {
        let filename = unique_filename(&clean_filename(img), &mut used);
        let relative = format!("images/{}", filename);
        store.save(owner_id, &relative, &img.data)?;
        image_map.insert(img.original_path.clone(), relative);
    }

    Ok(image_map)
}

fn clean_filename(img: &ExtractedImage) -> String {
    let name = Path::new(&img.original_path)
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| "image".to_string());

    if Path::new(&name).extension().is_some() {
        name
    } else {
        format!("{}.{}", name, extension_for_mime(&img.mime_type))
    }
}

fn unique_filename(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }
    let path = Path::new(name);
    let stem = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    let ext = path.extension().map(|s| s.to_string_lossy().to_string());
    let mut n = 2;
    loop {
        let candidate = match &ext {
            Some(ext) => format!("{}-{}.{}", stem, n, ext),
            None => format!("{}-{}", stem, n),
        };
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// MIME type from the leading magic bytes of an image.
pub fn sniff_mime(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else if data.starts_with(b"\x00\x00\x00\x0cjP  ") || data.starts_with(&[0xFF, 0x4F, 0xFF, 0x51]) {
        Some("image/jp2")
    } else if data.starts_with(b"BM") {
        Some("image/bmp")
    } else if data.starts_with(b"II*\x00") || data.starts_with(b"MM\x00*") {
        Some("image/tiff")
    } else {
        let head = String::from_utf8_lossy(&data[..data.len().min(256)]).to_ascii_lowercase();
        (head.contains("<svg")).then_some("image/svg+xml")
    }
}

/// MIME type guessed from a file extension.
pub fn mime_from_path(path: &str) -> Option<&'static str> {
    let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}

pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "image/jp2" => "jp2",
        "image/bmp" => "bmp",
        "image/tiff" => "tif",
        _ => "bin",
    }
}
