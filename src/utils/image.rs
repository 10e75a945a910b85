//! Inline images as base64 data URIs for vision requests.

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// Read `path` and return `data:<mime>;base64,<payload>`.
pub fn encode_image_data_url(path: &Path) -> Result<String> {
    if !path.is_file() {
        bail!("Image file '{}' does not exist", path.display());
    }
    let bytes = fs::read(path).with_context(|| format!("Failed to read image '{}'", path.display()))?;
    Ok(data_url(&bytes, guess_image_mime(path)))
}

pub fn data_url(bytes: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, BASE64.encode(bytes))
}

/// Mime type from the file extension; unknown extensions are sent as JPEG.
pub fn guess_image_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}
