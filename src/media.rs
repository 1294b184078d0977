//! Kitten pictures: base64 data URIs in, files under the media root out.

use crate::error::ApiError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const IMAGE_DIR: &str = "images";
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageFormat {
    /// Sniff the format from the leading bytes.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageFormat::Gif)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageFormat::Webp)
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Gif => "gif",
            ImageFormat::Webp => "webp",
        }
    }
}

/// A decoded upload, not yet written to disk.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
    /// Path relative to the media root the upload will be stored at.
    pub relative_path: String,
}

/// Decode `data:image/<type>;base64,<payload>`. The error is the message to
/// report against the image field.
pub fn decode_data_uri(value: &str) -> Result<ImageUpload, String> {
    let rest = value.trim().strip_prefix("data:").ok_or(INVALID_IMAGE)?;
    let (mime, payload) = rest.split_once(";base64,").ok_or(INVALID_IMAGE)?;
    if !mime.starts_with("image/") {
        return Err(INVALID_IMAGE.to_string());
    }

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| INVALID_IMAGE.to_string())?;
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(format!(
            "The image is too large. It must not exceed {} bytes.",
            MAX_IMAGE_BYTES
        ));
    }
    let format = ImageFormat::detect(&bytes).ok_or(INVALID_IMAGE)?;

    let relative_path = format!("{}/{}.{}", IMAGE_DIR, Uuid::new_v4().simple(), format.extension());
    Ok(ImageUpload {
        format,
        bytes,
        relative_path,
    })
}

/// Resolve a stored relative path, refusing anything that escapes the root.
fn resolve(media_root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    let mut resolved = media_root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            _ => return None,
        }
    }
    Some(resolved)
}

pub async fn store_image(media_root: &Path, upload: &ImageUpload) -> Result<(), ApiError> {
    let target = resolve(media_root, &upload.relative_path)
        .ok_or_else(|| ApiError::Internal(format!("Invalid media path {}", upload.relative_path)))?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await.map_err(|e| {
            ApiError::Internal(format!("Failed to create media directory '{}': {}", parent.display(), e))
        })?;
    }
    fs::write(&target, &upload.bytes).await.map_err(|e| {
        ApiError::Internal(format!("Failed to write image '{}': {}", target.display(), e))
    })?;

    info!("Stored {:?} image at {}", upload.format, target.display());
    Ok(())
}

/// Remove a stored image; a missing file is not an error.
pub async fn remove_image(media_root: &Path, relative: &str) {
    let Some(target) = resolve(media_root, relative) else {
        warn!("Refusing to remove media outside the root: {}", relative);
        return;
    };
    match fs::remove_file(&target).await {
        Ok(()) => debug!("Removed image {}", target.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove image '{}': {}", target.display(), e),
    }
}

/// Public URL of a stored file.
pub fn public_url(media_prefix: &str, relative: &str) -> String {
    format!("{}{}", media_prefix, relative.trim_start_matches('/'))
}
