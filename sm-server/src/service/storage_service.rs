use crate::config::StorageSettings;
use crate::error::{ErrorCode, Result};
use image::{ImageFormat, imageops::FilterType};
use sm_share::api::UploadResponse;
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Bucket holding images attached to messages.
pub const MESSAGE_IMAGES: &str = "message-images";

/// `{uuid}-{file name with whitespace replaced by underscores}`.
pub fn object_name(file_name: &str) -> String {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("image");
    let cleaned: String = base.chars().map(|c| if c.is_whitespace() { '_' } else { c }).collect();
    format!("{}-{}", Uuid::new_v4(), cleaned)
}

/// Resolves a public object path inside the storage root, refusing anything that escapes it.
pub fn resolve(root: &Path, object_path: &str) -> Option<PathBuf> {
    let relative = Path::new(object_path);
    if object_path.is_empty() || relative.components().any(|c| !matches!(c, Component::Normal(_))) {
        return None;
    }
    Some(root.join(relative))
}

/// Content type by extension, for serving stored objects.
pub fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Target size of a thumbnail that fits the bounds, keeping the aspect ratio. `None` when the
/// image already fits.
pub fn thumbnail_size(width: u32, height: u32, max_width: u32, max_height: u32) -> Option<(u32, u32)> {
    if width <= max_width && height <= max_height {
        return None;
    }
    let ratio = (max_width as f32 / width as f32).min(max_height as f32 / height as f32);
    Some((((width as f32) * ratio).max(1.0) as u32, ((height as f32) * ratio).max(1.0) as u32))
}

pub struct StorageService {
    settings: StorageSettings,
}

impl StorageService {
    pub fn new(settings: StorageSettings) -> Self {
        Self { settings }
    }

    pub fn init(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(Path::new(&self.settings.path).join(MESSAGE_IMAGES))
    }

    pub fn max_image_bytes(&self) -> usize {
        (self.settings.max_image_size_mb * 1024 * 1024) as usize
    }

    pub fn public_url(&self, object_path: &str) -> String {
        format!("{}/{}", self.settings.public_base_url.trim_end_matches('/'), object_path)
    }

    /// Validates and stores an uploaded image. Oversized images also get a JPEG thumbnail.
    pub async fn save_image(&self, file_name: &str, content_type: &str, data: &[u8]) -> Result<UploadResponse> {
        if !content_type.starts_with("image/") {
            return Err(ErrorCode::InvalidInput);
        }
        if data.is_empty() || data.len() > self.max_image_bytes() {
            return Err(ErrorCode::InvalidInput);
        }
        let img = image::load_from_memory(data).map_err(|e| {
            warn!(error = %e, file_name = %file_name, "upload is not a decodable image");
            ErrorCode::InvalidInput
        })?;

        let name = object_name(file_name);
        let object_path = format!("{MESSAGE_IMAGES}/{name}");
        let dir = Path::new(&self.settings.path).join(MESSAGE_IMAGES);
        tokio::fs::write(dir.join(&name), data).await.map_err(|e| {
            error!(error = %e, path = %object_path, "failed to write upload");
            ErrorCode::Internal
        })?;

        let mut thumbnail_url = None;
        if let Some((w, h)) = thumbnail_size(
            img.width(),
            img.height(),
            self.settings.thumbnail_max_width,
            self.settings.thumbnail_max_height,
        ) {
            let thumb_name = format!("thumb_{name}.jpg");
            let mut buffer = Vec::new();
            let thumb = img.resize(w, h, FilterType::Lanczos3).to_rgb8();
            match thumb.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg) {
                Ok(()) => match tokio::fs::write(dir.join(&thumb_name), &buffer).await {
                    Ok(()) => thumbnail_url = Some(self.public_url(&format!("{MESSAGE_IMAGES}/{thumb_name}"))),
                    Err(e) => warn!(error = %e, "failed to write thumbnail"),
                },
                Err(e) => warn!(error = %e, "failed to encode thumbnail"),
            }
        }

        info!(path = %object_path, size = data.len(), thumbnail = thumbnail_url.is_some(), "image stored");
        Ok(UploadResponse { public_url: self.public_url(&object_path), path: object_path, thumbnail_url })
    }

    /// Reads a stored object. `NotFound` for missing or out-of-root paths.
    pub async fn read(&self, object_path: &str) -> Result<(Vec<u8>, &'static str)> {
        let path = resolve(Path::new(&self.settings.path), object_path).ok_or(ErrorCode::NotFound)?;
        let bytes = tokio::fs::read(&path).await.map_err(|_| ErrorCode::NotFound)?;
        Ok((bytes, content_type_for(&path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_names_replace_whitespace() {
        let name = object_name("my summer\tpic.png");
        let (uuid, rest) = name.split_at(36);
        assert!(Uuid::parse_str(uuid).is_ok());
        assert_eq!(rest, "-my_summer_pic.png");
        assert!(object_name("../../etc/passwd").ends_with("-passwd"));
    }

    #[test]
    fn resolve_stays_inside_root() {
        let root = Path::new("/srv/storage");
        assert_eq!(
            resolve(root, "message-images/a.png"),
            Some(PathBuf::from("/srv/storage/message-images/a.png"))
        );
        assert_eq!(resolve(root, "../secret"), None);
        assert_eq!(resolve(root, "/etc/passwd"), None);
        assert_eq!(resolve(root, ""), None);
    }

    #[test]
    fn thumbnails_keep_aspect_ratio() {
        assert_eq!(thumbnail_size(400, 300, 800, 800), None);
        assert_eq!(thumbnail_size(1600, 800, 800, 800), Some((800, 400)));
        assert_eq!(thumbnail_size(1000, 2000, 800, 800), Some((400, 800)));
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("a.bin")), "application/octet-stream");
    }

    #[tokio::test]
    async fn saves_png_and_rejects_non_images() {
        let dir = std::env::temp_dir().join(format!("sm-storage-{}", Uuid::new_v4()));
        let service = StorageService::new(StorageSettings {
            path: dir.to_string_lossy().into_owned(),
            public_base_url: "http://cdn.test/api/storage/".to_string(),
            max_image_size_mb: 1,
            thumbnail_max_width: 4,
            thumbnail_max_height: 4,
        });
        service.init().unwrap();

        let mut png = Vec::new();
        image::RgbImage::new(8, 8)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();

        let uploaded = service.save_image("dot 1.png", "image/png", &png).await.unwrap();
        assert!(uploaded.path.starts_with("message-images/"));
        assert!(uploaded.path.ends_with("-dot_1.png"));
        assert_eq!(uploaded.public_url, format!("http://cdn.test/api/storage/{}", uploaded.path));
        assert!(uploaded.thumbnail_url.is_some());

        let (bytes, content_type) = service.read(&uploaded.path).await.unwrap();
        assert_eq!(bytes, png);
        assert_eq!(content_type, "image/png");

        assert_eq!(service.save_image("a.txt", "text/plain", b"hi").await.unwrap_err(), ErrorCode::InvalidInput);
        assert_eq!(service.save_image("a.png", "image/png", b"nope").await.unwrap_err(), ErrorCode::InvalidInput);

        let _ = std::fs::remove_dir_all(dir);
    }
}
