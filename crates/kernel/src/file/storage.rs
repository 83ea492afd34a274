//! Local image storage.
//!
//! Uploaded images are written flat under the uploads directory as
//! `<uuidv7>_<sanitized stem>.<ext>`. The UUIDv7 prefix makes names unique and
//! sorts them by upload time.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use super::compress::ImageError;

/// Accepted image types, by sniffed MIME type, with the extension used on disk.
pub const ALLOWED_IMAGE_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

/// Maximum length of the sanitized original-name part of a stored name.
const MAX_STEM_LENGTH: usize = 100;

/// A stored image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredImage {
    pub name: String,
    pub url: String,
    pub size: u64,
    pub content_type: String,
}

/// Image storage on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    /// Directory images are written to.
    base_path: PathBuf,
    /// Base URL the directory is served under.
    base_url: String,
    max_size: usize,
}

impl LocalImageStore {
    pub fn new(base_path: impl Into<PathBuf>, base_url: impl Into<String>, max_size: usize) -> Self {
        Self {
            base_path: base_path.into(),
            base_url: base_url.into(),
            max_size,
        }
    }

    /// Public URL for a stored name.
    pub fn public_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), name)
    }

    /// Validate and write an uploaded image.
    ///
    /// The type is sniffed from the bytes; the client's filename and declared
    /// content type are not trusted.
    pub async fn store(&self, original_name: &str, data: &[u8]) -> Result<StoredImage, ImageError> {
        if data.len() > self.max_size {
            return Err(ImageError::TooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let detected = infer::get(data).map(|kind| kind.mime_type());
        let Some((content_type, extension)) = detected.and_then(|mime| {
            ALLOWED_IMAGE_TYPES
                .iter()
                .find(|(allowed, _)| *allowed == mime)
        }) else {
            return Err(ImageError::UnsupportedType(
                detected.unwrap_or("unknown").to_string(),
            ));
        };

        let name = format!(
            "{}_{}.{}",
            Uuid::now_v7().simple(),
            sanitize_stem(original_name),
            extension
        );

        fs::create_dir_all(&self.base_path).await?;
        fs::write(self.base_path.join(&name), data).await?;

        debug!(name = %name, size = data.len(), content_type = %content_type, "stored image");

        Ok(StoredImage {
            url: self.public_url(&name),
            name,
            size: data.len() as u64,
            content_type: (*content_type).to_string(),
        })
    }

    /// List stored images, newest first.
    pub async fn list(&self) -> Result<Vec<StoredImage>, ImageError> {
        let mut entries = match fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut images = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let Some(content_type) = content_type_for(&name) else {
                continue;
            };

            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(e) => {
                    warn!(name = %name, error = %e, "failed to stat stored image");
                    continue;
                }
            };

            images.push(StoredImage {
                url: self.public_url(&name),
                name,
                size: metadata.len(),
                content_type: content_type.to_string(),
            });
        }

        images.sort_by(|a, b| b.name.cmp(&a.name));
        Ok(images)
    }
}

/// Content type for a stored name, by extension.
fn content_type_for(name: &str) -> Option<&'static str> {
    let extension = Path::new(name).extension()?.to_str()?;
    ALLOWED_IMAGE_TYPES
        .iter()
        .find(|(_, ext)| ext.eq_ignore_ascii_case(extension))
        .map(|(mime, _)| *mime)
}

/// Reduce a client filename to a safe stem: no directories, no extension,
/// only `[A-Za-z0-9._-]`.
fn sanitize_stem(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    let safe: String = stem
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .take(MAX_STEM_LENGTH)
        .collect();

    if safe.is_empty() {
        "image".to_string()
    } else {
        safe
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    fn temp_store() -> (LocalImageStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("inkstand-images-{}", Uuid::now_v7()));
        (LocalImageStore::new(&dir, "/files/", 1024 * 1024), dir)
    }

    fn png() -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::new(4, 4))
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn stems_are_sanitized() {
        assert_eq!(sanitize_stem("photo.jpg"), "photo");
        assert_eq!(sanitize_stem("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_stem("my photo (1).png"), "my_photo__1_");
        assert_eq!(sanitize_stem(""), "image");
        assert_eq!(sanitize_stem(&"a".repeat(300)).len(), MAX_STEM_LENGTH);
    }

    #[test]
    fn content_type_by_extension() {
        assert_eq!(content_type_for("x_a.jpg"), Some("image/jpeg"));
        assert_eq!(content_type_for("x_a.WEBP"), Some("image/webp"));
        assert_eq!(content_type_for("notes.txt"), None);
        assert_eq!(content_type_for("noext"), None);
    }

    #[tokio::test]
    async fn store_sniffs_type_and_lists_newest_first() {
        let (store, dir) = temp_store();

        let first = store.store("first.gif", &png()).await.unwrap();
        assert_eq!(first.content_type, "image/png");
        assert!(first.name.ends_with("_first.png"));
        assert_eq!(first.url, format!("/files/{}", first.name));

        let second = store.store("second.png", &png()).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, second.name);
        assert_eq!(listed[1].name, first.name);
        assert_eq!(listed[1].size, first.size);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn rejects_non_images() {
        let (store, _dir) = temp_store();
        let result = store.store("evil.png", b"<script>alert(1)</script>").await;
        assert!(matches!(result, Err(ImageError::UnsupportedType(_))));
    }

    #[tokio::test]
    async fn rejects_oversized_uploads() {
        let (_, dir) = temp_store();
        let store = LocalImageStore::new(&dir, "/files", 8);
        let result = store.store("big.png", &png()).await;
        assert!(matches!(result, Err(ImageError::TooLarge { max: 8, .. })));
    }

    #[tokio::test]
    async fn missing_directory_lists_empty() {
        let (store, _dir) = temp_store();
        assert!(store.list().await.unwrap().is_empty());
    }
}
