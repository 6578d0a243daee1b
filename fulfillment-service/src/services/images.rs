//! Image attachments for request items.

use async_trait::async_trait;
use service_core::error::AppError;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

pub const ALLOWED_IMAGE_TYPES: [(&str, &str); 4] = [
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
    ("image/gif", "gif"),
];

pub const DEFAULT_MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Store the image under `folder` and return its public URL.
    async fn upload(&self, image: ImageUpload, folder: &str) -> Result<String, AppError>;
    async fn delete(&self, url: &str) -> Result<(), AppError>;
}

/// Stores images on the local filesystem and serves them under `base_url`.
pub struct LocalImageStore {
    root: PathBuf,
    base_url: String,
    max_bytes: usize,
}

impl LocalImageStore {
    pub async fn new(
        root: impl Into<PathBuf>,
        base_url: impl Into<String>,
        max_bytes: usize,
    ) -> Result<Self, AppError> {
        let root = root.into();
        if !root.exists() {
            fs::create_dir_all(&root).await?;
        }
        Ok(Self {
            root,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_bytes,
        })
    }

    fn extension_for(content_type: &str) -> Option<&'static str> {
        ALLOWED_IMAGE_TYPES
            .iter()
            .find(|(mime, _)| mime.eq_ignore_ascii_case(content_type.trim()))
            .map(|(_, ext)| *ext)
    }

    /// Relative paths only, no `..` segments.
    fn checked_relative(path: &str) -> Result<&Path, AppError> {
        let relative = Path::new(path);
        let clean = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invalid image path: {}",
                path
            )));
        }
        Ok(relative)
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn upload(&self, image: ImageUpload, folder: &str) -> Result<String, AppError> {
        let extension = Self::extension_for(&image.content_type).ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!(
                "Unsupported image type: {}",
                image.content_type
            ))
        })?;
        if image.data.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!("Image is empty")));
        }
        if image.data.len() > self.max_bytes {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Image {} is {} bytes, limit is {}",
                image.file_name,
                image.data.len(),
                self.max_bytes
            )));
        }

        let folder = folder.trim_matches('/');
        let dir = self.root.join(Self::checked_relative(folder)?);
        fs::create_dir_all(&dir).await?;

        let name = format!("{}.{}", Uuid::new_v4(), extension);
        fs::write(dir.join(&name), image.data).await?;

        tracing::debug!(folder, file = %name, "Image stored");
        Ok(format!("{}/{}/{}", self.base_url, folder, name))
    }

    async fn delete(&self, url: &str) -> Result<(), AppError> {
        let relative = url
            .strip_prefix(&self.base_url)
            .map(|rest| rest.trim_start_matches('/'))
            .ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!("Image URL not served here: {}", url))
            })?;

        let path = self.root.join(Self::checked_relative(relative)?);
        if path.exists() {
            fs::remove_file(path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_lookup() {
        assert_eq!(LocalImageStore::extension_for("image/png"), Some("png"));
        assert_eq!(LocalImageStore::extension_for("IMAGE/JPEG"), Some("jpg"));
        assert_eq!(LocalImageStore::extension_for("application/pdf"), None);
    }

    #[test]
    fn test_rejects_traversal() {
        assert!(LocalImageStore::checked_relative("requests/REQ-1").is_ok());
        assert!(LocalImageStore::checked_relative("../etc").is_err());
        assert!(LocalImageStore::checked_relative("/abs").is_err());
        assert!(LocalImageStore::checked_relative("").is_err());
    }
}
