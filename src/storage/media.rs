//! Media storage on the local filesystem
//!
//! Uploaded images are written below the configured media root and served
//! back read-only under the media URL prefix.

use std::path::{Path, PathBuf};

use image::ImageFormat;

use crate::error::AppError;
use crate::forms::INVALID_IMAGE;

/// An uploaded file that decoded as a supported image
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub data: Vec<u8>,
    /// MIME type detected from the file contents
    pub content_type: &'static str,
    /// File extension used for the stored copy
    pub extension: &'static str,
}

impl ImageUpload {
    /// Check that `data` is a JPEG, PNG, GIF or WebP image.
    ///
    /// The client-supplied content type is ignored; the format is sniffed
    /// from the bytes and the whole image is decoded once.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, String> {
        let format = image::guess_format(&data).map_err(|_| INVALID_IMAGE.to_string())?;

        let (content_type, extension) = match format {
            ImageFormat::Jpeg => ("image/jpeg", "jpg"),
            ImageFormat::Png => ("image/png", "png"),
            ImageFormat::Gif => ("image/gif", "gif"),
            ImageFormat::WebP => ("image/webp", "webp"),
            _ => return Err(INVALID_IMAGE.to_string()),
        };

        image::load_from_memory_with_format(&data, format).map_err(|error| {
            tracing::debug!(%error, "Uploaded image failed to decode");
            INVALID_IMAGE.to_string()
        })?;

        Ok(Self {
            data,
            content_type,
            extension,
        })
    }

    /// Same as [`ImageUpload::from_bytes`], off the async runtime.
    pub async fn check(data: Vec<u8>) -> Result<Result<Self, String>, AppError> {
        tokio::task::spawn_blocking(move || Self::from_bytes(data))
            .await
            .map_err(|e| AppError::Internal(e.into()))
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Media storage service
///
/// Writes files below `root` and hands out URLs under `public_url`.
pub struct MediaStorage {
    /// Directory that holds all media files
    root: PathBuf,
    /// URL prefix the media directory is served under, e.g. "/media"
    public_url: String,
}

impl MediaStorage {
    /// Create media storage, making sure the root directory exists
    ///
    /// # Errors
    /// Returns error if the directory cannot be created
    pub async fn new(config: &crate::config::MediaConfig) -> Result<Self, AppError> {
        tokio::fs::create_dir_all(&config.root).await?;

        Ok(Self {
            root: config.root.clone(),
            public_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    /// Directory served under the media URL
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a media file
    ///
    /// # Arguments
    /// * `key` - Relative path below the media root
    /// * `data` - File contents
    ///
    /// # Returns
    /// Public URL for the stored file
    pub async fn upload(&self, key: &str, data: &[u8]) -> Result<String, AppError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::Storage(format!("media write failed for {}: {}", key, e)))?;

        tracing::debug!(key, bytes = data.len(), "Stored media file");
        Ok(self.get_public_url(key))
    }

    /// Store a post photo under posts/photos/
    ///
    /// # Returns
    /// (storage key, public URL)
    pub async fn upload_post_photo(
        &self,
        id: &str,
        image: &ImageUpload,
    ) -> Result<(String, String), AppError> {
        let key = format!("posts/photos/{}.{}", id, image.extension);
        let url = self.upload(&key, &image.data).await?;
        Ok((key, url))
    }

    /// Store a profile picture under users/pictures/
    ///
    /// # Returns
    /// (storage key, public URL)
    pub async fn upload_profile_picture(
        &self,
        id: &str,
        image: &ImageUpload,
    ) -> Result<(String, String), AppError> {
        let key = format!("users/pictures/{}.{}", id, image.extension);
        let url = self.upload(&key, &image.data).await?;
        Ok((key, url))
    }

    /// Delete a media file
    ///
    /// Missing files are not an error.
    pub async fn delete(&self, key: &str) -> Result<(), AppError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!(
                "media delete failed for {}: {}",
                key, e
            ))),
        }
    }

    /// Get public URL for a storage key
    pub fn get_public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key)
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, AppError> {
        let relative = Path::new(key);
        let escapes = relative.is_absolute()
            || relative
                .components()
                .any(|c| !matches!(c, std::path::Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(AppError::Storage(format!("invalid media key: {}", key)));
        }
        Ok(self.root.join(relative))
    }
}
