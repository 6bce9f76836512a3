//! Per-session image gallery
//!
//! Generated images are kept PNG-encoded and addressed by the SHA-256 of
//! that encoding, so:
//! - Regenerating an identical image doesn't duplicate its bytes, but the
//!   entry takes on the newest prompt and timestamp
//! - Image URLs stay stable for the lifetime of the session

use std::io::Cursor;

use chrono::{DateTime, Utc};
use image::{DynamicImage, ImageFormat};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::GeneratedImage;

/// Most history thumbnails shown next to the latest image
pub const MAX_THUMBNAILS: usize = 6;

/// Image data held by the gallery
#[derive(Debug, Clone)]
pub struct ImageData {
    pub hash: String,
    pub data: Vec<u8>,
    pub mime_type: String,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
}

impl ImageData {
    /// Attachment name offered for download
    pub fn download_filename(&self) -> String {
        format!(
            "ai_family_memory_{}.png",
            self.created_at.format("%Y%m%d_%H%M%S")
        )
    }

    pub fn summary(&self) -> ImageSummary {
        ImageSummary {
            hash: self.hash.clone(),
            prompt: self.prompt.clone(),
            created_at: self.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            size_bytes: self.data.len(),
        }
    }
}

/// Serializable image metadata
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ImageSummary {
    pub hash: String,
    pub prompt: String,
    pub created_at: String,
    pub size_bytes: usize,
}

/// Content-addressed images, oldest first
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    images: Vec<ImageData>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute SHA-256 hash of data
    fn compute_hash(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        format!("{:x}", hasher.finalize())
    }

    /// Encode an image as PNG
    pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png)?;
        Ok(bytes.into_inner())
    }

    /// Add a generated image, returning the stored entry
    ///
    /// Storing an image already present moves it to the latest position and
    /// replaces its prompt and timestamp with the new generation's.
    pub fn store(&mut self, generated: &GeneratedImage) -> Result<&ImageData, image::ImageError> {
        let data = Self::encode_png(&generated.image)?;
        let hash = Self::compute_hash(&data);

        let entry = match self.images.iter().position(|img| img.hash == hash) {
            Some(pos) => {
                debug!("Image {} already in gallery, moved to latest", hash);
                let mut existing = self.images.remove(pos);
                existing.prompt = generated.prompt.clone();
                existing.created_at = generated.created_at;
                existing
            }
            None => {
                debug!("Stored image with hash {} ({} bytes)", hash, data.len());
                ImageData {
                    hash,
                    data,
                    mime_type: "image/png".to_string(),
                    prompt: generated.prompt.clone(),
                    created_at: generated.created_at,
                }
            }
        };
        self.images.push(entry);
        Ok(&self.images[self.images.len() - 1])
    }

    /// Get image by hash
    pub fn get(&self, hash: &str) -> Option<&ImageData> {
        self.images.iter().find(|img| img.hash == hash)
    }

    pub fn latest(&self) -> Option<&ImageData> {
        self.images.last()
    }

    /// Up to `MAX_THUMBNAILS` images preceding the latest, oldest first
    pub fn thumbnails(&self) -> &[ImageData] {
        let before_latest = self.images.len().saturating_sub(1);
        let start = before_latest.saturating_sub(MAX_THUMBNAILS);
        &self.images[start..before_latest]
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn clear(&mut self) {
        self.images.clear();
    }
}
