//! Disk storage for uploaded images.
//!
//! Raw uploads keep their extension under a unique name. Images that are
//! converted are resized (cover crop) and re-encoded as lossless WebP.

use crate::services::error::StoreError;
use chrono::Utc;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use rand::Rng;
use std::io::Cursor;
use std::path::{Path, PathBuf};

pub const ALLOWED_EXTENSIONS: [&str; 5] = ["webp", "jpeg", "jpg", "png", "gif"];

pub const INVALID_FILE_TYPE: &str =
    "Invalid file type. Only webp, jpeg, jpg, png, gif are allowed.";

/// Target box for the about-us photo.
pub const ABOUT_PHOTO_DIMENSIONS: (u32, u32) = (430, 231);

#[derive(Clone, Debug)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::Internal(anyhow::anyhow!("Failed to create upload dir: {}", e)))
    }

    /// Stores an upload as-is and returns the generated file name.
    pub async fn save_original(&self, original_name: &str, data: &[u8]) -> Result<String, StoreError> {
        let ext = allowed_extension(original_name)
            .ok_or_else(|| StoreError::Invalid(INVALID_FILE_TYPE.to_string()))?;

        let filename = format!("{}.{}", unique_stem(), ext);
        self.write(&filename, data).await?;
        tracing::debug!(filename = %filename, bytes = data.len(), "Upload stored");
        Ok(filename)
    }

    /// Decodes, optionally resizes, and writes `{stem}.webp`. A random stem is used when none is given.
    pub async fn save_webp(
        &self,
        data: Vec<u8>,
        stem: Option<&str>,
        dimensions: Option<(u32, u32)>,
    ) -> Result<String, StoreError> {
        let stem = match stem {
            Some(s) if is_safe_stem(s) => s.to_string(),
            Some(s) => return Err(StoreError::Invalid(format!("Invalid image name: {}", s))),
            None => unique_stem(),
        };

        let encoded = tokio::task::spawn_blocking(move || encode_webp(&data, dimensions))
            .await
            .map_err(|e| StoreError::Internal(e.into()))??;

        let filename = format!("{}.webp", stem);
        self.write(&filename, &encoded).await?;
        tracing::info!(filename = %filename, bytes = encoded.len(), "WebP image stored");
        Ok(filename)
    }

    async fn write(&self, filename: &str, data: &[u8]) -> Result<(), StoreError> {
        self.ensure_dir().await?;
        tokio::fs::write(self.dir.join(filename), data)
            .await
            .map_err(|e| StoreError::Internal(anyhow::anyhow!("Failed to write {}: {}", filename, e)))
    }
}

/// Lower-cased extension when it is one of the accepted image types.
pub fn allowed_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

fn unique_stem() -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!("{}-{}", Utc::now().timestamp_millis(), suffix)
}

fn is_safe_stem(stem: &str) -> bool {
    !stem.is_empty()
        && stem
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
}

fn encode_webp(data: &[u8], dimensions: Option<(u32, u32)>) -> Result<Vec<u8>, StoreError> {
    let img = image::load_from_memory(data)
        .map_err(|e| StoreError::Invalid(format!("Invalid image: {}", e)))?;

    let img = match dimensions {
        Some((width, height)) => img.resize_to_fill(width, height, FilterType::Lanczos3),
        None => img,
    };

    let mut buffer = Vec::new();
    {
        let mut cursor = Cursor::new(&mut buffer);
        let rgba = img.to_rgba8();
        rgba.write_with_encoder(WebPEncoder::new_lossless(&mut cursor))
            .map_err(|e| StoreError::Internal(anyhow::anyhow!("WebP encoding failed: {}", e)))?;
    }
    Ok(buffer)
}
