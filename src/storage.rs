//! Local directory that downloaded media is written to and served from

use crate::error::{Result, ScraperError};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tracing::{debug, info};

/// An opened media file, ready to be streamed out
#[derive(Debug)]
pub struct MediaFile {
    pub file: File,
    pub size_bytes: u64,
}

/// Flat media directory. Names handed to it come from URLs, so anything
/// that could step outside the directory is refused.
#[derive(Debug, Clone)]
pub struct MediaStore {
    base_path: PathBuf,
}

impl MediaStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.base_path
    }

    pub async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.base_path).await?;
        info!("Serving media from {}", self.base_path.display());
        Ok(())
    }

    /// Path of an existing file in the store
    pub async fn resolve(&self, name: &str) -> Result<PathBuf> {
        if !is_safe_name(name) {
            debug!("Rejected unsafe file name {:?}", name);
            return Err(ScraperError::NotFound("File not found".to_string()));
        }

        let path = self.base_path.join(name);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => Err(ScraperError::NotFound("File not found".to_string())),
        }
    }

    /// Open a stored file for streaming
    pub async fn open(&self, name: &str) -> Result<MediaFile> {
        let path = self.resolve(name).await?;
        let file = File::open(&path).await?;
        let size_bytes = file.metadata().await?.len();
        Ok(MediaFile { file, size_bytes })
    }
}

fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains("..")
        && !name.contains('\0')
}
