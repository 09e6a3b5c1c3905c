//! Streaming media downloads into the serving directory

use crate::client::{HeaderProfile, HttpClient};
use crate::config::ScraperConfig;
use crate::error::{Result, ScraperError};
use futures::stream::StreamExt;
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

const MAX_TITLE_CHARS: usize = 50;

static UNSAFE_TITLE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("static title pattern"));

/// Result of a completed download
#[derive(Debug, Clone, Serialize)]
pub struct DownloadResult {
    pub url: String,
    pub filename: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub sha256_hash: String,
    pub duration_secs: f64,
}

/// Make a video title usable as a filename prefix: keep word characters,
/// whitespace and `-`, cut to 50 characters.
pub fn sanitize_title(title: &str) -> String {
    let cleaned = UNSAFE_TITLE_CHARS.replace_all(title, "");
    let truncated: String = cleaned.chars().take(MAX_TITLE_CHARS).collect();
    let trimmed = truncated.trim();
    if trimmed.is_empty() {
        "video".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `<prefix>_<8 hex>.<ext>`
pub fn unique_filename(prefix: &str, ext: &str) -> String {
    let simple = Uuid::new_v4().simple().to_string();
    format!("{}_{}.{}", prefix, &simple[..8], ext)
}

/// Download manager with bounded concurrency
#[derive(Clone)]
pub struct DownloadManager {
    client: Arc<HttpClient>,
    config: ScraperConfig,
    semaphore: Arc<Semaphore>,
    active_downloads: Arc<AtomicU64>,
}

impl DownloadManager {
    pub fn new(client: Arc<HttpClient>, config: &ScraperConfig) -> Self {
        Self {
            client,
            config: config.clone(),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_downloads.max(1))),
            active_downloads: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Stream `url` into `dir/<prefix>_<8 hex>.<ext>`
    pub async fn download(
        &self,
        url: &str,
        dir: &Path,
        prefix: &str,
        ext: &str,
        profile: HeaderProfile,
    ) -> Result<DownloadResult> {
        let _permit = self.semaphore.acquire().await.map_err(|_| {
            ScraperError::DownloadFailed {
                attempts: 0,
                message: "Semaphore closed".to_string(),
            }
        })?;

        fs::create_dir_all(dir).await?;
        let filename = unique_filename(prefix, ext);
        let path = dir.join(&filename);

        self.active_downloads.fetch_add(1, Ordering::SeqCst);
        let result = self.download_internal(url, &path, profile).await;
        self.active_downloads.fetch_sub(1, Ordering::SeqCst);

        match result {
            Ok((size_bytes, sha256_hash, duration_secs)) => {
                info!("Downloaded {} ({} bytes) to {}", url, size_bytes, path.display());
                Ok(DownloadResult {
                    url: url.to_string(),
                    filename,
                    path,
                    size_bytes,
                    sha256_hash,
                    duration_secs,
                })
            }
            Err(e) => {
                warn!("Download of {} failed: {}", url, e);
                if let Err(cleanup) = fs::remove_file(&path).await {
                    debug!("No partial file to remove at {}: {}", path.display(), cleanup);
                }
                Err(e)
            }
        }
    }

    async fn download_internal(
        &self,
        url: &str,
        path: &Path,
        profile: HeaderProfile,
    ) -> Result<(u64, String, f64)> {
        let start_time = std::time::Instant::now();
        let limit = self.config.max_file_size_bytes;

        if limit > 0 {
            if let Some(length) = self.client.get_content_length(url, profile).await? {
                if length > limit {
                    return Err(ScraperError::FileTooLarge {
                        size_bytes: length,
                        limit_bytes: limit,
                    });
                }
            }
        }

        let response = self.client.get_media(url, profile).await?;

        let mut file = File::create(path).await?;
        let mut hasher = Sha256::new();
        let mut downloaded = 0u64;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk?;
            downloaded += bytes.len() as u64;
            if limit > 0 && downloaded > limit {
                return Err(ScraperError::FileTooLarge {
                    size_bytes: downloaded,
                    limit_bytes: limit,
                });
            }
            file.write_all(&bytes).await?;
            hasher.update(&bytes);
        }

        file.flush().await?;
        debug!("Streamed {} bytes from {}", downloaded, url);

        Ok((
            downloaded,
            hex::encode(hasher.finalize()),
            start_time.elapsed().as_secs_f64(),
        ))
    }

    /// Number of downloads currently streaming
    pub fn active_downloads(&self) -> u64 {
        self.active_downloads.load(Ordering::SeqCst)
    }
}
