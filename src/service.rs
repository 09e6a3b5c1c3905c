//! Analysis and download orchestration shared by the basic and Pro APIs

use crate::client::{HeaderProfile, HttpClient};
use crate::config::ScraperConfig;
use crate::downloader::{sanitize_title, DownloadManager, DownloadResult};
use crate::error::{Result, ScraperError};
use crate::extractor::youtube::select_format;
use crate::extractor::{
    ExtractorRegistry, GenericExtractor, InstagramExtractor, MediaInfo, SiteExtractor,
    TikTokExtractor, TranscriptEntry, YouTubeExtractor,
};
use crate::platform::Platform;
use crate::storage::MediaStore;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument};

/// A finished download, ready to hand back to a client
#[derive(Debug, Clone, Serialize)]
pub struct DownloadOutcome {
    pub filename: String,
    pub download_url: String,
    pub filesize: u64,
    pub title: String,
    pub platform: Platform,
    pub thumbnail: Option<String>,
    pub duration_secs: Option<f64>,
    #[serde(skip)]
    pub path: PathBuf,
    pub sha256_hash: String,
}

impl DownloadOutcome {
    fn from_result(result: DownloadResult, info: &MediaInfo) -> Self {
        Self {
            download_url: format!("/api/file/{}", result.filename),
            filename: result.filename,
            filesize: result.size_bytes,
            title: info.title.clone(),
            platform: info.platform,
            thumbnail: info.thumbnail.clone(),
            duration_secs: info.duration_secs,
            path: result.path,
            sha256_hash: result.sha256_hash,
        }
    }
}

/// Platform extractors wired to one shared HTTP client
pub struct Extractors {
    pub youtube: Arc<YouTubeExtractor>,
    pub tiktok: Arc<TikTokExtractor>,
    pub instagram: Arc<InstagramExtractor>,
    pub generic: Arc<GenericExtractor>,
}

impl Extractors {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self {
            youtube: Arc::new(YouTubeExtractor::new(client.clone())),
            tiktok: Arc::new(TikTokExtractor::new(client.clone())),
            instagram: Arc::new(InstagramExtractor::new(client.clone())),
            generic: Arc::new(GenericExtractor::new(client)),
        }
    }
}

pub struct VideoService {
    registry: ExtractorRegistry,
    youtube: Arc<YouTubeExtractor>,
    tiktok: Arc<TikTokExtractor>,
    instagram: Arc<InstagramExtractor>,
    downloader: DownloadManager,
    store: MediaStore,
}

impl VideoService {
    pub fn new(config: &ScraperConfig, store: MediaStore) -> Result<Self> {
        let client = Arc::new(HttpClient::new(config)?);
        let extractors = Extractors::new(client.clone());
        Ok(Self::with_extractors(client, extractors, store))
    }

    /// Assemble from prebuilt extractors (alternate hosts, test fixtures)
    pub fn with_extractors(client: Arc<HttpClient>, extractors: Extractors, store: MediaStore) -> Self {
        let downloader = DownloadManager::new(client.clone(), client.config());
        let registry = ExtractorRegistry::with_extractors(
            vec![
                extractors.youtube.clone() as Arc<dyn SiteExtractor>,
                extractors.tiktok.clone() as Arc<dyn SiteExtractor>,
                extractors.instagram.clone() as Arc<dyn SiteExtractor>,
            ],
            extractors.generic,
        );

        Self {
            registry,
            youtube: extractors.youtube,
            tiktok: extractors.tiktok,
            instagram: extractors.instagram,
            downloader,
            store,
        }
    }

    pub fn store(&self) -> &MediaStore {
        &self.store
    }

    #[instrument(skip(self))]
    pub async fn analyze(&self, url: &str) -> Result<MediaInfo> {
        self.registry.analyze(url).await
    }

    /// Fetch the media behind `url` into the store.
    ///
    /// `quality` and `format_type` only matter for YouTube, where several
    /// streams are offered; TikTok and Instagram hand out a single file.
    #[instrument(skip(self))]
    pub async fn download(&self, url: &str, quality: &str, format_type: &str) -> Result<DownloadOutcome> {
        let platform = Platform::detect(url);
        let dir = self.store.dir();

        let (info, result) = match platform {
            Platform::YouTube => {
                let info = self.youtube.extract(url).await?;
                let format = select_format(&info.formats, quality, format_type)
                    .ok_or_else(|| ScraperError::BadRequest("No suitable stream found".to_string()))?;
                let media_url = format
                    .url
                    .as_deref()
                    .ok_or_else(|| ScraperError::BadRequest("No suitable stream found".to_string()))?;
                let prefix = sanitize_title(&info.title);
                let result = self
                    .downloader
                    .download(media_url, dir, &prefix, &format.ext, HeaderProfile::Desktop)
                    .await?;
                (info, result)
            }
            Platform::TikTok => {
                let info = self.tiktok.extract(url).await?;
                let media_url = required_media_url(&info)?;
                let result = self
                    .downloader
                    .download(&media_url, dir, "tiktok", "mp4", HeaderProfile::TikTokMedia)
                    .await?;
                (info, result)
            }
            Platform::Instagram => {
                let info = self.instagram.extract(url).await?;
                let media_url = required_media_url(&info)?;
                let result = self
                    .downloader
                    .download(&media_url, dir, "instagram", "mp4", HeaderProfile::InstagramMedia)
                    .await?;
                (info, result)
            }
            other => return Err(ScraperError::UnsupportedPlatform(other.to_string())),
        };

        info!(
            "Stored {} video {:?} as {} ({} bytes)",
            platform, info.title, result.filename, result.size_bytes
        );
        Ok(DownloadOutcome::from_result(result, &info))
    }

    /// Caption track of a YouTube video
    pub async fn transcript(&self, url: &str) -> Result<Vec<TranscriptEntry>> {
        self.youtube.transcript(url).await
    }

    /// Path of a previously downloaded file; rejects anything but a bare name
    pub async fn resolve_file(&self, name: &str) -> Result<PathBuf> {
        self.store.resolve(name).await
    }

    pub fn active_downloads(&self) -> u64 {
        self.downloader.active_downloads()
    }
}

fn required_media_url(info: &MediaInfo) -> Result<String> {
    info.video_url.clone().ok_or_else(|| {
        ScraperError::ExtractionFailed("Could not find video download URL".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::MediaFormat;

    fn service(dir: &std::path::Path) -> VideoService {
        VideoService::new(&ScraperConfig::default(), MediaStore::new(dir)).unwrap()
    }

    #[tokio::test]
    async fn test_download_rejects_unsupported_platform() {
        let dir = tempfile::tempdir().unwrap();
        let err = service(dir.path())
            .download("https://twitter.com/a/status/1", "default", "video")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Platform twitter not yet supported");
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_resolve_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a_12345678.mp4"), b"x").unwrap();
        let svc = service(dir.path());

        assert!(svc.resolve_file("a_12345678.mp4").await.is_ok());
        assert!(matches!(
            svc.resolve_file("../a_12345678.mp4").await,
            Err(ScraperError::NotFound(_))
        ));
    }

    #[test]
    fn test_required_media_url() {
        let mut info = MediaInfo::new(Platform::TikTok, "u", "t");
        assert!(matches!(required_media_url(&info), Err(ScraperError::ExtractionFailed(_))));
        info.video_url = Some("https://cdn/v.mp4".into());
        info.formats = vec![MediaFormat::default_mp4(info.video_url.clone())];
        assert_eq!(required_media_url(&info).unwrap(), "https://cdn/v.mp4");
    }
}
