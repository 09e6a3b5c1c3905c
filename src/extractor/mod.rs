//! Per-platform metadata and media URL extraction
//!
//! Each platform extractor tries several strategies in order and falls back
//! to less detailed data when the platform's markup does not cooperate.

pub mod generic;
pub mod instagram;
pub mod json;
pub mod tiktok;
pub mod youtube;

use crate::client::HttpClient;
use crate::error::Result;
use crate::platform::Platform;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use generic::GenericExtractor;
pub use instagram::InstagramExtractor;
pub use tiktok::TikTokExtractor;
pub use youtube::{TranscriptEntry, YouTubeExtractor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

/// One fetchable encoding of a video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaFormat {
    pub format_id: String,
    pub url: Option<String>,
    pub ext: String,
    pub mime_type: Option<String>,
    pub quality: Option<String>,
    pub kind: MediaKind,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<u32>,
    pub filesize: Option<u64>,
    pub bitrate: Option<u64>,
    pub has_audio: bool,
    pub has_video: bool,
}

impl MediaFormat {
    /// The single muxed mp4 TikTok and Instagram hand out
    pub fn default_mp4(url: Option<String>) -> Self {
        Self {
            format_id: "default".to_string(),
            url,
            ext: "mp4".to_string(),
            mime_type: Some("video/mp4".to_string()),
            quality: Some("default".to_string()),
            kind: MediaKind::Video,
            width: None,
            height: None,
            fps: None,
            filesize: None,
            bitrate: None,
            has_audio: true,
            has_video: true,
        }
    }

    /// Placeholder quality row for platforms we only know by name
    pub fn placeholder(quality: &str) -> Self {
        Self {
            format_id: quality.to_string(),
            quality: Some(quality.to_string()),
            mime_type: None,
            ..Self::default_mp4(None)
        }
    }

    pub fn is_progressive(&self) -> bool {
        self.has_audio && self.has_video
    }
}

/// Presentation metadata for one video, plus the direct media URL when found
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    pub platform: Platform,
    pub source_url: String,
    pub video_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub thumbnail: Option<String>,
    pub duration_secs: Option<f64>,
    pub view_count: Option<u64>,
    pub keywords: Vec<String>,
    pub publish_date: Option<String>,
    pub video_url: Option<String>,
    pub formats: Vec<MediaFormat>,
    pub transcript_available: bool,
    pub transcript_languages: Vec<String>,
    pub warning: Option<String>,
    pub note: Option<String>,
}

impl MediaInfo {
    pub fn new(platform: Platform, source_url: &str, title: impl Into<String>) -> Self {
        Self {
            platform,
            source_url: source_url.to_string(),
            video_id: None,
            title: title.into(),
            description: None,
            author: None,
            thumbnail: None,
            duration_secs: None,
            view_count: None,
            keywords: Vec::new(),
            publish_date: None,
            video_url: None,
            formats: Vec::new(),
            transcript_available: false,
            transcript_languages: Vec::new(),
            warning: None,
            note: None,
        }
    }
}

/// Site-specific extractor
#[async_trait]
pub trait SiteExtractor: Send + Sync {
    fn platform(&self) -> Platform;

    fn can_handle(&self, url: &str) -> bool {
        Platform::detect(url) == self.platform()
    }

    async fn extract(&self, url: &str) -> Result<MediaInfo>;
}

/// Dispatches a URL to the extractor for its platform
pub struct ExtractorRegistry {
    extractors: Vec<Arc<dyn SiteExtractor>>,
    generic: Arc<GenericExtractor>,
}

impl ExtractorRegistry {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self::with_extractors(
            vec![
                Arc::new(YouTubeExtractor::new(client.clone())),
                Arc::new(TikTokExtractor::new(client.clone())),
                Arc::new(InstagramExtractor::new(client.clone())),
            ],
            Arc::new(GenericExtractor::new(client)),
        )
    }

    pub fn with_extractors(
        extractors: Vec<Arc<dyn SiteExtractor>>,
        generic: Arc<GenericExtractor>,
    ) -> Self {
        Self { extractors, generic }
    }

    /// Dedicated extractor for this URL, if the platform has one
    pub fn for_url(&self, url: &str) -> Option<Arc<dyn SiteExtractor>> {
        self.extractors.iter().find(|e| e.can_handle(url)).cloned()
    }

    /// Analyze with the platform extractor, or best-effort generic scan
    pub async fn analyze(&self, url: &str) -> Result<MediaInfo> {
        match self.for_url(url) {
            Some(extractor) => extractor.extract(url).await,
            None => self.generic.extract(url).await,
        }
    }
}
