//! Instagram post/reel extraction: post page, embed page, then oEmbed

use super::generic::scan_html;
use super::json::{
    all_balanced_json_after, capture_json_string, decode_json_string, find_video_object,
    truncate_with_ellipsis,
};
use super::{MediaFormat, MediaInfo, SiteExtractor};
use crate::client::{HeaderProfile, HttpClient};
use crate::error::{Result, ScraperError};
use crate::platform::Platform;
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};
use url::Url;

const DEFAULT_BASE_URL: &str = "https://www.instagram.com";
const DEFAULT_TITLE: &str = "Instagram Video";
const MAX_CAPTION_CHARS: usize = 100;

static SHORTCODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:instagram\.com|instagr\.am)/(?:p|reels?|tv)/([A-Za-z0-9_-]+)")
        .expect("static shortcode pattern")
});
static VIDEO_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""video_url":"([^"]+)""#).expect("static pattern"));
static VIDEO_URL_CAMEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""videoUrl":"([^"]+)""#).expect("static pattern"));
static CONTENT_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"contentUrl":"([^"]+\.mp4[^"]*)""#).expect("static pattern"));
static CAPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""caption":"((?:[^"\\]|\\.)*)""#).expect("static pattern"));
static SRC_MP4_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"src="([^"]*\.mp4[^"]*)""#).expect("static pattern"));

const STATE_MARKERS: &[&str] = &[
    "window._sharedData",
    "window.__additionalDataLoaded(",
    "\"gql_data\":",
];

/// A normalized Instagram link
#[derive(Debug, Clone, PartialEq)]
pub struct CleanUrl {
    /// Canonical `https://www.instagram.com/p/CODE/` or the query-less input
    pub url: String,
    pub shortcode: Option<String>,
}

/// Normalize post, reel and tv links to `/p/CODE/`; strip the query from
/// anything else (stories, profiles).
pub fn clean_url(url: &str) -> Result<CleanUrl> {
    let lower = url.to_lowercase();
    if !lower.contains("instagram.com") && !lower.contains("instagr.am") {
        return Err(ScraperError::InvalidUrl("Invalid Instagram URL".to_string()));
    }

    if let Some(code) = SHORTCODE_RE.captures(url).and_then(|c| c.get(1)) {
        return Ok(CleanUrl {
            url: format!("{}/p/{}/", DEFAULT_BASE_URL, code.as_str()),
            shortcode: Some(code.as_str().to_string()),
        });
    }

    let stripped = url.split('?').next().unwrap_or(url);
    Ok(CleanUrl {
        url: stripped.to_string(),
        shortcode: None,
    })
}

#[derive(Debug, Clone, Copy)]
enum Strategy {
    Page,
    Embed,
    OEmbed,
}

impl Strategy {
    fn name(&self) -> &'static str {
        match self {
            Strategy::Page => "page",
            Strategy::Embed => "embed",
            Strategy::OEmbed => "oEmbed",
        }
    }
}

pub struct InstagramExtractor {
    client: Arc<HttpClient>,
    base_url: String,
}

impl InstagramExtractor {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: Arc<HttpClient>, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn normalize(&self, url: &str) -> Result<CleanUrl> {
        let cleaned = clean_url(url)?;
        if cleaned.shortcode.is_none() && Platform::is_short_link(url) {
            let resolved = self
                .client
                .resolve_redirects(url, HeaderProfile::InstagramMobile)
                .await;
            return clean_url(&resolved);
        }
        Ok(cleaned)
    }

    fn page_url(&self, cleaned: &CleanUrl) -> String {
        match &cleaned.shortcode {
            Some(code) => format!("{}/p/{}/", self.base_url, code),
            None => cleaned.url.clone(),
        }
    }

    async fn from_page(&self, cleaned: &CleanUrl) -> Result<Option<MediaInfo>> {
        let html = self
            .client
            .get_text(&self.page_url(cleaned), HeaderProfile::InstagramMobile)
            .await?;
        Ok(parse_post_page(&html, &cleaned.url))
    }

    async fn from_embed(&self, cleaned: &CleanUrl) -> Result<Option<MediaInfo>> {
        let code = match &cleaned.shortcode {
            Some(code) => code,
            None => return Ok(None),
        };
        let embed_url = format!("{}/p/{}/embed/", self.base_url, code);
        let html = self
            .client
            .get_text(&embed_url, HeaderProfile::InstagramMobile)
            .await?;
        Ok(parse_embed_page(&html, &embed_url, &cleaned.url))
    }

    async fn from_oembed(&self, cleaned: &CleanUrl) -> Result<Option<MediaInfo>> {
        let oembed_url = Url::parse_with_params(
            &format!("{}/oembed/", self.base_url),
            &[("url", cleaned.url.as_str()), ("format", "json")],
        )?;
        let data: Value = self
            .client
            .get_json(oembed_url.as_str(), HeaderProfile::InstagramMobile)
            .await?;
        Ok(parse_oembed(&data, &cleaned.url))
    }
}

#[async_trait]
impl SiteExtractor for InstagramExtractor {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    async fn extract(&self, url: &str) -> Result<MediaInfo> {
        let cleaned = self.normalize(url).await?;
        debug!("Instagram URL normalized to {}", cleaned.url);

        for strategy in [Strategy::Page, Strategy::Embed, Strategy::OEmbed] {
            let attempt = match strategy {
                Strategy::Page => self.from_page(&cleaned).await,
                Strategy::Embed => self.from_embed(&cleaned).await,
                Strategy::OEmbed => self.from_oembed(&cleaned).await,
            };
            let name = strategy.name();
            match attempt {
                Ok(Some(mut info)) => {
                    info!("Instagram {} strategy found video for {}", name, cleaned.url);
                    info.source_url = url.to_string();
                    info.video_id = cleaned.shortcode.clone();
                    info.formats = vec![MediaFormat::default_mp4(info.video_url.clone())];
                    return Ok(info);
                }
                Ok(None) => warn!("Instagram {} strategy found no video for {}", name, cleaned.url),
                Err(e) => warn!("Instagram {} strategy failed for {}: {}", name, cleaned.url, e),
            }
        }

        Err(ScraperError::ExtractionFailed(
            "Could not extract video information from any method".to_string(),
        ))
    }
}

/// State blobs first, then bare `video_url`-style patterns
pub fn parse_post_page(html: &str, canonical_url: &str) -> Option<MediaInfo> {
    for marker in STATE_MARKERS {
        for raw in all_balanced_json_after(html, marker) {
            let data: Value = match serde_json::from_str(raw) {
                Ok(data) => data,
                Err(_) => continue,
            };
            if let Some(hit) = find_video_object(&data) {
                let mut info = MediaInfo::new(
                    Platform::Instagram,
                    canonical_url,
                    hit.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
                );
                info.video_url = Some(hit.video_url);
                info.thumbnail = hit.thumbnail;
                info.duration_secs = hit.duration_secs;
                return Some(info);
            }
        }
    }

    let video_url =
        capture_json_string(html, &[&*VIDEO_URL_RE, &*VIDEO_URL_CAMEL_RE, &*CONTENT_URL_RE])?;
    let title = capture_json_string(html, &[&*CAPTION_RE])
        .filter(|c| !c.is_empty())
        .map(|c| truncate_with_ellipsis(&c, MAX_CAPTION_CHARS))
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    let mut info = MediaInfo::new(Platform::Instagram, canonical_url, title);
    info.video_url = Some(video_url);
    Some(info)
}

pub fn parse_embed_page(html: &str, embed_url: &str, canonical_url: &str) -> Option<MediaInfo> {
    let scan = scan_html(html, embed_url);
    let video_url = capture_json_string(html, &[&*VIDEO_URL_RE]).or_else(|| {
        scan.media_urls
            .iter()
            .find(|u| u.contains(".mp4"))
            .cloned()
    })?;

    let mut info = MediaInfo::new(Platform::Instagram, canonical_url, DEFAULT_TITLE);
    info.video_url = Some(video_url);
    info.thumbnail = scan.thumbnail;
    Some(info)
}

pub fn parse_oembed(data: &Value, canonical_url: &str) -> Option<MediaInfo> {
    let html = data.get("html").and_then(Value::as_str)?;
    let video_url = SRC_MP4_RE.captures(html)?.get(1)?.as_str().to_string();

    let title = data
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_TITLE);
    let mut info = MediaInfo::new(Platform::Instagram, canonical_url, title);
    info.video_url = Some(decode_json_string(&video_url.replace("&amp;", "&")));
    info.thumbnail = data
        .get("thumbnail_url")
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(info)
}
