//! Best-effort extraction for pages without a dedicated extractor

use super::{MediaFormat, MediaInfo, SiteExtractor};
use crate::client::{HeaderProfile, HttpClient};
use crate::error::Result;
use crate::platform::Platform;
use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};
use url::Url;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mkv", "mov", "m4v", "m3u8", "mpd"];

static VIDEO_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Direct video file URLs
        r#"https?://[^\s"'<>]+\.(?:mp4|webm|mkv|mov|m4v)(?:\?[^\s"'<>]*)?"#,
        // HLS/DASH manifests
        r#"https?://[^\s"'<>]+\.(?:m3u8|mpd)(?:\?[^\s"'<>]*)?"#,
        // src/file/url assignments in inline scripts
        r#"(?:src|source|file|url|video_url|videoUrl|video-url)["']?\s*[:=]\s*["']?(https?://[^\s"'<>]+\.(?:mp4|webm|m3u8))"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static video pattern"))
    .collect()
});

/// What a plain HTML scan can tell about a page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageScan {
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub description: Option<String>,
    /// Media URLs in discovery order, absolute and de-duplicated
    pub media_urls: Vec<String>,
}

impl PageScan {
    pub fn first_media(&self) -> Option<&str> {
        self.media_urls.first().map(String::as_str)
    }
}

/// Scan `<video>`/`<source>` elements, media links, Open Graph tags and raw
/// URL patterns. Relative URLs are resolved against `page_url`.
pub fn scan_html(html: &str, page_url: &str) -> PageScan {
    let document = Html::parse_document(html);
    let mut scan = PageScan::default();
    let mut seen = HashSet::new();

    let mut push = |scan: &mut PageScan, raw: &str| {
        if let Some(resolved) = resolve_url(raw, page_url) {
            if seen.insert(resolved.clone()) {
                scan.media_urls.push(resolved);
            }
        }
    };

    if let Ok(meta) = Selector::parse("meta") {
        for el in document.select(&meta) {
            let property = el.value().attr("property").or_else(|| el.value().attr("name"));
            let content = el.value().attr("content");
            if let (Some(prop), Some(content)) = (property, content) {
                match prop {
                    "og:video" | "og:video:url" | "og:video:secure_url" | "twitter:player:stream" => {
                        push(&mut scan, content)
                    }
                    "og:title" | "twitter:title" if scan.title.is_none() => {
                        scan.title = Some(content.trim().to_string())
                    }
                    "og:image" | "twitter:image" if scan.thumbnail.is_none() => {
                        scan.thumbnail = resolve_url(content, page_url)
                    }
                    "og:description" | "description" if scan.description.is_none() => {
                        scan.description = Some(content.trim().to_string())
                    }
                    _ => {}
                }
            }
        }
    }

    if let (Ok(video_sel), Ok(source_sel)) = (Selector::parse("video"), Selector::parse("source")) {
        for video in document.select(&video_sel) {
            if let Some(src) = video.value().attr("src") {
                push(&mut scan, src);
            }
            if scan.thumbnail.is_none() {
                scan.thumbnail = video
                    .value()
                    .attr("poster")
                    .and_then(|p| resolve_url(p, page_url));
            }
            for source in video.select(&source_sel) {
                if let Some(src) = source.value().attr("src") {
                    push(&mut scan, src);
                }
            }
        }
    }

    if let Ok(links) = Selector::parse("a[href]") {
        for link in document.select(&links) {
            if let Some(href) = link.value().attr("href") {
                if is_video_url(href) {
                    push(&mut scan, href);
                }
            }
        }
    }

    for pattern in VIDEO_PATTERNS.iter() {
        for cap in pattern.captures_iter(html) {
            if let Some(m) = cap.get(1).or_else(|| cap.get(0)) {
                push(&mut scan, m.as_str());
            }
        }
    }

    if scan.title.is_none() {
        scan.title = Selector::parse("title").ok().and_then(|sel| {
            document
                .select(&sel)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
                .filter(|t| !t.is_empty())
        });
    }

    debug!("Scanned {}: {} media URLs", page_url, scan.media_urls.len());
    scan
}

fn resolve_url(url: &str, base: &str) -> Option<String> {
    if url.starts_with("http://") || url.starts_with("https://") {
        return Some(url.to_string());
    }
    if url.starts_with("//") {
        return Some(format!("https:{}", url));
    }
    Url::parse(base).ok()?.join(url).ok().map(|u| u.to_string())
}

fn is_video_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    let path = lower.split(['?', '#']).next().unwrap_or(&lower);
    VIDEO_EXTENSIONS
        .iter()
        .any(|ext| path.ends_with(&format!(".{}", ext)))
}

/// Extractor for Twitter, Facebook and unknown hosts. Never fails: when
/// the page cannot be read it answers with a placeholder description.
pub struct GenericExtractor {
    client: Arc<HttpClient>,
}

impl GenericExtractor {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    /// Placeholder analysis for platforms we only know by name
    pub fn stub(platform: Platform, url: &str) -> MediaInfo {
        let mut info = MediaInfo::new(
            platform,
            url,
            format!("{} Video", platform.display_name()),
        );
        info.formats = vec![MediaFormat::placeholder("480p"), MediaFormat::placeholder("720p")];
        info.note = Some(format!("Basic {} support available", platform.as_str()));
        info
    }

    async fn scan(&self, url: &str) -> Result<PageScan> {
        let html = self.client.get_text(url, HeaderProfile::Desktop).await?;
        Ok(scan_html(&html, url))
    }
}

#[async_trait]
impl SiteExtractor for GenericExtractor {
    fn platform(&self) -> Platform {
        Platform::Unknown
    }

    fn can_handle(&self, _url: &str) -> bool {
        true
    }

    async fn extract(&self, url: &str) -> Result<MediaInfo> {
        let platform = Platform::detect(url);
        let mut info = Self::stub(platform, url);

        match self.scan(url).await {
            Ok(scan) => {
                if let Some(title) = scan.title.clone() {
                    info.title = title;
                }
                info.thumbnail = scan.thumbnail.clone();
                info.description = scan.description.clone();
                info.video_url = scan.first_media().map(str::to_string);
                if let Some(media) = &info.video_url {
                    info.formats = vec![MediaFormat::default_mp4(Some(media.clone()))];
                }
                info!(
                    "Generic scan of {} found {} media URLs",
                    url,
                    scan.media_urls.len()
                );
            }
            Err(e) => warn!("Generic scan of {} failed, using placeholder: {}", url, e),
        }

        Ok(info)
    }
}
