//! TikTok extraction from the embedded page state
//!
//! TikTok has shipped its page state under three different script ids over
//! the years; all are tried before falling back to raw pattern matching.

use super::json::{capture_json_string, decode_json_string, loose_f64, pointer, script_json};
use super::{MediaFormat, MediaInfo, SiteExtractor};
use crate::client::{HeaderProfile, HttpClient};
use crate::error::{Result, ScraperError};
use crate::platform::Platform;
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

const DEFAULT_TITLE: &str = "TikTok Video";

/// Durations above this are milliseconds, not seconds
const DURATION_MS_THRESHOLD: f64 = 10_000.0;

static VIDEO_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/video/(\d+)").expect("static video id pattern"));
static DOWNLOAD_ADDR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""downloadAddr":"([^"]+)""#).expect("static pattern"));
static PLAY_ADDR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""playAddr":"([^"]+)""#).expect("static pattern"));
static DESC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""desc":"((?:[^"\\]|\\.)*)""#).expect("static pattern"));

pub struct TikTokExtractor {
    client: Arc<HttpClient>,
}

impl TikTokExtractor {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    /// Expand `vm.`/`vt.tiktok.com` links to the canonical video page
    pub async fn resolve_url(&self, url: &str) -> String {
        if Platform::is_short_link(url) {
            self.client
                .resolve_redirects(url, HeaderProfile::TikTokMobile)
                .await
        } else {
            url.to_string()
        }
    }
}

#[async_trait]
impl SiteExtractor for TikTokExtractor {
    fn platform(&self) -> Platform {
        Platform::TikTok
    }

    async fn extract(&self, url: &str) -> Result<MediaInfo> {
        let page_url = self.resolve_url(url).await;
        let html = self
            .client
            .get_text(&page_url, HeaderProfile::TikTokMobile)
            .await?;

        let mut info = parse_page(&html, &page_url)?;
        info.source_url = url.to_string();
        info!(
            "Extracted TikTok video {:?} from {}",
            info.video_id.as_deref().unwrap_or("?"),
            page_url
        );
        Ok(info)
    }
}

/// Run every strategy over a fetched page
pub fn parse_page(html: &str, page_url: &str) -> Result<MediaInfo> {
    let from_state = item_struct(html).map(|item| info_from_item(&item, page_url));

    let mut info = match from_state {
        Some(info) if info.video_url.is_some() => return Ok(with_default_format(info)),
        Some(info) => {
            debug!("TikTok item state has no media URL, trying patterns");
            info
        }
        None => MediaInfo::new(Platform::TikTok, page_url, DEFAULT_TITLE),
    };

    match scan_patterns(html) {
        Some((video_url, desc)) => {
            info.video_url = Some(video_url);
            if info.title == DEFAULT_TITLE {
                if let Some(desc) = desc.filter(|d| !d.is_empty()) {
                    info.title = desc;
                }
            }
            if info.video_id.is_none() {
                info.video_id = video_id(page_url);
            }
            Ok(with_default_format(info))
        }
        None if looks_like_challenge(html) => {
            warn!("TikTok served a verification page for {}", page_url);
            Err(ScraperError::Blocked(
                "TikTok requested a captcha or verification".to_string(),
            ))
        }
        None => Err(ScraperError::ExtractionFailed(
            "Could not extract video information".to_string(),
        )),
    }
}

fn with_default_format(mut info: MediaInfo) -> MediaInfo {
    info.formats = vec![MediaFormat::default_mp4(info.video_url.clone())];
    info
}

/// The `itemStruct` object from whichever state blob the page carries
fn item_struct(html: &str) -> Option<Value> {
    if let Some(next) = script_json(html, "__NEXT_DATA__") {
        if let Some(item) = pointer(&next, &["props", "pageProps", "itemInfo", "itemStruct"]) {
            debug!("TikTok item found in __NEXT_DATA__");
            return Some(item.clone());
        }
    }

    if let Some(universal) = script_json(html, "__UNIVERSAL_DATA_FOR_REHYDRATION__") {
        if let Some(item) = pointer(
            &universal,
            &["__DEFAULT_SCOPE__", "webapp.video-detail", "itemInfo", "itemStruct"],
        ) {
            debug!("TikTok item found in __UNIVERSAL_DATA_FOR_REHYDRATION__");
            return Some(item.clone());
        }
    }

    if let Some(sigi) = script_json(html, "SIGI_STATE") {
        if let Some(item) = sigi
            .get("ItemModule")
            .and_then(Value::as_object)
            .and_then(|items| items.values().next())
        {
            debug!("TikTok item found in SIGI_STATE");
            return Some(item.clone());
        }
    }

    None
}

fn info_from_item(item: &Value, page_url: &str) -> MediaInfo {
    let title = item
        .get("desc")
        .and_then(Value::as_str)
        .filter(|d| !d.is_empty())
        .unwrap_or(DEFAULT_TITLE);
    let mut info = MediaInfo::new(Platform::TikTok, page_url, title);

    info.video_id = item
        .get("id")
        .and_then(|id| match id {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .or_else(|| video_id(page_url));
    info.author = pointer(item, &["author", "uniqueId"])
        .or_else(|| item.get("author"))
        .and_then(Value::as_str)
        .map(str::to_string);

    if let Some(video) = item.get("video") {
        let addr = |key: &str| {
            video
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        info.video_url = addr("playAddr")
            .or_else(|| addr("downloadAddr"))
            .or_else(|| {
                video
                    .get("bitrateInfo")
                    .and_then(Value::as_array)
                    .and_then(|rates| rates.first())
                    .and_then(|rate| pointer(rate, &["PlayAddr", "UrlList"]))
                    .and_then(Value::as_array)
                    .and_then(|urls| urls.first())
                    .and_then(Value::as_str)
                    .map(str::to_string)
            });
        info.thumbnail = addr("cover").or_else(|| addr("originCover"));
        info.duration_secs = loose_f64(video.get("duration")).map(normalize_duration);
    }

    info
}

fn normalize_duration(raw: f64) -> f64 {
    if raw > DURATION_MS_THRESHOLD {
        raw / 1000.0
    } else {
        raw
    }
}

/// Pattern fallback: media URL (unescaped and percent-decoded) plus description
fn scan_patterns(html: &str) -> Option<(String, Option<String>)> {
    let raw = [&*DOWNLOAD_ADDR_RE, &*PLAY_ADDR_RE]
        .iter()
        .find_map(|re| re.captures(html))
        .and_then(|caps| caps.get(1))?
        .as_str();

    let unescaped = decode_json_string(raw);
    let video_url = urlencoding::decode(&unescaped)
        .map(|s| s.into_owned())
        .unwrap_or(unescaped);
    let desc = capture_json_string(html, &[&*DESC_RE]);

    Some((video_url, desc))
}

fn looks_like_challenge(html: &str) -> bool {
    let lower = html.to_lowercase();
    lower.contains("captcha") || lower.contains("verify-bar") || lower.contains("verify to continue")
}

pub fn video_id(url: &str) -> Option<String> {
    VIDEO_ID_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScraperConfig;
    use crate::test_support::spawn_fixture;
    use axum::response::{Html, Redirect};
    use axum::routing::get;
    use axum::Router;

    const PAGE_URL: &str = "https://www.tiktok.com/@creator/video/7234567890123456789";

    fn script(id: &str, body: &str) -> String {
        format!(
            r#"<html><body><script id="{}" type="application/json">{}</script></body></html>"#,
            id, body
        )
    }

    #[test]
    fn test_next_data() {
        let html = script(
            "__NEXT_DATA__",
            r#"{"props":{"pageProps":{"itemInfo":{"itemStruct":{
                "id":"7234567890123456789","desc":"dance clip",
                "author":{"uniqueId":"creator"},
                "video":{"playAddr":"https://v16.tiktokcdn.com/play.mp4","cover":"https://p16.tiktokcdn.com/c.jpg","duration":15}
            }}}}}"#,
        );
        let info = parse_page(&html, PAGE_URL).unwrap();
        assert_eq!(info.title, "dance clip");
        assert_eq!(info.video_url.as_deref(), Some("https://v16.tiktokcdn.com/play.mp4"));
        assert_eq!(info.thumbnail.as_deref(), Some("https://p16.tiktokcdn.com/c.jpg"));
        assert_eq!(info.duration_secs, Some(15.0));
        assert_eq!(info.author.as_deref(), Some("creator"));
        assert_eq!(info.video_id.as_deref(), Some("7234567890123456789"));
        assert_eq!(info.formats.len(), 1);
        assert_eq!(info.formats[0].quality.as_deref(), Some("default"));
    }

    #[test]
    fn test_universal_data_with_millisecond_duration() {
        let html = script(
            "__UNIVERSAL_DATA_FOR_REHYDRATION__",
            r#"{"__DEFAULT_SCOPE__":{"webapp.video-detail":{"itemInfo":{"itemStruct":{
                "id":"1","desc":"",
                "video":{"downloadAddr":"https://v19.tiktokcdn.com/dl.mp4","duration":15300}
            }}}}}"#,
        );
        let info = parse_page(&html, PAGE_URL).unwrap();
        assert_eq!(info.title, DEFAULT_TITLE);
        assert_eq!(info.video_url.as_deref(), Some("https://v19.tiktokcdn.com/dl.mp4"));
        assert_eq!(info.duration_secs, Some(15.3));
    }

    #[test]
    fn test_sigi_state_bitrate_info() {
        let html = script(
            "SIGI_STATE",
            r#"{"ItemModule":{"99":{"id":"99","desc":"sigi",
                "video":{"bitrateInfo":[{"PlayAddr":{"UrlList":["https://v77.tiktokcdn.com/br.mp4"]}}]}}}}"#,
        );
        let info = parse_page(&html, PAGE_URL).unwrap();
        assert_eq!(info.title, "sigi");
        assert_eq!(info.video_url.as_deref(), Some("https://v77.tiktokcdn.com/br.mp4"));
    }

    #[test]
    fn test_pattern_fallback_decodes_url() {
        let html = r#"<script>window.x = {"desc":"pattern \"clip\"","downloadAddr":"https://v16.tiktokcdn.com/a.mp4?sig=a%3Db&x=1"}</script>"#;
        let info = parse_page(html, PAGE_URL).unwrap();
        assert_eq!(
            info.video_url.as_deref(),
            Some("https://v16.tiktokcdn.com/a.mp4?sig=a=b&x=1")
        );
        assert_eq!(info.title, "pattern \"clip\"");
        assert_eq!(info.video_id.as_deref(), Some("7234567890123456789"));
    }

    #[test]
    fn test_state_without_url_merges_pattern_result() {
        let html = format!(
            "{}<script>var extra = {{\"playAddr\":\"https://v16.tiktokcdn.com/late.mp4\"}}</script>",
            script(
                "__NEXT_DATA__",
                r#"{"props":{"pageProps":{"itemInfo":{"itemStruct":{"id":"5","desc":"kept title","video":{}}}}}}"#
            )
        );
        let info = parse_page(&html, PAGE_URL).unwrap();
        assert_eq!(info.title, "kept title");
        assert_eq!(info.video_id.as_deref(), Some("5"));
        assert_eq!(info.video_url.as_deref(), Some("https://v16.tiktokcdn.com/late.mp4"));
    }

    #[test]
    fn test_nothing_found() {
        let err = parse_page("<html><body>hello</body></html>", PAGE_URL).unwrap_err();
        assert!(matches!(err, ScraperError::ExtractionFailed(_)));
        assert_eq!(err.to_string(), "Extraction failed: Could not extract video information");
    }

    #[test]
    fn test_captcha_page_is_blocked() {
        let html = r#"<html><div class="captcha_verify_container">Verify to continue</div></html>"#;
        assert!(matches!(parse_page(html, PAGE_URL), Err(ScraperError::Blocked(_))));
    }

    #[test]
    fn test_challenge_markers() {
        assert!(looks_like_challenge(r#"<div id="verify-bar-close"></div>"#));
        assert!(looks_like_challenge("<p>Please VERIFY TO CONTINUE</p>"));
        assert!(looks_like_challenge("<script src=\"/captcha.js\"></script>"));
        assert!(!looks_like_challenge("<p>Verify your account settings</p>"));
    }

    #[tokio::test]
    async fn test_resolve_url_keeps_canonical_links() {
        let config = ScraperConfig::default();
        let extractor = TikTokExtractor::new(Arc::new(HttpClient::new(&config).unwrap()));
        assert_eq!(extractor.resolve_url(PAGE_URL).await, PAGE_URL);
    }

    #[test]
    fn test_video_id() {
        assert_eq!(video_id(PAGE_URL).as_deref(), Some("7234567890123456789"));
        assert_eq!(video_id("https://vm.tiktok.com/ZNdavRDxy/"), None);
    }

    #[tokio::test]
    async fn test_extract_follows_http_redirect_to_video_page() {
        let page = script(
            "__NEXT_DATA__",
            r#"{"props":{"pageProps":{"itemInfo":{"itemStruct":{"id":"42","desc":"via fixture","video":{"playAddr":"https://v16.tiktokcdn.com/f.mp4"}}}}}}"#,
        );
        let app = Router::new()
            .route("/t/short", get(|| async { Redirect::temporary("/@u/video/42") }))
            .route("/@u/video/42", get(move || async move { Html(page) }));
        let base = spawn_fixture(app).await;

        let config = ScraperConfig {
            max_retries: 1,
            rate_limit_per_second: 1000.0,
            ..Default::default()
        };
        let extractor = TikTokExtractor::new(Arc::new(HttpClient::new(&config).unwrap()));
        let url = format!("{}/t/short", base);
        let info = extractor.extract(&url).await.unwrap();
        assert_eq!(info.title, "via fixture");
        assert_eq!(info.source_url, url);
        assert_eq!(info.video_url.as_deref(), Some("https://v16.tiktokcdn.com/f.mp4"));
    }
}
