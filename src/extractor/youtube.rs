//! YouTube extraction: watch page player response, then oEmbed, then a stub

use super::json::{all_balanced_json_after, loose_f64, loose_u64, pointer, truncate_with_ellipsis};
use super::{MediaFormat, MediaInfo, MediaKind, SiteExtractor};
use crate::client::{HeaderProfile, HttpClient};
use crate::error::{Result, ScraperError};
use crate::platform::Platform;
use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};
use url::Url;

const DEFAULT_BASE_URL: &str = "https://www.youtube.com";
const MAX_DESCRIPTION_CHARS: usize = 500;
const MAX_KEYWORDS: usize = 10;

const INVALID_URL_MESSAGE: &str =
    "Invalid YouTube URL. Please make sure the URL is correct and contains a valid video ID.";
const LIMITED_INFO_WARNING: &str = "Limited information available due to YouTube API restrictions. Download functionality may be affected.";
const NO_INFO_WARNING: &str = "Video information unavailable due to YouTube API restrictions.";
const BLOCKED_MESSAGE: &str = "YouTube is currently blocking video analysis requests. This is a known issue with YouTube's recent changes. Please try again later or use a different video.";

static VIDEO_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:youtube(?:-nocookie)?\.com/(?:watch\?(?:[^#]*?&)?v=|embed/|v/|shorts/)|youtu\.be/)([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
    )
    .expect("static video id pattern")
});

/// Extract the 11-character video id from any of the usual URL shapes
pub fn extract_video_id(url: &str) -> Option<String> {
    VIDEO_ID_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// One line of a caption track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

#[derive(Debug, Clone)]
pub struct CaptionTrack {
    pub base_url: String,
    pub language_code: String,
}

/// Parsed watch page: the metadata plus the caption tracks
#[derive(Debug, Clone)]
pub struct WatchPage {
    pub info: MediaInfo,
    pub caption_tracks: Vec<CaptionTrack>,
}

pub struct YouTubeExtractor {
    client: Arc<HttpClient>,
    base_url: String,
}

impl YouTubeExtractor {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    /// Point the extractor at another host (mirrors, test fixtures)
    pub fn with_base_url(client: Arc<HttpClient>, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn watch_url(&self, video_id: &str) -> String {
        format!("{}/watch?v={}", self.base_url, video_id)
    }

    fn oembed_url(&self, video_id: &str) -> Result<String> {
        let canonical = format!("https://www.youtube.com/watch?v={}", video_id);
        let url = Url::parse_with_params(
            &format!("{}/oembed", self.base_url),
            &[("url", canonical.as_str()), ("format", "json")],
        )?;
        Ok(url.to_string())
    }

    /// Whether the timedtext track list names at least one caption track.
    /// Used when the watch page is out of reach; any failure reads as "no".
    async fn has_caption_tracks(&self, video_id: &str) -> bool {
        let url = match Url::parse_with_params(
            &format!("{}/api/timedtext", self.base_url),
            &[("type", "list"), ("v", video_id)],
        ) {
            Ok(url) => url,
            Err(_) => return false,
        };
        match self.client.get_text(url.as_str(), HeaderProfile::Desktop).await {
            Ok(body) => body.contains("<track"),
            Err(e) => {
                debug!("No caption list for {}: {}", video_id, e);
                false
            }
        }
    }

    pub async fn fetch_watch_page(&self, video_id: &str, source_url: &str) -> Result<WatchPage> {
        let html = self
            .client
            .get_text(&self.watch_url(video_id), HeaderProfile::Desktop)
            .await?;
        parse_watch_page(&html, video_id, source_url)
    }

    async fn fallback(&self, video_id: &str, source_url: &str, primary: ScraperError) -> Result<MediaInfo> {
        let oembed_url = self.oembed_url(video_id)?;
        match self.client.get_json::<Value>(&oembed_url, HeaderProfile::Desktop).await {
            Ok(data) => {
                info!("YouTube oEmbed fallback succeeded for {}", video_id);
                let mut info = oembed_info(&data, video_id, source_url);
                info.transcript_available = self.has_caption_tracks(video_id).await;
                Ok(info)
            }
            Err(e) if answered_with_status(&e) => {
                warn!("YouTube oEmbed answered {} for {}, using stub", e, video_id);
                Ok(stub_info(video_id, source_url))
            }
            Err(e) => {
                warn!("YouTube oEmbed fallback failed for {}: {}", video_id, e);
                if primary.is_access_problem() {
                    Err(ScraperError::Blocked(BLOCKED_MESSAGE.to_string()))
                } else {
                    Err(ScraperError::BadRequest(format!(
                        "Unable to analyze video due to YouTube restrictions: {}",
                        primary
                    )))
                }
            }
        }
    }

    /// Fetch the caption track (English preferred) and parse it
    pub async fn transcript(&self, url: &str) -> Result<Vec<TranscriptEntry>> {
        let video_id = extract_video_id(url)
            .ok_or_else(|| ScraperError::InvalidUrl("Invalid YouTube URL".to_string()))?;
        let page = self.fetch_watch_page(&video_id, url).await?;

        let track = page
            .caption_tracks
            .iter()
            .find(|t| t.language_code == "en" || t.language_code.starts_with("en-"))
            .or_else(|| page.caption_tracks.first())
            .ok_or_else(|| {
                ScraperError::NotFound(format!("No transcript available for video {}", video_id))
            })?;

        let xml = self
            .client
            .get_text(&track.base_url, HeaderProfile::Desktop)
            .await?;
        let entries = parse_transcript(&xml);
        if entries.is_empty() {
            return Err(ScraperError::ExtractionFailed(
                "Caption track contained no text".to_string(),
            ));
        }
        Ok(entries)
    }
}

#[async_trait]
impl SiteExtractor for YouTubeExtractor {
    fn platform(&self) -> Platform {
        Platform::YouTube
    }

    async fn extract(&self, url: &str) -> Result<MediaInfo> {
        let video_id = extract_video_id(url)
            .ok_or_else(|| ScraperError::InvalidUrl(INVALID_URL_MESSAGE.to_string()))?;

        match self.fetch_watch_page(&video_id, url).await {
            Ok(page) => {
                info!(
                    "Extracted {} formats for YouTube video {}",
                    page.info.formats.len(),
                    video_id
                );
                Ok(page.info)
            }
            Err(e @ (ScraperError::Unavailable(_) | ScraperError::AgeRestricted)) => Err(e),
            Err(e) => {
                warn!("YouTube watch page extraction failed for {}: {}", video_id, e);
                self.fallback(&video_id, url, e).await
            }
        }
    }
}

/// The request reached YouTube and got a non-success status back
fn answered_with_status(err: &ScraperError) -> bool {
    match err {
        ScraperError::NotFound(_)
        | ScraperError::AccessDenied(_)
        | ScraperError::RateLimited { .. }
        | ScraperError::JsonError(_) => true,
        ScraperError::HttpError(e) => e.status().is_some(),
        _ => false,
    }
}

fn oembed_info(data: &Value, video_id: &str, source_url: &str) -> MediaInfo {
    let title = data
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or("YouTube Video");
    let mut info = MediaInfo::new(Platform::YouTube, source_url, title);
    info.video_id = Some(video_id.to_string());
    info.author = data
        .get("author_name")
        .and_then(Value::as_str)
        .map(str::to_string);
    info.thumbnail = data
        .get("thumbnail_url")
        .and_then(Value::as_str)
        .map(str::to_string);
    info.warning = Some(LIMITED_INFO_WARNING.to_string());
    info
}

fn stub_info(video_id: &str, source_url: &str) -> MediaInfo {
    let mut info = MediaInfo::new(
        Platform::YouTube,
        source_url,
        format!("YouTube Video ({})", video_id),
    );
    info.video_id = Some(video_id.to_string());
    info.thumbnail = Some(format!(
        "https://img.youtube.com/vi/{}/maxresdefault.jpg",
        video_id
    ));
    info.warning = Some(NO_INFO_WARNING.to_string());
    info
}

/// Parse `ytInitialPlayerResponse` out of a watch page
pub fn parse_watch_page(html: &str, video_id: &str, source_url: &str) -> Result<WatchPage> {
    let player: Value = all_balanced_json_after(html, "ytInitialPlayerResponse")
        .into_iter()
        .filter_map(|raw| serde_json::from_str::<Value>(raw).ok())
        .find(|v| v.get("playabilityStatus").is_some() || v.get("videoDetails").is_some())
        .ok_or_else(|| {
            ScraperError::ExtractionFailed("Could not find ytInitialPlayerResponse".to_string())
        })?;

    check_playability(&player)?;

    let details = player.get("videoDetails").ok_or_else(|| {
        ScraperError::ExtractionFailed("Player response has no videoDetails".to_string())
    })?;

    let str_field = |key: &str| details.get(key).and_then(Value::as_str).map(str::to_string);

    let mut info = MediaInfo::new(
        Platform::YouTube,
        source_url,
        str_field("title").unwrap_or_else(|| "YouTube Video".to_string()),
    );
    info.video_id = Some(video_id.to_string());
    info.author = str_field("author");
    info.description = str_field("shortDescription")
        .map(|d| truncate_with_ellipsis(&d, MAX_DESCRIPTION_CHARS));
    info.duration_secs = loose_f64(details.get("lengthSeconds"));
    info.view_count = loose_u64(details.get("viewCount"));
    info.keywords = details
        .get("keywords")
        .and_then(Value::as_array)
        .map(|kws| {
            kws.iter()
                .filter_map(Value::as_str)
                .take(MAX_KEYWORDS)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    info.thumbnail = pointer(details, &["thumbnail", "thumbnails"])
        .and_then(Value::as_array)
        .and_then(|thumbs| thumbs.last())
        .and_then(|t| t.get("url"))
        .and_then(Value::as_str)
        .map(str::to_string);
    info.publish_date = pointer(&player, &["microformat", "playerMicroformatRenderer", "publishDate"])
        .and_then(Value::as_str)
        .map(str::to_string);

    let mut formats = Vec::new();
    for (key, progressive) in [("formats", true), ("adaptiveFormats", false)] {
        if let Some(entries) = pointer(&player, &["streamingData", key]).and_then(Value::as_array) {
            formats.extend(entries.iter().filter_map(|e| parse_format(e, progressive)));
        }
    }
    info.formats = formats;
    info.video_url = info
        .formats
        .iter()
        .filter(|f| f.is_progressive())
        .max_by_key(|f| f.height.unwrap_or(0))
        .and_then(|f| f.url.clone());

    let caption_tracks: Vec<CaptionTrack> = pointer(
        &player,
        &["captions", "playerCaptionsTracklistRenderer", "captionTracks"],
    )
    .and_then(Value::as_array)
    .map(|tracks| {
        tracks
            .iter()
            .filter_map(|t| {
                Some(CaptionTrack {
                    base_url: t.get("baseUrl")?.as_str()?.to_string(),
                    language_code: t.get("languageCode")?.as_str()?.to_string(),
                })
            })
            .collect()
    })
    .unwrap_or_default();

    info.transcript_available = !caption_tracks.is_empty();
    info.transcript_languages = caption_tracks.iter().map(|t| t.language_code.clone()).collect();

    Ok(WatchPage { info, caption_tracks })
}

fn check_playability(player: &Value) -> Result<()> {
    let status = match player.get("playabilityStatus") {
        Some(s) => s,
        None => return Ok(()),
    };
    let state = status.get("status").and_then(Value::as_str).unwrap_or("OK");
    let reason = status
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or("Video unavailable")
        .to_string();

    match state {
        "OK" | "LIVE_STREAM_OFFLINE" => Ok(()),
        "LOGIN_REQUIRED" if reason.to_lowercase().contains("age") => {
            Err(ScraperError::AgeRestricted)
        }
        "AGE_CHECK_REQUIRED" | "AGE_VERIFICATION_REQUIRED" => Err(ScraperError::AgeRestricted),
        "LOGIN_REQUIRED" => Err(ScraperError::AccessDenied(reason)),
        "ERROR" | "UNPLAYABLE" => Err(ScraperError::Unavailable(reason)),
        _ => Ok(()),
    }
}

/// Only formats with a plain `url` are kept; ciphered ones need a player
/// script we do not execute.
fn parse_format(entry: &Value, progressive: bool) -> Option<MediaFormat> {
    let url = entry.get("url")?.as_str()?.to_string();
    let itag = loose_u64(entry.get("itag"))?;
    let full_mime = entry.get("mimeType").and_then(Value::as_str).unwrap_or("video/mp4");
    let mime = full_mime.split(';').next().unwrap_or(full_mime).trim().to_string();

    let is_audio_only = mime.starts_with("audio/");
    let kind = if is_audio_only { MediaKind::Audio } else { MediaKind::Video };
    let bitrate = loose_u64(entry.get("averageBitrate")).or_else(|| loose_u64(entry.get("bitrate")));

    let quality = if is_audio_only {
        bitrate.map(|b| format!("{}kbps", b / 1000))
    } else {
        entry
            .get("qualityLabel")
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    Some(MediaFormat {
        format_id: itag.to_string(),
        url: Some(url),
        ext: extension_for_mime(&mime).to_string(),
        mime_type: Some(mime),
        quality,
        kind,
        width: loose_u64(entry.get("width")).map(|w| w as u32),
        height: loose_u64(entry.get("height")).map(|h| h as u32),
        fps: loose_u64(entry.get("fps")).map(|f| f as u32),
        filesize: loose_u64(entry.get("contentLength")),
        bitrate,
        has_audio: progressive || is_audio_only,
        has_video: !is_audio_only,
    })
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "audio/mp4" => "m4a",
        "audio/webm" => "webm",
        "video/webm" => "webm",
        "video/3gpp" => "3gp",
        _ => "mp4",
    }
}

/// Pick the stream a download request asks for.
///
/// `format_type` "audio" selects the best audio-only stream. For video,
/// "highest"/"default" prefer progressive (audio+video) streams, "lowest"
/// takes the smallest, and a label such as "720p" must match exactly or
/// falls back to the highest.
pub fn select_format<'a>(
    formats: &'a [MediaFormat],
    quality: &str,
    format_type: &str,
) -> Option<&'a MediaFormat> {
    let usable = || formats.iter().filter(|f| f.url.is_some());

    if format_type == "audio" {
        return usable()
            .filter(|f| f.kind == MediaKind::Audio)
            .max_by_key(|f| f.bitrate.unwrap_or(0));
    }

    let video: Vec<&MediaFormat> = usable().filter(|f| f.has_video).collect();
    let progressive: Vec<&MediaFormat> =
        video.iter().copied().filter(|f| f.is_progressive()).collect();
    let pool = if progressive.is_empty() { &video } else { &progressive };

    let highest = || pool.iter().copied().max_by_key(|f| f.height.unwrap_or(0));

    match quality {
        "" | "default" | "highest" => highest(),
        "lowest" => pool.iter().copied().min_by_key(|f| f.height.unwrap_or(u32::MAX)),
        label => progressive
            .iter()
            .chain(video.iter())
            .copied()
            .find(|f| f.quality.as_deref() == Some(label))
            .or_else(highest),
    }
}

/// Parse a timedtext document (`<text start=".." dur="..">line</text>`)
pub fn parse_transcript(xml: &str) -> Vec<TranscriptEntry> {
    let fragment = Html::parse_fragment(xml);
    let selector = match Selector::parse("text") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    fragment
        .select(&selector)
        .filter_map(|el| {
            let start: f64 = el.value().attr("start")?.parse().ok()?;
            let duration: f64 = el
                .value()
                .attr("dur")
                .and_then(|d| d.parse().ok())
                .unwrap_or(0.0);
            let raw: String = el.text().collect();
            // Caption text arrives entity-escaped a second time
            let text = raw
                .replace("&#39;", "'")
                .replace("&quot;", "\"")
                .replace("&amp;", "&")
                .replace('\n', " ")
                .trim()
                .to_string();
            if text.is_empty() {
                None
            } else {
                Some(TranscriptEntry { text, start, duration })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScraperConfig;
    use crate::test_support::spawn_fixture;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use std::collections::HashMap;

    fn watch_html(player: &str) -> String {
        format!(
            "<html><head><title>x - YouTube</title></head><body><script>var ytInitialPlayerResponse = {};var meta = 1;</script></body></html>",
            player
        )
    }

    const PLAYER: &str = r#"{
        "playabilityStatus": {"status": "OK"},
        "videoDetails": {
            "videoId": "dQw4w9WgXcQ",
            "title": "Never Gonna Give You Up",
            "author": "Rick Astley",
            "lengthSeconds": "212",
            "viewCount": "1500000000",
            "shortDescription": "The official video {with braces}",
            "keywords": ["rick", "astley"],
            "thumbnail": {"thumbnails": [{"url": "https://i.ytimg.com/small.jpg"}, {"url": "https://i.ytimg.com/large.jpg"}]}
        },
        "microformat": {"playerMicroformatRenderer": {"publishDate": "2009-10-24"}},
        "streamingData": {
            "formats": [
                {"itag": 18, "url": "https://rr.googlevideo.com/18", "mimeType": "video/mp4; codecs=\"avc1.42001E, mp4a.40.2\"", "qualityLabel": "360p", "width": 640, "height": 360, "fps": 25, "contentLength": "1000", "bitrate": 500000},
                {"itag": 22, "url": "https://rr.googlevideo.com/22", "mimeType": "video/mp4; codecs=\"avc1.64001F, mp4a.40.2\"", "qualityLabel": "720p", "width": 1280, "height": 720, "fps": 25, "bitrate": 1500000}
            ],
            "adaptiveFormats": [
                {"itag": 137, "url": "https://rr.googlevideo.com/137", "mimeType": "video/mp4; codecs=\"avc1.640028\"", "qualityLabel": "1080p", "width": 1920, "height": 1080, "fps": 25, "bitrate": 4000000},
                {"itag": 140, "url": "https://rr.googlevideo.com/140", "mimeType": "audio/mp4; codecs=\"mp4a.40.2\"", "bitrate": 130000, "averageBitrate": 128000},
                {"itag": 251, "url": "https://rr.googlevideo.com/251", "mimeType": "audio/webm; codecs=\"opus\"", "bitrate": 160000},
                {"itag": 248, "signatureCipher": "s=abc&url=https%3A%2F%2Frr", "mimeType": "video/webm", "qualityLabel": "1080p"}
            ]
        },
        "captions": {"playerCaptionsTracklistRenderer": {"captionTracks": [
            {"baseUrl": "https://www.youtube.com/api/timedtext?lang=de", "languageCode": "de"},
            {"baseUrl": "https://www.youtube.com/api/timedtext?lang=en", "languageCode": "en"}
        ]}}
    }"#;

    #[test]
    fn test_extract_video_id_shapes() {
        let id = Some("dQw4w9WgXcQ".to_string());
        assert_eq!(extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), id);
        assert_eq!(extract_video_id("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=42s"), id);
        assert_eq!(extract_video_id("https://youtu.be/dQw4w9WgXcQ?si=abc"), id);
        assert_eq!(extract_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ"), id);
        assert_eq!(extract_video_id("https://www.youtube.com/shorts/dQw4w9WgXcQ"), id);
        assert_eq!(extract_video_id("https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ"), id);
    }

    #[test]
    fn test_extract_video_id_rejects_bad_ids() {
        assert_eq!(extract_video_id("https://www.youtube.com/watch?v=short"), None);
        assert_eq!(extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQXX"), None);
        assert_eq!(extract_video_id("https://www.youtube.com/channel/UC123"), None);
        assert_eq!(extract_video_id("https://example.com/watch?v=dQw4w9WgXcQ"), None);
    }

    #[test]
    fn test_parse_watch_page_metadata() {
        let page = parse_watch_page(&watch_html(PLAYER), "dQw4w9WgXcQ", "https://youtu.be/dQw4w9WgXcQ").unwrap();
        let info = page.info;
        assert_eq!(info.title, "Never Gonna Give You Up");
        assert_eq!(info.author.as_deref(), Some("Rick Astley"));
        assert_eq!(info.duration_secs, Some(212.0));
        assert_eq!(info.view_count, Some(1_500_000_000));
        assert_eq!(info.thumbnail.as_deref(), Some("https://i.ytimg.com/large.jpg"));
        assert_eq!(info.publish_date.as_deref(), Some("2009-10-24"));
        assert_eq!(info.keywords, vec!["rick", "astley"]);
        assert_eq!(info.video_url.as_deref(), Some("https://rr.googlevideo.com/22"));
        assert!(info.transcript_available);
        assert_eq!(info.transcript_languages, vec!["de", "en"]);
        assert_eq!(page.caption_tracks.len(), 2);
    }

    #[test]
    fn test_parse_watch_page_formats() {
        let info = parse_watch_page(&watch_html(PLAYER), "dQw4w9WgXcQ", "u").unwrap().info;
        // The ciphered 248 entry is skipped
        assert_eq!(info.formats.len(), 5);

        let f18 = info.formats.iter().find(|f| f.format_id == "18").unwrap();
        assert_eq!(f18.mime_type.as_deref(), Some("video/mp4"));
        assert_eq!(f18.filesize, Some(1000));
        assert!(f18.is_progressive());

        let f137 = info.formats.iter().find(|f| f.format_id == "137").unwrap();
        assert!(f137.has_video && !f137.has_audio);

        let f140 = info.formats.iter().find(|f| f.format_id == "140").unwrap();
        assert_eq!(f140.kind, MediaKind::Audio);
        assert_eq!(f140.ext, "m4a");
        assert_eq!(f140.quality.as_deref(), Some("128kbps"));
    }

    #[test]
    fn test_parse_watch_page_missing_player() {
        let err = parse_watch_page("<html></html>", "dQw4w9WgXcQ", "u").unwrap_err();
        assert!(matches!(err, ScraperError::ExtractionFailed(_)));
    }

    #[test]
    fn test_playability_errors() {
        let unavailable = watch_html(r#"{"playabilityStatus":{"status":"ERROR","reason":"Video unavailable"}}"#);
        assert!(matches!(
            parse_watch_page(&unavailable, "dQw4w9WgXcQ", "u"),
            Err(ScraperError::Unavailable(_))
        ));

        let age = watch_html(r#"{"playabilityStatus":{"status":"LOGIN_REQUIRED","reason":"Sign in to confirm your age"}}"#);
        assert!(matches!(
            parse_watch_page(&age, "dQw4w9WgXcQ", "u"),
            Err(ScraperError::AgeRestricted)
        ));

        let private = watch_html(r#"{"playabilityStatus":{"status":"LOGIN_REQUIRED","reason":"This video is private"}}"#);
        assert!(matches!(
            parse_watch_page(&private, "dQw4w9WgXcQ", "u"),
            Err(ScraperError::AccessDenied(_))
        ));
    }

    #[test]
    fn test_select_format() {
        let info = parse_watch_page(&watch_html(PLAYER), "dQw4w9WgXcQ", "u").unwrap().info;
        let f = &info.formats;

        assert_eq!(select_format(f, "highest", "video").unwrap().format_id, "22");
        assert_eq!(select_format(f, "default", "video").unwrap().format_id, "22");
        assert_eq!(select_format(f, "lowest", "video").unwrap().format_id, "18");
        assert_eq!(select_format(f, "360p", "video").unwrap().format_id, "18");
        // Only available as a video-only adaptive stream
        assert_eq!(select_format(f, "1080p", "video").unwrap().format_id, "137");
        assert_eq!(select_format(f, "4320p", "video").unwrap().format_id, "22");
        assert_eq!(select_format(f, "default", "audio").unwrap().format_id, "251");
        assert!(select_format(&[], "highest", "video").is_none());
    }

    #[test]
    fn test_parse_transcript() {
        let xml = r#"<?xml version="1.0" encoding="utf-8" ?><transcript><text start="0.5" dur="1.2">Hello &amp;amp; welcome</text><text start="1.7" dur="2">it&amp;#39;s here</text><text start="4" dur="1"> </text></transcript>"#;
        let entries = parse_transcript(xml);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "Hello & welcome");
        assert_eq!(entries[0].start, 0.5);
        assert_eq!(entries[0].duration, 1.2);
        assert_eq!(entries[1].text, "it's here");
    }

    fn fast_client() -> Arc<HttpClient> {
        let config = ScraperConfig {
            retry_delay_ms: 1,
            max_retries: 1,
            rate_limit_per_second: 1000.0,
            ..Default::default()
        };
        Arc::new(HttpClient::new(&config).unwrap())
    }

    #[tokio::test]
    async fn test_extract_from_fixture_watch_page() {
        let html = watch_html(PLAYER);
        let app = Router::new().route("/watch", get(move || async move { axum::response::Html(html) }));
        let base = spawn_fixture(app).await;

        let extractor = YouTubeExtractor::with_base_url(fast_client(), &base);
        let info = extractor
            .extract("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .await
            .unwrap();
        assert_eq!(info.title, "Never Gonna Give You Up");
        assert!(info.warning.is_none());
    }

    #[tokio::test]
    async fn test_falls_back_to_oembed() {
        let app = Router::new()
            .route("/watch", get(|| async { axum::response::Html("<html>consent wall</html>") }))
            .route(
                "/oembed",
                get(|| async {
                    axum::Json(serde_json::json!({
                        "title": "From oEmbed",
                        "author_name": "Someone",
                        "thumbnail_url": "https://i.ytimg.com/hq.jpg"
                    }))
                }),
            );
        let base = spawn_fixture(app).await;

        let extractor = YouTubeExtractor::with_base_url(fast_client(), &base);
        let info = extractor.extract("https://youtu.be/dQw4w9WgXcQ").await.unwrap();
        assert_eq!(info.title, "From oEmbed");
        assert_eq!(info.thumbnail.as_deref(), Some("https://i.ytimg.com/hq.jpg"));
        assert!(info.formats.is_empty());
        assert!(!info.transcript_available);
        assert_eq!(info.warning.as_deref(), Some(LIMITED_INFO_WARNING));
    }

    #[tokio::test]
    async fn test_oembed_fallback_checks_caption_list() {
        let app = Router::new()
            .route("/watch", get(|| async { StatusCode::FORBIDDEN }))
            .route(
                "/oembed",
                get(|| async { axum::Json(serde_json::json!({"title": "Captioned"})) }),
            )
            .route(
                "/api/timedtext",
                get(|Query(params): Query<HashMap<String, String>>| async move {
                    if params.get("type").map(String::as_str) == Some("list")
                        && params.get("v").map(String::as_str) == Some("dQw4w9WgXcQ")
                    {
                        r#"<?xml version="1.0"?><transcript_list><track id="0" lang_code="en"/></transcript_list>"#
                    } else {
                        "<transcript_list/>"
                    }
                }),
            );
        let base = spawn_fixture(app).await;

        let extractor = YouTubeExtractor::with_base_url(fast_client(), &base);
        let info = extractor.extract("https://youtu.be/dQw4w9WgXcQ").await.unwrap();
        assert_eq!(info.title, "Captioned");
        assert!(info.transcript_available);
    }

    #[tokio::test]
    async fn test_falls_back_to_stub_when_oembed_refuses() {
        let app = Router::new()
            .route("/watch", get(|| async { StatusCode::FORBIDDEN }))
            .route("/oembed", get(|| async { StatusCode::UNAUTHORIZED }));
        let base = spawn_fixture(app).await;

        let extractor = YouTubeExtractor::with_base_url(fast_client(), &base);
        let info = extractor.extract("https://youtu.be/dQw4w9WgXcQ").await.unwrap();
        assert_eq!(info.title, "YouTube Video (dQw4w9WgXcQ)");
        assert_eq!(
            info.thumbnail.as_deref(),
            Some("https://img.youtube.com/vi/dQw4w9WgXcQ/maxresdefault.jpg")
        );
        assert_eq!(info.warning.as_deref(), Some(NO_INFO_WARNING));
    }

    #[tokio::test]
    async fn test_unavailable_skips_fallbacks() {
        let html = watch_html(r#"{"playabilityStatus":{"status":"ERROR","reason":"Video unavailable"}}"#);
        let app = Router::new().route("/watch", get(move || async move { axum::response::Html(html) }));
        let base = spawn_fixture(app).await;

        let extractor = YouTubeExtractor::with_base_url(fast_client(), &base);
        let err = extractor.extract("https://youtu.be/dQw4w9WgXcQ").await.unwrap_err();
        assert!(matches!(err, ScraperError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let extractor = YouTubeExtractor::new(fast_client());
        let err = extractor.extract("https://www.youtube.com/feed/trending").await.unwrap_err();
        assert!(matches!(err, ScraperError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_transcript_prefers_english() {
        let base_holder = Arc::new(std::sync::OnceLock::<String>::new());
        let holder = base_holder.clone();
        let app = Router::new()
            .route(
                "/watch",
                get(move || {
                    let holder = holder.clone();
                    async move {
                        let base = holder.get().cloned().unwrap_or_default();
                        let player = format!(
                            r#"{{"playabilityStatus":{{"status":"OK"}},"videoDetails":{{"title":"T"}},"captions":{{"playerCaptionsTracklistRenderer":{{"captionTracks":[{{"baseUrl":"{b}/timedtext?lang=de","languageCode":"de"}},{{"baseUrl":"{b}/timedtext?lang=en","languageCode":"en"}}]}}}}}}"#,
                            b = base
                        );
                        axum::response::Html(watch_html(&player))
                    }
                }),
            )
            .route(
                "/timedtext",
                get(|axum::extract::Query(q): axum::extract::Query<std::collections::HashMap<String, String>>| async move {
                    let line = if q.get("lang").map(String::as_str) == Some("en") { "english line" } else { "deutsche Zeile" };
                    format!(r#"<transcript><text start="0" dur="1">{}</text></transcript>"#, line)
                }),
            );
        let base = spawn_fixture(app).await;
        base_holder.set(base.clone()).unwrap();

        let extractor = YouTubeExtractor::with_base_url(fast_client(), &base);
        let entries = extractor.transcript("https://youtu.be/dQw4w9WgXcQ").await.unwrap();
        assert_eq!(entries, vec![TranscriptEntry { text: "english line".into(), start: 0.0, duration: 1.0 }]);
    }
}
