//! Analyze, download and transcript endpoints plus file serving

use super::{attachment, content_type_for, require_url, AppState, UrlRequest};
use crate::error::ScraperError;
use crate::extractor::{MediaFormat, MediaInfo, MediaKind};
use crate::platform::Platform;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/health", get(health_handler))
        .route("/api/analyze", post(analyze_handler))
        .route("/api/download", post(download_handler))
        .route("/api/transcript", post(transcript_handler))
        .route("/api/file/{filename}", get(file_handler))
}

async fn index_handler() -> Json<Value> {
    Json(json!({
        "service": "videohq",
        "version": env!("CARGO_PKG_VERSION"),
        "platforms": ["youtube", "tiktok", "instagram"],
        "endpoints": {
            "analyze": "POST /api/analyze",
            "download": "POST /api/download",
            "transcript": "POST /api/transcript",
            "file": "GET /api/file/{filename}",
            "pro": "POST /api/process-video",
        },
    }))
}

async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let now = chrono::Utc::now();
    Json(json!({
        "status": "healthy",
        "timestamp": now.timestamp_millis() as f64 / 1000.0,
        "active_downloads": state.service.active_downloads(),
    }))
}

/// Format row as the web UI lists it
#[derive(Debug, Serialize)]
struct FormatRow<'a> {
    itag: Option<u32>,
    quality: Option<&'a str>,
    #[serde(rename = "type")]
    kind: MediaKind,
    mime_type: Option<&'a str>,
    filesize: Option<u64>,
}

impl<'a> From<&'a MediaFormat> for FormatRow<'a> {
    fn from(format: &'a MediaFormat) -> Self {
        Self {
            itag: format.format_id.parse().ok(),
            quality: format.quality.as_deref(),
            kind: format.kind,
            mime_type: format.mime_type.as_deref(),
            filesize: format.filesize,
        }
    }
}

#[derive(Debug, Serialize)]
struct AnalyzeResponse<'a> {
    platform: Platform,
    title: &'a str,
    thumbnail: Option<&'a str>,
    duration: Option<f64>,
    formats: Vec<FormatRow<'a>>,
    transcript_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    video_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<&'a str>,
}

impl<'a> From<&'a MediaInfo> for AnalyzeResponse<'a> {
    fn from(info: &'a MediaInfo) -> Self {
        Self {
            platform: info.platform,
            title: &info.title,
            thumbnail: info.thumbnail.as_deref(),
            duration: info.duration_secs,
            formats: info.formats.iter().map(FormatRow::from).collect(),
            transcript_available: info.transcript_available,
            video_id: info.video_id.as_deref(),
            warning: info.warning.as_deref(),
            note: info.note.as_deref(),
        }
    }
}

async fn analyze_handler(
    State(state): State<AppState>,
    Json(req): Json<UrlRequest>,
) -> Result<Json<Value>, ScraperError> {
    let url = require_url(&req.url)?;
    let info = state.service.analyze(url).await?;
    Ok(Json(serde_json::to_value(AnalyzeResponse::from(&info))?))
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct DownloadRequest {
    url: String,
    quality: String,
    format: String,
}

impl Default for DownloadRequest {
    fn default() -> Self {
        Self {
            url: String::new(),
            quality: "default".to_string(),
            format: "video".to_string(),
        }
    }
}

async fn download_handler(
    State(state): State<AppState>,
    Json(req): Json<DownloadRequest>,
) -> Result<Json<Value>, ScraperError> {
    let url = require_url(&req.url)?;
    let outcome = state.service.download(url, &req.quality, &req.format).await?;
    Ok(Json(json!({
        "success": true,
        "filename": outcome.filename,
        "download_url": outcome.download_url,
        "filesize": outcome.filesize,
    })))
}

async fn transcript_handler(
    State(state): State<AppState>,
    Json(req): Json<UrlRequest>,
) -> Result<Json<Value>, ScraperError> {
    let url = require_url(&req.url)?;
    let transcript = state.service.transcript(url).await?;
    Ok(Json(json!({
        "success": true,
        "transcript": transcript,
    })))
}

async fn file_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ScraperError> {
    let media = state.service.store().open(&filename).await?;
    Ok(attachment(media, &filename, content_type_for(&filename)))
}
