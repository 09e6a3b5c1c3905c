//! Routes kept for clients of the standalone Instagram downloader API.
//! Errors here carry `success: false` next to the message.

use super::{attachment, content_type_for, require_url, AppState, UrlRequest};
use crate::error::ScraperError;
use crate::platform::Platform;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/igdl", get(igdl_handler))
        .route("/api/instagram/analyze", post(analyze_handler))
        .route("/api/instagram/download", post(download_handler))
        .route("/download/{filename}", get(file_handler))
        .route("/health", get(health_handler))
}

/// Wraps `ScraperError` so the body also says `success: false`
struct CompatError(ScraperError);

impl From<ScraperError> for CompatError {
    fn from(e: ScraperError) -> Self {
        CompatError(e)
    }
}

impl IntoResponse for CompatError {
    fn into_response(self) -> Response {
        warn!("Instagram route failed: {}", self.0);
        (
            self.0.status_code(),
            Json(json!({"error": self.0.to_string(), "success": false})),
        )
            .into_response()
    }
}

fn require_instagram(url: &str) -> Result<(), ScraperError> {
    if Platform::detect(url) != Platform::Instagram {
        return Err(ScraperError::InvalidUrl("Invalid Instagram URL".to_string()));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct IgdlQuery {
    url: Option<String>,
}

async fn igdl_handler(
    State(state): State<AppState>,
    Query(query): Query<IgdlQuery>,
) -> Result<Json<Value>, CompatError> {
    let url = match query.url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => url,
        _ => {
            return Err(ScraperError::BadRequest("URL parameter is missing".to_string()).into())
        }
    };
    require_instagram(url)?;

    let info = state.service.analyze(url).await?;
    let video_url = info.video_url.ok_or_else(|| {
        ScraperError::ExtractionFailed("Failed to extract video".to_string())
    })?;

    Ok(Json(json!({
        "url": video_url,
        "title": info.title,
        "thumbnail": info.thumbnail,
        "success": true,
    })))
}

async fn analyze_handler(
    State(state): State<AppState>,
    Json(req): Json<UrlRequest>,
) -> Result<Json<Value>, CompatError> {
    let url = require_url(&req.url)?;
    require_instagram(url)?;

    let info = state.service.analyze(url).await?;
    Ok(Json(json!({
        "success": true,
        "platform": info.platform,
        "title": info.title,
        "video_url": info.video_url,
        "thumbnail": info.thumbnail,
        "duration": info.duration_secs,
        "available_qualities": [
            {"resolution": "480p", "type": "mobile"},
            {"resolution": "720p", "type": "hd"},
            {"resolution": "1080p", "type": "full_hd"},
        ],
        "enhancement_potential": "Good - Instagram videos benefit from AI upscaling",
    })))
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct DownloadRequest {
    url: String,
    quality: String,
}

impl Default for DownloadRequest {
    fn default() -> Self {
        Self {
            url: String::new(),
            quality: "720p".to_string(),
        }
    }
}

async fn download_handler(
    State(state): State<AppState>,
    Json(req): Json<DownloadRequest>,
) -> Result<Json<Value>, CompatError> {
    let url = require_url(&req.url)?;
    require_instagram(url)?;

    let outcome = state.service.download(url, &req.quality, "video").await?;
    Ok(Json(json!({
        "success": true,
        "title": outcome.title,
        "filename": outcome.filename,
        "filesize": outcome.filesize,
        "download_url": format!("/download/{}", outcome.filename),
        "quality": req.quality,
        "platform": Platform::Instagram,
    })))
}

async fn file_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ScraperError> {
    let media = state.service.store().open(&filename).await?;
    Ok(attachment(media, &filename, content_type_for(&filename)))
}

async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "Instagram Video Downloader API",
        "version": "1.0.0",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_instagram() {
        assert!(require_instagram("https://www.instagram.com/p/Cxyz_123/").is_ok());
        assert!(require_instagram("https://instagr.am/p/Cxyz_123/").is_ok());
        let err = require_instagram("https://www.tiktok.com/@a/video/1").unwrap_err();
        assert_eq!(err.to_string(), "Invalid Instagram URL");
    }

    #[tokio::test]
    async fn test_compat_error_body() {
        let resp = CompatError(ScraperError::BadRequest("URL parameter is missing".into())).into_response();
        assert_eq!(resp.status(), axum::http::StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({"error": "URL parameter is missing", "success": false}));
    }
}
