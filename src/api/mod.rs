//! JSON HTTP surface: the basic downloader API, the Instagram compatibility
//! routes and the Pro gating routes, served from one router.

mod basic;
mod instagram;
mod pro;
mod session;

pub use session::{Session, SESSION_COOKIE, SESSION_HEADER};

use crate::error::ScraperError;
use crate::pro::{Enhancer, GatingState, JobQueue};
use crate::service::VideoService;
use crate::storage::MediaFile;
use axum::body::Body;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<VideoService>,
    pub gating: Arc<GatingState>,
    pub jobs: JobQueue,
}

impl AppState {
    pub fn new(service: Arc<VideoService>, enhancer: Enhancer) -> Self {
        Self {
            jobs: JobQueue::new(service.clone(), enhancer),
            gating: Arc::new(GatingState::new()),
            service,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers([header::CONTENT_DISPOSITION, header::CONTENT_LENGTH]);

    Router::new()
        .merge(basic::routes())
        .merge(instagram::routes())
        .merge(pro::routes())
        .fallback(not_found_handler)
        .layer(cors)
        .with_state(state)
}

async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": "Route not found"})),
    )
}

impl IntoResponse for ScraperError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            debug!("Request rejected ({}): {}", status, self);
        }

        let mut body = json!({"error": self.to_string()});
        match &self {
            ScraperError::AdRequired { ad_duration } | ScraperError::UnlockExpired { ad_duration } => {
                body["ad_required"] = json!(true);
                body["ad_duration"] = json!(ad_duration);
            }
            ScraperError::PremiumRequired { .. } => {
                body["premium_offer"] = json!({
                    "trial": "7 days free",
                    "price": "$4.99/month",
                    "benefits": ["8K downloads", "No ads", "Batch processing"],
                });
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

/// Request body carrying just a URL
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct UrlRequest {
    pub url: String,
}

/// Trimmed URL, or 400 "URL is required"
pub(crate) fn require_url(url: &str) -> Result<&str, ScraperError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ScraperError::BadRequest("URL is required".to_string()));
    }
    Ok(url)
}

pub(crate) fn content_type_for(filename: &str) -> &'static str {
    match filename.rsplit('.').next().map(|e| e.to_ascii_lowercase()).as_deref() {
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("m4a") => "audio/mp4",
        Some("mp3") => "audio/mpeg",
        _ => "application/octet-stream",
    }
}

/// Stream a stored file as a download named `download_name`
pub(crate) fn attachment(media: MediaFile, download_name: &str, content_type: &str) -> Response {
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", download_name))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    let mut resp = Response::new(Body::from_stream(ReaderStream::new(media.file)));
    let headers = resp.headers_mut();
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(media.size_bytes));
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    resp
}
