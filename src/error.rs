//! Error types for the video analysis and download service

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("URL parsing failed: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Rate limit exceeded, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("Download failed after {attempts} attempts: {message}")]
    DownloadFailed { attempts: u32, message: String },

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("{0}")]
    InvalidUrl(String),

    #[error("Platform {0} not yet supported")]
    UnsupportedPlatform(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Blocked by platform: {0}")]
    Blocked(String),

    #[error("This video is unavailable: {0}")]
    Unavailable(String),

    #[error("This video is age-restricted and cannot be analyzed.")]
    AgeRestricted,

    #[error("Timeout after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    #[error("File too large: {size_bytes} bytes exceeds limit of {limit_bytes} bytes")]
    FileTooLarge { size_bytes: u64, limit_bytes: u64 },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Ad viewing required")]
    AdRequired { ad_duration: u64 },

    #[error("Quality unlock expired")]
    UnlockExpired { ad_duration: u64 },

    #[error("Premium required for {quality}")]
    PremiumRequired { quality: String },
}

impl ScraperError {
    /// HTTP status the API layer answers with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ScraperError::InvalidUrl(_)
            | ScraperError::UnsupportedPlatform(_)
            | ScraperError::BadRequest(_)
            | ScraperError::Unavailable(_)
            | ScraperError::AgeRestricted
            | ScraperError::FileTooLarge { .. } => StatusCode::BAD_REQUEST,
            ScraperError::NotFound(_) => StatusCode::NOT_FOUND,
            ScraperError::Blocked(_) => StatusCode::SERVICE_UNAVAILABLE,
            ScraperError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ScraperError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ScraperError::AdRequired { .. } | ScraperError::UnlockExpired { .. } => {
                StatusCode::PAYMENT_REQUIRED
            }
            ScraperError::PremiumRequired { .. } => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True when the platform refused us (403/401, captcha walls), as opposed
    /// to the content itself being missing or malformed.
    pub fn is_access_problem(&self) -> bool {
        match self {
            ScraperError::AccessDenied(_)
            | ScraperError::Blocked(_)
            | ScraperError::RateLimited { .. } => true,
            ScraperError::HttpError(e) => e
                .status()
                .map(|s| s.as_u16() == 400 || s.as_u16() == 403)
                .unwrap_or(false),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;
