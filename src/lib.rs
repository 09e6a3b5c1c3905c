//! videohq - social video analysis and download service
//!
//! Takes a YouTube, TikTok or Instagram URL, works out the platform, pulls
//! title, thumbnail, duration and the available encodings out of the
//! platform's pages, and optionally streams the media into a local directory
//! it then serves back. A "Pro" surface layers ad-view unlocks, premium tiers
//! and a simulated enhancement stage on top of the same downloads.
//!
//! # Features
//!
//! - **Layered extraction**: embedded JSON state, meta tags and regex
//!   fallbacks per platform, with short-link resolution
//! - **Rate Limiting**: per-domain limits and retry with backoff
//! - **Streaming Downloads**: bounded concurrency, size limits and SHA-256
//! - **HTTP API**: JSON endpoints served with axum
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use videohq::{api, MediaStore, ScraperConfig, VideoService};
//! use videohq::pro::Enhancer;
//!
//! # async fn run() -> videohq::Result<()> {
//! let store = MediaStore::new("./downloads");
//! let service = Arc::new(VideoService::new(&ScraperConfig::default(), store)?);
//! let app = api::router(api::AppState::new(service, Enhancer::new(1.0)));
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:5000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod downloader;
pub mod error;
pub mod extractor;
pub mod platform;
pub mod pro;
pub mod service;
pub mod storage;

// Re-exports for Rust usage
pub use client::{HeaderProfile, HttpClient};
pub use config::{ScraperConfig, ServerConfig};
pub use downloader::{DownloadManager, DownloadResult};
pub use error::{Result, ScraperError};
pub use extractor::{MediaFormat, MediaInfo, SiteExtractor};
pub use platform::Platform;
pub use service::{DownloadOutcome, VideoService};
pub use storage::MediaStore;

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` overrides the default
/// `videohq=info`; `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("videohq=info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().try_init().ok();
    } else {
        builder.try_init().ok();
    }
}
