//! Configuration types for the scraper and the HTTP server

use crate::error::{Result, ScraperError};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Scraper configuration shared by the HTTP client, extractors and downloader
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Maximum concurrent media downloads
    pub max_concurrent_downloads: usize,

    /// Request timeout in seconds for page and API fetches
    pub request_timeout_secs: u64,

    /// Timeout in seconds for media downloads
    pub download_timeout_secs: u64,

    /// Maximum retry attempts
    pub max_retries: u32,

    /// Base delay between retries in milliseconds
    pub retry_delay_ms: u64,

    /// Desktop user agent string
    pub user_agent: String,

    /// Rate limit: requests per second per domain
    pub rate_limit_per_second: f64,

    /// Maximum file size to download (0 = unlimited)
    pub max_file_size_bytes: u64,

    /// Maximum redirect hops followed when resolving short links
    pub max_redirects: usize,

    /// Proxy URL (optional)
    pub proxy_url: Option<String>,

    /// Enable compression for requests
    pub enable_compression: bool,

    /// Connection pool size per host
    pub pool_size_per_host: usize,

    /// Idle connection timeout in seconds
    pub idle_timeout_secs: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: 8,
            request_timeout_secs: 30,
            download_timeout_secs: 300,
            max_retries: 3,
            retry_delay_ms: 1000,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            rate_limit_per_second: 5.0,
            max_file_size_bytes: 0, // Unlimited
            max_redirects: 10,
            proxy_url: None,
            enable_compression: true,
            pool_size_per_host: 8,
            idle_timeout_secs: 90,
        }
    }
}

impl ScraperConfig {
    /// A configuration that backs off harder, for IPs the platforms already throttle
    pub fn conservative() -> Self {
        Self {
            max_concurrent_downloads: 2,
            max_retries: 5,
            retry_delay_ms: 2000,
            rate_limit_per_second: 0.5,
            ..Default::default()
        }
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            ScraperError::ConfigError(format!("Serialization failed: {}", e))
        })
    }

    /// Load from JSON string; missing fields take their defaults
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str).map_err(|e| {
            ScraperError::ConfigError(format!("Deserialization failed: {}", e))
        })
    }

    /// Load from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Apply `SCRAPER_*` environment overrides on top of this configuration
    pub fn with_env_overrides(mut self) -> Self {
        self.max_concurrent_downloads =
            env_parse("SCRAPER_MAX_CONCURRENT_DOWNLOADS", self.max_concurrent_downloads);
        self.request_timeout_secs = env_parse("SCRAPER_REQUEST_TIMEOUT", self.request_timeout_secs);
        self.download_timeout_secs =
            env_parse("SCRAPER_DOWNLOAD_TIMEOUT", self.download_timeout_secs);
        self.max_retries = env_parse("SCRAPER_MAX_RETRIES", self.max_retries);
        self.rate_limit_per_second =
            env_parse("SCRAPER_RATE_LIMIT", self.rate_limit_per_second);
        self.max_file_size_bytes = env_parse("SCRAPER_MAX_FILE_SIZE", self.max_file_size_bytes);
        if let Ok(proxy) = env::var("SCRAPER_PROXY") {
            if !proxy.trim().is_empty() {
                self.proxy_url = Some(proxy);
            }
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.rate_limit_per_second <= 0.0 {
            return Err(ScraperError::ConfigError(
                "rate_limit_per_second must be positive".to_string(),
            ));
        }
        if self.max_concurrent_downloads == 0 {
            return Err(ScraperError::ConfigError(
                "max_concurrent_downloads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// HTTP server settings, read from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory downloaded media is written to and served from
    pub download_dir: PathBuf,
    /// Tokio worker threads (0 = one per CPU)
    pub worker_threads: usize,
    /// Multiplier applied to the simulated enhancement durations
    pub enhance_time_scale: f64,
    pub scraper: ScraperConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            download_dir: PathBuf::from("./downloads"),
            worker_threads: 0,
            enhance_time_scale: 1.0,
            scraper: ScraperConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let scraper = match env::var("SCRAPER_CONFIG") {
            Ok(path) if !path.trim().is_empty() => ScraperConfig::from_file(Path::new(&path))?,
            _ => ScraperConfig::default(),
        }
        .with_env_overrides();
        scraper.validate()?;

        let defaults = Self::default();
        Ok(Self {
            host: env_str("HOST", &defaults.host),
            port: env_parse("PORT", defaults.port),
            download_dir: PathBuf::from(env_str("DOWNLOAD_DIR", "./downloads")),
            worker_threads: env_parse("WORKER_THREADS", defaults.worker_threads),
            enhance_time_scale: env_parse("ENHANCE_TIME_SCALE", defaults.enhance_time_scale)
                .max(0.0),
            scraper,
        })
    }

    /// Worker thread count with 0 resolved to the number of CPUs
    pub fn effective_worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            num_cpus::get()
        } else {
            self.worker_threads
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_str(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
