//! HTTP client with connection pooling, per-domain rate limiting and
//! browser-like header profiles for each platform

use crate::config::ScraperConfig;
use crate::error::{Result, ScraperError};
use dashmap::DashMap;
use governor::{Quota, RateLimiter};
use reqwest::{
    header::{
        HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CONTENT_LENGTH, RANGE,
        REFERER, USER_AGENT,
    },
    redirect::Policy,
    Client, Response, StatusCode,
};
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

type DomainRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

const ANDROID_CHROME_UA: &str = "Mozilla/5.0 (Linux; Android 5.0; SM-G900P Build/LRX21T) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/86.0.4240.111 Mobile Safari/537.36";
const IPHONE_SAFARI_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 14_7_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.2 Mobile/15E148 Safari/604.1";
const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8";

/// Per-request header sets. Platforms serve different markup (or refuse)
/// depending on the user agent, so each request picks one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderProfile {
    /// Client defaults only
    Desktop,
    /// TikTok page fetches (mobile Chrome)
    TikTokMobile,
    /// TikTok CDN media fetches
    TikTokMedia,
    /// Instagram page fetches (mobile Safari)
    InstagramMobile,
    /// Instagram CDN media fetches
    InstagramMedia,
}

impl HeaderProfile {
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        match self {
            HeaderProfile::Desktop => {}
            HeaderProfile::TikTokMobile => {
                headers.insert(USER_AGENT, HeaderValue::from_static(ANDROID_CHROME_UA));
                headers.insert(REFERER, HeaderValue::from_static("https://www.tiktok.com/"));
                headers.insert(ACCEPT, HeaderValue::from_static(HTML_ACCEPT));
                headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
            }
            HeaderProfile::TikTokMedia => {
                headers.insert(USER_AGENT, HeaderValue::from_static("okhttp"));
                headers.insert(REFERER, HeaderValue::from_static("https://www.tiktok.com/"));
                headers.insert(RANGE, HeaderValue::from_static("bytes=0-"));
            }
            HeaderProfile::InstagramMobile => {
                headers.insert(USER_AGENT, HeaderValue::from_static(IPHONE_SAFARI_UA));
                headers.insert(
                    ACCEPT,
                    HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
                );
                headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
            }
            HeaderProfile::InstagramMedia => {
                headers.insert(USER_AGENT, HeaderValue::from_static(IPHONE_SAFARI_UA));
                headers.insert(
                    ACCEPT,
                    HeaderValue::from_static("video/mp4,video/*;q=0.9,*/*;q=0.8"),
                );
                headers.insert(REFERER, HeaderValue::from_static("https://www.instagram.com/"));
            }
        }
        headers
    }
}

/// HTTP client with automatic rate limiting and connection pooling
pub struct HttpClient {
    client: Client,
    config: ScraperConfig,
    rate_limiters: Arc<DashMap<String, Arc<DomainRateLimiter>>>,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let user_agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| ScraperError::ConfigError(format!("Invalid user agent: {}", e)))?;
        headers.insert(USER_AGENT, user_agent);
        headers.insert(ACCEPT, HeaderValue::from_static(HTML_ACCEPT));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        if config.enable_compression {
            headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate, br"));
        }

        let mut builder = Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .redirect(Policy::limited(config.max_redirects))
            .connect_timeout(Duration::from_secs(15))
            .pool_max_idle_per_host(config.pool_size_per_host)
            .pool_idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .gzip(config.enable_compression)
            .brotli(config.enable_compression)
            .deflate(config.enable_compression);

        if let Some(ref proxy_url) = config.proxy_url {
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
                ScraperError::ConfigError(format!("Invalid proxy URL: {}", e))
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build()?;

        Ok(Self {
            client,
            config: config.clone(),
            rate_limiters: Arc::new(DashMap::new()),
        })
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    /// Get or create a rate limiter for a domain
    fn get_rate_limiter(&self, domain: &str) -> Arc<DomainRateLimiter> {
        if let Some(limiter) = self.rate_limiters.get(domain) {
            return limiter.clone();
        }

        let rate = self.config.rate_limit_per_second;
        let quota = if rate >= 1.0 {
            Quota::per_second(NonZeroU32::new(rate as u32).unwrap_or(NonZeroU32::MIN))
        } else {
            // For rates < 1 per second, use per-minute quota
            let per_min = (rate * 60.0).max(1.0) as u32;
            Quota::per_minute(NonZeroU32::new(per_min).unwrap_or(NonZeroU32::MIN))
        };

        self.rate_limiters
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(RateLimiter::direct(quota)))
            .clone()
    }

    /// Extract domain from URL for rate limiting
    fn get_domain(url: &str) -> Result<String> {
        let parsed = Url::parse(url)?;
        Ok(parsed.host_str().unwrap_or("unknown").to_string())
    }

    async fn wait_for_rate_limit(&self, url: &str) -> Result<()> {
        let domain = Self::get_domain(url)?;
        let limiter = self.get_rate_limiter(&domain);
        limiter.until_ready().await;
        Ok(())
    }

    /// Perform a GET request with automatic retries
    pub async fn get(&self, url: &str) -> Result<Response> {
        self.get_with_headers(url, None).await
    }

    /// Perform a GET request with one of the platform header profiles
    pub async fn get_with_profile(&self, url: &str, profile: HeaderProfile) -> Result<Response> {
        self.get_with_headers(url, Some(profile.headers())).await
    }

    /// Perform a GET request with custom headers
    pub async fn get_with_headers(
        &self,
        url: &str,
        headers: Option<HeaderMap>,
    ) -> Result<Response> {
        self.wait_for_rate_limit(url).await?;

        let mut attempt = 0;
        let max_retries = self.config.max_retries.max(1);
        let base_delay = Duration::from_millis(self.config.retry_delay_ms);

        loop {
            attempt += 1;
            debug!("HTTP GET attempt {}/{}: {}", attempt, max_retries, url);

            let mut request = self
                .client
                .get(url)
                .timeout(Duration::from_secs(self.config.request_timeout_secs));
            if let Some(ref h) = headers {
                request = request.headers(h.clone());
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response);
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = response
                            .headers()
                            .get("Retry-After")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok())
                            .unwrap_or(60);

                        warn!("Rate limited on {}, waiting {} seconds", url, retry_after);

                        if attempt >= max_retries {
                            return Err(ScraperError::RateLimited {
                                retry_after_secs: retry_after,
                            });
                        }

                        sleep(Duration::from_secs(retry_after)).await;
                        continue;
                    }

                    if status == StatusCode::NOT_FOUND {
                        return Err(ScraperError::NotFound(format!("Not found: {}", url)));
                    }

                    if status == StatusCode::FORBIDDEN || status == StatusCode::UNAUTHORIZED {
                        return Err(ScraperError::AccessDenied(url.to_string()));
                    }

                    if status.is_server_error() && attempt < max_retries {
                        let delay = base_delay * 2u32.pow(attempt - 1);
                        warn!("Server error {} on {}, retrying in {:?}", status, url, delay);
                        sleep(delay).await;
                        continue;
                    }

                    return match response.error_for_status() {
                        Err(e) => Err(ScraperError::HttpError(e)),
                        Ok(response) => Ok(response),
                    };
                }
                Err(e) => {
                    if e.is_timeout() && attempt >= max_retries {
                        return Err(ScraperError::Timeout {
                            timeout_secs: self.config.request_timeout_secs,
                        });
                    }
                    if attempt >= max_retries {
                        return Err(ScraperError::DownloadFailed {
                            attempts: attempt,
                            message: e.to_string(),
                        });
                    }

                    let delay = base_delay * 2u32.pow(attempt - 1);
                    warn!("Request failed: {}, retrying in {:?}", e, delay);
                    sleep(delay).await;
                }
            }
        }
    }

    /// Fetch a page body as text
    pub async fn get_text(&self, url: &str, profile: HeaderProfile) -> Result<String> {
        let response = self.get_with_profile(url, profile).await?;
        Ok(response.text().await?)
    }

    /// Fetch and deserialize a JSON document
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        profile: HeaderProfile,
    ) -> Result<T> {
        let response = self.get_with_profile(url, profile).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Follow redirects from a short link and return where it lands.
    /// Falls back to the input when the shortener cannot be reached.
    pub async fn resolve_redirects(&self, url: &str, profile: HeaderProfile) -> String {
        match self.get_with_profile(url, profile).await {
            Ok(response) => {
                let resolved = response.url().to_string();
                debug!("Resolved {} -> {}", url, resolved);
                resolved
            }
            Err(e) => {
                warn!("Could not resolve short link {}: {}", url, e);
                url.to_string()
            }
        }
    }

    /// Open a media stream with the download timeout instead of the page timeout
    pub async fn get_media(&self, url: &str, profile: HeaderProfile) -> Result<Response> {
        self.wait_for_rate_limit(url).await?;

        let response = self
            .client
            .get(url)
            .headers(profile.headers())
            .timeout(Duration::from_secs(self.config.download_timeout_secs))
            .send()
            .await?;

        Self::check_media_status(url, response)
    }

    /// Size of the media behind `url`, if the server reports one.
    ///
    /// Asks with HEAD first; servers that reject HEAD or omit the length
    /// there get a GET whose body is dropped unread.
    pub async fn get_content_length(&self, url: &str, profile: HeaderProfile) -> Result<Option<u64>> {
        self.wait_for_rate_limit(url).await?;
        let timeout = Duration::from_secs(self.config.request_timeout_secs);

        let head = self
            .client
            .head(url)
            .headers(profile.headers())
            .timeout(timeout)
            .send()
            .await?;
        // HEAD bodies are empty, so read the header instead of the body size hint
        if let Some(length) = Self::check_media_status(url, head).ok().and_then(|r| {
            r.headers()
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
        }) {
            return Ok(Some(length));
        }

        debug!("HEAD gave no length for {}, falling back to GET", url);
        self.wait_for_rate_limit(url).await?;
        let response = self
            .client
            .get(url)
            .headers(profile.headers())
            .timeout(timeout)
            .send()
            .await?;
        Ok(Self::check_media_status(url, response)?.content_length())
    }

    fn check_media_status(url: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ScraperError::NotFound(format!("Not found: {}", url)));
        }
        if status == StatusCode::FORBIDDEN || status == StatusCode::UNAUTHORIZED {
            return Err(ScraperError::AccessDenied(url.to_string()));
        }
        Ok(response.error_for_status()?)
    }
}
