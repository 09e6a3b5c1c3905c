//! Platform detection for incoming URLs

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    YouTube,
    TikTok,
    Instagram,
    Twitter,
    Facebook,
    Unknown,
}

/// Detection result with the confidence and icon the Pro UI renders
#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    pub platform: Platform,
    pub confidence: f64,
    pub icon: &'static str,
}

// Checked in order. Short hosts are anchored to a host boundary.
static PLATFORM_PATTERNS: LazyLock<Vec<(Platform, Regex)>> = LazyLock::new(|| {
    let table: [(Platform, &[&str]); 5] = [
        (Platform::TikTok, &[r"tiktok\.com"]),
        (
            Platform::YouTube,
            &[r"youtube\.com", r"youtu\.be", r"youtube-nocookie\.com"],
        ),
        (Platform::Instagram, &[r"instagram\.com", r"instagr\.am"]),
        (
            Platform::Twitter,
            &[r"twitter\.com", r"(?:^|[/.@])x\.com", r"(?:^|[/.@])t\.co(?:[/:?#]|$)"],
        ),
        (Platform::Facebook, &[r"facebook\.com", r"fb\.watch"]),
    ];

    table
        .iter()
        .flat_map(|(platform, patterns)| {
            patterns
                .iter()
                .map(move |p| (*platform, Regex::new(p).expect("static platform pattern")))
        })
        .collect()
});

const SHORT_LINK_HOSTS: &[&str] = &[
    "vm.tiktok.com",
    "vt.tiktok.com",
    "t.co",
    "fb.watch",
    "instagr.am",
];

impl Platform {
    pub fn detect(url: &str) -> Platform {
        let lower = url.trim().to_lowercase();
        PLATFORM_PATTERNS
            .iter()
            .find(|(_, re)| re.is_match(&lower))
            .map(|(platform, _)| *platform)
            .unwrap_or(Platform::Unknown)
    }

    pub fn detect_with_confidence(url: &str) -> Detection {
        let platform = Self::detect(url);
        let confidence = if platform == Platform::Unknown { 0.0 } else { 0.95 };
        Detection {
            platform,
            confidence,
            icon: platform.icon(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::YouTube => "youtube",
            Platform::TikTok => "tiktok",
            Platform::Instagram => "instagram",
            Platform::Twitter => "twitter",
            Platform::Facebook => "facebook",
            Platform::Unknown => "unknown",
        }
    }

    /// Capitalized name used in stub titles ("Twitter Video")
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::YouTube => "YouTube",
            Platform::TikTok => "TikTok",
            Platform::Instagram => "Instagram",
            Platform::Twitter => "Twitter",
            Platform::Facebook => "Facebook",
            Platform::Unknown => "Unknown",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Platform::TikTok => "🎵",
            Platform::YouTube => "📺",
            Platform::Instagram => "📸",
            Platform::Twitter => "🐦",
            Platform::Facebook => "👥",
            Platform::Unknown => "📹",
        }
    }

    pub fn recommended_qualities(&self) -> &'static [&'static str] {
        match self {
            Platform::TikTok => &["480p", "1080p", "4K"],
            Platform::YouTube => &["480p", "1080p", "4K", "8K"],
            Platform::Instagram | Platform::Twitter | Platform::Facebook => &["480p", "1080p"],
            Platform::Unknown => &["480p"],
        }
    }

    /// Whether the platform has a dedicated extractor and downloader
    pub fn is_downloadable(&self) -> bool {
        matches!(self, Platform::YouTube | Platform::TikTok | Platform::Instagram)
    }

    /// True for shortener hosts that only redirect to the real page
    pub fn is_short_link(url: &str) -> bool {
        let host = match Url::parse(url.trim()) {
            Ok(parsed) => parsed.host_str().map(|h| h.to_lowercase()),
            Err(_) => None,
        };
        match host {
            Some(host) => SHORT_LINK_HOSTS.iter().any(|h| host == *h),
            None => false,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
