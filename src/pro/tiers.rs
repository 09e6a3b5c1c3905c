//! Quality tiers offered by the Pro interface

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityTier {
    #[serde(skip)]
    pub quality: &'static str,
    /// Seconds of ad viewing needed to unlock (0 = free)
    pub ad_required: u64,
    pub icon: &'static str,
    pub label: &'static str,
    pub premium: bool,
    /// Seconds the simulated enhancement takes
    pub processing_time: u64,
    #[serde(skip)]
    pub size_multiplier: f64,
}

pub const QUALITY_TIERS: [QualityTier; 4] = [
    QualityTier {
        quality: "480p",
        ad_required: 0,
        icon: "🎬",
        label: "Standard",
        premium: false,
        processing_time: 5,
        size_multiplier: 1.0,
    },
    QualityTier {
        quality: "1080p",
        ad_required: 15,
        icon: "🌟",
        label: "HD Premium",
        premium: false,
        processing_time: 15,
        size_multiplier: 2.5,
    },
    QualityTier {
        quality: "4K",
        ad_required: 30,
        icon: "🔥",
        label: "AI Enhanced",
        premium: false,
        processing_time: 45,
        size_multiplier: 8.0,
    },
    QualityTier {
        quality: "8K",
        ad_required: 0,
        icon: "👑",
        label: "Ultra Premium",
        premium: true,
        processing_time: 90,
        size_multiplier: 20.0,
    },
];

impl QualityTier {
    pub fn lookup(quality: &str) -> Option<&'static QualityTier> {
        QUALITY_TIERS.iter().find(|t| t.quality == quality)
    }

    pub fn needs_ad(&self) -> bool {
        self.ad_required > 0
    }
}

/// The whole table keyed by quality, as the front end expects it
pub struct TierTable;

impl Serialize for TierTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(QUALITY_TIERS.len()))?;
        for tier in &QUALITY_TIERS {
            map.serialize_entry(tier.quality, tier)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let hd = QualityTier::lookup("1080p").unwrap();
        assert_eq!(hd.ad_required, 15);
        assert!(hd.needs_ad());
        assert!(QualityTier::lookup("8K").unwrap().premium);
        assert!(!QualityTier::lookup("480p").unwrap().needs_ad());
        assert!(QualityTier::lookup("720p").is_none());
    }

    #[test]
    fn test_table_serializes_by_quality() {
        let value = serde_json::to_value(TierTable).unwrap();
        assert_eq!(value["4K"]["label"], "AI Enhanced");
        assert_eq!(value["4K"]["processing_time"], 45);
        assert_eq!(value["8K"]["premium"], true);
        assert!(value["480p"].get("quality").is_none());
        assert_eq!(value.as_object().unwrap().len(), 4);
    }
}
