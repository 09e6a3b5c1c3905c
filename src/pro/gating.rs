//! Ad-view unlocks and premium membership, kept in memory per session

use super::tiers::QualityTier;
use crate::error::{Result, ScraperError};
use chrono::{DateTime, Duration, Utc};
use dashmap::{DashMap, DashSet};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

/// How long a watched ad keeps a quality unlocked
pub const UNLOCK_DURATION_SECS: i64 = 3600;

/// Share of the ad that must be watched
const REQUIRED_WATCH_RATIO: f64 = 0.8;

/// Offers not redeemed within this window are dropped
const AD_SESSION_TTL_SECS: i64 = 3600;

#[derive(Debug, Clone)]
pub struct AdSession {
    pub session_id: String,
    pub quality: String,
    pub duration: u64,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdContent {
    pub title: &'static str,
    pub description: &'static str,
    pub video_url: &'static str,
    pub skip_available_after: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdReward {
    pub quality: String,
    pub description: String,
}

/// Answer to an ad request
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AdOffer {
    Premium {
        premium_user: bool,
        ad_required: bool,
    },
    NotRequired {
        ad_required: bool,
    },
    Required {
        ad_session_id: String,
        duration: u64,
        ad_type: &'static str,
        ad_content: AdContent,
        reward: AdReward,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdCompletion {
    Unlocked { quality: String, unlock_duration: i64 },
    /// Not enough of the ad was watched; carries the required seconds
    Insufficient { required_secs: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Monthly,
    Yearly,
}

impl Plan {
    pub fn parse(plan: &str) -> Option<Plan> {
        match plan {
            "monthly" => Some(Plan::Monthly),
            "yearly" => Some(Plan::Yearly),
            _ => None,
        }
    }

    pub fn price(&self) -> f64 {
        match self {
            Plan::Monthly => 4.99,
            Plan::Yearly => 39.99,
        }
    }

    pub fn trial_days(&self) -> u32 {
        7
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Upgrade {
    pub success: bool,
    pub plan: Plan,
    pub price: f64,
    pub trial_days: u32,
    pub benefits: [&'static str; 5],
}

#[derive(Debug, Default)]
pub struct GatingState {
    premium: DashSet<String>,
    ad_sessions: DashMap<String, AdSession>,
    /// (session, quality) -> unlock expiry
    unlocks: DashMap<(String, String), DateTime<Utc>>,
}

impl GatingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_premium(&self, session_id: &str) -> bool {
        self.premium.contains(session_id)
    }

    pub fn request_ad(&self, session_id: &str, quality: &str) -> AdOffer {
        self.request_ad_at(session_id, quality, Utc::now())
    }

    pub fn request_ad_at(&self, session_id: &str, quality: &str, now: DateTime<Utc>) -> AdOffer {
        if self.is_premium(session_id) {
            return AdOffer::Premium {
                premium_user: true,
                ad_required: false,
            };
        }

        let duration = match QualityTier::lookup(quality) {
            Some(tier) if tier.needs_ad() => tier.ad_required,
            _ => return AdOffer::NotRequired { ad_required: false },
        };

        let ttl = Duration::seconds(AD_SESSION_TTL_SECS);
        self.ad_sessions.retain(|_, ad| now - ad.started_at < ttl);

        let ad_session_id = Uuid::new_v4().to_string();
        self.ad_sessions.insert(
            ad_session_id.clone(),
            AdSession {
                session_id: session_id.to_string(),
                quality: quality.to_string(),
                duration,
                started_at: now,
            },
        );
        debug!("Ad session {} started for {} ({})", ad_session_id, session_id, quality);

        AdOffer::Required {
            ad_session_id,
            duration,
            ad_type: "rewarded_video",
            ad_content: AdContent {
                title: "Premium Video Editing Tools",
                description: "Unlock professional video editing features",
                video_url: "/static/ads/sample_ad.mp4",
                skip_available_after: duration.saturating_sub(10).max(5),
            },
            reward: AdReward {
                quality: quality.to_string(),
                description: format!("Unlock {} AI-enhanced download", quality),
            },
        }
    }

    pub fn complete_ad(&self, ad_session_id: &str, watch_duration: f64) -> Result<AdCompletion> {
        self.complete_ad_at(ad_session_id, watch_duration, Utc::now())
    }

    pub fn complete_ad_at(
        &self,
        ad_session_id: &str,
        watch_duration: f64,
        now: DateTime<Utc>,
    ) -> Result<AdCompletion> {
        let required = self
            .ad_sessions
            .get(ad_session_id)
            .map(|ad| ad.duration as f64 * REQUIRED_WATCH_RATIO)
            .ok_or_else(|| ScraperError::BadRequest("Invalid ad session".to_string()))?;
        if watch_duration < required {
            return Ok(AdCompletion::Insufficient {
                required_secs: required as u64,
            });
        }

        // Redeemed offers are single use
        let (_, ad) = self
            .ad_sessions
            .remove(ad_session_id)
            .ok_or_else(|| ScraperError::BadRequest("Invalid ad session".to_string()))?;
        let key = (ad.session_id, ad.quality.clone());
        let quality = ad.quality;

        self.unlocks
            .insert(key, now + Duration::seconds(UNLOCK_DURATION_SECS));
        info!("Unlocked {} for one hour via ad {}", quality, ad_session_id);

        Ok(AdCompletion::Unlocked {
            quality,
            unlock_duration: UNLOCK_DURATION_SECS,
        })
    }

    /// Check that `session_id` may process `quality`
    pub fn authorize(&self, session_id: &str, quality: &str) -> Result<&'static QualityTier> {
        self.authorize_at(session_id, quality, Utc::now())
    }

    pub fn authorize_at(
        &self,
        session_id: &str,
        quality: &str,
        now: DateTime<Utc>,
    ) -> Result<&'static QualityTier> {
        let tier = QualityTier::lookup(quality)
            .ok_or_else(|| ScraperError::BadRequest(format!("Unsupported quality: {}", quality)))?;

        if self.is_premium(session_id) {
            return Ok(tier);
        }
        if tier.premium {
            return Err(ScraperError::PremiumRequired {
                quality: quality.to_string(),
            });
        }
        if !tier.needs_ad() {
            return Ok(tier);
        }

        let key = (session_id.to_string(), quality.to_string());
        let expires_at = match self.unlocks.get(&key) {
            Some(entry) => *entry,
            None => {
                return Err(ScraperError::AdRequired {
                    ad_duration: tier.ad_required,
                })
            }
        };

        if now > expires_at {
            self.unlocks.remove(&key);
            return Err(ScraperError::UnlockExpired {
                ad_duration: tier.ad_required,
            });
        }
        Ok(tier)
    }

    pub fn upgrade(&self, session_id: &str, plan: &str) -> Result<Upgrade> {
        let plan = Plan::parse(plan).ok_or_else(|| ScraperError::BadRequest("Invalid plan".to_string()))?;
        self.premium.insert(session_id.to_string());
        info!("Session {} upgraded to {:?}", session_id, plan);

        Ok(Upgrade {
            success: true,
            plan,
            price: plan.price(),
            trial_days: plan.trial_days(),
            benefits: [
                "Unlimited 8K downloads",
                "Zero ads forever",
                "Batch processing",
                "Priority queue",
                "Advanced AI filters",
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ad_id(offer: &AdOffer) -> String {
        match offer {
            AdOffer::Required { ad_session_id, .. } => ad_session_id.clone(),
            other => panic!("expected an ad, got {:?}", other),
        }
    }

    #[test]
    fn test_free_tier_needs_nothing() {
        let gating = GatingState::new();
        assert!(matches!(
            gating.request_ad("s1", "480p"),
            AdOffer::NotRequired { ad_required: false }
        ));
        assert!(matches!(
            gating.request_ad("s1", "unknown"),
            AdOffer::NotRequired { .. }
        ));
        assert!(gating.authorize("s1", "480p").is_ok());
    }

    #[test]
    fn test_ad_offer_shape() {
        let gating = GatingState::new();
        let offer = gating.request_ad("s1", "1080p");
        let json = serde_json::to_value(&offer).unwrap();
        assert_eq!(json["duration"], 15);
        assert_eq!(json["ad_type"], "rewarded_video");
        assert_eq!(json["ad_content"]["skip_available_after"], 5);
        assert_eq!(json["reward"]["description"], "Unlock 1080p AI-enhanced download");

        let offer_4k = serde_json::to_value(gating.request_ad("s1", "4K")).unwrap();
        assert_eq!(offer_4k["ad_content"]["skip_available_after"], 20);
    }

    #[test]
    fn test_ad_unlock_flow() {
        let gating = GatingState::new();
        assert!(matches!(
            gating.authorize("s1", "1080p"),
            Err(ScraperError::AdRequired { ad_duration: 15 })
        ));

        let id = ad_id(&gating.request_ad("s1", "1080p"));
        assert_eq!(
            gating.complete_ad(&id, 11.0).unwrap(),
            AdCompletion::Insufficient { required_secs: 12 }
        );
        assert!(gating.authorize("s1", "1080p").is_err());

        assert_eq!(
            gating.complete_ad(&id, 12.0).unwrap(),
            AdCompletion::Unlocked {
                quality: "1080p".into(),
                unlock_duration: 3600
            }
        );
        assert!(gating.authorize("s1", "1080p").is_ok());
        // Unlocks are per session and per quality
        assert!(gating.authorize("s2", "1080p").is_err());
        assert!(gating.authorize("s1", "4K").is_err());
    }

    #[test]
    fn test_unlock_expires() {
        let gating = GatingState::new();
        let start = Utc::now();
        let id = ad_id(&gating.request_ad_at("s1", "4K", start));
        gating.complete_ad_at(&id, 30.0, start).unwrap();

        let later = start + Duration::seconds(UNLOCK_DURATION_SECS - 1);
        assert!(gating.authorize_at("s1", "4K", later).is_ok());

        let expired = start + Duration::seconds(UNLOCK_DURATION_SECS + 1);
        assert!(matches!(
            gating.authorize_at("s1", "4K", expired),
            Err(ScraperError::UnlockExpired { ad_duration: 30 })
        ));
        // The stale unlock is dropped, so the next check asks for an ad again
        assert!(matches!(
            gating.authorize_at("s1", "4K", expired),
            Err(ScraperError::AdRequired { .. })
        ));
    }

    #[test]
    fn test_redeemed_ad_is_single_use() {
        let gating = GatingState::new();
        let id = ad_id(&gating.request_ad("s1", "1080p"));
        gating.complete_ad(&id, 15.0).unwrap();
        assert!(gating.ad_sessions.is_empty());

        let err = gating.complete_ad(&id, 15.0).unwrap_err();
        assert_eq!(err.to_string(), "Invalid ad session");
    }

    #[test]
    fn test_stale_ad_sessions_are_pruned() {
        let gating = GatingState::new();
        let start = Utc::now();
        let stale = ad_id(&gating.request_ad_at("s1", "1080p", start));
        let recent = ad_id(&gating.request_ad_at("s2", "4K", start + Duration::seconds(60)));
        assert_eq!(gating.ad_sessions.len(), 2);

        let later = start + Duration::seconds(AD_SESSION_TTL_SECS + 1);
        let fresh = ad_id(&gating.request_ad_at("s3", "1080p", later));
        assert!(!gating.ad_sessions.contains_key(&stale));
        assert!(gating.ad_sessions.contains_key(&recent));
        assert!(gating.ad_sessions.contains_key(&fresh));
        assert!(gating.complete_ad_at(&stale, 15.0, later).is_err());
    }

    #[test]
    fn test_invalid_ad_session() {
        let gating = GatingState::new();
        let err = gating.complete_ad("nope", 100.0).unwrap_err();
        assert_eq!(err.to_string(), "Invalid ad session");
    }

    #[test]
    fn test_premium_tier() {
        let gating = GatingState::new();
        assert!(matches!(
            gating.authorize("s1", "8K"),
            Err(ScraperError::PremiumRequired { .. })
        ));

        let upgrade = gating.upgrade("s1", "yearly").unwrap();
        assert_eq!(upgrade.price, 39.99);
        assert_eq!(upgrade.trial_days, 7);
        assert!(gating.is_premium("s1"));
        assert!(gating.authorize("s1", "8K").is_ok());
        assert!(gating.authorize("s1", "4K").is_ok());
        assert!(matches!(gating.request_ad("s1", "4K"), AdOffer::Premium { .. }));
    }

    #[test]
    fn test_invalid_plan_and_quality() {
        let gating = GatingState::new();
        assert_eq!(gating.upgrade("s1", "lifetime").unwrap_err().to_string(), "Invalid plan");
        assert!(!gating.is_premium("s1"));
        assert!(matches!(
            gating.authorize("s1", "720p"),
            Err(ScraperError::BadRequest(_))
        ));
    }
}
