//! Simulated "AI enhancement": a fixed sequence of timed steps that only
//! reports progress and scales the reported output size.

use super::tiers::QualityTier;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

pub const ENHANCEMENT_STEPS: [&str; 6] = [
    "Analyzing video content...",
    "Applying AI upscaling algorithms...",
    "Enhancing color depth and contrast...",
    "Optimizing frame interpolation...",
    "Reducing compression artifacts...",
    "Finalizing enhancement...",
];

/// Progress at which enhancement starts; the remaining 70 points are spread
/// over the steps.
pub const ENHANCE_START_PROGRESS: f64 = 30.0;

#[derive(Debug, Clone, PartialEq)]
pub struct StepProgress {
    pub step: &'static str,
    pub progress: f64,
    /// Seconds left, as reported to the client
    pub eta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnhancementResult {
    pub original_size: u64,
    pub enhanced_size: u64,
    pub quality_improvement: String,
}

/// Runs the step sequence for one tier
#[derive(Debug, Clone)]
pub struct Enhancer {
    time_scale: f64,
}

impl Enhancer {
    pub fn new(time_scale: f64) -> Self {
        Self {
            time_scale: time_scale.max(0.0),
        }
    }

    /// Seconds each step sleeps for `tier`
    pub fn step_secs(&self, tier: &QualityTier) -> f64 {
        tier.processing_time as f64 / ENHANCEMENT_STEPS.len() as f64 * self.time_scale
    }

    pub async fn run<F>(&self, tier: &QualityTier, original_size: u64, mut on_step: F) -> EnhancementResult
    where
        F: FnMut(StepProgress),
    {
        let step_secs = self.step_secs(tier);
        let total = ENHANCEMENT_STEPS.len();

        for (i, step) in ENHANCEMENT_STEPS.iter().enumerate() {
            let step_pct = (i + 1) as f64 / total as f64 * 100.0;
            on_step(StepProgress {
                step,
                progress: ENHANCE_START_PROGRESS + step_pct * 0.7,
                eta: (total - i - 1) as f64 * step_secs,
            });
            debug!("Enhancement step {}/{}: {}", i + 1, total, step);
            tokio::time::sleep(Duration::from_secs_f64(step_secs)).await;
        }

        EnhancementResult {
            original_size,
            enhanced_size: (original_size as f64 * tier.size_multiplier) as u64,
            quality_improvement: format!("{} AI Enhanced", tier.quality),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_time_scales() {
        let tier = QualityTier::lookup("4K").unwrap();
        assert_eq!(Enhancer::new(1.0).step_secs(tier), 7.5);
        assert_eq!(Enhancer::new(0.0).step_secs(tier), 0.0);
        assert_eq!(Enhancer::new(-3.0).step_secs(tier), 0.0);
    }

    #[tokio::test]
    async fn test_run_reports_every_step() {
        let tier = QualityTier::lookup("1080p").unwrap();
        let mut seen = Vec::new();
        let result = Enhancer::new(0.0)
            .run(tier, 1000, |p| seen.push(p))
            .await;

        assert_eq!(seen.len(), 6);
        assert_eq!(seen[0].step, "Analyzing video content...");
        assert!((seen[0].progress - (30.0 + 100.0 / 6.0 * 0.7)).abs() < 1e-9);
        assert!((seen[5].progress - 100.0).abs() < 1e-9);
        assert!(seen.windows(2).all(|w| w[0].progress < w[1].progress));

        assert_eq!(result.original_size, 1000);
        assert_eq!(result.enhanced_size, 2500);
        assert_eq!(result.quality_improvement, "1080p AI Enhanced");
    }

    #[tokio::test]
    async fn test_eta_counts_down() {
        let tier = QualityTier::lookup("480p").unwrap();
        let mut etas = Vec::new();
        Enhancer::new(0.012).run(tier, 10, |p| etas.push(p.eta)).await;

        let step = 5.0 / 6.0 * 0.012;
        assert!((etas[0] - 5.0 * step).abs() < 1e-9);
        assert_eq!(*etas.last().unwrap(), 0.0);
    }
}
