//! Pro tier: quality gating behind ad views or premium, and background
//! processing jobs with a simulated enhancement stage.

pub mod enhance;
pub mod gating;
pub mod jobs;
pub mod tiers;

pub use enhance::{EnhancementResult, Enhancer, StepProgress, ENHANCEMENT_STEPS};
pub use gating::{AdCompletion, AdOffer, GatingState, Plan, Upgrade};
pub use jobs::{JobQueue, JobStatus, ProcessJob, ProcessResult};
pub use tiers::{QualityTier, TierTable, QUALITY_TIERS};
