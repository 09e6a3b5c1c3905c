//! Background processing jobs: download, then the simulated enhancement

use super::enhance::{Enhancer, EnhancementResult, ENHANCE_START_PROGRESS};
use super::tiers::QualityTier;
use crate::error::{Result, ScraperError};
use crate::platform::Platform;
use crate::service::{DownloadOutcome, VideoService};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Downloading,
    Enhancing,
    Completed,
    Error,
}

/// What the download stage produced
#[derive(Debug, Clone, Serialize)]
pub struct DownloadSummary {
    pub filename: String,
    pub filepath: String,
    pub filesize: u64,
    pub title: String,
    pub platform: Platform,
}

impl From<&DownloadOutcome> for DownloadSummary {
    fn from(outcome: &DownloadOutcome) -> Self {
        Self {
            filename: outcome.filename.clone(),
            filepath: outcome.path.display().to_string(),
            filesize: outcome.filesize,
            title: outcome.title.clone(),
            platform: outcome.platform,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    #[serde(flatten)]
    pub download: DownloadSummary,
    #[serde(flatten)]
    pub enhancement: EnhancementResult,
    pub quality: String,
    pub ai_enhanced: bool,
}

/// A single processing job
#[derive(Debug, Clone, Serialize)]
pub struct ProcessJob {
    pub id: String,
    pub status: JobStatus,
    pub progress: f64,
    pub url: String,
    pub quality: String,
    pub platform: Platform,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhancement_step: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_result: Option<DownloadSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ProcessResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessJob {
    pub fn new(url: &str, quality: &str, session_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            status: JobStatus::Downloading,
            progress: 0.0,
            url: url.to_string(),
            quality: quality.to_string(),
            platform: Platform::detect(url),
            session_id: session_id.to_string(),
            created_at: Utc::now(),
            enhancement_step: None,
            eta: None,
            download_result: None,
            result: None,
            error: None,
        }
    }
}

/// In-memory job table; one spawned worker per job
#[derive(Clone)]
pub struct JobQueue {
    jobs: Arc<DashMap<String, ProcessJob>>,
    service: Arc<VideoService>,
    enhancer: Enhancer,
}

impl JobQueue {
    pub fn new(service: Arc<VideoService>, enhancer: Enhancer) -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
            service,
            enhancer,
        }
    }

    pub fn get(&self, id: &str) -> Option<ProcessJob> {
        self.jobs.get(id).map(|job| job.clone())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn update<F: FnOnce(&mut ProcessJob)>(&self, id: &str, f: F) {
        if let Some(mut job) = self.jobs.get_mut(id) {
            f(&mut job);
        }
    }

    /// Register a job for an authorized tier and start its worker
    pub fn spawn_processing(&self, url: &str, tier: &'static QualityTier, session_id: &str) -> String {
        let job = ProcessJob::new(url, tier.quality, session_id);
        let id = job.id.clone();
        self.jobs.insert(id.clone(), job);

        let queue = self.clone();
        let job_id = id.clone();
        let url = url.to_string();
        tokio::spawn(async move {
            match queue.process(&job_id, &url, tier).await {
                Ok(result) => {
                    info!("Job {} completed ({})", job_id, result.enhancement.quality_improvement);
                    queue.update(&job_id, |job| {
                        job.status = JobStatus::Completed;
                        job.progress = 100.0;
                        job.enhancement_step = None;
                        job.eta = None;
                        job.result = Some(result);
                    });
                }
                Err(e) => {
                    error!("Job {} failed: {}", job_id, e);
                    queue.update(&job_id, |job| {
                        job.status = JobStatus::Error;
                        job.error = Some(e.to_string());
                    });
                }
            }
        });

        id
    }

    async fn process(&self, id: &str, url: &str, tier: &'static QualityTier) -> Result<ProcessResult> {
        self.update(id, |job| job.progress = 10.0);

        let platform = Platform::detect(url);
        if !platform.is_downloadable() {
            return Err(ScraperError::BadRequest(format!(
                "Platform {} not supported yet",
                platform
            )));
        }

        let outcome = self.service.download(url, "highest", "video").await?;
        let download = DownloadSummary::from(&outcome);
        self.update(id, |job| {
            job.status = JobStatus::Enhancing;
            job.progress = ENHANCE_START_PROGRESS;
            job.download_result = Some(download.clone());
        });

        let enhancement = self
            .enhancer
            .run(tier, download.filesize, |step| {
                self.update(id, |job| {
                    job.progress = step.progress;
                    job.eta = Some(step.eta);
                    job.enhancement_step = Some(step.step);
                });
            })
            .await;

        Ok(ProcessResult {
            download,
            enhancement,
            quality: tier.quality.to_string(),
            ai_enhanced: true,
        })
    }
}
