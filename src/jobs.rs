/*!
 * In-memory translation jobs.
 *
 * This module handles:
 * - Accepting an uploaded `.docx` into its own job directory
 * - Driving the pipeline for a job and tracking its status
 * - Broadcasting progress to any number of subscribers
 * - Cancelling pending or running jobs
 *
 * Jobs live only as long as the `JobManager`; nothing is persisted.
 */

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use log::{debug, info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::file_utils::FileManager;
use crate::pipeline::{CancelHandle, TranslationPipeline};

/// Buffered updates per job before slow subscribers start lagging
const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Lifecycle of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Error,
    Cancelled,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error | JobStatus::Cancelled)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Error => write!(f, "error"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Message sent to job subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobUpdate {
    Progress {
        progress: f64,
        average_quality: f64,
        elapsed_seconds: f64,
    },
    Completed {
        average_quality: f64,
        elapsed_seconds: f64,
        output_path: PathBuf,
    },
    Error {
        message: String,
    },
    Cancelled,
}

/// Snapshot of a job
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub target_language: String,
    pub retain_terms: Vec<String>,
    pub status: JobStatus,
    /// Percent complete, 0..=100
    pub progress: f64,
    pub average_quality: f64,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Seconds spent running; frozen once the job finishes
    pub fn elapsed_seconds(&self) -> f64 {
        let Some(started) = self.started_at else {
            return 0.0;
        };
        let end = self.completed_at.unwrap_or_else(Utc::now);
        ((end - started).num_milliseconds().max(0) as f64) / 1000.0
    }
}

struct JobEntry {
    job: Job,
    updates: broadcast::Sender<JobUpdate>,
    cancel: Option<CancelHandle>,
}

/// Split a free-form list of retained terms on newlines and commas
pub fn parse_retain_terms(raw: &str) -> Vec<String> {
    raw.replace('\r', "")
        .split('\n')
        .flat_map(|line| line.split(','))
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(String::from)
        .collect()
}

/// Registry of translation jobs
#[derive(Clone, Default)]
pub struct JobManager {
    jobs: Arc<RwLock<HashMap<String, JobEntry>>>,
}

impl fmt::Debug for JobManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobManager").field("jobs", &self.jobs.read().len()).finish()
    }
}

impl JobManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an uploaded document under `work_dir/<job id>/` and register a pending job
    pub async fn create_job(
        &self,
        work_dir: &Path,
        filename: &str,
        data: &[u8],
        target_language: &str,
        retain_terms_raw: Option<&str>,
    ) -> Result<Job> {
        // Only the final component; upload names must not escape the job directory
        let filename = Path::new(filename)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| anyhow!("Invalid file name: {}", filename))?;
        if !filename.to_lowercase().ends_with(".docx") {
            return Err(anyhow!("Only .docx files are supported"));
        }

        let id = Uuid::new_v4().to_string();
        let job_dir = work_dir.join(&id);
        tokio::fs::create_dir_all(&job_dir)
            .await
            .with_context(|| format!("Failed to create job directory: {:?}", job_dir))?;

        let input_path = job_dir.join(&filename);
        tokio::fs::write(&input_path, data)
            .await
            .with_context(|| format!("Failed to write upload: {:?}", input_path))?;

        let job = Job {
            id: id.clone(),
            output_path: job_dir.join(FileManager::output_file_name(&filename, target_language)),
            input_path,
            target_language: target_language.to_string(),
            retain_terms: retain_terms_raw.map(parse_retain_terms).unwrap_or_default(),
            status: JobStatus::Pending,
            progress: 0.0,
            average_quality: 0.0,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };

        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        self.jobs.write().insert(
            id.clone(),
            JobEntry {
                job: job.clone(),
                updates,
                cancel: None,
            },
        );

        info!("Created job {} for {}", &id[..8], filename);
        Ok(job)
    }

    pub fn get_job(&self, job_id: &str) -> Option<Job> {
        self.jobs.read().get(job_id).map(|entry| entry.job.clone())
    }

    /// All jobs, oldest first
    pub fn list_jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.read().values().map(|entry| entry.job.clone()).collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }

    /// Receive every update published for the job from now on
    pub fn subscribe(&self, job_id: &str) -> Option<broadcast::Receiver<JobUpdate>> {
        self.jobs.read().get(job_id).map(|entry| entry.updates.subscribe())
    }

    /// Run a pending job to completion and return its final status
    pub async fn run_job(&self, job_id: &str, pipeline: &TranslationPipeline) -> Result<JobStatus> {
        let (input, output, target_language, retain_terms) = {
            let jobs = self.jobs.read();
            let entry = jobs.get(job_id).ok_or_else(|| anyhow!("Job not found: {}", job_id))?;
            if entry.job.status != JobStatus::Pending {
                return Ok(entry.job.status);
            }
            (
                entry.job.input_path.clone(),
                entry.job.output_path.clone(),
                entry.job.target_language.clone(),
                entry.job.retain_terms.clone(),
            )
        };

        let mut run = pipeline.translate_document(&input, &output, &target_language, &retain_terms);
        self.update(job_id, |entry| {
            entry.job.status = JobStatus::Running;
            entry.job.started_at = Some(Utc::now());
            entry.cancel = Some(run.cancel_handle());
            None
        });
        debug!("Job {} running", job_id);

        let mut failure = None;
        while let Some(item) = run.next().await {
            match item {
                Ok(progress) => {
                    self.update(job_id, |entry| {
                        entry.job.progress = progress.percent;
                        entry.job.average_quality = progress.average_quality;
                        Some(JobUpdate::Progress {
                            progress: progress.percent,
                            average_quality: progress.average_quality,
                            elapsed_seconds: entry.job.elapsed_seconds(),
                        })
                    });
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        let status = self.finish(job_id, failure);
        info!("Job {} finished: {}", job_id, status);
        Ok(status)
    }

    /// Request cancellation; returns false when the job is unknown or already finished
    pub fn cancel_job(&self, job_id: &str) -> bool {
        let mut jobs = self.jobs.write();
        let Some(entry) = jobs.get_mut(job_id) else {
            return false;
        };

        match entry.job.status {
            JobStatus::Pending => {
                entry.job.status = JobStatus::Cancelled;
                entry.job.completed_at = Some(Utc::now());
                let _ = entry.updates.send(JobUpdate::Cancelled);
                true
            }
            JobStatus::Running => {
                if let Some(cancel) = &entry.cancel {
                    cancel.cancel();
                }
                true
            }
            _ => false,
        }
    }

    fn finish(&self, job_id: &str, failure: Option<PipelineError>) -> JobStatus {
        self.update(job_id, |entry| {
            entry.cancel = None;
            entry.job.completed_at = Some(Utc::now());
            let update = match failure {
                None => {
                    entry.job.status = JobStatus::Completed;
                    entry.job.progress = 100.0;
                    JobUpdate::Completed {
                        average_quality: entry.job.average_quality,
                        elapsed_seconds: entry.job.elapsed_seconds(),
                        output_path: entry.job.output_path.clone(),
                    }
                }
                Some(PipelineError::Cancelled) => {
                    entry.job.status = JobStatus::Cancelled;
                    JobUpdate::Cancelled
                }
                Some(e) => {
                    warn!("Job {} failed: {}", entry.job.id, e);
                    entry.job.status = JobStatus::Error;
                    entry.job.error = Some(e.to_string());
                    JobUpdate::Error { message: e.to_string() }
                }
            };
            Some(update)
        })
        .unwrap_or(JobStatus::Error)
    }

    /// Mutate a job under the lock and publish the update it returns
    fn update<F>(&self, job_id: &str, apply: F) -> Option<JobStatus>
    where
        F: FnOnce(&mut JobEntry) -> Option<JobUpdate>,
    {
        let mut jobs = self.jobs.write();
        let entry = jobs.get_mut(job_id)?;
        if let Some(update) = apply(entry) {
            // No subscribers is fine
            let _ = entry.updates.send(update);
        }
        Some(entry.job.status)
    }
}
