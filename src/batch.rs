use log::{error, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::denoiser::FileReport;
use crate::{Denoiser, DiagnosticsWriter, NoiseCategory, Result};

/// One `(original, noisy, output)` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    pub original: PathBuf,
    pub noisy: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchManifest {
    pub jobs: Vec<BatchJob>,
}

impl BatchManifest {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Completed { report: FileReport },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    pub job: BatchJob,
    pub outcome: JobOutcome,
}

impl BatchEntry {
    pub fn category(&self) -> Option<NoiseCategory> {
        match &self.outcome {
            JobOutcome::Completed { report } => Some(report.category),
            JobOutcome::Failed { .. } => None,
        }
    }
}

/// Per-pair results in manifest order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|e| e.category().is_some()).count()
    }

    pub fn failed(&self) -> usize {
        self.entries.len() - self.succeeded()
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Denoises every job, at most `max_parallel` at a time.
///
/// Pairs share nothing mutable, so each runs on its own blocking task. A
/// failing pair is recorded and the rest of the batch carries on.
pub async fn run_batch(
    denoiser: Arc<Denoiser>,
    jobs: Vec<BatchJob>,
    max_parallel: usize,
    diagnostics: Option<Arc<DiagnosticsWriter>>,
) -> BatchReport {
    let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
    let mut tasks = JoinSet::new();

    for (index, job) in jobs.iter().cloned().enumerate() {
        let denoiser = Arc::clone(&denoiser);
        let diagnostics = diagnostics.clone();
        let semaphore = Arc::clone(&semaphore);

        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let result = tokio::task::spawn_blocking(move || {
                denoiser.process_file(
                    &job.original,
                    &job.noisy,
                    &job.output,
                    diagnostics.as_deref(),
                )
            })
            .await;

            let outcome = match result {
                Ok(Ok(report)) => JobOutcome::Completed { report },
                Ok(Err(e)) => JobOutcome::Failed {
                    error: e.to_string(),
                },
                Err(e) => JobOutcome::Failed {
                    error: format!("worker panicked: {}", e),
                },
            };
            (index, outcome)
        });
    }

    let mut outcomes: Vec<Option<JobOutcome>> = vec![None; jobs.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, outcome)) => outcomes[index] = Some(outcome),
            Err(e) => error!("Batch task failed to join: {}", e),
        }
    }

    let entries = jobs
        .into_iter()
        .zip(outcomes)
        .map(|(job, outcome)| {
            let outcome = outcome.unwrap_or(JobOutcome::Failed {
                error: "task did not complete".to_string(),
            });
            match &outcome {
                JobOutcome::Completed { report } => {
                    info!("{}: {}", job.output.display(), report.category)
                }
                JobOutcome::Failed { error } => {
                    error!("{}: failed: {}", job.noisy.display(), error)
                }
            }
            BatchEntry { job, outcome }
        })
        .collect();

    BatchReport { entries }
}
