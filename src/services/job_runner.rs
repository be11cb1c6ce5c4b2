//! Bounded-concurrency job execution
//!
//! Match and ingest jobs run on a fixed pool of workers fed from an
//! unbounded queue; submission never blocks. The status map is the only
//! shared state: workers write the single terminal transition, the
//! boundary reads on status polls.

use crate::error::{Error, Result};
use crate::models::{JobOutcome, JobRecord};
use crate::services::downloader::TrackSource;
use crate::services::processor::{self, TempAudio};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default worker pool size
pub const DEFAULT_WORKERS: usize = 4;

type JobMap = Arc<RwLock<HashMap<Uuid, JobRecord>>>;
type SharedQueue = Arc<Mutex<mpsc::UnboundedReceiver<QueuedJob>>>;

#[derive(Debug)]
enum QueuedJob {
    Match { job_id: Uuid, audio_path: PathBuf },
    Ingest { job_id: Uuid, url: String },
}

/// Accepts fingerprint/match jobs and tracks their status for the
/// lifetime of the process.
pub struct JobRunner {
    jobs: JobMap,
    queue: mpsc::UnboundedSender<QueuedJob>,
}

impl JobRunner {
    /// Start a runner with `workers` worker tasks over `pool`.
    ///
    /// Each job holds at most one database connection, so the sqlx pool
    /// should be sized to at least `workers`.
    pub fn new(pool: SqlitePool, source: Arc<dyn TrackSource>, workers: usize) -> Self {
        let jobs: JobMap = Arc::new(RwLock::new(HashMap::new()));
        let (tx, rx) = mpsc::unbounded_channel();
        let rx: SharedQueue = Arc::new(Mutex::new(rx));

        for worker_id in 0..workers {
            tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&rx),
                Arc::clone(&jobs),
                pool.clone(),
                Arc::clone(&source),
            ));
        }

        info!(workers, "Job runner started");
        Self { jobs, queue: tx }
    }

    /// Submit a match job against an audio file.
    ///
    /// The runner takes ownership of the file: it is deleted when the
    /// job completes, whether or not it succeeded.
    pub async fn submit_match(&self, audio_path: PathBuf) -> Uuid {
        self.submit(|job_id| QueuedJob::Match { job_id, audio_path })
            .await
    }

    /// Submit an ingest job for every music track behind a URL.
    pub async fn submit_ingest(&self, url: impl Into<String>) -> Uuid {
        let url = url.into();
        self.submit(|job_id| QueuedJob::Ingest { job_id, url }).await
    }

    /// Look up a job's status record.
    ///
    /// # Errors
    /// `Error::NotFound` for an unknown id.
    pub async fn get_status(&self, job_id: Uuid) -> Result<JobRecord> {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .cloned()
            .ok_or(Error::NotFound(job_id))
    }

    async fn submit(&self, make_job: impl FnOnce(Uuid) -> QueuedJob) -> Uuid {
        let job_id = Uuid::new_v4();

        self.jobs
            .write()
            .await
            .insert(job_id, JobRecord::new(job_id));

        debug!(%job_id, "Job submitted");

        if self.queue.send(make_job(job_id)).is_err() {
            // Queue closed: every worker is gone. Fail fast instead of
            // leaving the record PENDING forever.
            warn!(%job_id, "Job queue is closed, failing submission");
            if let Some(record) = self.jobs.write().await.get_mut(&job_id) {
                record.complete_failure(
                    Error::Internal("job queue is closed".to_string()).to_string(),
                );
            }
        }

        job_id
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: SharedQueue,
    jobs: JobMap,
    pool: SqlitePool,
    source: Arc<dyn TrackSource>,
) {
    loop {
        // Hold the receiver lock only while waiting for the next job.
        let job = { queue.lock().await.recv().await };
        let Some(job) = job else {
            debug!(worker_id, "Job queue closed, worker exiting");
            break;
        };

        match job {
            QueuedJob::Match { job_id, audio_path } => {
                debug!(worker_id, %job_id, path = %audio_path.display(), "Running match job");
                let _audio = TempAudio::new(audio_path.clone());
                let result = processor::run_match(&pool, &audio_path).await;
                finish(&jobs, job_id, result.map(JobOutcome::Match)).await;
            }
            QueuedJob::Ingest { job_id, url } => {
                debug!(worker_id, %job_id, url = %url, "Running ingest job");
                let result = processor::run_ingest(&pool, Arc::clone(&source), &url).await;
                finish(&jobs, job_id, result.map(JobOutcome::Ingest)).await;
            }
        }
    }
}

/// Record a job's terminal transition. Errors never propagate out of a
/// worker; they end up on the record as the FAIL reason.
async fn finish(jobs: &JobMap, job_id: Uuid, result: Result<JobOutcome>) {
    let mut map = jobs.write().await;
    let Some(record) = map.get_mut(&job_id) else {
        warn!(%job_id, "Completed job has no status record");
        return;
    };

    match result {
        Ok(outcome) => {
            info!(%job_id, "Job succeeded");
            record.complete_success(outcome);
        }
        Err(e) => {
            warn!(%job_id, "Job failed: {}", e);
            record.complete_failure(e.to_string());
        }
    }
}
