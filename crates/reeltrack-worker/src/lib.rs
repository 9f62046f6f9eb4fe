//! The unified scheduling worker.
//!
//! One long-running process coordinates three interleaved periodic
//! activities against the store — video discovery, metric-schedule
//! maintenance, and due-metric dispatch — plus a liveness heartbeat.
//! Jobs are driven by a [`tokio_cron_scheduler::JobScheduler`]; each is
//! guarded against overlapping with itself, and all cross-job
//! coordination goes through the database.

pub mod jobs;
pub mod policy;
pub mod scheduler;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use thiserror::Error;

use reeltrack_core::AppConfig;
use reeltrack_db::DbError;
use reeltrack_enrich::Enricher;
use reeltrack_upstream::{UpstreamClient, UpstreamError};

pub use jobs::JobGuards;

/// The heartbeat row this worker writes and the admin surface reads.
pub const WORKER_NAME: &str = "reeltrack-worker";

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),
}

/// Tick cadences and in-loop delays, derived once from config.
#[derive(Debug, Clone, Copy)]
pub struct JobIntervals {
    pub discover: Duration,
    pub reschedule: Duration,
    pub dispatch: Duration,
    pub heartbeat: Duration,
    pub inter_account_delay: Duration,
    pub inter_metric_delay: Duration,
}

impl JobIntervals {
    /// Production cadences, or the compressed test-mode ones.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        if config.test_mode {
            Self {
                discover: Duration::from_secs(10),
                reschedule: Duration::from_secs(30),
                dispatch: Duration::from_secs(10),
                heartbeat: Duration::from_secs(10),
                inter_account_delay: Duration::from_secs(1),
                inter_metric_delay: Duration::from_millis(100),
            }
        } else {
            Self {
                discover: Duration::from_secs(config.worker_interval_hours * 3_600),
                reschedule: Duration::from_secs(3_600),
                dispatch: Duration::from_secs(60),
                heartbeat: Duration::from_secs(30),
                inter_account_delay: Duration::from_secs(10),
                inter_metric_delay: Duration::from_millis(500),
            }
        }
    }

    /// A lease older than this is considered lost and reaped at startup.
    #[must_use]
    pub fn lease_timeout(&self) -> Duration {
        self.dispatch * 10
    }
}

/// Everything the jobs share. One instance per worker process.
pub struct WorkerContext {
    pub pool: PgPool,
    pub upstream: Arc<UpstreamClient>,
    pub enricher: Arc<Enricher>,
    pub intervals: JobIntervals,
    pub reels_limit: u32,
    pub dispatch_batch_limit: i64,
    pub audio_dir: PathBuf,
    pub guards: JobGuards,
}
