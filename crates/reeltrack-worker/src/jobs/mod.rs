//! The worker's periodic jobs and their reentrancy guards.

pub mod discover;
pub mod dispatch;
pub mod heartbeat;
pub mod reschedule;

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::WorkerError;

/// A job that fails this many times in a row is paused for one interval.
const MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// Per-job reentrancy guard and failure counter.
///
/// A tick that fires while the previous invocation of the same job is
/// still running is silently skipped; jobs never run in parallel with
/// themselves. Repeated job-level failures pause the job for one
/// interval before it is tried again.
pub struct JobGuard {
    name: &'static str,
    running: AtomicBool,
    consecutive_failures: AtomicU32,
    pause_next: AtomicBool,
}

impl JobGuard {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            running: AtomicBool::new(false),
            consecutive_failures: AtomicU32::new(0),
            pause_next: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Attempts to enter the job. Returns `false` when the tick should
    /// be skipped — either the previous run is still going, or the job
    /// is serving its one-interval failure pause.
    fn try_enter(&self) -> bool {
        if self.pause_next.swap(false, Ordering::SeqCst) {
            tracing::info!(job = self.name, "skipping one interval after repeated failures");
            return false;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::info!(job = self.name, "previous run still in progress — skipping tick");
            return false;
        }
        true
    }

    fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }

    fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures > MAX_CONSECUTIVE_FAILURES {
            tracing::warn!(
                job = self.name,
                failures,
                "too many consecutive failures — pausing job for one interval"
            );
            self.pause_next.store(true, Ordering::SeqCst);
            self.consecutive_failures.store(0, Ordering::SeqCst);
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

/// One guard per job kind.
pub struct JobGuards {
    pub discover: JobGuard,
    pub reschedule: JobGuard,
    pub dispatch: JobGuard,
    pub heartbeat: JobGuard,
}

impl Default for JobGuards {
    fn default() -> Self {
        Self {
            discover: JobGuard::new("discover"),
            reschedule: JobGuard::new("reschedule"),
            dispatch: JobGuard::new("dispatch-due"),
            heartbeat: JobGuard::new("heartbeat"),
        }
    }
}

/// Runs a job body under its guard. Job-level errors are logged and
/// counted; they never escape to the scheduler framework.
pub async fn run_guarded<F, Fut>(guard: &JobGuard, job: F)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(), WorkerError>>,
{
    if !guard.try_enter() {
        return;
    }
    match job().await {
        Ok(()) => guard.record_success(),
        Err(e) => {
            tracing::error!(job = guard.name, error = %e, "job failed");
            guard.record_failure();
        }
    }
}
