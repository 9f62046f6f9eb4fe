//! The heartbeat job: prove to the admin surface that the worker lives.

use reeltrack_db::{heartbeats, with_retry};
use sqlx::PgPool;

use crate::{WorkerError, WORKER_NAME};

/// Upserts the worker's liveness row with the current time and pid.
///
/// # Errors
///
/// Returns [`WorkerError::Db`] if the store is unreachable beyond the
/// retry budget.
pub async fn run_heartbeat(pool: &PgPool) -> Result<(), WorkerError> {
    let pid = i32::try_from(std::process::id()).ok();
    with_retry(|| heartbeats::upsert_heartbeat(pool, WORKER_NAME, pid, "running")).await?;
    Ok(())
}

/// Marks the worker stopped. Called once on graceful shutdown.
///
/// # Errors
///
/// Returns [`WorkerError::Db`] if the store is unreachable beyond the
/// retry budget.
pub async fn mark_stopped(pool: &PgPool) -> Result<(), WorkerError> {
    with_retry(|| heartbeats::upsert_heartbeat(pool, WORKER_NAME, None, "stopped")).await?;
    Ok(())
}
