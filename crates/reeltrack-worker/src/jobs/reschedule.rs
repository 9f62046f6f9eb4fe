//! The reschedule job: keep every idle schedule's due time in step with
//! its video's age.
//!
//! As a video ages across a cadence boundary the policy interval grows;
//! this walk rewrites `next_due_at` and the advisory `interval_seconds`
//! accordingly. Rows currently leased by a dispatcher are left alone.

use chrono::Utc;
use reeltrack_db::{schedules, with_retry};

use crate::policy;
use crate::{WorkerContext, WorkerError};

/// Runs one reschedule tick. Returns the number of schedules rewritten.
///
/// # Errors
///
/// Returns [`WorkerError::Db`] if the store is unreachable beyond the
/// retry budget.
pub async fn run_reschedule(ctx: &WorkerContext) -> Result<usize, WorkerError> {
    let rows = with_retry(|| schedules::list_idle_schedules(&ctx.pool)).await?;
    tracing::info!(count = rows.len(), "reschedule: walking idle schedules");

    let mut updated = 0usize;
    for row in rows {
        let now = Utc::now();
        let interval = policy::sample_interval(now - row.published_at);
        let moved = with_retry(|| {
            schedules::reschedule_idle(
                &ctx.pool,
                row.schedule_id,
                policy::next_due(row.published_at, now),
                interval.num_seconds(),
            )
        })
        .await?;
        // The guard can lose the race to a dispatcher that claimed the
        // row between the walk and this update; that is fine.
        if moved {
            updated += 1;
        }
    }

    tracing::info!(updated, "reschedule: tick complete");
    Ok(updated)
}
