//! The dispatch-due job: sample metrics for every schedule whose time
//! has come.
//!
//! Claiming is atomic — see `claim_due_schedules` — so two overlapping
//! dispatchers can never sample the same schedule. Each claimed row is
//! released exactly once, whatever happens in between.

use chrono::{DateTime, Duration, Utc};
use reeltrack_db::{metrics, schedules, with_retry, DueScheduleRow, NewMetric, ScheduleStatus};
use reeltrack_upstream::UpstreamError;

use crate::policy;
use crate::{WorkerContext, WorkerError};

/// Delay before retrying a schedule that hit a transient upstream error.
const TRANSIENT_RETRY_SECS: i64 = 60;

#[derive(Debug, Default)]
pub struct DispatchOutcome {
    pub claimed: usize,
    pub sampled: usize,
    pub disabled: usize,
    pub rate_limited: bool,
}

/// Runs one dispatch tick.
///
/// # Errors
///
/// Returns [`WorkerError::Db`] if the store is unreachable beyond the
/// retry budget, or [`WorkerError::Upstream`] on an auth failure (the
/// rest of the batch is released untouched first).
pub async fn run_dispatch(ctx: &WorkerContext) -> Result<DispatchOutcome, WorkerError> {
    let now = Utc::now();
    let batch =
        with_retry(|| schedules::claim_due_schedules(&ctx.pool, now, ctx.dispatch_batch_limit))
            .await?;

    let mut outcome = DispatchOutcome {
        claimed: batch.len(),
        ..DispatchOutcome::default()
    };
    if batch.is_empty() {
        return Ok(outcome);
    }
    tracing::info!(claimed = batch.len(), "dispatch: processing due schedules");

    let mut queue = batch.into_iter();
    while let Some(due) = queue.next() {
        let now = Utc::now();
        match ctx.upstream.media_metrics(due.media_pk).await {
            Ok(counts) => {
                let new_metric = NewMetric {
                    video_id: due.video_id,
                    view_count: counts.view_count,
                    like_count: counts.like_count,
                    comment_count: counts.comment_count,
                    save_count: counts.save_count,
                    followers_count: counts.followers_count,
                    measured_at: now,
                };
                with_retry(|| metrics::append_metric(&ctx.pool, &new_metric)).await?;

                release(
                    ctx,
                    due.schedule_id,
                    policy::next_due(due.published_at, now),
                    Some(now),
                    ScheduleStatus::Idle,
                )
                .await?;
                outcome.sampled += 1;
                tracing::info!(
                    shortcode = %due.shortcode,
                    views = counts.view_count,
                    "dispatch: sample stored"
                );
            }
            Err(UpstreamError::NotFound { .. }) => {
                // The media is gone; its schedule is terminal.
                release(ctx, due.schedule_id, far_future(now), None, ScheduleStatus::Disabled)
                    .await?;
                outcome.disabled += 1;
                tracing::warn!(
                    shortcode = %due.shortcode,
                    "dispatch: media gone — schedule disabled"
                );
            }
            Err(UpstreamError::RateLimited { retry_after_secs }) => {
                // Honour the advisory delay, capped at a day against a
                // nonsense Retry-After.
                let retry_after = i64::try_from(retry_after_secs)
                    .unwrap_or(86_400)
                    .min(86_400);
                release(
                    ctx,
                    due.schedule_id,
                    now + Duration::seconds(retry_after),
                    None,
                    ScheduleStatus::Idle,
                )
                .await?;
                unwind_remaining(ctx, queue).await?;
                outcome.rate_limited = true;
                tracing::warn!(
                    retry_after_secs,
                    "dispatch: rate limited — backing off for the rest of this tick"
                );
                break;
            }
            Err(e @ UpstreamError::Auth(_)) => {
                release(ctx, due.schedule_id, due.next_due_at, None, ScheduleStatus::Idle).await?;
                unwind_remaining(ctx, queue).await?;
                return Err(e.into());
            }
            Err(e) => {
                tracing::error!(
                    shortcode = %due.shortcode,
                    error = %e,
                    "dispatch: sample failed — retrying shortly"
                );
                release(
                    ctx,
                    due.schedule_id,
                    now + Duration::seconds(TRANSIENT_RETRY_SECS),
                    None,
                    ScheduleStatus::Idle,
                )
                .await?;
            }
        }

        tokio::time::sleep(ctx.intervals.inter_metric_delay).await;
    }

    Ok(outcome)
}

async fn release(
    ctx: &WorkerContext,
    schedule_id: i64,
    next_due_at: DateTime<Utc>,
    last_run_at: Option<DateTime<Utc>>,
    status: ScheduleStatus,
) -> Result<(), WorkerError> {
    with_retry(|| {
        schedules::release_schedule(&ctx.pool, schedule_id, next_due_at, last_run_at, status)
    })
    .await?;
    Ok(())
}

/// Releases the unprocessed tail of a claimed batch back to `idle` with
/// its original due times, instead of leaving the leases for the reaper.
async fn unwind_remaining(
    ctx: &WorkerContext,
    queue: impl Iterator<Item = DueScheduleRow>,
) -> Result<(), WorkerError> {
    for due in queue {
        release(ctx, due.schedule_id, due.next_due_at, None, ScheduleStatus::Idle).await?;
    }
    Ok(())
}

/// Effectively never: the due time given to a disabled schedule.
fn far_future(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::days(365 * 100)
}
