//! Wires the four worker jobs onto repeated-interval triggers.
//!
//! The [`JobScheduler`] handle lives as long as the process does; when
//! it goes away, so do the jobs.

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::jobs::{discover, dispatch, heartbeat, reschedule, run_guarded};
use crate::WorkerContext;

/// Builds and starts the scheduler over the four worker jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] when scheduler setup, job registration,
/// or startup fails.
pub async fn build_scheduler(ctx: Arc<WorkerContext>) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let discover_ctx = Arc::clone(&ctx);
    scheduler
        .add(Job::new_repeated_async(
            ctx.intervals.discover,
            move |_uuid, _lock| {
                let ctx = Arc::clone(&discover_ctx);
                Box::pin(async move {
                    run_guarded(&ctx.guards.discover, || async {
                        discover::run_discover(&ctx).await.map(|_| ())
                    })
                    .await;
                })
            },
        )?)
        .await?;

    let reschedule_ctx = Arc::clone(&ctx);
    scheduler
        .add(Job::new_repeated_async(
            ctx.intervals.reschedule,
            move |_uuid, _lock| {
                let ctx = Arc::clone(&reschedule_ctx);
                Box::pin(async move {
                    run_guarded(&ctx.guards.reschedule, || async {
                        reschedule::run_reschedule(&ctx).await.map(|_| ())
                    })
                    .await;
                })
            },
        )?)
        .await?;

    let dispatch_ctx = Arc::clone(&ctx);
    scheduler
        .add(Job::new_repeated_async(
            ctx.intervals.dispatch,
            move |_uuid, _lock| {
                let ctx = Arc::clone(&dispatch_ctx);
                Box::pin(async move {
                    run_guarded(&ctx.guards.dispatch, || async {
                        dispatch::run_dispatch(&ctx).await.map(|_| ())
                    })
                    .await;
                })
            },
        )?)
        .await?;

    let heartbeat_ctx = Arc::clone(&ctx);
    scheduler
        .add(Job::new_repeated_async(
            ctx.intervals.heartbeat,
            move |_uuid, _lock| {
                let ctx = Arc::clone(&heartbeat_ctx);
                Box::pin(async move {
                    run_guarded(&ctx.guards.heartbeat, || async {
                        heartbeat::run_heartbeat(&ctx.pool).await
                    })
                    .await;
                })
            },
        )?)
        .await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Runs every job once, in dependency-friendly order. Called right after
/// startup so a freshly deployed worker does useful work immediately
/// instead of waiting out its first discover interval.
pub async fn run_initial_pass(ctx: &Arc<WorkerContext>) {
    run_guarded(&ctx.guards.heartbeat, || async {
        heartbeat::run_heartbeat(&ctx.pool).await
    })
    .await;
    run_guarded(&ctx.guards.discover, || async {
        discover::run_discover(ctx).await.map(|_| ())
    })
    .await;
    run_guarded(&ctx.guards.reschedule, || async {
        reschedule::run_reschedule(ctx).await.map(|_| ())
    })
    .await;
    run_guarded(&ctx.guards.dispatch, || async {
        dispatch::run_dispatch(ctx).await.map(|_| ())
    })
    .await;
}
