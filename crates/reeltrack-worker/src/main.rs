use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing_subscriber::EnvFilter;

use reeltrack_db::{schedules, PoolConfig};
use reeltrack_enrich::{Enricher, WhisperCli, YtDlpExtractor};
use reeltrack_upstream::{UpstreamClient, UpstreamConfig};
use reeltrack_worker::{jobs::heartbeat, scheduler, JobIntervals, WorkerContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = reeltrack_core::load_app_config()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    tracing::info!(?config, "starting unified worker");
    if config.test_mode {
        tracing::warn!("TEST_MODE enabled — all cadences compressed");
    }

    tokio::fs::create_dir_all(&config.audio_dir).await?;

    let pool = reeltrack_db::connect_pool(
        &config.database_url,
        PoolConfig::from_app_config(&config),
    )
    .await?;
    reeltrack_db::run_migrations(&pool).await?;

    let intervals = JobIntervals::from_config(&config);

    // Leases lost to a previous crash are reclaimed before any dispatch
    // tick can run.
    let lease_timeout = Duration::from_std(intervals.lease_timeout())?;
    let reaped = schedules::reap_stale_running(&pool, Utc::now() - lease_timeout).await?;
    if reaped > 0 {
        tracing::warn!(reaped, "reaped stale schedule leases from a previous run");
    }

    heartbeat::run_heartbeat(&pool).await?;

    let upstream = Arc::new(UpstreamClient::new(UpstreamConfig::from_app_config(
        &config,
    ))?);
    let enricher = Arc::new(Enricher::new(
        config.audio_dir.clone(),
        Box::new(YtDlpExtractor::new(config.ytdlp_bin.clone())),
        Box::new(WhisperCli::new(
            config.whisper_bin.clone(),
            config.whisper_model.clone(),
        )),
    ));

    let ctx = Arc::new(WorkerContext {
        pool: pool.clone(),
        upstream,
        enricher,
        intervals,
        reels_limit: config.worker_reels_limit,
        dispatch_batch_limit: config.dispatch_batch_limit,
        audio_dir: config.audio_dir.clone(),
        guards: reeltrack_worker::JobGuards::default(),
    });

    let scheduler_handle = scheduler::build_scheduler(Arc::clone(&ctx)).await?;
    tracing::info!(
        discover_secs = ctx.intervals.discover.as_secs(),
        reschedule_secs = ctx.intervals.reschedule.as_secs(),
        dispatch_secs = ctx.intervals.dispatch.as_secs(),
        heartbeat_secs = ctx.intervals.heartbeat.as_secs(),
        "scheduler started"
    );

    // First pass runs concurrently so shutdown stays responsive during a
    // long initial discover.
    let initial_ctx = Arc::clone(&ctx);
    tokio::spawn(async move {
        scheduler::run_initial_pass(&initial_ctx).await;
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("interrupt received — shutting down");

    let mut scheduler_handle = scheduler_handle;
    if let Err(e) = scheduler_handle.shutdown().await {
        tracing::warn!(error = %e, "scheduler shutdown reported an error");
    }
    if let Err(e) = heartbeat::mark_stopped(&pool).await {
        tracing::error!(error = %e, "could not mark worker stopped");
    }
    pool.close().await;
    tracing::info!("worker stopped");

    Ok(())
}
