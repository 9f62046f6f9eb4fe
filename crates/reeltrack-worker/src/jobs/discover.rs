//! The discover job: find newly published videos for every tracked
//! account, enrich them, and seed their first metric schedule.

use chrono::Utc;
use reeltrack_db::{accounts, schedules, videos, with_retry, AccountRow, NewVideo};
use reeltrack_upstream::{MediaSummary, UpstreamError};

use crate::policy;
use crate::{WorkerContext, WorkerError};

#[derive(Debug, Default)]
pub struct DiscoverOutcome {
    pub accounts_processed: usize,
    pub new_videos: usize,
}

/// Runs one discover tick over all tracked accounts.
///
/// Per-account upstream trouble is contained: a vanished account is
/// skipped, a transient failure moves on to the next account. An auth
/// failure or a rate limit aborts the remainder of the tick — every
/// further call would hit the same wall.
///
/// # Errors
///
/// Returns [`WorkerError::Db`] if the store is unreachable beyond the
/// retry budget, or [`WorkerError::Upstream`] when the tick is aborted.
pub async fn run_discover(ctx: &WorkerContext) -> Result<DiscoverOutcome, WorkerError> {
    let account_list = with_retry(|| accounts::list_accounts(&ctx.pool)).await?;
    tracing::info!(count = account_list.len(), "discover: starting tick");

    if account_list.is_empty() {
        tracing::warn!("discover: no accounts in store — nothing to do");
        return Ok(DiscoverOutcome::default());
    }

    let mut outcome = DiscoverOutcome::default();
    for account in &account_list {
        let media = match ctx.upstream.recent_media(account.id, ctx.reels_limit).await {
            Ok(media) => media,
            Err(UpstreamError::NotFound { .. }) => {
                tracing::warn!(
                    account = %account.username,
                    "discover: account gone or private — skipping"
                );
                continue;
            }
            Err(e @ (UpstreamError::Auth(_) | UpstreamError::RateLimited { .. })) => {
                tracing::warn!(
                    account = %account.username,
                    error = %e,
                    "discover: aborting tick"
                );
                return Err(e.into());
            }
            Err(e) => {
                tracing::error!(
                    account = %account.username,
                    error = %e,
                    "discover: fetch failed — skipping account"
                );
                continue;
            }
        };

        let new_videos = process_account_media(ctx, account, &media).await?;
        outcome.accounts_processed += 1;
        outcome.new_videos += new_videos;
        tracing::info!(
            account = %account.username,
            new_videos,
            "discover: account processed"
        );

        tokio::time::sleep(ctx.intervals.inter_account_delay).await;
    }

    tracing::info!(
        accounts = outcome.accounts_processed,
        new_videos = outcome.new_videos,
        "discover: tick complete"
    );
    Ok(outcome)
}

/// Walks one account's recent media, newest first, stopping at the first
/// shortcode the store already knows.
///
/// The break assumes the upstream returns newest-first and that earlier
/// runs processed everything older; a new account catches up over
/// successive ticks.
async fn process_account_media(
    ctx: &WorkerContext,
    account: &AccountRow,
    media: &[MediaSummary],
) -> Result<usize, WorkerError> {
    // The feed carries the owner's current follower count; refresh the
    // cached value while we are here.
    if let Some(first) = media.first() {
        with_retry(|| {
            accounts::upsert_account(
                &ctx.pool,
                account.id,
                &account.username,
                account.profile_url.as_deref(),
                first.followers_count,
            )
        })
        .await?;
    }

    let mut inserted = 0usize;
    for m in media {
        let existing = with_retry(|| videos::get_video_by_shortcode(&ctx.pool, &m.shortcode)).await?;
        if existing.is_some() {
            tracing::debug!(
                account = %account.username,
                shortcode = %m.shortcode,
                "discover: shortcode known — assuming older media already processed"
            );
            break;
        }

        let enrichment = ctx.enricher.enrich(&m.shortcode, &m.url).await;

        let video = with_retry(|| {
            let new_video = NewVideo {
                video_id: m.video_id,
                shortcode: m.shortcode.clone(),
                account_id: account.id,
                video_url: m.video_url.clone(),
                audio_url: m.audio_url.clone(),
                audio_file_path: enrichment
                    .audio_file_path
                    .as_ref()
                    .map(|p| p.display().to_string()),
                transcription: enrichment.transcription.clone(),
                caption: m.caption.clone(),
                duration_seconds: m.duration_seconds,
                published_at: m.published_at,
            };
            let pool = &ctx.pool;
            async move { videos::upsert_video(pool, &new_video).await }
        })
        .await?;

        let now = Utc::now();
        let interval = policy::sample_interval(now - m.published_at);
        with_retry(|| {
            schedules::create_schedule_if_missing(
                &ctx.pool,
                video.id,
                policy::next_due(m.published_at, now),
                interval.num_seconds(),
            )
        })
        .await?;

        inserted += 1;
        tracing::info!(
            account = %account.username,
            shortcode = %m.shortcode,
            transcribed = video.transcription.is_some(),
            "discover: stored new video"
        );
    }

    Ok(inserted)
}
