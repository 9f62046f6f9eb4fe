//! Database operations for the `metric_schedules` table.
//!
//! One schedule row per video drives the dispatch-due job. The row is a
//! small state machine: `idle → running → idle` on a normal sample,
//! `idle → running → disabled` when the media is gone, and
//! `running → idle` when the startup reaper reclaims a lost lease.
//! [`claim_due_schedules`] is the at-most-once dispatch gate.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// Schedule lifecycle states as stored in `metric_schedules.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleStatus {
    Idle,
    Running,
    Disabled,
}

impl ScheduleStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ScheduleStatus::Idle => "idle",
            ScheduleStatus::Running => "running",
            ScheduleStatus::Disabled => "disabled",
        }
    }
}

/// A row from the `metric_schedules` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MetricScheduleRow {
    pub id: i64,
    pub video_id: i64,
    pub next_due_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub interval_seconds: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A claimed schedule joined with the video columns the dispatcher needs.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DueScheduleRow {
    pub schedule_id: i64,
    /// Internal `videos.id`.
    pub video_id: i64,
    /// Upstream numeric media id.
    pub media_pk: i64,
    pub shortcode: String,
    pub published_at: DateTime<Utc>,
    pub next_due_at: DateTime<Utc>,
}

/// An idle schedule joined with its video's publication time, for the
/// reschedule walk.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IdleScheduleRow {
    pub schedule_id: i64,
    pub video_id: i64,
    pub published_at: DateTime<Utc>,
}

/// Creates the schedule row for a video if none exists yet.
///
/// Conflicts on `(video_id)` are a no-op: an existing schedule — whatever
/// its state — is left alone.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_schedule_if_missing(
    pool: &PgPool,
    video_id: i64,
    next_due_at: DateTime<Utc>,
    interval_seconds: i64,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO metric_schedules (video_id, next_due_at, interval_seconds, status) \
         VALUES ($1, $2, $3, 'idle') \
         ON CONFLICT (video_id) DO NOTHING",
    )
    .bind(video_id)
    .bind(next_due_at)
    .bind(interval_seconds)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetches the schedule row for a video.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the video has no schedule, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn schedule_for_video(
    pool: &PgPool,
    video_id: i64,
) -> Result<MetricScheduleRow, DbError> {
    let row = sqlx::query_as::<_, MetricScheduleRow>(
        "SELECT id, video_id, next_due_at, last_run_at, interval_seconds, status, \
                created_at, updated_at \
         FROM metric_schedules \
         WHERE video_id = $1",
    )
    .bind(video_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Atomically selects and leases up to `limit` due schedules.
///
/// A single statement flips `status` from `idle` to `running` for rows
/// with `next_due_at <= now`, using `FOR UPDATE SKIP LOCKED` so that
/// concurrent callers receive disjoint batches. Rows are returned joined
/// with the video columns the dispatcher needs.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the statement fails.
pub async fn claim_due_schedules(
    pool: &PgPool,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<DueScheduleRow>, DbError> {
    let rows = sqlx::query_as::<_, DueScheduleRow>(
        "WITH claimed AS ( \
             UPDATE metric_schedules \
             SET status = 'running', updated_at = NOW() \
             WHERE id IN ( \
                 SELECT id FROM metric_schedules \
                 WHERE status = 'idle' AND next_due_at <= $1 \
                 ORDER BY next_due_at \
                 LIMIT $2 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING id, video_id, next_due_at \
         ) \
         SELECT c.id AS schedule_id, c.video_id, c.next_due_at, \
                v.video_id AS media_pk, v.shortcode, v.published_at \
         FROM claimed c \
         JOIN videos v ON v.id = c.video_id \
         ORDER BY c.next_due_at",
    )
    .bind(now)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns a lease taken by [`claim_due_schedules`] and advances the
/// schedule.
///
/// `last_run_at` is updated only when `Some` — a schedule released
/// without a successful sample keeps its previous run timestamp.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the schedule id does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn release_schedule(
    pool: &PgPool,
    id: i64,
    next_due_at: DateTime<Utc>,
    last_run_at: Option<DateTime<Utc>>,
    status: ScheduleStatus,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE metric_schedules \
         SET next_due_at = $2, \
             last_run_at = COALESCE($3, last_run_at), \
             status      = $4, \
             updated_at  = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(next_due_at)
    .bind(last_run_at)
    .bind(status.as_str())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Updates the advisory interval and due time of an idle schedule.
///
/// Guarded by `status = 'idle'`: a row currently leased by a dispatcher
/// is never touched, so an in-flight sample cannot be rescheduled from
/// under its owner.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn reschedule_idle(
    pool: &PgPool,
    id: i64,
    next_due_at: DateTime<Utc>,
    interval_seconds: i64,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE metric_schedules \
         SET next_due_at = $2, interval_seconds = $3, updated_at = NOW() \
         WHERE id = $1 AND status = 'idle'",
    )
    .bind(id)
    .bind(next_due_at)
    .bind(interval_seconds)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Returns all idle schedules joined with their video's publication
/// time, for the reschedule walk.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_idle_schedules(pool: &PgPool) -> Result<Vec<IdleScheduleRow>, DbError> {
    let rows = sqlx::query_as::<_, IdleScheduleRow>(
        "SELECT s.id AS schedule_id, s.video_id, v.published_at \
         FROM metric_schedules s \
         JOIN videos v ON v.id = s.video_id \
         WHERE s.status = 'idle' \
         ORDER BY s.id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns leases lost to a crash back to `idle`.
///
/// A `running` row whose `updated_at` predates `cutoff` belonged to a
/// dispatcher that never released it; the caller computes the cutoff
/// from the lease timeout. Returns the number of rows reaped.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn reap_stale_running(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE metric_schedules \
         SET status = 'idle', updated_at = NOW() \
         WHERE status = 'running' AND updated_at < $1",
    )
    .bind(cutoff)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
