//! Database operations for the `metrics` table.
//!
//! Metric rows are append-only observations; nothing here mutates or
//! deletes an existing row.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `metrics` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MetricRow {
    pub id: i64,
    pub video_id: i64,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub save_count: Option<i64>,
    pub followers_count: i64,
    pub measured_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for [`append_metric`].
#[derive(Debug, Clone)]
pub struct NewMetric {
    pub video_id: i64,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub save_count: Option<i64>,
    pub followers_count: i64,
    pub measured_at: DateTime<Utc>,
}

/// Appends one metric observation. Pure insert, never an update.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn append_metric(pool: &PgPool, metric: &NewMetric) -> Result<MetricRow, DbError> {
    let row = sqlx::query_as::<_, MetricRow>(
        "INSERT INTO metrics \
             (video_id, view_count, like_count, comment_count, save_count, \
              followers_count, measured_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING id, video_id, view_count, like_count, comment_count, save_count, \
                   followers_count, measured_at, created_at",
    )
    .bind(metric.video_id)
    .bind(metric.view_count)
    .bind(metric.like_count)
    .bind(metric.comment_count)
    .bind(metric.save_count)
    .bind(metric.followers_count)
    .bind(metric.measured_at)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Returns the most recent metric row for a video, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn latest_metric_for_video(
    pool: &PgPool,
    video_id: i64,
) -> Result<Option<MetricRow>, DbError> {
    let row = sqlx::query_as::<_, MetricRow>(
        "SELECT id, video_id, view_count, like_count, comment_count, save_count, \
                followers_count, measured_at, created_at \
         FROM metrics \
         WHERE video_id = $1 \
         ORDER BY measured_at DESC, id DESC \
         LIMIT 1",
    )
    .bind(video_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns all metric rows for a video ordered by `measured_at`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_metrics_for_video(
    pool: &PgPool,
    video_id: i64,
) -> Result<Vec<MetricRow>, DbError> {
    let rows = sqlx::query_as::<_, MetricRow>(
        "SELECT id, video_id, view_count, like_count, comment_count, save_count, \
                followers_count, measured_at, created_at \
         FROM metrics \
         WHERE video_id = $1 \
         ORDER BY measured_at, id",
    )
    .bind(video_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
