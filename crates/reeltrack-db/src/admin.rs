//! Read models for the admin API.
//!
//! Aggregated queries the admin surface renders; nothing here writes.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// One account with its tracked-video count.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountSummaryRow {
    pub id: i64,
    pub username: String,
    pub profile_url: Option<String>,
    pub followers_count: i64,
    pub video_count: i64,
    pub created_at: DateTime<Utc>,
}

/// One recent video with its owning account and latest metric sample.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RecentVideoRow {
    pub id: i64,
    pub shortcode: String,
    pub username: String,
    pub caption: Option<String>,
    pub published_at: DateTime<Utc>,
    pub has_transcription: bool,
    pub view_count: Option<i64>,
    pub like_count: Option<i64>,
    pub comment_count: Option<i64>,
    pub measured_at: Option<DateTime<Utc>>,
}

/// Returns all accounts with their video counts, ordered by username.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_accounts_with_counts(pool: &PgPool) -> Result<Vec<AccountSummaryRow>, DbError> {
    let rows = sqlx::query_as::<_, AccountSummaryRow>(
        "SELECT a.id, a.username, a.profile_url, a.followers_count, \
                COUNT(v.id) AS video_count, a.created_at \
         FROM accounts a \
         LEFT JOIN videos v ON v.account_id = a.id \
         GROUP BY a.id \
         ORDER BY a.username",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns the most recently published videos with their latest metric
/// sample, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_videos(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<RecentVideoRow>, DbError> {
    let rows = sqlx::query_as::<_, RecentVideoRow>(
        "SELECT v.id, v.shortcode, a.username, v.caption, v.published_at, \
                (v.transcription IS NOT NULL) AS has_transcription, \
                m.view_count, m.like_count, m.comment_count, m.measured_at \
         FROM videos v \
         JOIN accounts a ON a.id = v.account_id \
         LEFT JOIN LATERAL ( \
             SELECT view_count, like_count, comment_count, measured_at \
             FROM metrics \
             WHERE metrics.video_id = v.id \
             ORDER BY measured_at DESC, id DESC \
             LIMIT 1 \
         ) m ON true \
         ORDER BY v.published_at DESC, v.id DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
