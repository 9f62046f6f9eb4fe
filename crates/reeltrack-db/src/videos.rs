//! Database operations for the `videos` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `videos` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VideoRow {
    pub id: i64,
    /// Upstream numeric media id.
    pub video_id: i64,
    pub shortcode: String,
    pub account_id: i64,
    pub video_url: Option<String>,
    pub audio_url: Option<String>,
    pub audio_file_path: Option<String>,
    pub transcription: Option<String>,
    pub caption: Option<String>,
    pub duration_seconds: Option<f64>,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for [`upsert_video`].
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub video_id: i64,
    pub shortcode: String,
    pub account_id: i64,
    pub video_url: Option<String>,
    pub audio_url: Option<String>,
    pub audio_file_path: Option<String>,
    pub transcription: Option<String>,
    pub caption: Option<String>,
    pub duration_seconds: Option<f64>,
    pub published_at: DateTime<Utc>,
}

/// Fetches a video by its upstream shortcode.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_video_by_shortcode(
    pool: &PgPool,
    shortcode: &str,
) -> Result<Option<VideoRow>, DbError> {
    let row = sqlx::query_as::<_, VideoRow>(
        "SELECT id, video_id, shortcode, account_id, video_url, audio_url, \
                audio_file_path, transcription, caption, duration_seconds, \
                published_at, created_at, updated_at \
         FROM videos \
         WHERE shortcode = $1",
    )
    .bind(shortcode)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Fetches a video by its internal id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_video(pool: &PgPool, id: i64) -> Result<VideoRow, DbError> {
    let row = sqlx::query_as::<_, VideoRow>(
        "SELECT id, video_id, shortcode, account_id, video_url, audio_url, \
                audio_file_path, transcription, caption, duration_seconds, \
                published_at, created_at, updated_at \
         FROM videos \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Inserts a video, or fills in missing enrichment data on an existing row.
///
/// Conflicts on `(video_id)` leave the immutable fields (`shortcode`,
/// `account_id`, `published_at`) untouched and fill the nullable
/// enrichment fields only where they are currently NULL — a later
/// enrichment retry can complete a partial row but never overwrites
/// data already present.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_video(pool: &PgPool, video: &NewVideo) -> Result<VideoRow, DbError> {
    let row = sqlx::query_as::<_, VideoRow>(
        "INSERT INTO videos \
             (video_id, shortcode, account_id, video_url, audio_url, audio_file_path, \
              transcription, caption, duration_seconds, published_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (video_id) DO UPDATE SET \
             video_url        = COALESCE(videos.video_url, EXCLUDED.video_url), \
             audio_url        = COALESCE(videos.audio_url, EXCLUDED.audio_url), \
             audio_file_path  = COALESCE(videos.audio_file_path, EXCLUDED.audio_file_path), \
             transcription    = COALESCE(videos.transcription, EXCLUDED.transcription), \
             caption          = COALESCE(videos.caption, EXCLUDED.caption), \
             duration_seconds = COALESCE(videos.duration_seconds, EXCLUDED.duration_seconds), \
             updated_at       = NOW() \
         RETURNING id, video_id, shortcode, account_id, video_url, audio_url, \
                   audio_file_path, transcription, caption, duration_seconds, \
                   published_at, created_at, updated_at",
    )
    .bind(video.video_id)
    .bind(&video.shortcode)
    .bind(video.account_id)
    .bind(&video.video_url)
    .bind(&video.audio_url)
    .bind(&video.audio_file_path)
    .bind(&video.transcription)
    .bind(&video.caption)
    .bind(video.duration_seconds)
    .bind(video.published_at)
    .fetch_one(pool)
    .await?;

    Ok(row)
}
