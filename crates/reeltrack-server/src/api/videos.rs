//! Recent videos with their latest metric sample.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{page_size, AdminError, AppState, Envelope};
use crate::middleware::RequestMeta;

#[derive(Debug, Deserialize)]
pub struct RecentVideosQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RecentVideoItem {
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

/// `GET /api/v1/videos/recent?limit=` — newest videos first, each with
/// its most recent metric row if one exists.
pub async fn list_recent_videos(
    State(state): State<AppState>,
    Extension(meta): Extension<RequestMeta>,
    Query(query): Query<RecentVideosQuery>,
) -> impl IntoResponse {
    let limit = page_size(query.limit);

    match reeltrack_db::list_recent_videos(&state.pool, limit).await {
        Ok(rows) => {
            let data: Vec<RecentVideoItem> = rows
                .into_iter()
                .map(|row| RecentVideoItem {
                    id: row.id,
                    shortcode: row.shortcode,
                    username: row.username,
                    caption: row.caption,
                    published_at: row.published_at,
                    has_transcription: row.has_transcription,
                    view_count: row.view_count,
                    like_count: row.like_count,
                    comment_count: row.comment_count,
                    measured_at: row.measured_at,
                })
                .collect();
            Ok(Envelope::reply(&meta, data))
        }
        Err(e) => Err(AdminError::store(&meta, &e)),
    }
}
