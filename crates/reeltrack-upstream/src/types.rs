//! Wire types for the platform's private JSON API, and the public
//! summaries the rest of the system consumes.

use chrono::{DateTime, Utc};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Public result types
// ---------------------------------------------------------------------------

/// One recent media item, as the discover job consumes it.
#[derive(Debug, Clone)]
pub struct MediaSummary {
    /// Upstream numeric media id.
    pub video_id: i64,
    pub shortcode: String,
    /// Canonical page URL — what the audio extractor is pointed at.
    pub url: String,
    /// Direct media URL (opaque and expiring).
    pub video_url: Option<String>,
    pub audio_url: Option<String>,
    pub caption: Option<String>,
    pub duration_seconds: Option<f64>,
    pub published_at: DateTime<Utc>,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    /// Follower count of the owning account at fetch time.
    pub followers_count: i64,
}

/// A fresh engagement sample for one media item.
#[derive(Debug, Clone)]
pub struct MediaMetrics {
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub save_count: Option<i64>,
    pub followers_count: i64,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub checkpoint_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserInfoEnvelope {
    pub user: UserInfo,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserInfo {
    pub pk: i64,
    #[serde(default)]
    pub follower_count: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WebProfileEnvelope {
    pub data: WebProfileData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WebProfileData {
    pub user: Option<WebProfileUser>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WebProfileUser {
    /// Numeric id serialized as a string on this endpoint.
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FeedEnvelope {
    #[serde(default)]
    pub items: Vec<FeedItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FeedItem {
    pub pk: i64,
    pub code: String,
    /// 1 = photo, 2 = video, 8 = carousel.
    pub media_type: i32,
    /// Unix seconds.
    pub taken_at: i64,
    #[serde(default)]
    pub caption: Option<Caption>,
    #[serde(default)]
    pub video_duration: Option<f64>,
    #[serde(default)]
    pub video_versions: Vec<VideoVersion>,
    #[serde(default)]
    pub play_count: Option<i64>,
    #[serde(default)]
    pub view_count: Option<i64>,
    #[serde(default)]
    pub like_count: Option<i64>,
    #[serde(default)]
    pub comment_count: Option<i64>,
    #[serde(default)]
    pub saved_count: Option<i64>,
    #[serde(default)]
    pub user: Option<FeedItemUser>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FeedItemUser {
    pub pk: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Caption {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VideoVersion {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MediaInfoEnvelope {
    #[serde(default)]
    pub items: Vec<FeedItem>,
}

impl FeedItem {
    pub(crate) fn is_video(&self) -> bool {
        self.media_type == 2
    }

    /// The platform reports reel plays as `play_count` on newer payloads
    /// and `view_count` on older ones.
    pub(crate) fn views(&self) -> i64 {
        self.play_count.or(self.view_count).unwrap_or(0)
    }

    pub(crate) fn published_at(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(self.taken_at, 0).unwrap_or_else(Utc::now)
    }
}
