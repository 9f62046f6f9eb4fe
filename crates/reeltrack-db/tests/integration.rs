//! Offline unit tests for reeltrack-db pool configuration and row types.
//! These tests do not require a live database connection.

use chrono::Utc;
use reeltrack_db::{DueScheduleRow, MetricRow, PoolConfig, ScheduleStatus, VideoRow};

#[test]
fn pool_config_default_matches_store_contract() {
    let config = PoolConfig::default();
    assert_eq!(config.max_connections, 5);
    assert_eq!(config.min_connections, 1);
}

/// Compile-time smoke test: confirm that [`VideoRow`] has all expected
/// fields with the correct types. No database required.
#[test]
fn video_row_has_expected_fields() {
    let row = VideoRow {
        id: 1_i64,
        video_id: 3_600_000_000_000_i64,
        shortcode: "Cx1Yz".to_string(),
        account_id: 42_i64,
        video_url: None,
        audio_url: None,
        audio_file_path: Some("audio/Cx1Yz.mp3".to_string()),
        transcription: None,
        caption: Some("caption".to_string()),
        duration_seconds: Some(12.5),
        published_at: Utc::now(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    assert_eq!(row.shortcode, "Cx1Yz");
    assert_eq!(row.account_id, 42);
    assert!(row.transcription.is_none());
    assert_eq!(row.audio_file_path.as_deref(), Some("audio/Cx1Yz.mp3"));
}

#[test]
fn metric_row_save_count_is_optional() {
    let row = MetricRow {
        id: 1,
        video_id: 2,
        view_count: 1_000,
        like_count: 50,
        comment_count: 3,
        save_count: None,
        followers_count: 20_000,
        measured_at: Utc::now(),
        created_at: Utc::now(),
    };

    assert!(row.save_count.is_none());
    assert_eq!(row.view_count, 1_000);
}

#[test]
fn due_schedule_row_carries_dispatch_context() {
    let row = DueScheduleRow {
        schedule_id: 10,
        video_id: 3,
        media_pk: 3_600_000_000_000,
        shortcode: "S1".to_string(),
        published_at: Utc::now(),
        next_due_at: Utc::now(),
    };

    assert_eq!(row.media_pk, 3_600_000_000_000);
    assert_eq!(row.shortcode, "S1");
}

#[test]
fn schedule_status_column_values() {
    assert_eq!(ScheduleStatus::Idle.as_str(), "idle");
    assert_eq!(ScheduleStatus::Disabled.as_str(), "disabled");
}
