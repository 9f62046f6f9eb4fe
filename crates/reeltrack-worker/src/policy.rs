//! The age-decaying sampling cadence.
//!
//! Young videos change fast and are sampled often; old ones settle into
//! a daily rhythm. Both schedule creation and the periodic reschedule
//! walk go through [`next_due`], which anchors the interval at the
//! *current* time — never at `published_at + interval`.

use chrono::{DateTime, Duration, Utc};

/// Maps a video's age to the interval until its next sample.
///
/// | Age of video          | Interval |
/// |-----------------------|----------|
/// | under 1 h             | 1 h      |
/// | 1 h to under 7 h      | 2 h      |
/// | 7 h to under 31 h     | 12 h     |
/// | 31 h and older        | 24 h     |
///
/// Boundaries are half-open on the right: a video aged exactly 1 h is in
/// the 2 h bucket. A negative age (upstream clock ahead of ours) falls
/// into the first bucket.
#[must_use]
pub fn sample_interval(age: Duration) -> Duration {
    if age < Duration::hours(1) {
        Duration::hours(1)
    } else if age < Duration::hours(7) {
        Duration::hours(2)
    } else if age < Duration::hours(31) {
        Duration::hours(12)
    } else {
        Duration::hours(24)
    }
}

/// The next sample time for a video published at `published_at`, as seen
/// from `now`. Deterministic, and monotone non-decreasing in `now` for a
/// fixed `published_at`.
#[must_use]
pub fn next_due(published_at: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    now + sample_interval(now - published_at)
}
