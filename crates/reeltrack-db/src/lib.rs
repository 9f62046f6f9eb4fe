//! The Postgres store: pool setup, embedded migrations, and one module
//! per table. All coordination between the worker's jobs happens
//! through these operations; nothing here keeps in-memory state.

use reeltrack_core::AppConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;

// Relative to this crate's Cargo.toml, i.e. <workspace-root>/migrations/.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

/// Pool sizing, either [`Default`] or lifted from [`AppConfig`].
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 1,
            acquire_timeout_secs: 10,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("record not found")]
    NotFound,
    #[error(transparent)]
    Config(#[from] reeltrack_core::ConfigError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl DbError {
    /// Errors worth retrying with a short backoff: connection-level and
    /// pool-acquisition failures. Constraint violations and missing rows
    /// are not transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            DbError::Sqlx(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::WorkerCrashed
                    | sqlx::Error::Tls(_)
            ),
            _ => false,
        }
    }
}

/// Opens a Postgres pool against `database_url` with the given sizing.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if no connection can be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Applies any migrations the database has not seen yet. Safe to call
/// from every binary; whichever starts first on a fresh database
/// creates the schema.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if a migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

/// Proves the pool can still reach the database with a trivial query.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the round trip fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// [`ping`] behind the crate's own error type, for the admin health
/// endpoint.
///
/// # Errors
///
/// Returns [`DbError`] if the ping fails.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    ping(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pool_is_sized_for_a_single_worker() {
        let config = PoolConfig::default();

        assert_eq!(config.max_connections, 5);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.acquire_timeout_secs, 10);
    }

    #[test]
    fn not_found_is_not_transient() {
        assert!(!DbError::NotFound.is_transient());
    }

    #[test]
    fn row_not_found_is_not_transient() {
        assert!(!DbError::Sqlx(sqlx::Error::RowNotFound).is_transient());
    }

    #[test]
    fn io_error_is_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(DbError::Sqlx(sqlx::Error::Io(io)).is_transient());
    }

    #[test]
    fn pool_timeout_is_transient() {
        assert!(DbError::Sqlx(sqlx::Error::PoolTimedOut).is_transient());
    }
}

pub mod accounts;
pub mod admin;
pub mod heartbeats;
pub mod metrics;
pub mod retry;
pub mod schedules;
pub mod videos;

pub use accounts::{list_accounts, seed_accounts, upsert_account, AccountRow, SeedAccount};
pub use admin::{list_accounts_with_counts, list_recent_videos, AccountSummaryRow, RecentVideoRow};
pub use heartbeats::{get_heartbeat, upsert_heartbeat, HeartbeatRow};
pub use metrics::{
    append_metric, latest_metric_for_video, list_metrics_for_video, MetricRow, NewMetric,
};
pub use retry::with_retry;
pub use schedules::{
    claim_due_schedules, create_schedule_if_missing, list_idle_schedules, reap_stale_running,
    release_schedule, reschedule_idle, schedule_for_video, DueScheduleRow, IdleScheduleRow,
    MetricScheduleRow, ScheduleStatus,
};
pub use videos::{get_video, get_video_by_shortcode, upsert_video, NewVideo, VideoRow};
