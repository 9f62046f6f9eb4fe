//! Database operations for the `worker_heartbeats` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `worker_heartbeats` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HeartbeatRow {
    pub id: i64,
    pub worker_name: String,
    pub last_heartbeat: DateTime<Utc>,
    pub status: String,
    pub pid: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Upserts the liveness record for a worker.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_heartbeat(
    pool: &PgPool,
    worker_name: &str,
    pid: Option<i32>,
    status: &str,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO worker_heartbeats (worker_name, last_heartbeat, status, pid) \
         VALUES ($1, NOW(), $2, $3) \
         ON CONFLICT (worker_name) DO UPDATE SET \
             last_heartbeat = NOW(), \
             status         = EXCLUDED.status, \
             pid            = COALESCE(EXCLUDED.pid, worker_heartbeats.pid), \
             updated_at     = NOW()",
    )
    .bind(worker_name)
    .bind(status)
    .bind(pid)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetches the heartbeat row for a worker, if one has ever been written.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_heartbeat(
    pool: &PgPool,
    worker_name: &str,
) -> Result<Option<HeartbeatRow>, DbError> {
    let row = sqlx::query_as::<_, HeartbeatRow>(
        "SELECT id, worker_name, last_heartbeat, status, pid, created_at, updated_at \
         FROM worker_heartbeats \
         WHERE worker_name = $1",
    )
    .bind(worker_name)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
