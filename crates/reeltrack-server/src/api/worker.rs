//! Worker liveness, derived from the heartbeat row.

use axum::{extract::State, response::IntoResponse, Extension};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{AdminError, AppState, Envelope};
use crate::middleware::RequestMeta;

/// The heartbeat row the unified worker maintains.
const WORKER_NAME: &str = "reeltrack-worker";

#[derive(Debug, Serialize)]
pub struct WorkerStatus {
    /// `running`, `stale`, `stopped`, or `unknown`.
    pub status: &'static str,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub seconds_since_heartbeat: Option<i64>,
    pub pid: Option<i32>,
}

/// `GET /api/v1/worker/status`.
///
/// A worker that said `stopped` is stopped. Otherwise it is `running`
/// while the last heartbeat is within twice the heartbeat interval, and
/// `stale` after that — the process likely died without the chance to
/// say goodbye.
pub async fn worker_status(
    State(state): State<AppState>,
    Extension(meta): Extension<RequestMeta>,
) -> impl IntoResponse {
    let row = match reeltrack_db::get_heartbeat(&state.pool, WORKER_NAME).await {
        Ok(row) => row,
        Err(e) => return Err(AdminError::store(&meta, &e)),
    };

    let data = match row {
        None => WorkerStatus {
            status: "unknown",
            last_heartbeat: None,
            seconds_since_heartbeat: None,
            pid: None,
        },
        Some(row) => {
            let age = (Utc::now() - row.last_heartbeat).num_seconds();
            let status = if row.status == "stopped" {
                "stopped"
            } else if age <= 2 * state.heartbeat_interval_secs {
                "running"
            } else {
                "stale"
            };
            WorkerStatus {
                status,
                last_heartbeat: Some(row.last_heartbeat),
                seconds_since_heartbeat: Some(age),
                pid: row.pid,
            }
        }
    };

    Ok(Envelope::reply(&meta, data))
}
