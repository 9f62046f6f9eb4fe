//! Account list and the bulk seed endpoint.

use axum::{extract::State, response::IntoResponse, Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reeltrack_db::SeedAccount;
use reeltrack_upstream::UpstreamError;

use super::{AdminError, AppState, Envelope};
use crate::middleware::RequestMeta;

#[derive(Debug, Serialize)]
pub struct AccountItem {
    pub id: i64,
    pub username: String,
    pub profile_url: Option<String>,
    pub followers_count: i64,
    pub video_count: i64,
    pub created_at: DateTime<Utc>,
}

/// `GET /api/v1/accounts` — all tracked accounts with video counts.
pub async fn list_accounts(
    State(state): State<AppState>,
    Extension(meta): Extension<RequestMeta>,
) -> impl IntoResponse {
    match reeltrack_db::list_accounts_with_counts(&state.pool).await {
        Ok(rows) => {
            let data: Vec<AccountItem> = rows
                .into_iter()
                .map(|row| AccountItem {
                    id: row.id,
                    username: row.username,
                    profile_url: row.profile_url,
                    followers_count: row.followers_count,
                    video_count: row.video_count,
                    created_at: row.created_at,
                })
                .collect();
            Ok(Envelope::reply(&meta, data))
        }
        Err(e) => Err(AdminError::store(&meta, &e)),
    }
}

/// One record of the seed payload. `user_pk` becomes `accounts.id`
/// verbatim; a null is resolved through the upstream client when one is
/// configured.
#[derive(Debug, Deserialize)]
pub struct SeedRecord {
    pub username: String,
    pub user_pk: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RejectedRecord {
    pub username: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct SeedResult {
    pub inserted: usize,
    pub skipped: usize,
    pub rejected: Vec<RejectedRecord>,
}

/// `POST /api/v1/accounts/seed` — bulk account seed with conflict-skip.
pub async fn seed_accounts(
    State(state): State<AppState>,
    Extension(meta): Extension<RequestMeta>,
    Json(records): Json<Vec<SeedRecord>>,
) -> impl IntoResponse {
    if records.is_empty() {
        return Err(AdminError::bad_request(&meta, "seed payload is empty"));
    }

    let mut accepted = Vec::new();
    let mut rejected = Vec::new();

    for record in records {
        match record.user_pk {
            Some(user_pk) => accepted.push(SeedAccount {
                username: record.username,
                user_pk,
            }),
            None => match &state.upstream {
                Some(upstream) => match upstream.resolve_username(&record.username).await {
                    Ok(user_pk) => accepted.push(SeedAccount {
                        username: record.username,
                        user_pk,
                    }),
                    Err(UpstreamError::NotFound { .. }) => rejected.push(RejectedRecord {
                        username: record.username,
                        reason: "username does not resolve".to_string(),
                    }),
                    Err(e) => {
                        tracing::warn!(
                            username = %record.username,
                            error = %e,
                            "seed: resolution failed"
                        );
                        rejected.push(RejectedRecord {
                            username: record.username,
                            reason: format!("resolution failed: {e}"),
                        });
                    }
                },
                None => rejected.push(RejectedRecord {
                    username: record.username,
                    reason: "user_pk is null and no upstream resolver is configured".to_string(),
                }),
            },
        }
    }

    match reeltrack_db::seed_accounts(&state.pool, &accepted).await {
        Ok(inserted) => {
            let result = SeedResult {
                inserted,
                skipped: accepted.len() - inserted,
                rejected,
            };
            tracing::info!(
                inserted = result.inserted,
                skipped = result.skipped,
                rejected = result.rejected.len(),
                "seed: accounts imported"
            );
            Ok(Envelope::reply(&meta, result))
        }
        Err(e) => Err(AdminError::store(&meta, &e)),
    }
}
