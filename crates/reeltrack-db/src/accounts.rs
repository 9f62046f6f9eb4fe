//! Database operations for the `accounts` table.
//!
//! The primary key is the upstream platform's numeric user key, not a
//! locally generated surrogate: the worker uses it verbatim against the
//! per-account upstream endpoints.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `accounts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountRow {
    pub id: i64,
    pub username: String,
    pub profile_url: Option<String>,
    pub followers_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One record of the bulk seed payload.
#[derive(Debug, Clone)]
pub struct SeedAccount {
    pub username: String,
    pub user_pk: i64,
}

/// Inserts or refreshes an account keyed by its upstream user id.
///
/// Conflicts on `(id)` update mutable fields only: `followers_count` is
/// refreshed, `profile_url` is kept if already set. `username` never
/// changes once a row exists.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails (including a username
/// collision with a different account id).
pub async fn upsert_account(
    pool: &PgPool,
    id: i64,
    username: &str,
    profile_url: Option<&str>,
    followers_count: i64,
) -> Result<AccountRow, DbError> {
    let row = sqlx::query_as::<_, AccountRow>(
        "INSERT INTO accounts (id, username, profile_url, followers_count) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (id) DO UPDATE SET \
             profile_url     = COALESCE(accounts.profile_url, EXCLUDED.profile_url), \
             followers_count = EXCLUDED.followers_count, \
             updated_at      = NOW() \
         RETURNING id, username, profile_url, followers_count, created_at, updated_at",
    )
    .bind(id)
    .bind(username)
    .bind(profile_url)
    .bind(followers_count)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Returns all tracked accounts, ordered by username.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_accounts(pool: &PgPool) -> Result<Vec<AccountRow>, DbError> {
    let rows = sqlx::query_as::<_, AccountRow>(
        "SELECT id, username, profile_url, followers_count, created_at, updated_at \
         FROM accounts \
         ORDER BY username",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Bulk-inserts seed accounts with conflict-skip semantics.
///
/// Runs inside a single transaction and returns the number of rows
/// actually inserted. A record whose id or username already exists is
/// skipped, not updated.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert fails for a reason other than
/// a conflict.
pub async fn seed_accounts(pool: &PgPool, records: &[SeedAccount]) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;

    for record in records {
        let result = sqlx::query(
            "INSERT INTO accounts (id, username, profile_url) \
             VALUES ($1, $2, $3) \
             ON CONFLICT DO NOTHING",
        )
        .bind(record.user_pk)
        .bind(&record.username)
        .bind(format!("https://www.instagram.com/{}/", record.username))
        .execute(&mut *tx)
        .await?;

        inserted += usize::try_from(result.rows_affected()).unwrap_or(0);
    }

    tx.commit().await?;
    Ok(inserted)
}
