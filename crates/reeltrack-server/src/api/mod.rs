mod accounts;
mod videos;
mod worker;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use reeltrack_upstream::UpstreamClient;

use crate::middleware::{tag_request, RequestMeta, REQUEST_ID_HEADER};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// Used only by the seed endpoint, to resolve usernames without a
    /// `user_pk`. `None` rejects such records instead.
    pub upstream: Option<Arc<UpstreamClient>>,
    /// The worker's heartbeat cadence; the status view derives staleness
    /// from twice this value.
    pub heartbeat_interval_secs: i64,
}

/// Successful responses wrap their payload with the correlation id of
/// the request that produced it and a generation timestamp.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub data: T,
    pub request_id: String,
    pub generated_at: DateTime<Utc>,
}

impl<T: Serialize> Envelope<T> {
    pub(crate) fn reply(meta: &RequestMeta, data: T) -> Json<Self> {
        Json(Self {
            data,
            request_id: meta.id.clone(),
            generated_at: Utc::now(),
        })
    }
}

/// A failed request. Carries its HTTP status directly; the body renders
/// as `{"error": ..., "request_id": ...}`.
#[derive(Debug)]
pub struct AdminError {
    status: StatusCode,
    message: String,
    request_id: String,
}

impl AdminError {
    pub(crate) fn bad_request(meta: &RequestMeta, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            request_id: meta.id.clone(),
        }
    }

    /// The one error every read handler can hit: the store said no.
    /// Logged here with the correlation id; the caller gets a terse 500.
    pub(crate) fn store(meta: &RequestMeta, error: &reeltrack_db::DbError) -> Self {
        tracing::error!(request_id = %meta.id, error = %error, "admin query failed against the store");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "store query failed".to_string(),
            request_id: meta.id.clone(),
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({
            "error": self.message,
            "request_id": self.request_id,
        });
        (self.status, Json(body)).into_response()
    }
}

/// Clamps a caller-supplied page size into the allowed window.
pub(crate) fn page_size(requested: Option<i64>) -> i64 {
    requested.map_or(DEFAULT_PAGE_SIZE, |n| n.clamp(1, MAX_PAGE_SIZE))
}

pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ]);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/accounts", get(accounts::list_accounts))
        .route("/api/v1/accounts/seed", post(accounts::seed_accounts))
        .route("/api/v1/videos/recent", get(videos::list_recent_videos))
        .route("/api/v1/worker/status", get(worker::worker_status))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(axum::middleware::from_fn(tag_request)),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthReport {
    healthy: bool,
    store: &'static str,
}

async fn health(
    State(state): State<AppState>,
    Extension(meta): Extension<RequestMeta>,
) -> impl IntoResponse {
    match reeltrack_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Envelope::reply(
                &meta,
                HealthReport {
                    healthy: true,
                    store: "reachable",
                },
            ),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health probe: store ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Envelope::reply(
                    &meta,
                    HealthReport {
                        healthy: false,
                        store: "unreachable",
                    },
                ),
            )
        }
    }
}
