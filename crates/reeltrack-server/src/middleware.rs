//! Request tagging for the admin surface.
//!
//! The admin API carries no auth layer, so its observability story is
//! this: every request gets a correlation id and a completion log line
//! with method, path, status, and latency. The id comes from the
//! caller's `x-request-id` header when present, is minted fresh
//! otherwise, rides in the request extensions for handlers to embed in
//! their response envelopes, and is echoed back as a response header so
//! operators can line an API call up with worker logs.

use std::time::Instant;

use axum::http::HeaderMap;
use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Correlation data attached to every admin request.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub id: String,
}

impl RequestMeta {
    fn from_headers(headers: &HeaderMap) -> Self {
        let id = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map_or_else(|| Uuid::new_v4().to_string(), str::to_owned);
        Self { id }
    }
}

/// Tags the request with a [`RequestMeta`], logs its outcome, and
/// echoes the correlation id on the response.
pub async fn tag_request(mut req: Request, next: Next) -> Response {
    let meta = RequestMeta::from_headers(req.headers());
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let started = Instant::now();

    req.extensions_mut().insert(meta.clone());
    let mut response = next.run(req).await;

    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    tracing::info!(
        request_id = %meta.id,
        %method,
        path,
        status = response.status().as_u16(),
        elapsed_ms,
        "admin request served"
    );

    if let Ok(value) = HeaderValue::from_str(&meta.id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_the_caller_supplied_id() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("trace-me-7"));
        assert_eq!(RequestMeta::from_headers(&headers).id, "trace-me-7");
    }

    #[test]
    fn mints_an_id_when_the_header_is_absent() {
        let meta = RequestMeta::from_headers(&HeaderMap::new());
        assert!(!meta.id.is_empty());
    }

    #[test]
    fn treats_a_blank_header_as_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static(""));
        let meta = RequestMeta::from_headers(&headers);
        assert!(!meta.id.is_empty());
    }
}
