use thiserror::Error;

/// Errors surfaced by the upstream platform client.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Credentials rejected, session expired, or a verification
    /// challenge is pending. Fatal for the current tick; the operator
    /// must refresh credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Media removed or account gone/private. The caller disables the
    /// affected schedule or skips the account.
    #[error("not found: {context}")]
    NotFound { context: String },

    /// HTTP 429. Carries the advisory Retry-After value.
    #[error("rate limited (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    /// Connection-level trouble: DNS, TLS, timeout, reset.
    #[error("transport failure: {0}")]
    Http(#[from] reqwest::Error),

    /// A non-2xx status with no better classification (5xx retried,
    /// other 4xx not).
    #[error("unexpected HTTP status {status} for {context}")]
    UnexpectedStatus { status: u16, context: String },

    /// The body came back, but not in the shape we expected.
    #[error("unreadable {context} response: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Reading or writing the persisted session blob failed.
    #[error("session file error at {path}: {source}")]
    SessionFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
