//! Authenticated client for the platform's private JSON API.
//!
//! Wraps `reqwest` with session management (persisted blob, session
//! token, or username/password login), optional proxy support, typed
//! error classification, and retry with backoff for transient failures.
//! All outbound requests are serialized through a single-concurrency
//! gate with a jittered inter-request delay — the upstream strongly
//! dislikes parallel authenticated requests from one identity.

mod client;
mod error;
mod retry;
mod session;
mod types;

pub use client::{UpstreamClient, UpstreamConfig};
pub use error::UpstreamError;
pub use session::SessionBlob;
pub use types::{MediaMetrics, MediaSummary};
