use std::net::SocketAddr;
use std::path::PathBuf;

/// Upstream credentials, in the order the client tries them after a
/// persisted session blob.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// A session token lifted from a logged-in browser, plus the CSRF
    /// token if available.
    SessionToken {
        token: String,
        csrf_token: Option<String>,
    },
    /// Plain username/password login.
    Login { username: String, password: String },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::SessionToken { .. } => write!(f, "SessionToken([redacted])"),
            Credentials::Login { username, .. } => {
                write!(f, "Login(username={username}, password=[redacted])")
            }
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub log_level: String,

    // Worker cadence and limits
    pub worker_interval_hours: u64,
    pub worker_reels_limit: u32,
    pub test_mode: bool,
    pub dispatch_batch_limit: i64,

    // Enrichment
    pub audio_dir: PathBuf,
    pub ytdlp_bin: String,
    pub whisper_bin: String,
    pub whisper_model: String,

    // Upstream platform access
    pub credentials: Credentials,
    pub fallback_login: Option<(String, String)>,
    pub proxy: Option<String>,
    pub session_file: PathBuf,
    pub upstream_timeout_secs: u64,
    pub upstream_max_retries: u32,

    // Database pool
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &"[redacted]")
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("worker_interval_hours", &self.worker_interval_hours)
            .field("worker_reels_limit", &self.worker_reels_limit)
            .field("test_mode", &self.test_mode)
            .field("dispatch_batch_limit", &self.dispatch_batch_limit)
            .field("audio_dir", &self.audio_dir)
            .field("ytdlp_bin", &self.ytdlp_bin)
            .field("whisper_bin", &self.whisper_bin)
            .field("whisper_model", &self.whisper_model)
            .field("credentials", &self.credentials)
            .field(
                "fallback_login",
                &self.fallback_login.as_ref().map(|_| "[redacted]"),
            )
            .field("proxy", &self.proxy)
            .field("session_file", &self.session_file)
            .field("upstream_timeout_secs", &self.upstream_timeout_secs)
            .field("upstream_max_retries", &self.upstream_max_retries)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .finish()
    }
}
