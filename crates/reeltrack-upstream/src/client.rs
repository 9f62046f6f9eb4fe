//! HTTP client for the platform's private JSON API.
//!
//! Wraps `reqwest` with session management, typed error classification,
//! and retry with backoff. Every authenticated request passes through a
//! single-concurrency gate with a jittered 0.5–2.0 s delay; the upstream
//! tolerates exactly one well-behaved caller per identity.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use reeltrack_core::{AppConfig, Credentials};
use reqwest::{header, Client, Response, Url};
use tokio::sync::Mutex;

use crate::error::UpstreamError;
use crate::retry::retry_with_backoff;
use crate::session::SessionBlob;
use crate::types::{
    FeedEnvelope, LoginResponse, MediaInfoEnvelope, MediaMetrics, MediaSummary, UserInfoEnvelope,
    WebProfileEnvelope,
};

const DEFAULT_BASE_URL: &str = "https://i.instagram.com/";

/// The public web application id the platform expects on API calls.
const APP_ID: &str = "936619743392459";

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Base delay for the transient-error retry schedule.
const RETRY_BASE_MS: u64 = 1_000;

/// Jittered delay inserted before every upstream call while the gate is
/// held.
const PACE_RANGE_MS: (u64, u64) = (500, 2_000);

/// Client configuration, lifted from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub credentials: Credentials,
    pub fallback_login: Option<(String, String)>,
    pub proxy: Option<String>,
    pub session_path: PathBuf,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Inter-request pacing; disabled in tests.
    pub paced: bool,
}

impl UpstreamConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            credentials: config.credentials.clone(),
            fallback_login: config.fallback_login.clone(),
            proxy: config.proxy.clone(),
            session_path: config.session_file.clone(),
            timeout_secs: config.upstream_timeout_secs,
            max_retries: config.upstream_max_retries,
            paced: true,
        }
    }
}

struct ClientState {
    session: Option<SessionBlob>,
}

/// Client for the platform's private JSON API.
///
/// Use [`UpstreamClient::new`] for production or
/// [`UpstreamClient::with_base_url`] to point at a mock server in tests.
pub struct UpstreamClient {
    http: Client,
    base_url: Url,
    config: UpstreamConfig,
    // Single-concurrency gate: holding this lock for the whole of each
    // operation serializes all outbound requests from this identity.
    state: Mutex<ClientState>,
}

impl UpstreamClient {
    /// Builds a client against the production endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed (invalid proxy URL included).
    pub fn new(config: UpstreamConfig) -> Result<Self, UpstreamError> {
        Self::with_base_url(config, DEFAULT_BASE_URL)
    }

    /// Builds a client against an arbitrary endpoint, which is how the
    /// wiremock suites drive it.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`UpstreamError::Auth`] if `base_url` is
    /// not a valid URL.
    pub fn with_base_url(config: UpstreamConfig, base_url: &str) -> Result<Self, UpstreamError> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT);

        // Platform calls go through the proxy; audio extraction
        // deliberately does not (it runs in its own process).
        if let Some(proxy_url) = &config.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }

        let http = builder.build()?;

        let mut base = Url::parse(base_url)
            .map_err(|e| UpstreamError::Auth(format!("bad upstream base URL '{base_url}': {e}")))?;
        // Relative joins resolve against the last path segment, so the
        // base path must end in a slash.
        if !base.path().ends_with('/') {
            let fixed = format!("{}/", base.path());
            base.set_path(&fixed);
        }

        Ok(Self {
            http,
            base_url: base,
            config,
            state: Mutex::new(ClientState { session: None }),
        })
    }

    /// Establishes a session without performing any data request.
    ///
    /// Useful at worker startup to fail early on dead credentials.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Auth`] if no credential mode yields a
    /// working session.
    pub async fn authenticate(&self) -> Result<(), UpstreamError> {
        let mut state = self.state.lock().await;
        self.ensure_session(&mut state).await.map(|_| ())
    }

    /// Resolves a username to the platform's numeric user key.
    ///
    /// # Errors
    ///
    /// - [`UpstreamError::NotFound`] if no such user exists.
    /// - [`UpstreamError::Auth`] if the session is dead.
    /// - [`UpstreamError::RateLimited`] / [`UpstreamError::Http`] as usual.
    pub async fn resolve_username(&self, username: &str) -> Result<i64, UpstreamError> {
        let mut state = self.state.lock().await;
        let blob = self.ensure_session(&mut state).await?;

        let url = self.build_url(
            "api/v1/users/web_profile_info/",
            &[("username", username)],
        );
        let context = format!("web_profile_info(username={username})");
        let body = self
            .get_json(&mut state, &blob, url, &context)
            .await?;

        let envelope: WebProfileEnvelope = Self::parse(body, &context)?;
        let user = envelope.data.user.ok_or_else(|| UpstreamError::NotFound {
            context: format!("user '{username}'"),
        })?;
        // The endpoint serializes the numeric key as a string.
        serde_json::from_str::<i64>(&user.id).map_err(|e| UpstreamError::Deserialize {
            context,
            source: e,
        })
    }

    /// Fetches an account's most recent videos, newest first.
    ///
    /// Two upstream calls: the owner's profile (for the follower count)
    /// and the media feed, filtered to video items.
    ///
    /// # Errors
    ///
    /// - [`UpstreamError::NotFound`] if the account is gone or private.
    /// - [`UpstreamError::Auth`] if the session is dead.
    /// - [`UpstreamError::RateLimited`] / [`UpstreamError::Http`] as usual.
    pub async fn recent_media(
        &self,
        user_pk: i64,
        limit: u32,
    ) -> Result<Vec<MediaSummary>, UpstreamError> {
        let mut state = self.state.lock().await;
        let blob = self.ensure_session(&mut state).await?;

        let user_context = format!("user_info(pk={user_pk})");
        let url = self.build_url(&format!("api/v1/users/{user_pk}/info/"), &[]);
        let body = self.get_json(&mut state, &blob, url, &user_context).await?;
        let user: UserInfoEnvelope = Self::parse(body, &user_context)?;
        let followers_count = user.user.follower_count;

        let feed_context = format!("user_feed(pk={user_pk})");
        let url = self.build_url(
            &format!("api/v1/feed/user/{user_pk}/"),
            &[("count", &limit.to_string())],
        );
        let body = self.get_json(&mut state, &blob, url, &feed_context).await?;
        let feed: FeedEnvelope = Self::parse(body, &feed_context)?;

        let media = feed
            .items
            .into_iter()
            .filter(|item| item.is_video())
            .map(|item| {
                let direct_url = item.video_versions.first().map(|v| v.url.clone());
                MediaSummary {
                    video_id: item.pk,
                    url: format!("https://www.instagram.com/reel/{}/", item.code),
                    video_url: direct_url.clone(),
                    audio_url: direct_url,
                    caption: item.caption.as_ref().and_then(|c| c.text.clone()),
                    duration_seconds: item.video_duration,
                    published_at: item.published_at(),
                    view_count: item.views(),
                    like_count: item.like_count.unwrap_or(0),
                    comment_count: item.comment_count.unwrap_or(0),
                    followers_count,
                    shortcode: item.code,
                }
            })
            .collect();

        Ok(media)
    }

    /// Fetches a fresh engagement sample for one media item.
    ///
    /// # Errors
    ///
    /// - [`UpstreamError::NotFound`] if the media has been removed.
    /// - [`UpstreamError::Auth`] if the session is dead.
    /// - [`UpstreamError::RateLimited`] / [`UpstreamError::Http`] as usual.
    pub async fn media_metrics(&self, media_pk: i64) -> Result<MediaMetrics, UpstreamError> {
        let mut state = self.state.lock().await;
        let blob = self.ensure_session(&mut state).await?;

        let context = format!("media_info(pk={media_pk})");
        let url = self.build_url(&format!("api/v1/media/{media_pk}/info/"), &[]);
        let body = self.get_json(&mut state, &blob, url, &context).await?;
        let envelope: MediaInfoEnvelope = Self::parse(body, &context)?;

        let item = envelope
            .items
            .into_iter()
            .next()
            .ok_or_else(|| UpstreamError::NotFound {
                context: format!("media {media_pk}"),
            })?;

        // The feed payload does not carry the owner's follower count;
        // fetch it separately, tolerating failure with a zero.
        let followers_count = match &item.user {
            Some(owner) => {
                let owner_context = format!("user_info(pk={})", owner.pk);
                let url = self.build_url(&format!("api/v1/users/{}/info/", owner.pk), &[]);
                match self.get_json(&mut state, &blob, url, &owner_context).await {
                    Ok(body) => Self::parse::<UserInfoEnvelope>(body, &owner_context)
                        .map(|e| e.user.follower_count)
                        .unwrap_or(0),
                    Err(UpstreamError::NotFound { .. }) => 0,
                    Err(e) => {
                        tracing::warn!(media_pk, error = %e, "could not fetch owner follower count");
                        0
                    }
                }
            }
            None => 0,
        };

        Ok(MediaMetrics {
            view_count: item.views(),
            like_count: item.like_count.unwrap_or(0),
            comment_count: item.comment_count.unwrap_or(0),
            save_count: item.saved_count,
            followers_count,
        })
    }

    // -----------------------------------------------------------------------
    // Session management
    // -----------------------------------------------------------------------

    /// Returns a working session, establishing one if needed.
    ///
    /// Credential precedence: (a) the persisted blob at `session_path`,
    /// (b) the configured session token, (c) username/password login.
    /// A session obtained from (b) or (c) is persisted for next time.
    async fn ensure_session(&self, state: &mut ClientState) -> Result<SessionBlob, UpstreamError> {
        if let Some(blob) = &state.session {
            return Ok(blob.clone());
        }

        // (a) persisted session blob
        if let Some(blob) = SessionBlob::load(&self.config.session_path).await? {
            if self.verify_session(&blob).await? {
                tracing::info!("resumed persisted upstream session");
                state.session = Some(blob.clone());
                return Ok(blob);
            }
            tracing::info!("persisted session expired — re-authenticating");
        }

        // (b) configured session token
        if let Credentials::SessionToken { token, csrf_token } = &self.config.credentials {
            let blob = SessionBlob {
                session_token: token.clone(),
                csrf_token: csrf_token.clone(),
            };
            if self.verify_session(&blob).await? {
                tracing::info!("authenticated via configured session token");
                blob.save(&self.config.session_path).await?;
                state.session = Some(blob.clone());
                return Ok(blob);
            }
            tracing::warn!("configured session token rejected");
        }

        // (c) username/password login
        let login = match &self.config.credentials {
            Credentials::Login { username, password } => {
                Some((username.clone(), password.clone()))
            }
            Credentials::SessionToken { .. } => self.config.fallback_login.clone(),
        };
        if let Some((username, password)) = login {
            let blob = self.login(&username, &password).await?;
            tracing::info!(username = %username, "authenticated via login");
            blob.save(&self.config.session_path).await?;
            state.session = Some(blob.clone());
            return Ok(blob);
        }

        Err(UpstreamError::Auth(
            "no working credentials: session token rejected and no login configured".to_string(),
        ))
    }

    /// Cheap probe that tells a live session from a dead one.
    async fn verify_session(&self, blob: &SessionBlob) -> Result<bool, UpstreamError> {
        self.pace().await;
        let url = self.build_url("api/v1/accounts/current_user/", &[]);
        let response = self.authed_get(blob, url).send().await?;
        match Self::classify(response, "current_user").await {
            Ok(_) => Ok(true),
            Err(UpstreamError::Auth(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn login(&self, username: &str, password: &str) -> Result<SessionBlob, UpstreamError> {
        self.pace().await;
        let url = self.build_url("accounts/login/ajax/", &[]);
        let enc_password = format!(
            "#PWD_INSTAGRAM_BROWSER:0:{}:{password}",
            Utc::now().timestamp()
        );

        let response = self
            .http
            .post(url)
            .header("X-IG-App-ID", APP_ID)
            .header("X-CSRFToken", "missing")
            .header(header::REFERER, "https://www.instagram.com/")
            .form(&[("username", username), ("enc_password", &enc_password)])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(UpstreamError::RateLimited {
                retry_after_secs: retry_after(&response).unwrap_or(300),
            });
        }

        let session_token = extract_cookie(response.headers(), "sessionid");
        let csrf_token = extract_cookie(response.headers(), "csrftoken");

        let body = response.text().await?;
        let parsed: LoginResponse =
            serde_json::from_str(&body).map_err(|e| UpstreamError::Deserialize {
                context: "login".to_string(),
                source: e,
            })?;

        if parsed.checkpoint_url.is_some() {
            return Err(UpstreamError::Auth(
                "verification challenge required — complete it in a browser first".to_string(),
            ));
        }
        if !parsed.authenticated {
            let reason = parsed
                .message
                .unwrap_or_else(|| "invalid username or password".to_string());
            return Err(UpstreamError::Auth(reason));
        }

        let session_token = session_token.ok_or_else(|| {
            UpstreamError::Auth("login succeeded but no session cookie was set".to_string())
        })?;

        Ok(SessionBlob {
            session_token,
            csrf_token,
        })
    }

    // -----------------------------------------------------------------------
    // Request plumbing
    // -----------------------------------------------------------------------

    /// Resolves an endpoint path against the base URL and attaches any
    /// query parameters (percent-encoding happens in the URL layer).
    fn build_url(&self, path: &str, params: &[(&str, &str)]) -> Url {
        let mut url = self
            .base_url
            .join(path)
            .unwrap_or_else(|_| self.base_url.clone());
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in params {
                pairs.append_pair(name, value);
            }
        }
        url
    }

    fn authed_get(&self, blob: &SessionBlob, url: Url) -> reqwest::RequestBuilder {
        let mut cookie = format!("sessionid={}", blob.session_token);
        if let Some(csrf) = &blob.csrf_token {
            cookie.push_str(&format!("; csrftoken={csrf}"));
        }
        let mut request = self
            .http
            .get(url)
            .header("X-IG-App-ID", APP_ID)
            .header(header::COOKIE, cookie)
            .header(header::REFERER, "https://www.instagram.com/");
        if let Some(csrf) = &blob.csrf_token {
            request = request.header("X-CSRFToken", csrf.clone());
        }
        request
    }

    /// Sends an authenticated GET with pacing and transient-error retry,
    /// returning the parsed JSON body.
    ///
    /// An [`UpstreamError::Auth`] response drops the cached session so
    /// the next operation re-runs the credential ladder.
    async fn get_json(
        &self,
        state: &mut ClientState,
        blob: &SessionBlob,
        url: Url,
        context: &str,
    ) -> Result<serde_json::Value, UpstreamError> {
        self.pace().await;
        let result = retry_with_backoff(self.config.max_retries, RETRY_BASE_MS, || {
            let url = url.clone();
            async move {
                let response = self.authed_get(blob, url).send().await?;
                Self::classify(response, context).await
            }
        })
        .await;

        if matches!(result, Err(UpstreamError::Auth(_))) {
            state.session = None;
        }
        result
    }

    /// Maps a response to the error taxonomy, or returns its JSON body.
    async fn classify(
        response: Response,
        context: &str,
    ) -> Result<serde_json::Value, UpstreamError> {
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(UpstreamError::RateLimited {
                retry_after_secs: retry_after(&response).unwrap_or(300),
            });
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(UpstreamError::NotFound {
                context: context.to_string(),
            });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(UpstreamError::Auth(format!(
                "{context}: HTTP {status}"
            )));
        }

        let body = response.text().await?;

        if !status.is_success() {
            // The platform reports auth problems as 400 with a telltale
            // message rather than a 401.
            if is_auth_failure_body(&body) {
                return Err(UpstreamError::Auth(format!(
                    "{context}: challenge or login required"
                )));
            }
            return Err(UpstreamError::UnexpectedStatus {
                status: status.as_u16(),
                context: context.to_string(),
            });
        }

        let value: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| UpstreamError::Deserialize {
                context: context.to_string(),
                source: e,
            })?;

        if value.get("status").and_then(serde_json::Value::as_str) == Some("fail") {
            if is_auth_failure_body(&body) {
                return Err(UpstreamError::Auth(format!(
                    "{context}: challenge or login required"
                )));
            }
            let message = value
                .get("message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown failure");
            return Err(UpstreamError::UnexpectedStatus {
                status: status.as_u16(),
                context: format!("{context}: {message}"),
            });
        }

        Ok(value)
    }

    fn parse<T: serde::de::DeserializeOwned>(
        body: serde_json::Value,
        context: &str,
    ) -> Result<T, UpstreamError> {
        serde_json::from_value(body).map_err(|e| UpstreamError::Deserialize {
            context: context.to_string(),
            source: e,
        })
    }

    /// Jittered inter-request delay, skipped when pacing is disabled.
    async fn pace(&self) {
        if !self.config.paced {
            return;
        }
        let (min, max) = PACE_RANGE_MS;
        let delay_ms = min + rand::random::<u64>() % (max - min + 1);
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
}

fn retry_after(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
}

fn is_auth_failure_body(body: &str) -> bool {
    body.contains("login_required")
        || body.contains("challenge_required")
        || body.contains("checkpoint_required")
}

fn extract_cookie(headers: &header::HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|raw| {
            let (pair, _) = raw.split_once(';').unwrap_or((raw, ""));
            let (key, value) = pair.split_once('=')?;
            if key.trim() == name && !value.is_empty() {
                Some(value.to_string())
            } else {
                None
            }
        })
}
