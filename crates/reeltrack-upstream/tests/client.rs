//! Integration tests for `UpstreamClient` using wiremock HTTP mocks.

use reeltrack_core::Credentials;
use reeltrack_upstream::{SessionBlob, UpstreamClient, UpstreamConfig, UpstreamError};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token_config(session_path: std::path::PathBuf) -> UpstreamConfig {
    UpstreamConfig {
        credentials: Credentials::SessionToken {
            token: "tok-abc".to_string(),
            csrf_token: Some("csrf-1".to_string()),
        },
        fallback_login: None,
        proxy: None,
        session_path,
        timeout_secs: 30,
        max_retries: 0,
        paced: false,
    }
}

fn test_client(server: &MockServer, session_path: std::path::PathBuf) -> UpstreamClient {
    UpstreamClient::with_base_url(token_config(session_path), &server.uri())
        .expect("build upstream client")
}

async fn mock_session_ok(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/current_user/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "ok"})),
        )
        .mount(server)
        .await;
}

fn user_info_body(pk: i64, followers: i64) -> serde_json::Value {
    serde_json::json!({
        "status": "ok",
        "user": { "pk": pk, "follower_count": followers }
    })
}

#[tokio::test]
async fn recent_media_returns_videos_newest_first() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");
    mock_session_ok(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users/42/info/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_info_body(42, 20_000)))
        .mount(&server)
        .await;

    let feed = serde_json::json!({
        "status": "ok",
        "items": [
            {
                "pk": 900, "code": "S1", "media_type": 2, "taken_at": 1_700_003_600,
                "caption": { "text": "newest" },
                "video_duration": 14.5,
                "video_versions": [ { "url": "https://cdn.example.com/900.mp4" } ],
                "play_count": 1000, "like_count": 50, "comment_count": 3
            },
            // A photo post interleaved in the feed must be filtered out.
            { "pk": 901, "code": "P1", "media_type": 1, "taken_at": 1_700_001_800 },
            {
                "pk": 902, "code": "S2", "media_type": 2, "taken_at": 1_700_000_000,
                "video_versions": [], "like_count": 7, "comment_count": 0
            }
        ]
    });
    Mock::given(method("GET"))
        .and(path("/api/v1/feed/user/42/"))
        .and(query_param("count", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&feed))
        .mount(&server)
        .await;

    let client = test_client(&server, dir.path().join("session.json"));
    let media = client.recent_media(42, 50).await.expect("media");

    assert_eq!(media.len(), 2);
    assert_eq!(media[0].shortcode, "S1");
    assert_eq!(media[0].video_id, 900);
    assert_eq!(media[0].url, "https://www.instagram.com/reel/S1/");
    assert_eq!(
        media[0].video_url.as_deref(),
        Some("https://cdn.example.com/900.mp4")
    );
    assert_eq!(media[0].caption.as_deref(), Some("newest"));
    assert_eq!(media[0].view_count, 1000);
    assert_eq!(media[0].followers_count, 20_000);
    assert_eq!(media[0].published_at.timestamp(), 1_700_003_600);

    assert_eq!(media[1].shortcode, "S2");
    assert!(media[1].video_url.is_none());
}

#[tokio::test]
async fn recent_media_empty_feed_is_ok() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");
    mock_session_ok(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users/42/info/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_info_body(42, 10)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/feed/user/42/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"status": "ok", "items": []})),
        )
        .mount(&server)
        .await;

    let client = test_client(&server, dir.path().join("session.json"));
    let media = client.recent_media(42, 50).await.expect("media");
    assert!(media.is_empty());
}

#[tokio::test]
async fn media_metrics_joins_owner_follower_count() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");
    mock_session_ok(&server).await;

    let info = serde_json::json!({
        "status": "ok",
        "items": [ {
            "pk": 900, "code": "S1", "media_type": 2, "taken_at": 1_700_000_000,
            "play_count": 1000, "like_count": 50, "comment_count": 3,
            "saved_count": 12,
            "user": { "pk": 42 }
        } ]
    });
    Mock::given(method("GET"))
        .and(path("/api/v1/media/900/info/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&info))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/42/info/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_info_body(42, 20_000)))
        .mount(&server)
        .await;

    let client = test_client(&server, dir.path().join("session.json"));
    let metrics = client.media_metrics(900).await.expect("metrics");

    assert_eq!(metrics.view_count, 1000);
    assert_eq!(metrics.like_count, 50);
    assert_eq!(metrics.comment_count, 3);
    assert_eq!(metrics.save_count, Some(12));
    assert_eq!(metrics.followers_count, 20_000);
}

#[tokio::test]
async fn media_metrics_maps_404_to_not_found() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");
    mock_session_ok(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/media/900/info/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = test_client(&server, dir.path().join("session.json"));
    let result = client.media_metrics(900).await;
    assert!(matches!(result, Err(UpstreamError::NotFound { .. })));
}

#[tokio::test]
async fn media_metrics_empty_items_is_not_found() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");
    mock_session_ok(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/media/900/info/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"status": "ok", "items": []})),
        )
        .mount(&server)
        .await;

    let client = test_client(&server, dir.path().join("session.json"));
    let result = client.media_metrics(900).await;
    assert!(matches!(result, Err(UpstreamError::NotFound { .. })));
}

#[tokio::test]
async fn rate_limit_carries_retry_after() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");
    mock_session_ok(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/media/900/info/"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "120"))
        .mount(&server)
        .await;

    let client = test_client(&server, dir.path().join("session.json"));
    let result = client.media_metrics(900).await;
    assert!(matches!(
        result,
        Err(UpstreamError::RateLimited {
            retry_after_secs: 120
        })
    ));
}

#[tokio::test]
async fn challenge_body_maps_to_auth_error() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");
    mock_session_ok(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/media/900/info/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "message": "challenge_required", "status": "fail"
        })))
        .mount(&server)
        .await;

    let client = test_client(&server, dir.path().join("session.json"));
    let result = client.media_metrics(900).await;
    assert!(matches!(result, Err(UpstreamError::Auth(_))));
}

#[tokio::test]
async fn resolve_username_parses_numeric_id() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");
    mock_session_ok(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users/web_profile_info/"))
        .and(query_param("username", "someone"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "ok",
            "data": { "user": { "id": "4242" } }
        })))
        .mount(&server)
        .await;

    let client = test_client(&server, dir.path().join("session.json"));
    let pk = client.resolve_username("someone").await.expect("resolve");
    assert_eq!(pk, 4242);
}

#[tokio::test]
async fn resolve_unknown_username_is_not_found() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");
    mock_session_ok(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users/web_profile_info/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "ok",
            "data": { "user": null }
        })))
        .mount(&server)
        .await;

    let client = test_client(&server, dir.path().join("session.json"));
    let result = client.resolve_username("ghost").await;
    assert!(matches!(result, Err(UpstreamError::NotFound { .. })));
}

#[tokio::test]
async fn token_session_is_persisted_after_verification() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");
    mock_session_ok(&server).await;

    let session_path = dir.path().join("session.json");
    let client = test_client(&server, session_path.clone());
    client.authenticate().await.expect("authenticate");

    let blob = SessionBlob::load(&session_path)
        .await
        .expect("load")
        .expect("blob persisted");
    assert_eq!(blob.session_token, "tok-abc");
    assert_eq!(blob.csrf_token.as_deref(), Some("csrf-1"));
}

#[tokio::test]
async fn persisted_session_takes_precedence_over_login() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");
    mock_session_ok(&server).await;

    let session_path = dir.path().join("session.json");
    SessionBlob {
        session_token: "persisted-tok".to_string(),
        csrf_token: None,
    }
    .save(&session_path)
    .await
    .expect("save blob");

    // Login credentials only; if the client tried to log in this
    // unmocked POST would fail the test.
    let config = UpstreamConfig {
        credentials: Credentials::Login {
            username: "alice".to_string(),
            password: "hunter2".to_string(),
        },
        fallback_login: None,
        proxy: None,
        session_path,
        timeout_secs: 30,
        max_retries: 0,
        paced: false,
    };
    let client =
        UpstreamClient::with_base_url(config, &server.uri()).expect("client construction");
    client.authenticate().await.expect("resume session");
}

#[tokio::test]
async fn login_flow_extracts_session_cookie() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");

    Mock::given(method("POST"))
        .and(path("/accounts/login/ajax/"))
        .and(header("x-ig-app-id", "936619743392459"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "sessionid=fresh-session; Path=/; HttpOnly")
                .insert_header("set-cookie", "csrftoken=fresh-csrf; Path=/")
                .set_body_json(serde_json::json!({"authenticated": true, "userId": "42"})),
        )
        .mount(&server)
        .await;

    let session_path = dir.path().join("session.json");
    let config = UpstreamConfig {
        credentials: Credentials::Login {
            username: "alice".to_string(),
            password: "hunter2".to_string(),
        },
        fallback_login: None,
        proxy: None,
        session_path: session_path.clone(),
        timeout_secs: 30,
        max_retries: 0,
        paced: false,
    };
    let client =
        UpstreamClient::with_base_url(config, &server.uri()).expect("client construction");
    client.authenticate().await.expect("login");

    let blob = SessionBlob::load(&session_path)
        .await
        .expect("load")
        .expect("blob persisted after login");
    assert_eq!(blob.session_token, "fresh-session");
    assert_eq!(blob.csrf_token.as_deref(), Some("fresh-csrf"));
}

#[tokio::test]
async fn login_rejection_is_auth_error() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");

    Mock::given(method("POST"))
        .and(path("/accounts/login/ajax/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "authenticated": false, "message": "bad_password"
        })))
        .mount(&server)
        .await;

    let config = UpstreamConfig {
        credentials: Credentials::Login {
            username: "alice".to_string(),
            password: "wrong".to_string(),
        },
        fallback_login: None,
        proxy: None,
        session_path: dir.path().join("session.json"),
        timeout_secs: 30,
        max_retries: 0,
        paced: false,
    };
    let client =
        UpstreamClient::with_base_url(config, &server.uri()).expect("client construction");
    let result = client.authenticate().await;
    assert!(matches!(result, Err(UpstreamError::Auth(_))));
}

#[tokio::test]
async fn rejected_token_falls_back_to_login() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");

    // The configured token is dead...
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/current_user/"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    // ...so the client walks down to the fallback login.
    Mock::given(method("POST"))
        .and(path("/accounts/login/ajax/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "sessionid=recovered; Path=/")
                .set_body_json(serde_json::json!({"authenticated": true})),
        )
        .mount(&server)
        .await;

    let session_path = dir.path().join("session.json");
    let mut config = token_config(session_path.clone());
    config.fallback_login = Some(("alice".to_string(), "hunter2".to_string()));
    let client =
        UpstreamClient::with_base_url(config, &server.uri()).expect("client construction");
    client.authenticate().await.expect("fallback login");

    let blob = SessionBlob::load(&session_path)
        .await
        .expect("load")
        .expect("blob persisted");
    assert_eq!(blob.session_token, "recovered");
}
