//! Client behaviour against a mocked X API.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use recast_social::{HttpMediaDownloader, XClient, XConfig};
use recast_types::{CollaboratorError, MediaDownloader, PostFetcher, Publisher};

fn client(server: &MockServer) -> XClient {
    XClient::new(
        XConfig::default()
            .with_base_url(format!("{}/2", server.uri()))
            .with_bearer_token("app-token")
            .with_user_access_token("user-token")
            .with_timeout(Duration::from_secs(5)),
    )
    .unwrap()
}

async fn mount_user(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/2/users/by/username/rustlang"))
        .and(header("authorization", "Bearer app-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": {"id": "42", "name": "Rust", "username": "rustlang"}})),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fetch_recent_clamps_page_and_truncates() {
    let server = MockServer::start().await;
    mount_user(&server).await;

    Mock::given(method("GET"))
        .and(path("/2/users/42/tweets"))
        .and(query_param("max_results", "5"))
        .and(query_param("expansions", "attachments.media_keys"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-rate-limit-limit", "900")
                .insert_header("x-rate-limit-remaining", "899")
                .insert_header("x-rate-limit-reset", "1700000600")
                .set_body_json(json!({
                    "data": [
                        {"id": "3", "text": "newest", "attachments": {"media_keys": ["3_9"]}},
                        {"id": "2", "text": "middle"},
                        {"id": "1", "text": "oldest"}
                    ],
                    "includes": {"media": [{"media_key": "3_9", "type": "photo", "url": "https://pbs.example/p.png"}]}
                })),
        )
        .mount(&server)
        .await;

    let client = client(&server);
    let posts = client.fetch_recent("rustlang", 2).await.unwrap();

    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].external_id, "3");
    assert_eq!(posts[0].media_urls, vec!["https://pbs.example/p.png"]);

    let snapshot = client.rate_limit_snapshot();
    assert_eq!(snapshot["users/tweets"].remaining, Some(899));
    assert_eq!(snapshot["users/tweets"].limit, Some(900));
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2/users/by/username/ghost"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{"detail": "Could not find user with username: [ghost].", "title": "Not Found Error"}]
        })))
        .mount(&server)
        .await;

    let err = client(&server).fetch_recent("ghost", 1).await.unwrap_err();
    assert!(matches!(err, CollaboratorError::NotFound(_)));
}

#[tokio::test]
async fn test_fetch_rate_limited_reports_wait() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2/users/by/username/rustlang"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "15")
                .set_body_json(json!({"title": "Too Many Requests", "detail": "Too Many Requests"})),
        )
        .mount(&server)
        .await;

    let err = client(&server).fetch_recent("rustlang", 1).await.unwrap_err();
    assert!(err.is_rate_limited());
    assert_eq!(err.retry_after(), Some(Duration::from_secs(15)));
    assert_eq!(err.to_string(), "rate limited: Too Many Requests");
}

#[tokio::test]
async fn test_publish_uploads_media_then_posts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/media/upload"))
        .and(header("authorization", "Bearer user-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": "m-1"}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .and(body_json(json!({"text": "hello", "media": {"media_ids": ["m-1"]}})))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"data": {"id": "9001", "text": "hello"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let present = dir.path().join("media_0.jpg");
    std::fs::write(&present, b"jpeg bytes").unwrap();
    let missing = dir.path().join("media_1.jpg");

    let id = client(&server)
        .publish("hello", &[present, missing])
        .await
        .unwrap();
    assert_eq!(id, "9001");
}

#[tokio::test]
async fn test_publish_status_mapping() {
    let cases = [
        (403, "duplicate content"),
        (401, "bad token"),
        (400, "text too long"),
    ];

    for (status, detail) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2/tweets"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({"detail": detail})))
            .mount(&server)
            .await;

        let err = client(&server).publish("text", &[]).await.unwrap_err();
        let expected = match status {
            403 => CollaboratorError::Forbidden(detail.to_string()),
            401 => CollaboratorError::Unauthorized(detail.to_string()),
            _ => CollaboratorError::MalformedContent(detail.to_string()),
        };
        assert_eq!(err, expected);
    }
}

#[tokio::test]
async fn test_publish_without_user_token() {
    let server = MockServer::start().await;
    let client = XClient::new(
        XConfig::default()
            .with_base_url(server.uri())
            .with_bearer_token("app-token"),
    )
    .unwrap();

    let err = client.publish("text", &[]).await.unwrap_err();
    assert!(matches!(err, CollaboratorError::Unauthorized(_)));
}

#[tokio::test]
async fn test_media_downloader_saves_and_skips() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/photo"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(b"png".to_vec()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/gone.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let downloader = HttpMediaDownloader::new(dir.path(), Duration::from_secs(5)).unwrap();
    let urls = vec![
        format!("{}/img/gone.jpg", server.uri()),
        format!("{}/img/photo", server.uri()),
    ];

    let saved = downloader.download("77", &urls).await;
    assert_eq!(saved, vec![dir.path().join("77").join("media_1.png")]);
    assert_eq!(std::fs::read(&saved[0]).unwrap(), b"png");
}
