use herald_http::HttpClient;
use herald_social::{PublishError, Publisher, TwitterPublisher};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn publisher(server: &MockServer, token: &str) -> TwitterPublisher {
    let http = HttpClient::new(&server.uri()).unwrap().with_retries(0);
    TwitterPublisher::with_client(http, token)
}

#[tokio::test]
async fn posts_text_with_account_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .and(header("authorization", "Bearer py-token"))
        .and(body_json(json!({"text": "The release of requests package 2.31.0"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {"id": "1661234567890", "text": "The release of requests package 2.31.0"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    publisher(&server, "py-token")
        .publish("The release of requests package 2.31.0")
        .await
        .unwrap();
}

#[tokio::test]
async fn duplicate_content_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "detail": "You are not allowed to create a Tweet with duplicate content.",
            "status": 403
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = publisher(&server, "py-token").publish("again").await.unwrap_err();
    match err {
        PublishError::Rejected { status, message } => {
            assert_eq!(status, 403);
            assert!(message.contains("duplicate content"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn expired_token_is_a_credentials_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"title": "Unauthorized", "detail": "Unauthorized"})))
        .mount(&server)
        .await;

    let err = publisher(&server, "stale").publish("hello").await.unwrap_err();
    assert!(matches!(err, PublishError::Credentials(_)), "{err:?}");
}

#[tokio::test]
async fn unreachable_host_is_a_transport_failure() {
    let http = HttpClient::new("http://127.0.0.1:9").unwrap().with_retries(0);
    let err = TwitterPublisher::with_client(http, "token")
        .publish("hello")
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::Transport(_)), "{err:?}");
}
