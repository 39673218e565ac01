use herald_http::{HttpClient, HttpError, RequestOpts};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn retries_server_errors_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss/updates.xml"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rss/updates.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<rss/>"))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let body = client
        .get_text("rss/updates.xml", RequestOpts::default())
        .await
        .unwrap();
    assert_eq!(body, "<rss/>");
}

#[tokio::test]
async fn gives_up_after_three_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
        .expect(3)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let err = client
        .get_text("feed", RequestOpts::default())
        .await
        .unwrap_err();
    match err {
        HttpError::Api { status, message, .. } => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(message, "boom");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_json(json!({"detail": "You are not allowed to create a Tweet with duplicate content."})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let err = client
        .post_json_opts::<_, serde_json::Value>(
            "2/tweets",
            &json!({"text": "hi"}),
            RequestOpts {
                bearer: Some("tok"),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("duplicate content"));
}

#[tokio::test]
async fn sends_bearer_and_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer secret-token"))
        .and(body_json(json!({"query": "{ viewer { login } }"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"ok": true}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let got: serde_json::Value = client
        .post_json_opts(
            "graphql",
            &json!({"query": "{ viewer { login } }"}),
            RequestOpts {
                bearer: Some("\"secret-token\" "),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(got["data"]["ok"], true);
}

#[test]
fn request_opts_debug_hides_bearer() {
    let opts = RequestOpts {
        bearer: Some("ghp_live_value"),
        ..Default::default()
    };
    let shown = format!("{opts:?}");
    assert!(!shown.contains("ghp_live_value"), "{shown}");
    assert!(shown.contains("<redacted>"));
}
