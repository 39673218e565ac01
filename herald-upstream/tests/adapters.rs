use herald_common::Language;
use herald_http::HttpClient;
use herald_upstream::{CodeHosting, GithubClient, PackageFeed, PypiFeed, UpstreamError};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>PyPI recent updates</title>
    <item>
      <title>requests 2.31.0</title>
      <link>https://pypi.org/project/requests/2.31.0/</link>
      <description>Python HTTP for Humans.</description>
    </item>
    <item>
      <title>nonsense</title>
      <link>https://pypi.org/</link>
    </item>
  </channel>
</rss>"#;

fn client(server: &MockServer) -> HttpClient {
    HttpClient::new(&server.uri()).unwrap().with_retries(0)
}

#[tokio::test]
async fn feed_fetch_reads_once_and_skips_bad_items() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss/updates.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
        .expect(1)
        .mount(&server)
        .await;

    let feed = PypiFeed::new(client(&server), format!("{}/rss/updates.xml", server.uri()));
    assert_eq!(feed.language(), Language::Python);

    let (ok, bad): (Vec<_>, Vec<_>) = feed
        .fetch_candidates()
        .await
        .unwrap()
        .partition(Result::is_ok);
    assert_eq!(ok.len(), 1);
    assert_eq!(bad.len(), 1);

    let requests = ok.into_iter().next().unwrap().unwrap();
    assert_eq!(requests.name, "requests");
    assert_eq!(requests.release, "2.31.0");
}

#[tokio::test]
async fn feed_transport_failure_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let feed = PypiFeed::new(client(&server), format!("{}/rss/updates.xml", server.uri()));
    let err = feed.fetch_candidates().await.unwrap_err();
    assert!(matches!(err, UpstreamError::Unavailable(_)), "{err:?}");
}

#[tokio::test]
async fn github_snapshot_is_loaded_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer ghp_test"))
        .and(body_partial_json(json!({"variables": {"owner": "psf", "name": "requests"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "repository": {
                    "description": "A simple, yet elegant, HTTP library.",
                    "homepageUrl": "https://requests.readthedocs.io",
                    "url": "https://github.com/psf/requests",
                    "repositoryTopics": {"nodes": [{"topic": {"name": "python-requests"}}]},
                    "refs": {"nodes": [
                        {"name": "v2.31.0", "target": {"author": {"date": "2023-05-22T15:12:42Z"}}}
                    ]}
                }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let github = GithubClient::new(
        client(&server),
        format!("{}/graphql", server.uri()),
        "ghp_test",
    );
    let snapshot = github.load_repository(" psf ", "requests ").await.unwrap();
    assert_eq!(snapshot.site_url, "https://requests.readthedocs.io");
    assert_eq!(snapshot.topics, ["python-requests"]);
    assert_eq!(snapshot.tags.len(), 1);
    assert_eq!(snapshot.tags[0].name, "v2.31.0");
}

#[tokio::test]
async fn github_not_found_is_reported_as_such() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"repository": null},
            "errors": [{
                "type": "NOT_FOUND",
                "path": ["repository"],
                "message": "Could not resolve to a Repository with the name 'psf/nope'."
            }]
        })))
        .mount(&server)
        .await;

    let github = GithubClient::new(client(&server), format!("{}/graphql", server.uri()), "t");
    let err = github.load_repository("psf", "nope").await.unwrap_err();
    match err {
        UpstreamError::RepositoryNotFound(slug) => assert_eq!(slug, "psf/nope"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn github_rejected_token_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Bad credentials"})),
        )
        .mount(&server)
        .await;

    let github = GithubClient::new(client(&server), format!("{}/graphql", server.uri()), "bad");
    let err = github.load_repository("psf", "requests").await.unwrap_err();
    assert!(matches!(err, UpstreamError::Unavailable(_)), "{err:?}");
    assert!(err.to_string().contains("Bad credentials"), "{err}");
}
