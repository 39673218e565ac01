//! GitHub GraphQL v4 adapter: one query per repository.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use herald_common::CodeHostingKind;
use herald_http::{HttpClient, RequestOpts};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::{CodeHosting, RepositorySnapshot, TagRef, UpstreamError};

pub const MAX_TOPICS: usize = 10;
pub const MAX_TAGS: usize = 5;

const REPOSITORY_QUERY: &str = r#"
query ($owner: String!, $name: String!, $topics: Int!, $tags: Int!) {
  repository(owner: $owner, name: $name) {
    description
    homepageUrl
    url
    repositoryTopics(first: $topics) {
      nodes { topic { name } }
    }
    refs(refPrefix: "refs/tags/", first: $tags, orderBy: {field: TAG_COMMIT_DATE, direction: DESC}) {
      nodes {
        name
        target {
          ... on Commit { author { date } }
          ... on Tag { tagger { date } }
        }
      }
    }
  }
}"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<RepositoryData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct RepositoryData {
    repository: Option<RepositoryNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryNode {
    description: Option<String>,
    homepage_url: Option<String>,
    url: String,
    repository_topics: Connection<TopicNode>,
    refs: Option<Connection<RefNode>>,
}

#[derive(Debug, Deserialize)]
struct Connection<T> {
    #[serde(default = "Vec::new")]
    nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TopicNode {
    topic: Topic,
}

#[derive(Debug, Deserialize)]
struct Topic {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RefNode {
    name: String,
    target: Option<RefTarget>,
}

#[derive(Debug, Deserialize)]
struct RefTarget {
    author: Option<Signature>,
    tagger: Option<Signature>,
}

#[derive(Debug, Deserialize)]
struct Signature {
    date: Option<DateTime<FixedOffset>>,
}

impl RefNode {
    fn into_tag(self) -> TagRef {
        let created = self.target.and_then(|t| {
            t.tagger
                .and_then(|s| s.date)
                .or_else(|| t.author.and_then(|s| s.date))
        });
        TagRef {
            name: self.name,
            created: created.map(|d| d.with_timezone(&Utc)),
        }
    }
}

impl RepositoryNode {
    fn into_snapshot(self) -> RepositorySnapshot {
        let site_url = self
            .homepage_url
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .unwrap_or(self.url);
        RepositorySnapshot {
            description: self.description.unwrap_or_default(),
            site_url,
            topics: self
                .repository_topics
                .nodes
                .into_iter()
                .take(MAX_TOPICS)
                .map(|n| n.topic.name)
                .collect(),
            tags: self
                .refs
                .map(|r| r.nodes)
                .unwrap_or_default()
                .into_iter()
                .take(MAX_TAGS)
                .map(RefNode::into_tag)
                .collect(),
        }
    }
}

/// GitHub client authenticated with a bearer token.
#[derive(Clone)]
pub struct GithubClient {
    http: HttpClient,
    endpoint: String,
    token: String,
}

impl std::fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubClient")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl GithubClient {
    pub fn new(http: HttpClient, endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl CodeHosting for GithubClient {
    fn kind(&self) -> CodeHostingKind {
        CodeHostingKind::Github
    }

    async fn load_repository(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<RepositorySnapshot, UpstreamError> {
        let (owner, name) = (owner.trim(), name.trim());
        let slug = format!("{owner}/{name}");
        let body = json!({
            "query": REPOSITORY_QUERY,
            "variables": {
                "owner": owner,
                "name": name,
                "topics": MAX_TOPICS,
                "tags": MAX_TAGS,
            },
        });
        let opts = RequestOpts {
            bearer: Some(&self.token),
            allow_absolute: true,
            ..Default::default()
        };
        let resp: GraphQlResponse = self.http.post_json_opts(&self.endpoint, &body, opts).await?;

        if resp
            .errors
            .iter()
            .any(|e| e.kind.as_deref() == Some("NOT_FOUND"))
        {
            return Err(UpstreamError::RepositoryNotFound(slug));
        }
        match resp.data {
            Some(RepositoryData {
                repository: Some(node),
            }) => {
                let snapshot = node.into_snapshot();
                debug!(
                    repo = %slug,
                    tags = snapshot.tags.len(),
                    topics = snapshot.topics.len(),
                    "github.repository_loaded"
                );
                Ok(snapshot)
            }
            Some(RepositoryData { repository: None }) => {
                Err(UpstreamError::RepositoryNotFound(slug))
            }
            None => {
                let message = resp
                    .errors
                    .into_iter()
                    .map(|e| e.message)
                    .collect::<Vec<_>>()
                    .join("; ");
                warn!(repo = %slug, error = %message, "github.query_failed");
                Err(UpstreamError::Unavailable(format!(
                    "graphql query for {slug} failed: {message}"
                )))
            }
        }
    }
}
