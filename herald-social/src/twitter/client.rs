//! Posting to X/Twitter through the v2 `POST /2/tweets` endpoint.
//!
//! Each category account authenticates with its own OAuth 2.0 user-context access token,
//! sent as a bearer credential.
use async_trait::async_trait;
use herald_http::{HttpClient, HttpError, RequestOpts};
use tracing::info;

use crate::twitter::types::{CreateTweetRequest, CreateTweetResponse};
use crate::{PublishError, Publisher};

pub const TWITTER_API_BASE: &str = "https://api.twitter.com";

#[derive(Clone)]
pub struct TwitterPublisher {
    http: HttpClient,
    access_token: String,
}

impl std::fmt::Debug for TwitterPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitterPublisher")
            .field("base", &self.http.base().as_str())
            .field("access_token", &"<redacted>")
            .finish()
    }
}

impl TwitterPublisher {
    pub fn new(access_token: impl Into<String>) -> Result<Self, HttpError> {
        Ok(Self::with_client(
            HttpClient::new(TWITTER_API_BASE)?,
            access_token,
        ))
    }

    /// Use a preconfigured client; its base URL replaces the public API host.
    pub fn with_client(http: HttpClient, access_token: impl Into<String>) -> Self {
        Self {
            http,
            access_token: access_token.into(),
        }
    }
}

#[async_trait]
impl Publisher for TwitterPublisher {
    async fn publish(&self, text: &str) -> Result<(), PublishError> {
        let resp: CreateTweetResponse = self
            .http
            .post_json_opts(
                "2/tweets",
                &CreateTweetRequest { text },
                RequestOpts {
                    bearer: Some(&self.access_token),
                    ..Default::default()
                },
            )
            .await?;
        info!(tweet_id = %resp.data.id, chars = text.chars().count(), "twitter.posted");
        Ok(())
    }
}
