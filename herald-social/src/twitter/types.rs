use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct CreateTweetRequest<'a> {
    pub text: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTweetResponse {
    pub data: CreatedTweet,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedTweet {
    pub id: String,
    #[serde(default)]
    pub text: String,
}
