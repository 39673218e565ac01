//! Outbound announcement channels.
//!
//! The watch crate only sees [`Publisher`]: one `publish(text)` call that either succeeds
//! or fails. [`twitter::TwitterPublisher`] is the production channel.
pub mod twitter;

pub use twitter::TwitterPublisher;

use async_trait::async_trait;
use herald_http::HttpError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    /// The channel answered and refused the post.
    #[error("publish rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("publish transport failure: {0}")]
    Transport(String),

    #[error("publish credentials invalid: {0}")]
    Credentials(String),
}

impl From<HttpError> for PublishError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Api {
                status, message, ..
            } if status.as_u16() == 401 => PublishError::Credentials(message),
            HttpError::Api {
                status, message, ..
            } => PublishError::Rejected {
                status: status.as_u16(),
                message,
            },
            HttpError::Build(msg) => PublishError::Credentials(msg),
            other => PublishError::Transport(other.to_string()),
        }
    }
}

/// A channel that accepts a finished announcement text.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, text: &str) -> Result<(), PublishError>;
}
