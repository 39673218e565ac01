use herald_http::HttpError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Transport or credential failure after the HTTP layer exhausted its retries.
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    /// A document or a single item did not have the expected shape.
    #[error("malformed upstream data: {0}")]
    Format(String),

    #[error("repository not found: {0}")]
    RepositoryNotFound(String),
}

impl From<HttpError> for UpstreamError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Decode(..) => UpstreamError::Format(err.to_string()),
            other => UpstreamError::Unavailable(other.to_string()),
        }
    }
}
