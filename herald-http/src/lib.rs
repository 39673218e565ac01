//! HTTP client used by every Herald upstream and publisher, with retries and safe logging.
//!
//! - Per-call `RequestOpts`: bearer token, timeout and retry budget
//! - Bearer tokens are cleaned before use and masked in raw logs
//! - Retries transport errors, 429 and 5xx with exponential backoff and `Retry-After`
//! - Optional *raw* request/response logging via `HERALD_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```rust
//! # async fn demo() -> Result<(), herald_http::HttpError> {
//! let client = herald_http::HttpClient::new("https://pypi.org")?;
//! let feed: String = client
//!     .get_text("rss/updates.xml", herald_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```
//!
//! The default budget is two retries, so a call makes at most three attempts before the
//! last error is surfaced to the caller.

use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

const RAW_ENV: &str = "HERALD_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;
const USER_AGENT: &str = concat!("herald/", env!("CARGO_PKG_VERSION"));

fn raw_logging() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

fn masked_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let val = if key.eq_ignore_ascii_case("authorization") {
                "Bearer <redacted>".to_string()
            } else {
                v.to_str().unwrap_or("").to_string()
            };
            (key, val)
        })
        .collect()
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("bad url: {0}")]
    Url(String),
    #[error("cannot build request: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("cannot decode response ({0}): {1}")]
    Decode(String, String),
    #[error("http {status}: {message} (request {request_id})")]
    Api {
        status: StatusCode,
        message: String,
        request_id: String,
    },
}

impl HttpError {
    /// True for failures where the remote never produced a usable answer: transport
    /// errors, throttling, server errors and rejected credentials.
    pub fn is_unavailable(&self) -> bool {
        match self {
            HttpError::Network(_) => true,
            HttpError::Api { status, .. } => {
                status.is_server_error()
                    || *status == StatusCode::TOO_MANY_REQUESTS
                    || *status == StatusCode::UNAUTHORIZED
                    || *status == StatusCode::FORBIDDEN
            }
            _ => false,
        }
    }
}

/// Per-request overrides of the client defaults.
///
/// Unset fields fall back to the client's timeout and retry budget.
///
/// ```
/// use herald_http::RequestOpts;
///
/// let graphql = RequestOpts {
///     bearer: Some("ghp_example"),
///     allow_absolute: true,
///     ..Default::default()
/// };
/// assert!(graphql.retries.is_none());
/// assert!(graphql.timeout.is_none());
/// ```
#[derive(Clone, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    /// Sent as `Authorization: Bearer`; surrounding quotes and whitespace are dropped.
    pub bearer: Option<&'a str>,
    /// Accept a full URL in `path` instead of joining it onto the base.
    pub allow_absolute: bool,
}

impl std::fmt::Debug for RequestOpts<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOpts")
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .field("bearer", &self.bearer.map(|_| "<redacted>"))
            .field("allow_absolute", &self.allow_absolute)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    pub default_timeout: Duration,
    pub max_retries: usize,
}

impl HttpClient {
    /// Client rooted at `base`; relative paths are joined onto it.
    ///
    /// ```no_run
    /// # fn main() -> Result<(), herald_http::HttpError> {
    /// let github = herald_http::HttpClient::new("https://api.github.com/graphql")?
    ///     .with_retries(1);
    /// assert_eq!(github.max_retries, 1);
    /// # Ok(()) }
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_timeout: Duration::from_secs(15),
            max_retries: 2,
        })
    }

    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// GET a text body (RSS/XML feeds).
    pub async fn get_text(&self, path: &str, opts: RequestOpts<'_>) -> Result<String, HttpError> {
        let bytes = self
            .request_internal::<()>(Method::GET, path, None, opts)
            .await?;
        String::from_utf8(bytes).map_err(|e| {
            let snippet = body_excerpt(e.as_bytes());
            HttpError::Decode(e.to_string(), snippet)
        })
    }

    /// POST JSON with per-request options.
    pub async fn post_json_opts<B, T>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let bytes = self
            .request_internal(Method::POST, path, Some(body), opts)
            .await?;
        decode_json(&bytes)
    }

    fn resolve(&self, path: &str, allow_absolute: bool) -> Result<Url, HttpError> {
        if allow_absolute {
            if let Ok(abs) = Url::parse(path) {
                return Ok(abs);
            }
        }
        self.base
            .join(path)
            .map_err(|e| HttpError::Url(e.to_string()))
    }

    /// Send with retries and return the body of the first successful response.
    async fn request_internal<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        opts: RequestOpts<'_>,
    ) -> Result<Vec<u8>, HttpError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.resolve(path, opts.allow_absolute)?;
        let max_retries = opts.retries.unwrap_or(self.max_retries);
        let timeout = opts.timeout.unwrap_or(self.default_timeout);

        let body_bytes = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| HttpError::Build(format!("request body encode failed: {e}")))?;

        let bearer = opts.bearer.map(clean_token).transpose()?;

        let mut attempt = 0usize;
        loop {
            let mut rb = self
                .inner
                .request(method.clone(), url.clone())
                .timeout(timeout);

            if let Some(bytes) = &body_bytes {
                rb = rb
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(bytes.clone());
            }
            if let Some(tok) = &bearer {
                rb = rb.bearer_auth(tok);
            }

            let try_no = attempt + 1;
            tracing::debug!(
                attempt = try_no,
                max_retries,
                method = %method,
                host_path = %format!("{}{}", url.host_str().unwrap_or("-"), url.path()),
                timeout_ms = timeout.as_millis() as u64,
                bearer = bearer.is_some(),
                has_body = body_bytes.is_some(),
                "http.request.start"
            );
            if raw_logging() {
                let body = body_bytes
                    .as_deref()
                    .map(|b| String::from_utf8_lossy(&b[..b.len().min(RAW_MAX_BODY)]).into_owned());
                tracing::debug!(target: "http.raw", method = %method, url = %url, body = ?body, "request");
            }

            let started = std::time::Instant::now();
            let sent = match rb.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let headers = resp.headers().clone();
                    resp.bytes().await.map(|b| (status, headers, b))
                }
                Err(err) => Err(err),
            };
            let (status, headers, bytes) = match sent {
                Ok(parts) => parts,
                Err(err) => {
                    let message = err.to_string();
                    if attempt < max_retries {
                        attempt += 1;
                        let delay = backoff(attempt);
                        tracing::warn!(
                            attempt,
                            max_retries,
                            backoff_ms = delay.as_millis() as u64,
                            message = %message,
                            "http.retrying.network"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(attempt, max_retries, message = %message, "http.network_error");
                    return Err(HttpError::Network(message));
                }
            };
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let request_id = headers
                .get("x-request-id")
                .or_else(|| headers.get("x-github-request-id"))
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string();
            let remain = headers
                .get("x-ratelimit-remaining")
                .or_else(|| headers.get("x-rate-limit-remaining"))
                .and_then(|v| v.to_str().ok());

            tracing::debug!(
                %status,
                duration_ms = elapsed_ms,
                body_len = bytes.len(),
                x_request_id = %request_id,
                rate_limit.remaining = ?remain,
                "http.response.headers"
            );
            if raw_logging() {
                let text = String::from_utf8_lossy(&bytes[..bytes.len().min(RAW_MAX_BODY)]);
                tracing::info!(
                    target: "http.raw",
                    status = %status,
                    duration_ms = elapsed_ms,
                    headers = ?masked_headers(&headers),
                    body = %text,
                    truncated = bytes.len() > RAW_MAX_BODY
                );
            }

            if status.is_success() {
                return Ok(bytes.to_vec());
            }

            let snippet = body_excerpt(&bytes);
            let message = extract_error_message(&bytes);
            let throttled = status == StatusCode::TOO_MANY_REQUESTS;

            if (throttled || status.is_server_error()) && attempt < max_retries {
                attempt += 1;
                let delay = match retry_after_secs(&headers) {
                    Some(secs) => Duration::from_secs(secs),
                    None if throttled => backoff(attempt).max(Duration::from_millis(1100)),
                    None => backoff(attempt),
                };
                tracing::warn!(
                    %status,
                    attempt,
                    max_retries,
                    backoff_ms = delay.as_millis() as u64,
                    message = %message,
                    body_snippet = %snippet,
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            tracing::warn!(
                %status,
                message = %message,
                x_request_id = %request_id,
                body_snippet = %snippet,
                "http.error"
            );
            return Err(HttpError::Api {
                status,
                message,
                request_id,
            });
        }
    }
}

fn backoff(attempt: usize) -> Duration {
    Duration::from_millis(200u64.saturating_mul(1 << (attempt.saturating_sub(1)).min(10)))
}

fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, HttpError> {
    serde_json::from_slice::<T>(bytes).map_err(|e| {
        let snippet = body_excerpt(bytes);
        tracing::warn!(
            serde_line = %e.line(),
            serde_col = %e.column(),
            serde_err = %e,
            body_snippet = %snippet,
            "http.decode_failed"
        );
        HttpError::Decode(e.to_string(), snippet)
    })
}

/// Pull a human message out of the common error envelopes (GitHub, Twitter/X, generic).
fn extract_error_message(body: &[u8]) -> String {
    // Twitter/X v2: {"errors":[{"message":"...", "detail":"...", "title":"..."}]}
    // GitHub GraphQL: {"errors":[{"type":"...", "message":"..."}]}
    #[derive(Deserialize)]
    struct Errors {
        errors: Vec<ErrItem>,
    }
    #[derive(Deserialize)]
    struct ErrItem {
        #[serde(default)]
        message: String,
        #[serde(default)]
        detail: String,
        #[serde(default)]
        title: String,
    }

    // Fallback envelopes: message, detail or error.
    #[derive(Deserialize)]
    struct Msg {
        #[serde(default)]
        message: String,
        #[serde(default)]
        detail: String,
        #[serde(default)]
        error: String,
    }

    if let Ok(env) = serde_json::from_slice::<Errors>(body) {
        if let Some(first) = env.errors.into_iter().next() {
            for candidate in [first.message, first.detail, first.title] {
                if !candidate.is_empty() {
                    return candidate;
                }
            }
        }
    }
    if let Ok(m) = serde_json::from_slice::<Msg>(body) {
        for candidate in [m.message, m.detail, m.error] {
            if !candidate.is_empty() {
                return candidate;
            }
        }
    }
    body_excerpt(body)
}

fn retry_after_secs(h: &HeaderMap) -> Option<u64> {
    h.get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?
        .parse()
        .ok()
}

fn body_excerpt(body: &[u8]) -> String {
    let mut excerpt = String::from_utf8_lossy(body).to_string();
    if excerpt.len() > 500 {
        let mut cut = 500;
        while !excerpt.is_char_boundary(cut) {
            cut -= 1;
        }
        excerpt.truncate(cut);
        excerpt.push_str("...");
    }
    excerpt
}

fn clean_token(raw: &str) -> Result<String, HttpError> {
    let mut s = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    s.retain(|ch| !ch.is_ascii_whitespace());

    if s.is_empty() {
        return Err(HttpError::Build("API key is empty".into()));
    }
    if !s.is_ascii() {
        return Err(HttpError::Build("API key must be ASCII".into()));
    }
    if s.bytes().any(|b| b < 0x20 || b == 0x7F) {
        return Err(HttpError::Build(
            "API key has control characters".into(),
        ));
    }

    HeaderValue::from_str(&format!("Bearer {}", s))
        .map_err(|e| HttpError::Build(format!("unusable bearer token: {e}")))?;
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_quoted_tokens() {
        assert_eq!(clean_token(" \"abc def\" ").unwrap(), "abcdef");
        assert!(clean_token("   ").is_err());
        assert!(clean_token("tök").is_err());
    }

    #[test]
    fn extracts_first_error_message() {
        let body = br#"{"errors":[{"type":"NOT_FOUND","message":"Could not resolve"}]}"#;
        assert_eq!(extract_error_message(body), "Could not resolve");
        let body = br#"{"detail":"duplicate content"}"#;
        assert_eq!(extract_error_message(body), "duplicate content");
        assert_eq!(extract_error_message(b"plain"), "plain");
    }

    #[test]
    fn backoff_doubles() {
        assert_eq!(backoff(1), Duration::from_millis(200));
        assert_eq!(backoff(2), Duration::from_millis(400));
        assert_eq!(backoff(3), Duration::from_millis(800));
    }

    #[test]
    fn unavailable_covers_transport_and_auth() {
        assert!(HttpError::Network("reset".into()).is_unavailable());
        let api = |status| HttpError::Api {
            status,
            message: String::new(),
            request_id: "-".into(),
        };
        assert!(api(StatusCode::BAD_GATEWAY).is_unavailable());
        assert!(api(StatusCode::UNAUTHORIZED).is_unavailable());
        assert!(!api(StatusCode::BAD_REQUEST).is_unavailable());
        assert!(!HttpError::Decode("x".into(), String::new()).is_unavailable());
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        let body = "é".repeat(400);
        let excerpt = body_excerpt(body.as_bytes());
        assert!(excerpt.ends_with("..."));
        assert!(excerpt.len() <= 503);
    }
}
