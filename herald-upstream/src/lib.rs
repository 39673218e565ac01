//! Upstream adapters: the package-index RSS feed and the code-hosting GraphQL API.
//!
//! Both adapters sit behind small `async_trait` seams ([`PackageFeed`], [`CodeHosting`]) so
//! the watch jobs can be exercised against fakes. Everything they return is already
//! validated into fixed-shape values; malformed feed items surface as per-item
//! [`UpstreamError::Format`] results the caller skips.
pub mod error;
pub mod github;
pub mod pypi;
pub mod snapshot;

pub use error::UpstreamError;
pub use github::GithubClient;
pub use pypi::{parse_feed, FeedCandidates, PypiFeed};
pub use snapshot::{
    derive_hashtags, extract_releases, normalize_description, RepositorySnapshot, TagReleases,
    TagRef,
};

use async_trait::async_trait;
use herald_common::{CodeHostingKind, Language};

/// A package-index feed. One call performs exactly one network read.
#[async_trait]
pub trait PackageFeed: Send + Sync {
    fn language(&self) -> Language;

    async fn fetch_candidates(&self) -> Result<FeedCandidates, UpstreamError>;
}

/// A code host able to describe a repository and its recent tags.
#[async_trait]
pub trait CodeHosting: Send + Sync {
    fn kind(&self) -> CodeHostingKind;

    async fn load_repository(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<RepositorySnapshot, UpstreamError>;
}
