//! Persistence for packages and their releases.
//!
//! [`ReleaseRepository`] is the seam the watch jobs program against; [`SqliteStore`] is
//! the production implementation backed by `sqlx` and embedded migrations. Uniqueness of
//! (name, language) for packages and (name, package) for releases is enforced by the
//! schema, not by callers.
pub mod error;
pub mod repository;
pub mod sqlite;

pub use error::{StoreError, StoreResult};
pub use repository::ReleaseRepository;
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use herald_common::{CodeHostingKind, Language, PackageStatus, ReleaseStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub id: i64,
    pub name: String,
    pub language: Language,
    pub description: String,
    pub keywords: String,
    pub homepage: String,
    pub site_url: String,
    /// Space-joined `#tag` list derived from repository topics.
    pub hashtags: String,
    pub rank: u32,
    pub status: PackageStatus,
    pub repository: Option<RepositoryRef>,
    /// Two-group pattern applied to tag names; empty when the package is not tracked.
    pub release_regex: String,
}

/// Pointer to the repository a package is developed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub hosting: CodeHostingKind,
    pub owner: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub id: i64,
    pub package_id: i64,
    pub name: String,
    pub created: DateTime<Utc>,
    pub status: ReleaseStatus,
}

/// A `new` release joined with its owning package, as selected for announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRelease {
    pub release: Release,
    pub package: Package,
}

/// Fields known when a package is first seen in a package-index feed.
#[derive(Debug, Clone)]
pub struct NewPackage {
    pub name: String,
    pub language: Language,
    pub description: String,
    pub keywords: String,
    pub homepage: String,
}

/// Registration of a package's repository, pattern and rank.
#[derive(Debug, Clone)]
pub struct TrackPackage {
    pub name: String,
    pub language: Language,
    pub repository: RepositoryRef,
    pub release_regex: String,
    /// `None` leaves an existing rank untouched.
    pub rank: Option<u32>,
}

/// Metadata refreshed from the code host on every watch run.
#[derive(Debug, Clone)]
pub struct PackageMetadata {
    pub description: String,
    pub hashtags: String,
    pub site_url: String,
    pub status: PackageStatus,
}
