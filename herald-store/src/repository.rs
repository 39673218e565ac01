//! Repository trait abstracting package and release persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use herald_common::{Language, PackageStatus, ReleaseCandidate, ReleaseStatus};

use crate::error::StoreResult;
use crate::{NewPackage, Package, PackageMetadata, PendingRelease, Release, TrackPackage};

#[async_trait]
pub trait ReleaseRepository: Send + Sync {
    /// Look a package up by (name, language), name compared case-insensitively, creating
    /// it from `new` when absent. Concurrent callers converge on the same row.
    async fn get_or_create_package(&self, new: &NewPackage) -> StoreResult<Package>;

    /// Register (or update) the repository reference, tag pattern and rank of a package.
    async fn track_package(&self, track: &TrackPackage) -> StoreResult<Package>;

    /// Packages with a repository reference, in id order.
    async fn tracked_packages(&self) -> StoreResult<Vec<Package>>;

    async fn update_package_metadata(&self, package_id: i64, meta: &PackageMetadata)
        -> StoreResult<()>;

    async fn set_package_status(&self, package_id: i64, status: PackageStatus) -> StoreResult<()>;

    async fn release_exists(&self, package_id: i64, name: &str) -> StoreResult<bool>;

    /// Insert a release in state `new`. Fails with `StoreError::DuplicateEntity` when
    /// (name, package) is already present.
    async fn insert_release(
        &self,
        package_id: i64,
        candidate: &ReleaseCandidate,
    ) -> StoreResult<Release>;

    async fn get_release(&self, release_id: i64) -> StoreResult<Release>;

    /// Up to `limit` releases in state `new` for `language`, created at or before
    /// `created_before`, oldest first.
    async fn oldest_new_releases(
        &self,
        language: Language,
        created_before: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<PendingRelease>>;

    /// Move a `new` release to a terminal status. A release that already left `new`
    /// is kept as is and reported as `StoreError::AlreadySettled`.
    async fn save_release_status(&self, release_id: i64, status: ReleaseStatus)
        -> StoreResult<()>;

    /// Delete releases created before `cutoff`, whatever their status.
    async fn delete_releases_created_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;

    async fn delete_releases_of_failed_packages(&self) -> StoreResult<u64>;

    /// Delete releases of `done` packages ranked below `min_rank`.
    async fn delete_releases_of_low_rank_packages(&self, min_rank: u32) -> StoreResult<u64>;

    async fn count_releases(&self) -> StoreResult<u64>;
}
