use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use herald_store::{ReleaseRepository, StoreResult};
use tracing::info;

/// Rows removed by each delete pass of one [`RetentionPolicy::prune`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub expired: u64,
    pub failed_packages: u64,
    pub low_rank: u64,
}

impl PruneReport {
    pub fn total(&self) -> u64 {
        self.expired + self.failed_packages + self.low_rank
    }
}

/// Deletes releases that are too old, belong to a failed package, or belong to a `done`
/// package ranked below `min_rank`. Package rows are never touched.
#[derive(Clone)]
pub struct RetentionPolicy {
    repo: Arc<dyn ReleaseRepository>,
    window: Duration,
    min_rank: u32,
}

impl RetentionPolicy {
    pub fn new(repo: Arc<dyn ReleaseRepository>, window: Duration, min_rank: u32) -> Self {
        Self {
            repo,
            window,
            min_rank,
        }
    }

    pub async fn prune(&self) -> StoreResult<PruneReport> {
        self.prune_at(Utc::now()).await
    }

    pub async fn prune_at(&self, now: DateTime<Utc>) -> StoreResult<PruneReport> {
        let report = PruneReport {
            expired: self
                .repo
                .delete_releases_created_before(now - self.window)
                .await?,
            failed_packages: self.repo.delete_releases_of_failed_packages().await?,
            low_rank: self
                .repo
                .delete_releases_of_low_rank_packages(self.min_rank)
                .await?,
        };
        info!(
            expired = report.expired,
            failed_packages = report.failed_packages,
            low_rank = report.low_rank,
            min_rank = self.min_rank,
            "retention.pruned"
        );
        Ok(report)
    }
}
