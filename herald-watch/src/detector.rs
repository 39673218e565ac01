use std::sync::Arc;

use herald_common::ReleaseCandidate;
use herald_store::{Package, ReleaseRepository, StoreResult};
use tracing::{debug, info};

/// Turns release candidates into stored releases, once per (name, package).
#[derive(Clone)]
pub struct ReleaseDetector {
    repo: Arc<dyn ReleaseRepository>,
}

impl ReleaseDetector {
    pub fn new(repo: Arc<dyn ReleaseRepository>) -> Self {
        Self { repo }
    }

    /// Insert every candidate not yet recorded for `package` and return how many were
    /// created. Re-running with the same candidates creates nothing.
    pub async fn reconcile<I>(&self, package: &Package, candidates: I) -> StoreResult<usize>
    where
        I: IntoIterator<Item = ReleaseCandidate>,
    {
        let mut created = 0;
        for candidate in candidates {
            if self.repo.release_exists(package.id, &candidate.name).await? {
                continue;
            }
            match self.repo.insert_release(package.id, &candidate).await {
                Ok(release) => {
                    created += 1;
                    info!(
                        package = %package.name,
                        language = %package.language,
                        release = %release.name,
                        "detector.release_created"
                    );
                }
                // Lost a race with a concurrent run; the row exists.
                Err(e) if e.is_duplicate() => {
                    debug!(package = %package.name, release = %candidate.name, "detector.release_exists");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(created)
    }
}
