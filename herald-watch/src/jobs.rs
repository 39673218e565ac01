//! Batch jobs feeding the release store from upstream sources.
//!
//! Per-item isolation: a malformed feed item or an unreachable repository is logged and
//! skipped. Only a failed feed download or a store error aborts a run.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use herald_common::{PackageStatus, ReleaseCandidate};
use herald_store::{NewPackage, Package, PackageMetadata, ReleaseRepository};
use herald_upstream::{
    derive_hashtags, extract_releases, normalize_description, CodeHosting, PackageFeed,
    UpstreamError,
};
use regex::Regex;
use tracing::{info, warn};

use crate::ReleaseDetector;

/// Tag pattern used when a tracked package has none: an optional `v` and a dotted,
/// dashed or underscored version.
pub const DEFAULT_RELEASE_PATTERN: &str = r"^v?(\d+(?:[._-]\d+)+)$";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    pub seen: usize,
    pub skipped: usize,
    pub created: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchReport {
    pub refreshed: usize,
    pub not_found: usize,
    pub failed: usize,
    pub created: usize,
}

/// Read the package-index feed once, creating packages on first sight and recording the
/// release each item announces.
pub async fn poll_index(
    feed: &dyn PackageFeed,
    repo: Arc<dyn ReleaseRepository>,
) -> Result<PollReport> {
    let detector = ReleaseDetector::new(repo.clone());
    let mut report = PollReport::default();

    let candidates = feed
        .fetch_candidates()
        .await
        .context("fetching package index feed")?;
    for item in candidates {
        report.seen += 1;
        let raw = match item {
            Ok(raw) => raw,
            Err(e) => {
                report.skipped += 1;
                warn!(error = %e, "poll.item_skipped");
                continue;
            }
        };
        let package = repo
            .get_or_create_package(&NewPackage {
                name: raw.name.clone(),
                language: raw.language,
                description: raw.description.clone(),
                keywords: raw.keywords.clone(),
                homepage: raw.homepage.clone(),
            })
            .await
            .with_context(|| format!("storing package {}", raw.name))?;
        report.created += detector
            .reconcile(&package, [ReleaseCandidate::from(&raw)])
            .await?;
    }

    info!(
        language = %feed.language(),
        seen = report.seen,
        skipped = report.skipped,
        created = report.created,
        "poll.done"
    );
    Ok(report)
}

/// Refresh every tracked package from its code host and record fresh tag releases.
pub async fn watch_code_hosting(
    host: &dyn CodeHosting,
    repo: Arc<dyn ReleaseRepository>,
    freshness: Duration,
    now: DateTime<Utc>,
) -> Result<WatchReport> {
    let detector = ReleaseDetector::new(repo.clone());
    let mut report = WatchReport::default();

    for package in repo.tracked_packages().await? {
        let Some(reference) = package.repository.as_ref() else {
            continue;
        };
        if reference.hosting != host.kind() {
            continue;
        }
        let pattern = match release_pattern(&package) {
            Ok(p) => p,
            Err(e) => {
                report.failed += 1;
                warn!(package = %package.name, error = %e, "watch.bad_pattern");
                continue;
            }
        };

        let snapshot = match host.load_repository(&reference.owner, &reference.name).await {
            Ok(snapshot) => snapshot,
            Err(UpstreamError::RepositoryNotFound(slug)) => {
                report.not_found += 1;
                warn!(package = %package.name, repo = %slug, "watch.repository_not_found");
                repo.set_package_status(package.id, PackageStatus::Fail)
                    .await?;
                continue;
            }
            Err(e) => {
                report.failed += 1;
                warn!(package = %package.name, error = %e, "watch.load_failed");
                continue;
            }
        };

        let metadata = PackageMetadata {
            description: normalize_description(&snapshot.description),
            hashtags: derive_hashtags(&snapshot, &[package.language.as_str(), package.name.as_str()]),
            site_url: snapshot.site_url.clone(),
            status: PackageStatus::Done,
        };
        repo.update_package_metadata(package.id, &metadata)
            .await
            .with_context(|| format!("updating package {}", package.name))?;
        report.refreshed += 1;

        report.created += detector
            .reconcile(&package, extract_releases(&snapshot, &pattern, now, freshness))
            .await?;
    }

    info!(
        hosting = %host.kind(),
        refreshed = report.refreshed,
        not_found = report.not_found,
        failed = report.failed,
        created = report.created,
        "watch.done"
    );
    Ok(report)
}

fn release_pattern(package: &Package) -> Result<Regex, regex::Error> {
    let raw = package.release_regex.trim();
    Regex::new(if raw.is_empty() {
        DEFAULT_RELEASE_PATTERN
    } else {
        raw
    })
}
