//! Announcement of stored releases, one category (language) at a time.
//!
//! A release leaves `new` exactly once: `tweeted` when the channel accepts the post,
//! `fail` otherwise. The status row is written once, after the publish attempt, whatever
//! its outcome. When an overlapping run settled the release first, its status stands.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use herald_common::{Language, ReleaseStatus};
use herald_config::{HttpConfig, NotifierConfig};
use herald_http::HttpClient;
use herald_social::{PublishError, Publisher, TwitterPublisher};
use herald_store::{PendingRelease, ReleaseRepository};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Where failed publish attempts are recorded.
pub trait FailureSink: Send + Sync {
    fn record(&self, pending: &PendingRelease, err: &PublishError);
}

/// Records failures as `tracing` error events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFailureSink;

impl FailureSink for TracingFailureSink {
    fn record(&self, pending: &PendingRelease, err: &PublishError) {
        error!(
            package = %pending.package.name,
            language = %pending.package.language,
            release = %pending.release.name,
            release_id = pending.release.id,
            error = %err,
            "notifier.publish_failed"
        );
    }
}

/// Outcome counts for one notification cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub published: usize,
    pub failed: usize,
}

/// Announcement text for a release. Falls back to `#language #name` when the package
/// has no stored hashtags.
pub fn render_announcement(pending: &PendingRelease) -> String {
    let package = &pending.package;
    let hashtags = if package.hashtags.trim().is_empty() {
        let bare: String = package
            .name
            .chars()
            .filter(|c| !matches!(c, '-' | '_'))
            .collect();
        format!("#{} #{}", package.language, bare)
    } else {
        package.hashtags.trim().to_string()
    };
    format!(
        "The release of {} package {} is now available. 🥳\n\n{} 😍",
        package.name, pending.release.name, hashtags
    )
}

/// Publishes the oldest eligible `new` release of each category that has a channel.
pub struct Notifier {
    repo: Arc<dyn ReleaseRepository>,
    channels: BTreeMap<Language, Arc<dyn Publisher>>,
    sink: Arc<dyn FailureSink>,
    eligibility: Duration,
    per_cycle: usize,
}

impl Notifier {
    pub fn new(repo: Arc<dyn ReleaseRepository>, eligibility: Duration) -> Self {
        Self {
            repo,
            channels: BTreeMap::new(),
            sink: Arc::new(TracingFailureSink),
            eligibility,
            per_cycle: 1,
        }
    }

    /// Build a Twitter channel for every category that has credentials; the rest are
    /// left out and never announced.
    pub fn from_config(
        repo: Arc<dyn ReleaseRepository>,
        config: &NotifierConfig,
        http: &HttpConfig,
    ) -> Result<Self> {
        let mut notifier = Self::new(repo, config.eligibility())
            .with_releases_per_cycle(config.releases_per_cycle);
        for language in Language::ALL {
            let Some(token) = config.credentials(language) else {
                debug!(%language, "notifier.no_credentials");
                continue;
            };
            let client = HttpClient::new(herald_social::twitter::client::TWITTER_API_BASE)
                .context("building twitter client")?
                .with_timeout(http.timeout())
                .with_retries(http.retries);
            notifier = notifier.with_channel(
                language,
                Arc::new(TwitterPublisher::with_client(client, token)),
            );
        }
        Ok(notifier)
    }

    pub fn with_channel(mut self, language: Language, publisher: Arc<dyn Publisher>) -> Self {
        self.channels.insert(language, publisher);
        self
    }

    pub fn with_failure_sink(mut self, sink: Arc<dyn FailureSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Releases announced per category per cycle; never below one.
    pub fn with_releases_per_cycle(mut self, n: usize) -> Self {
        self.per_cycle = n.max(1);
        self
    }

    pub fn categories(&self) -> impl Iterator<Item = Language> + '_ {
        self.channels.keys().copied()
    }

    pub async fn run_cycle(&self) -> Result<CycleReport> {
        self.run_cycle_at(Utc::now()).await
    }

    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let mut report = CycleReport::default();
        let created_before = now - self.eligibility;
        for (language, publisher) in &self.channels {
            let batch = self
                .repo
                .oldest_new_releases(*language, created_before, self.per_cycle)
                .await
                .with_context(|| format!("selecting releases for {language}"))?;
            for pending in batch {
                match self.announce(publisher.as_ref(), &pending).await? {
                    Some(ReleaseStatus::Tweeted) => report.published += 1,
                    Some(_) => report.failed += 1,
                    None => {}
                }
            }
        }
        if report.published + report.failed > 0 {
            info!(
                published = report.published,
                failed = report.failed,
                "notifier.cycle_done"
            );
        }
        Ok(report)
    }

    async fn announce(
        &self,
        publisher: &dyn Publisher,
        pending: &PendingRelease,
    ) -> Result<Option<ReleaseStatus>> {
        let text = render_announcement(pending);
        let status = match publisher.publish(&text).await {
            Ok(()) => {
                info!(
                    package = %pending.package.name,
                    release = %pending.release.name,
                    "notifier.published"
                );
                ReleaseStatus::Tweeted
            }
            Err(err) => {
                self.sink.record(pending, &err);
                ReleaseStatus::Fail
            }
        };
        match self.repo.save_release_status(pending.release.id, status).await {
            Ok(()) => Ok(Some(status)),
            Err(e) if e.is_already_settled() => {
                warn!(
                    release_id = pending.release.id,
                    attempted = %status,
                    error = %e,
                    "notifier.release_already_settled"
                );
                Ok(None)
            }
            Err(e) => Err(e)
                .with_context(|| format!("saving status of release {}", pending.release.id)),
        }
    }

    /// Run cycles every `interval` until `cancel` fires. A failed cycle is logged and
    /// the loop carries on.
    pub async fn run_forever(&self, interval: StdDuration, cancel: CancellationToken) {
        info!(
            interval_secs = interval.as_secs(),
            channels = self.channels.len(),
            "notifier.started"
        );
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                res = self.run_cycle() => {
                    if let Err(e) = res {
                        warn!(error = ?e, "notifier.cycle_failed");
                    }
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        info!("notifier.stopped");
    }
}
