//! Subcommands of the `herald` binary and the wiring each one needs.
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Subcommand;
use herald_common::{CodeHostingKind, Language};
use herald_config::{HeraldConfig, HttpConfig};
use herald_http::HttpClient;
use herald_store::{ReleaseRepository, RepositoryRef, SqliteStore, TrackPackage};
use herald_upstream::{GithubClient, PypiFeed};
use herald_watch::{Notifier, RetentionPolicy, poll_index, watch_code_hosting};
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read the package-index feed and record new packages and releases.
    PollIndex,
    /// Refresh tracked packages from their code host and record fresh tags.
    Watch,
    /// Delete stale releases and releases of failed or low-rank packages.
    Prune,
    /// Announce the oldest eligible release of each category.
    Notify {
        /// Keep announcing every `notifier.poll_interval_secs` until interrupted.
        #[arg(long)]
        forever: bool,
    },
    /// Register or update the repository a package is developed in.
    Track {
        language: Language,
        name: String,
        #[arg(long, value_name = "OWNER/NAME")]
        repo: RepoSlug,
        /// Tag pattern: group 1 (or `name`) is the version, group 2 (or `prefix`) the
        /// component. Defaults to plain `v1.2.3`-style tags.
        #[arg(long)]
        pattern: Option<String>,
        #[arg(long)]
        rank: Option<u32>,
    },
    /// Apply database migrations and exit.
    Migrate,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::PollIndex => "poll-index",
            Command::Watch => "watch",
            Command::Prune => "prune",
            Command::Notify { .. } => "notify",
            Command::Track { .. } => "track",
            Command::Migrate => "migrate",
        }
    }
}

/// `owner/name` on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl FromStr for RepoSlug {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('/') {
            Some((owner, name))
                if !owner.trim().is_empty()
                    && !name.trim().is_empty()
                    && !name.contains('/') =>
            {
                Ok(Self {
                    owner: owner.trim().to_string(),
                    name: name.trim().to_string(),
                })
            }
            _ => Err(format!("expected OWNER/NAME, got {s:?}")),
        }
    }
}

fn http_client(http: &HttpConfig, base: &str) -> Result<HttpClient> {
    Ok(HttpClient::new(base)
        .with_context(|| format!("building HTTP client for {base}"))?
        .with_timeout(http.timeout())
        .with_retries(http.retries))
}

pub async fn run(command: Command, cfg: &HeraldConfig, cancel: CancellationToken) -> Result<()> {
    let sqlite = Arc::new(
        SqliteStore::connect(&cfg.database_url)
            .await
            .context("opening database")?,
    );
    let store: Arc<dyn ReleaseRepository> = sqlite.clone();

    match command {
        Command::Migrate => {
            sqlite.migrate().await?;
            info!("herald.migrated");
        }
        Command::PollIndex => {
            let index = &cfg.package_index;
            let feed = PypiFeed::new(http_client(&cfg.http, &index.url)?, index.url.as_str())
                .with_language(index.language);
            poll_index(&feed, store).await?;
        }
        Command::Watch => {
            let hosting = &cfg.code_hosting;
            let Some(token) = hosting.token() else {
                bail!("code_hosting.token is not configured");
            };
            let github = GithubClient::new(
                http_client(&cfg.http, &hosting.endpoint)?,
                hosting.endpoint.as_str(),
                token,
            );
            watch_code_hosting(&github, store, hosting.freshness(), Utc::now()).await?;
        }
        Command::Prune => {
            RetentionPolicy::new(store, cfg.retention.window(), cfg.retention.min_rank)
                .prune()
                .await?;
        }
        Command::Notify { forever } => {
            let notifier = Notifier::from_config(store, &cfg.notifier, &cfg.http)?;
            if notifier.categories().next().is_none() {
                warn!("notifier.no_accounts");
            }
            if forever {
                notifier
                    .run_forever(cfg.notifier.poll_interval(), cancel)
                    .await;
            } else {
                notifier.run_cycle().await?;
            }
        }
        Command::Track {
            language,
            name,
            repo,
            pattern,
            rank,
        } => {
            let release_regex = pattern.unwrap_or_default();
            if !release_regex.is_empty() {
                Regex::new(&release_regex).context("invalid --pattern")?;
            }
            let package = store
                .track_package(&TrackPackage {
                    name,
                    language,
                    repository: RepositoryRef {
                        hosting: CodeHostingKind::Github,
                        owner: repo.owner,
                        name: repo.name,
                    },
                    release_regex,
                    rank,
                })
                .await?;
            info!(
                package = %package.name,
                id = package.id,
                rank = package.rank,
                "herald.tracked"
            );
        }
    }
    Ok(())
}
