//! Loader for Herald configuration with YAML + environment overlays.
//!
//! Sources are merged in order: the YAML file (or inline snippets), then
//! `HERALD__`-prefixed environment variables (`__` separates nesting levels, so
//! `HERALD__RETENTION__MIN_RANK=3` overrides `retention.min_rank`). After merging,
//! `${VAR}` placeholders anywhere in string values are expanded from the process
//! environment, which is how secrets such as `code_hosting.token` are normally supplied.
use chrono::Duration;
use config::{Config, ConfigError, Environment, File};
use herald_common::Language;
use herald_common::observability::LogFormat;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

pub const DEFAULT_PACKAGE_INDEX_URL: &str = "https://pypi.org/rss/updates.xml";
pub const DEFAULT_GRAPHQL_ENDPOINT: &str = "https://api.github.com/graphql";

#[derive(Debug, Deserialize)]
pub struct HeraldConfig {
    pub database_url: String,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub package_index: PackageIndexConfig,
    #[serde(default)]
    pub code_hosting: CodeHostingConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default = "default_true")]
    pub stderr: bool,
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            stderr: true,
            dir: None,
            filter: default_filter(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries after the first attempt.
    #[serde(default = "default_retries")]
    pub retries: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize)]
pub struct PackageIndexConfig {
    #[serde(default = "default_package_index_url")]
    pub url: String,
    /// Language stamped on every candidate read from this feed.
    #[serde(default = "default_index_language")]
    pub language: Language,
}

impl Default for PackageIndexConfig {
    fn default() -> Self {
        Self {
            url: default_package_index_url(),
            language: default_index_language(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CodeHostingConfig {
    #[serde(default = "default_graphql_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub token: Option<String>,
    /// Tags older than this stop the walk over a repository's tags.
    #[serde(default = "default_freshness_days")]
    pub freshness_days: u32,
}

impl Default for CodeHostingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_graphql_endpoint(),
            token: None,
            freshness_days: default_freshness_days(),
        }
    }
}

impl CodeHostingConfig {
    pub fn freshness(&self) -> Duration {
        Duration::days(self.freshness_days.into())
    }

    pub fn token(&self) -> Option<&str> {
        resolved_secret(self.token.as_deref())
    }
}

#[derive(Debug, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_retention_days")]
    pub window_days: u32,
    /// Releases of `done` packages ranked below this are pruned.
    #[serde(default = "default_min_rank")]
    pub min_rank: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            window_days: default_retention_days(),
            min_rank: default_min_rank(),
        }
    }
}

impl RetentionConfig {
    pub fn window(&self) -> Duration {
        Duration::days(self.window_days.into())
    }
}

#[derive(Debug, Deserialize)]
pub struct NotifierConfig {
    /// Minimum release age before it may be announced.
    #[serde(default = "default_eligibility_days")]
    pub eligibility_days: u32,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_releases_per_cycle")]
    pub releases_per_cycle: usize,
    /// One account per category; languages without an entry are never announced.
    #[serde(default)]
    pub accounts: BTreeMap<Language, AccountConfig>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            eligibility_days: default_eligibility_days(),
            poll_interval_secs: default_poll_interval_secs(),
            releases_per_cycle: default_releases_per_cycle(),
            accounts: BTreeMap::new(),
        }
    }
}

impl NotifierConfig {
    pub fn eligibility(&self) -> Duration {
        Duration::days(self.eligibility_days.into())
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// Access token for `language`, or `None` when the account is absent, empty, or
    /// still holds an unexpanded `${VAR}` placeholder.
    pub fn credentials(&self, language: Language) -> Option<&str> {
        self.accounts
            .get(&language)
            .and_then(|account| resolved_secret(account.access_token.as_deref()))
    }
}

#[derive(Debug, Deserialize)]
pub struct AccountConfig {
    #[serde(default)]
    pub access_token: Option<String>,
}

fn resolved_secret(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty() && !s.contains("${"))
}

fn default_true() -> bool {
    true
}
fn default_filter() -> String {
    "info".into()
}
fn default_timeout_secs() -> u64 {
    15
}
fn default_retries() -> usize {
    2
}
fn default_package_index_url() -> String {
    DEFAULT_PACKAGE_INDEX_URL.into()
}
fn default_index_language() -> Language {
    Language::Python
}
fn default_graphql_endpoint() -> String {
    DEFAULT_GRAPHQL_ENDPOINT.into()
}
fn default_freshness_days() -> u32 {
    15
}
fn default_retention_days() -> u32 {
    5
}
fn default_min_rank() -> u32 {
    1
}
fn default_eligibility_days() -> u32 {
    1
}
fn default_poll_interval_secs() -> u64 {
    300
}
fn default_releases_per_cycle() -> usize {
    1
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hiding the `config` crate wiring (YAML + env overrides).
pub struct HeraldConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for HeraldConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl HeraldConfigLoader {
    /// Start with `HERALD__` environment overrides only.
    ///
    /// ```
    /// use herald_config::HeraldConfigLoader;
    ///
    /// let config = HeraldConfigLoader::new()
    ///     .with_yaml_str("database_url: 'sqlite::memory:'")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.database_url, "sqlite::memory:");
    /// assert_eq!(config.retention.window_days, 5);
    /// assert!(config.notifier.accounts.is_empty());
    /// ```
    pub fn new() -> Self {
        let builder = Config::builder().add_source(
            Environment::with_prefix("HERALD")
                .separator("__")
                .try_parsing(true),
        );
        Self { builder }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Like [`with_file`](Self::with_file) but tolerates a missing file, for deployments
    /// configured purely through the environment.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use herald_common::Language;
    /// use herald_config::HeraldConfigLoader;
    ///
    /// let cfg = HeraldConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// database_url: "sqlite://herald.db"
    /// notifier:
    ///   eligibility_days: 2
    ///   accounts:
    ///     python:
    ///       access_token: "py-token"
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.notifier.eligibility_days, 2);
    /// assert_eq!(cfg.notifier.credentials(Language::Python), Some("py-token"));
    /// assert_eq!(cfg.notifier.credentials(Language::Css), None);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder: merge sources, expand `${VAR}` placeholders, and
    /// deserialize into [`HeraldConfig`].
    pub fn load(self) -> Result<HeraldConfig, ConfigError> {
        let cfg = self.builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}
