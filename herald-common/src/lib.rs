//! Value types and utilities shared across the Herald crates.
//!
//! Herald watches package registries and code hosts for fresh releases, records them, and
//! announces them on social media. This crate holds the vocabulary every other crate
//! speaks: languages (which double as announcement categories), package and release
//! statuses, and the fixed-shape candidate records produced by upstream adapters.
//!
//! # Overview
//!
//! - [`Language`]: closed set of tracked ecosystems, one announcement account each
//! - [`PackageStatus`] / [`ReleaseStatus`]: persisted lifecycle states
//! - [`RawCandidate`]: one package-index feed observation
//! - [`ReleaseCandidate`]: a release name plus the moment it was cut
//! - [`observability`]: centralised tracing/logging initialisation
//!
//! # Examples
//!
//! ```rust
//! use herald_common::{Language, ReleaseStatus};
//!
//! let lang: Language = "python".parse().unwrap();
//! assert_eq!(lang.as_str(), "python");
//! assert!(ReleaseStatus::Tweeted.is_terminal());
//! ```
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod observability;

/// Programming language of a package. Each language is also an announcement category
/// with its own social account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Css,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Python, Language::Javascript, Language::Css];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Css => "css",
        }
    }
}

/// Lifecycle of a package row.
///
/// `Done` means code-hosting metadata was refreshed successfully; `Fail` means the
/// referenced repository could not be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PackageStatus {
    #[default]
    Pending,
    Done,
    Fail,
}

impl PackageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageStatus::Pending => "pending",
            PackageStatus::Done => "done",
            PackageStatus::Fail => "fail",
        }
    }
}

/// Release state machine: `New` moves exactly once to `Tweeted` or `Fail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseStatus {
    #[default]
    New,
    Tweeted,
    Fail,
}

impl ReleaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseStatus::New => "new",
            ReleaseStatus::Tweeted => "tweeted",
            ReleaseStatus::Fail => "fail",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReleaseStatus::New)
    }
}

/// Code hosts a package may point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeHostingKind {
    Github,
}

impl CodeHostingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeHostingKind::Github => "github",
        }
    }
}

macro_rules! impl_str_enum {
    ($ty:ty, $kind:literal, [$($variant:expr),+ $(,)?]) => {
        impl FromStr for $ty {
            type Err = HeraldError;

            fn from_str(s: &str) -> Result<Self> {
                let wanted = s.trim().to_ascii_lowercase();
                [$($variant),+]
                    .into_iter()
                    .find(|v| v.as_str() == wanted)
                    .ok_or_else(|| HeraldError::UnknownVariant {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

impl_str_enum!(Language, "language", [Language::Python, Language::Javascript, Language::Css]);
impl_str_enum!(
    PackageStatus,
    "package status",
    [PackageStatus::Pending, PackageStatus::Done, PackageStatus::Fail]
);
impl_str_enum!(
    ReleaseStatus,
    "release status",
    [ReleaseStatus::New, ReleaseStatus::Tweeted, ReleaseStatus::Fail]
);
impl_str_enum!(CodeHostingKind, "code hosting", [CodeHostingKind::Github]);

/// One release observation from a package-index feed, validated at the adapter boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCandidate {
    pub name: String,
    pub release: String,
    pub homepage: String,
    /// Empty when the feed item carries none.
    pub description: String,
    pub keywords: String,
    pub language: Language,
}

/// A release not yet persisted: its version name and the moment it was published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseCandidate {
    pub name: String,
    pub created: DateTime<Utc>,
}

impl ReleaseCandidate {
    pub fn new(name: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            created,
        }
    }
}

impl From<&RawCandidate> for ReleaseCandidate {
    /// Feed items carry no publish date, so the observation time stands in.
    fn from(raw: &RawCandidate) -> Self {
        ReleaseCandidate::new(raw.release.clone(), Utc::now())
    }
}

/// Error types shared across the Herald crates.
#[derive(thiserror::Error, Debug)]
pub enum HeraldError {
    /// A persisted or configured string did not name a known variant.
    #[error("unknown {kind}: {value:?}")]
    UnknownVariant { kind: &'static str, value: String },
}

/// Convenient alias for results that use [`HeraldError`].
pub type Result<T> = std::result::Result<T, HeraldError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Python".parse::<Language>().unwrap(), Language::Python);
        assert_eq!(" DONE ".parse::<PackageStatus>().unwrap(), PackageStatus::Done);
        assert_eq!("tweeted".parse::<ReleaseStatus>().unwrap(), ReleaseStatus::Tweeted);
    }

    #[test]
    fn rejects_unknown_variants() {
        let err = "cobol".parse::<Language>().unwrap_err();
        assert_eq!(err.to_string(), "unknown language: \"cobol\"");
    }

    #[test]
    fn only_new_is_not_terminal() {
        assert!(!ReleaseStatus::New.is_terminal());
        assert!(ReleaseStatus::Tweeted.is_terminal());
        assert!(ReleaseStatus::Fail.is_terminal());
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Language::Javascript).unwrap();
        assert_eq!(json, "\"javascript\"");
        let back: CodeHostingKind = serde_json::from_str("\"github\"").unwrap();
        assert_eq!(back, CodeHostingKind::Github);
    }
}
