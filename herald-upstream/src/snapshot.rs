//! Code-host repository snapshots and the pure functions derived from them.

use chrono::{DateTime, Duration, Utc};
use herald_common::ReleaseCandidate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

/// Longest description kept, exclusive.
pub const MAX_DESCRIPTION_LEN: usize = 255;
const ELLIPSIS: &str = "...";

static EMOJI_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":\w+:").expect("emoji marker pattern compiles"));

/// What a code host reports about one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySnapshot {
    pub description: String,
    /// Project homepage when set, else the repository URL.
    pub site_url: String,
    pub topics: Vec<String>,
    /// Most recent tags first.
    pub tags: Vec<TagRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRef {
    pub name: String,
    /// Tagger date for annotated tags, commit author date otherwise. `None` when the
    /// host reported neither.
    pub created: Option<DateTime<Utc>>,
}

impl TagRef {
    pub fn new(name: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            created: Some(created),
        }
    }
}

fn hashtag(term: &str) -> Option<String> {
    let cleaned: String = term
        .trim()
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | '@' | '/'))
        .flat_map(char::to_lowercase)
        .collect();
    (!cleaned.is_empty()).then(|| format!("#{cleaned}"))
}

/// Hashtags from the repository topics plus `extra_terms`, deduplicated and joined with
/// single spaces in sorted order.
pub fn derive_hashtags(snapshot: &RepositorySnapshot, extra_terms: &[&str]) -> String {
    let tags: BTreeSet<String> = snapshot
        .topics
        .iter()
        .map(String::as_str)
        .chain(extra_terms.iter().copied())
        .filter_map(hashtag)
        .collect();
    tags.into_iter().collect::<Vec<_>>().join(" ")
}

/// Strip `:emoji:` markers and non-ASCII text, then shorten word by word until the
/// result is under [`MAX_DESCRIPTION_LEN`] characters.
pub fn normalize_description(raw: &str) -> String {
    let stripped = EMOJI_MARKER.replace_all(raw, "");
    let ascii: String = stripped.chars().filter(char::is_ascii).collect();
    let mut text = ascii.trim().to_string();

    while text.len() >= MAX_DESCRIPTION_LEN {
        let mut words: Vec<&str> = text.split(' ').collect();
        words.pop();
        let shorter = words.join(" ");
        // A single unbroken word cannot shrink any further by words.
        if words.is_empty() || shorter.is_empty() {
            text = ELLIPSIS.to_string();
            break;
        }
        text = format!("{shorter}{ELLIPSIS}");
    }
    text
}

fn normalize_version(raw: &str) -> String {
    raw.trim().replace(['_', '-'], ".")
}

/// Releases pulled from a snapshot's tags, newest first. Stops at the first tag older
/// than the freshness window and yields at most one release per tag prefix.
#[derive(Debug)]
pub struct TagReleases<'a> {
    tags: std::slice::Iter<'a, TagRef>,
    pattern: &'a Regex,
    now: DateTime<Utc>,
    freshness: Duration,
    seen_prefixes: HashSet<String>,
    exhausted: bool,
}

impl Iterator for TagReleases<'_> {
    type Item = ReleaseCandidate;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        for tag in self.tags.by_ref() {
            let Some(created) = tag.created else {
                continue;
            };
            if (self.now - created).abs() > self.freshness {
                self.exhausted = true;
                return None;
            }
            let Some(caps) = self.pattern.captures(&tag.name) else {
                continue;
            };
            let Some(version) = caps.name("name").or_else(|| caps.get(1)) else {
                continue;
            };
            let prefix = caps
                .name("prefix")
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or("");
            if !self.seen_prefixes.insert(prefix.to_string()) {
                continue;
            }
            return Some(ReleaseCandidate::new(
                normalize_version(version.as_str()),
                created,
            ));
        }
        self.exhausted = true;
        None
    }
}

/// Walk `snapshot.tags` newest first against `pattern`.
///
/// Group 1 (or the named group `name`) is the version; group 2 (or `prefix`) is the
/// component prefix, empty when absent. Tags that do not match are skipped.
pub fn extract_releases<'a>(
    snapshot: &'a RepositorySnapshot,
    pattern: &'a Regex,
    now: DateTime<Utc>,
    freshness: Duration,
) -> TagReleases<'a> {
    TagReleases {
        tags: snapshot.tags.iter(),
        pattern,
        now,
        freshness,
        seen_prefixes: HashSet::new(),
        exhausted: false,
    }
}
