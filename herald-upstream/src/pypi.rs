//! PyPI "newest releases" RSS feed.
//!
//! Each `<item>` carries `<title>name version</title>` and a link ending in `version/`;
//! the feed has no publish dates or keywords.

use async_trait::async_trait;
use herald_common::{Language, RawCandidate};
use herald_http::{HttpClient, RequestOpts};
use serde::Deserialize;
use tracing::debug;

use crate::{PackageFeed, UpstreamError};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<FeedItem>,
}

#[derive(Debug, Deserialize)]
struct FeedItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Items of one fetched feed, validated one at a time as they are pulled.
#[derive(Debug)]
pub struct FeedCandidates {
    items: std::vec::IntoIter<FeedItem>,
    language: Language,
}

impl Iterator for FeedCandidates {
    type Item = Result<RawCandidate, UpstreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.items.next()?;
        Some(candidate_from_item(item, self.language))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl ExactSizeIterator for FeedCandidates {}

/// Parse an RSS document. Only a document that is not RSS at all fails here; bad items
/// are reported when the returned iterator reaches them.
pub fn parse_feed(xml: &str, language: Language) -> Result<FeedCandidates, UpstreamError> {
    let rss: Rss = quick_xml::de::from_str(xml)
        .map_err(|e| UpstreamError::Format(format!("feed is not valid RSS: {e}")))?;
    Ok(FeedCandidates {
        items: rss.channel.items.into_iter(),
        language,
    })
}

fn candidate_from_item(item: FeedItem, language: Language) -> Result<RawCandidate, UpstreamError> {
    let title = item.title.unwrap_or_default();
    let (name, release) = title
        .trim()
        .rsplit_once(char::is_whitespace)
        .map(|(n, r)| (n.trim(), r.trim()))
        .filter(|(n, r)| !n.is_empty() && !r.is_empty())
        .ok_or_else(|| UpstreamError::Format(format!("unexpected item title {title:?}")))?;

    let link = item.link.unwrap_or_default();
    let homepage = link
        .trim()
        .strip_suffix('/')
        .and_then(|l| l.strip_suffix(release))
        .filter(|h| !h.is_empty())
        .ok_or_else(|| {
            UpstreamError::Format(format!("link {link:?} does not end with {release:?}/"))
        })?;

    Ok(RawCandidate {
        name: name.to_string(),
        release: release.to_string(),
        homepage: homepage.to_string(),
        description: item.description.unwrap_or_default().trim().to_string(),
        keywords: String::new(),
        language,
    })
}

/// RSS adapter for a package index. The language tag is fixed per instance.
#[derive(Debug, Clone)]
pub struct PypiFeed {
    http: HttpClient,
    url: String,
    language: Language,
}

impl PypiFeed {
    pub fn new(http: HttpClient, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            language: Language::Python,
        }
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }
}

#[async_trait]
impl PackageFeed for PypiFeed {
    fn language(&self) -> Language {
        self.language
    }

    async fn fetch_candidates(&self) -> Result<FeedCandidates, UpstreamError> {
        let opts = RequestOpts {
            allow_absolute: true,
            ..Default::default()
        };
        let body = self.http.get_text(&self.url, opts).await?;
        let candidates = parse_feed(&body, self.language)?;
        debug!(url = %self.url, items = candidates.len(), "pypi.feed_fetched");
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>PyPI recent updates</title>
    <link>https://pypi.org/</link>
    <description>Recent updates to the Python Package Index</description>
    <item>
      <title>requests 2.31.0</title>
      <link>https://pypi.org/project/requests/2.31.0/</link>
      <description>Python HTTP for Humans.</description>
      <pubDate>Mon, 22 May 2023 15:12:42 GMT</pubDate>
    </item>
    <item>
      <title>broken-item</title>
      <link>https://pypi.org/project/broken-item/</link>
    </item>
    <item>
      <title>zope.interface 6.0</title>
      <link>https://pypi.org/project/zope.interface/6.0/</link>
      <description/>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_items_and_isolates_malformed_ones() {
        let results: Vec<_> = parse_feed(FEED, Language::Python).unwrap().collect();
        assert_eq!(results.len(), 3);

        let requests = results[0].as_ref().unwrap();
        assert_eq!(requests.name, "requests");
        assert_eq!(requests.release, "2.31.0");
        assert_eq!(requests.homepage, "https://pypi.org/project/requests/");
        assert_eq!(requests.description, "Python HTTP for Humans.");
        assert_eq!(requests.language, Language::Python);

        assert!(matches!(results[1], Err(UpstreamError::Format(_))));

        let zope = results[2].as_ref().unwrap();
        assert_eq!(zope.name, "zope.interface");
        assert_eq!(zope.description, "");
    }

    #[test]
    fn link_must_end_with_the_release() {
        let item = FeedItem {
            title: Some("flask 3.0.0".into()),
            link: Some("https://pypi.org/project/flask/2.9.0/".into()),
            description: None,
        };
        let err = candidate_from_item(item, Language::Python).unwrap_err();
        assert!(err.to_string().contains("3.0.0"), "{err}");
    }

    #[test]
    fn non_rss_document_is_a_format_error() {
        let err = parse_feed("<html><body>gone</body></html>", Language::Python).unwrap_err();
        assert!(matches!(err, UpstreamError::Format(_)));
    }

    #[test]
    fn empty_channel_yields_nothing() {
        let xml = "<rss><channel><title>empty</title></channel></rss>";
        assert_eq!(parse_feed(xml, Language::Python).unwrap().count(), 0);
    }
}
