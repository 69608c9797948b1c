//! Type definitions for the RSS module.

use serde::{Deserialize, Serialize};
use tokio::time::Duration;

/// CSS selectors locating articles on an HTML listing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HtmlSelectors {
    /// Matches one element per article; the other selectors apply inside it.
    pub container: String,
    pub title: String,
    /// Its `href` becomes the article url.
    pub link: String,
    #[serde(default)]
    pub summary: Option<String>,
}

/// How a source's body is turned into articles.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedKind {
    /// RSS or Atom.
    #[default]
    Rss,
    /// An HTML page scraped with selectors. Relative links resolve against `base_url`,
    /// or the page url when unset.
    Html {
        selectors: HtmlSelectors,
        #[serde(default)]
        base_url: Option<String>,
    },
}

/// One configured feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Recorded as the `source` of every article from this feed.
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub kind: FeedKind,
}

impl FeedConfig {
    pub fn new(name: &str, url: &str) -> Self {
        FeedConfig {
            name: name.to_string(),
            url: url.to_string(),
            kind: FeedKind::Rss,
        }
    }

    pub fn html(name: &str, url: &str, selectors: HtmlSelectors, base_url: Option<&str>) -> Self {
        FeedConfig {
            name: name.to_string(),
            url: url.to_string(),
            kind: FeedKind::Html {
                selectors,
                base_url: base_url.map(str::to_string),
            },
        }
    }

    /// Parses `name|url`, or a bare url which is then also used as the name.
    pub fn parse(entry: &str) -> Option<Self> {
        let entry = entry.trim();
        if entry.is_empty() {
            return None;
        }
        match entry.split_once('|') {
            Some((name, url)) if !url.trim().is_empty() => {
                let name = if name.trim().is_empty() { url } else { name };
                Some(FeedConfig::new(name.trim(), url.trim()))
            }
            Some(_) => None,
            None => Some(FeedConfig::new(entry, entry)),
        }
    }
}

// Constants
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
pub const RETRY_DELAY: Duration = Duration::from_secs(5);
pub const MAX_RETRIES: usize = 3;
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const DEFAULT_FEED_URL: &str =
    "https://news.google.com/rss/search?q=Singapore&hl=en-SG&gl=SG&ceid=SG:en";
pub const DEFAULT_FEED_NAME: &str = "Google News SG";
