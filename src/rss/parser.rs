//! Feed parsing logic for RSS and Atom formats.

use anyhow::{anyhow, Result};
use feed_rs::model::Entry;
use feed_rs::parser;
use std::io::Cursor;
use tracing::{debug, warn};

use super::util::{cleanup_xml, is_valid_url, strip_html};
use crate::article::Article;
use crate::TARGET_WEB_REQUEST;

/// Parse a feed body into articles attributed to `source_name`.
///
/// Entries without a title or a valid http(s) link are dropped.
pub fn parse_feed(body: &str, source_name: &str) -> Result<Vec<Article>> {
    let feed = match parser::parse(Cursor::new(body.as_bytes())) {
        Ok(feed) => feed,
        Err(first_err) => {
            // Try cleaning the XML first
            let cleaned_xml = cleanup_xml(body);
            if !(cleaned_xml.contains("<rss") || cleaned_xml.contains("<feed")) {
                return Err(anyhow!(
                    "Feed from {} doesn't appear to be RSS or Atom: {}",
                    source_name,
                    first_err
                ));
            }
            let feed = parser::parse(Cursor::new(cleaned_xml.into_bytes())).map_err(|second_err| {
                anyhow!(
                    "Failed to parse feed from {} even after cleanup. First error: {}. Second error: {}",
                    source_name,
                    first_err,
                    second_err
                )
            })?;
            warn!(target: TARGET_WEB_REQUEST, "Feed from {} parsed only after XML cleanup", source_name);
            feed
        }
    };

    let total = feed.entries.len();
    let articles: Vec<Article> = feed
        .entries
        .into_iter()
        .filter_map(|entry| entry_to_article(entry, source_name))
        .collect();

    debug!(
        target: TARGET_WEB_REQUEST,
        "Found {} usable of {} entries in feed from {}", articles.len(), total, source_name
    );
    Ok(articles)
}

fn entry_to_article(entry: Entry, source_name: &str) -> Option<Article> {
    let title = entry
        .title
        .map(|t| strip_html(&t.content))
        .filter(|t| !t.is_empty());
    let url = entry
        .links
        .first()
        .map(|link| link.href.trim().to_string())
        .filter(|href| is_valid_url(href));

    let (title, url) = match (title, url) {
        (Some(title), Some(url)) => (title, url),
        _ => {
            debug!(target: TARGET_WEB_REQUEST, "Skipping entry {} without title or link", entry.id);
            return None;
        }
    };

    let summary = entry
        .summary
        .map(|s| s.content)
        .or_else(|| entry.content.and_then(|c| c.body))
        .map(|html| strip_html(&html))
        .unwrap_or_default();

    let mut article = Article::new(&title, &url, &summary, source_name);
    if let Some(published) = entry.published.or(entry.updated) {
        article = article.with_published_at(published);
    }
    Some(article)
}
