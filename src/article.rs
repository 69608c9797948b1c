use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A normalized news article as supplied by an article source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub url: String,
    pub summary: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl Article {
    pub fn new(title: &str, url: &str, summary: &str, source: &str) -> Self {
        Article {
            title: title.to_string(),
            url: url.to_string(),
            summary: summary.to_string(),
            source: source.to_string(),
            published_at: None,
        }
    }

    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }

    /// Articles without a title or url cannot be placed on the map.
    pub fn is_usable(&self) -> bool {
        !self.title.trim().is_empty() && !self.url.trim().is_empty()
    }

    /// Title and summary joined into the text scanned for place names.
    pub fn search_text(&self) -> String {
        format!("{} {}", self.title, self.summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_requires_title_and_url() {
        assert!(Article::new("Flooding in Bedok", "https://example.com/a", "", "feed").is_usable());
        assert!(!Article::new("  ", "https://example.com/a", "", "feed").is_usable());
        assert!(!Article::new("Flooding in Bedok", "", "", "feed").is_usable());
    }

    #[test]
    fn test_search_text_joins_title_and_summary() {
        let article = Article::new("Title", "https://example.com/a", "Summary", "feed");
        assert_eq!(article.search_text(), "Title Summary");
    }
}
