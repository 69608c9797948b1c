//! Article sources feeding the pipeline.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use super::client::{create_http_client, fetch_feed_body};
use super::html::parse_html_page;
use super::parser::parse_feed;
use super::types::{FeedConfig, FeedKind, MAX_RETRIES, REQUEST_TIMEOUT, RETRY_DELAY};
use crate::article::Article;
use crate::TARGET_WEB_REQUEST;

/// Supplies the raw articles for one pipeline run.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    async fn fetch_articles(&self) -> Result<Vec<Article>>;
}

/// Fetches and merges a fixed list of RSS/Atom feeds and HTML pages.
pub struct FeedSource {
    client: reqwest::Client,
    feeds: Vec<FeedConfig>,
    request_timeout: Duration,
    max_retries: usize,
    retry_delay: Duration,
}

impl FeedSource {
    pub fn new(feeds: Vec<FeedConfig>) -> Result<Self> {
        Ok(Self::with_client(create_http_client()?, feeds))
    }

    pub fn with_client(client: reqwest::Client, feeds: Vec<FeedConfig>) -> Self {
        FeedSource {
            client,
            feeds,
            request_timeout: REQUEST_TIMEOUT,
            max_retries: MAX_RETRIES,
            retry_delay: RETRY_DELAY,
        }
    }

    pub fn with_retry_policy(mut self, max_retries: usize, retry_delay: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_delay = retry_delay;
        self
    }

    pub fn feeds(&self) -> &[FeedConfig] {
        &self.feeds
    }

    async fn fetch_feed(&self, feed: &FeedConfig) -> Result<Vec<Article>> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let result = match fetch_feed_body(&self.client, &feed.url, self.request_timeout).await {
                Ok(body) => match &feed.kind {
                    FeedKind::Rss => parse_feed(&body, &feed.name),
                    FeedKind::Html {
                        selectors,
                        base_url,
                    } => parse_html_page(
                        &body,
                        selectors,
                        base_url.as_deref().unwrap_or(&feed.url),
                        &feed.name,
                    ),
                },
                Err(err) => Err(err),
            };

            match result {
                Ok(articles) => return Ok(articles),
                Err(err) if attempts < self.max_retries => {
                    warn!(
                        target: TARGET_WEB_REQUEST,
                        "Attempt {}/{} for {} failed: {:#}", attempts, self.max_retries, feed.url, err
                    );
                    sleep(self.retry_delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl ArticleSource for FeedSource {
    async fn fetch_articles(&self) -> Result<Vec<Article>> {
        let mut articles = Vec::new();
        let mut failures = 0;

        for feed in &self.feeds {
            debug!(target: TARGET_WEB_REQUEST, "Starting to process feed: {}", feed.url);
            match self.fetch_feed(feed).await {
                Ok(mut found) => {
                    info!(
                        target: TARGET_WEB_REQUEST,
                        "Fetched {} articles from {}", found.len(), feed.name
                    );
                    articles.append(&mut found);
                }
                Err(err) => {
                    failures += 1;
                    error!(target: TARGET_WEB_REQUEST, "Failed to fetch feed {}: {:#}", feed.name, err);
                }
            }
        }

        if !self.feeds.is_empty() && failures == self.feeds.len() {
            return Err(anyhow!("All {} configured feeds failed", failures));
        }
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rss::HtmlSelectors;
    use axum::{http::StatusCode, routing::get, Router};

    const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>t</title><link>https://x</link><description>d</description>
<item><title>Yishun fire</title><link>https://news.example/yishun</link><description>Blaze in Yishun</description></item>
</channel></rss>"#;

    const PAGE: &str = r#"<html><body><ul>
<li class="item"><a href="/news/tampines-hub">Tampines Hub reopens</a><span>New wing</span></li>
<li class="item"><a href="news/clementi">Clementi market</a></li>
</ul></body></html>"#;

    async fn serve() -> String {
        let app = Router::new()
            .route("/feed", get(|| async { FEED }))
            .route("/latest", get(|| async { axum::response::Html(PAGE) }))
            .route(
                "/broken",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn source(feeds: Vec<FeedConfig>) -> FeedSource {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        FeedSource::with_client(client, feeds).with_retry_policy(1, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_one_failing_feed_does_not_fail_the_fetch() {
        let base = serve().await;
        let source = source(vec![
            FeedConfig::new("Broken", &format!("{}/broken", base)),
            FeedConfig::new("Local", &format!("{}/feed", base)),
        ]);

        let articles = source.fetch_articles().await.unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Yishun fire");
        assert_eq!(articles[0].source, "Local");
    }

    #[tokio::test]
    async fn test_html_page_and_feed_are_merged() {
        let base = serve().await;
        let selectors = HtmlSelectors {
            container: "li.item".to_string(),
            title: "a".to_string(),
            link: "a".to_string(),
            summary: Some("span".to_string()),
        };
        let source = source(vec![
            FeedConfig::new("Local", &format!("{}/feed", base)),
            FeedConfig::html("Listing", &format!("{}/latest", base), selectors, None),
        ]);

        let articles = source.fetch_articles().await.unwrap();
        let titles: Vec<_> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Yishun fire", "Tampines Hub reopens", "Clementi market"]);
        assert_eq!(articles[1].url, format!("{}/news/tampines-hub", base));
        assert_eq!(articles[1].summary, "New wing");
        assert_eq!(articles[1].source, "Listing");
        assert_eq!(articles[2].url, format!("{}/news/clementi", base));
    }

    #[tokio::test]
    async fn test_all_feeds_failing_is_an_error() {
        let base = serve().await;
        let source = source(vec![FeedConfig::new("Broken", &format!("{}/broken", base))]);
        assert!(source.fetch_articles().await.is_err());
    }

    #[test]
    fn test_feed_config_parse() {
        assert_eq!(
            FeedConfig::parse("CNA|https://cna/rss"),
            Some(FeedConfig::new("CNA", "https://cna/rss"))
        );
        assert_eq!(
            FeedConfig::parse(" https://st/rss "),
            Some(FeedConfig::new("https://st/rss", "https://st/rss"))
        );
        assert_eq!(FeedConfig::parse("CNA|"), None);
        assert_eq!(FeedConfig::parse("  "), None);
    }
}
