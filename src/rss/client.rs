//! HTTP client creation and request handling for RSS feeds.

use anyhow::{Context, Result};
use reqwest::{cookie::Jar, header};
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::debug;

use super::types::USER_AGENT;
use crate::TARGET_WEB_REQUEST;

/// Create the shared client used for every feed request
pub fn create_http_client() -> Result<reqwest::Client> {
    let cookie_store = Jar::default();
    reqwest::Client::builder()
        .cookie_store(true)
        .cookie_provider(Arc::new(cookie_store))
        .gzip(true)
        .redirect(reqwest::redirect::Policy::default())
        .build()
        .context("Failed to build HTTP client")
}

/// Fetch a feed body, failing on timeout or a non-success status.
pub async fn fetch_feed_body(
    client: &reqwest::Client,
    url: &str,
    request_timeout: Duration,
) -> Result<String> {
    debug!(target: TARGET_WEB_REQUEST, "Requesting feed {}", url);

    let response = timeout(
        request_timeout,
        client
            .get(url)
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::ACCEPT, "application/rss+xml, application/atom+xml, application/xml, text/xml, */*;q=0.9")
            .send(),
    )
    .await
    .with_context(|| format!("Request to {} timed out after {:?}", url, request_timeout))?
    .with_context(|| format!("Request to {} failed", url))?;

    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("HTTP error {} from {}", status, url);
    }

    let body = timeout(request_timeout, response.text())
        .await
        .with_context(|| format!("Reading body from {} timed out", url))?
        .with_context(|| format!("Failed to read body from {}", url))?;

    debug!(target: TARGET_WEB_REQUEST, "Fetched {} bytes from {}", body.len(), url);
    Ok(body)
}
