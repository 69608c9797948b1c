//! Service configuration read from environment variables.

use std::env;
use std::path::PathBuf;
use tokio::time::Duration;
use tracing::warn;

use crate::environment::{parse_or_default, split_list};
use crate::geocode::ResolverSettings;
use crate::rss::{FeedConfig, DEFAULT_FEED_NAME, DEFAULT_FEED_URL};

pub const DEFAULT_BOUNDARIES_PATH: &str = "data/doc.kml";
pub const DEFAULT_CONSTITUENCY_PROPERTY: &str = "Name";
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org/search";
pub const DEFAULT_GEOCODER_USER_AGENT: &str = "singapore_news_mapper";
pub const DEFAULT_GEOCODE_QUALIFIER: &str = "Singapore";
pub const DEFAULT_GEOCODE_MIN_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_GEOCODE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CLUSTER_CACHE_TTL_SECS: u64 = 1800;
pub const DEFAULT_WORKER_COUNT: usize = 4;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub feeds: Vec<FeedConfig>,
    pub boundaries_path: PathBuf,
    pub constituency_property: String,
    pub gazetteer_extra: Vec<String>,
    pub geocoder_url: String,
    pub geocoder_user_agent: String,
    pub geocode_qualifier: String,
    pub geocode_min_interval: Duration,
    pub geocode_timeout: Duration,
    pub cluster_cache_ttl: Duration,
    pub worker_count: usize,
    pub database_path: Option<String>,
    pub host: String,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_vars(|_| None)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable lookup; blank values count as unset.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let text = |name: &str, default: &str| {
            var(name)
                .map(|value| value.trim().to_string())
                .unwrap_or_else(|| default.to_string())
        };

        let mut feeds = match var("FEED_URLS") {
            Some(value) => {
                let feeds: Vec<FeedConfig> = split_list(&value, ';')
                    .iter()
                    .filter_map(|entry| {
                        let feed = FeedConfig::parse(entry);
                        if feed.is_none() {
                            warn!("Ignoring malformed FEED_URLS entry '{}'", entry);
                        }
                        feed
                    })
                    .collect();
                if feeds.is_empty() {
                    warn!("FEED_URLS has no usable entries, using the default feed");
                    vec![FeedConfig::new(DEFAULT_FEED_NAME, DEFAULT_FEED_URL)]
                } else {
                    feeds
                }
            }
            None => vec![FeedConfig::new(DEFAULT_FEED_NAME, DEFAULT_FEED_URL)],
        };

        if let Some(value) = var("SOURCES_JSON") {
            match serde_json::from_str::<Vec<FeedConfig>>(&value) {
                Ok(mut extra) => feeds.append(&mut extra),
                Err(err) => warn!("Ignoring malformed SOURCES_JSON: {}", err),
            }
        }

        let min_interval_ms = var("GEOCODE_MIN_INTERVAL_MS")
            .map(|v| parse_or_default("GEOCODE_MIN_INTERVAL_MS", &v, DEFAULT_GEOCODE_MIN_INTERVAL_MS))
            .unwrap_or(DEFAULT_GEOCODE_MIN_INTERVAL_MS);
        let timeout_secs = var("GEOCODE_TIMEOUT_SECS")
            .map(|v| parse_or_default("GEOCODE_TIMEOUT_SECS", &v, DEFAULT_GEOCODE_TIMEOUT_SECS))
            .unwrap_or(DEFAULT_GEOCODE_TIMEOUT_SECS);
        let ttl_secs = var("CLUSTER_CACHE_TTL_SECS")
            .map(|v| parse_or_default("CLUSTER_CACHE_TTL_SECS", &v, DEFAULT_CLUSTER_CACHE_TTL_SECS))
            .unwrap_or(DEFAULT_CLUSTER_CACHE_TTL_SECS);
        let worker_count = var("WORKER_COUNT")
            .map(|v| parse_or_default("WORKER_COUNT", &v, DEFAULT_WORKER_COUNT))
            .unwrap_or(DEFAULT_WORKER_COUNT)
            .max(1);
        let port = var("PORT")
            .map(|v| parse_or_default("PORT", &v, DEFAULT_PORT))
            .unwrap_or(DEFAULT_PORT);

        AppConfig {
            feeds,
            boundaries_path: PathBuf::from(text("BOUNDARIES_PATH", DEFAULT_BOUNDARIES_PATH)),
            constituency_property: text("CONSTITUENCY_PROPERTY", DEFAULT_CONSTITUENCY_PROPERTY),
            gazetteer_extra: var("GAZETTEER_EXTRA")
                .map(|v| split_list(&v, ';'))
                .unwrap_or_default(),
            geocoder_url: text("GEOCODER_URL", DEFAULT_GEOCODER_URL),
            geocoder_user_agent: text("GEOCODER_USER_AGENT", DEFAULT_GEOCODER_USER_AGENT),
            geocode_qualifier: text("GEOCODE_QUALIFIER", DEFAULT_GEOCODE_QUALIFIER),
            geocode_min_interval: Duration::from_millis(min_interval_ms),
            geocode_timeout: Duration::from_secs(timeout_secs),
            cluster_cache_ttl: Duration::from_secs(ttl_secs),
            worker_count,
            database_path: var("DATABASE_PATH").map(|v| v.trim().to_string()),
            host: text("HOST", DEFAULT_HOST),
            port,
        }
    }

    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            qualifier: self.geocode_qualifier.clone(),
            min_interval: self.geocode_min_interval,
            timeout: self.geocode_timeout,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
