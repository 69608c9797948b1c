use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, timeout, Duration, Instant};
use tracing::{debug, error, info, warn};

use super::cache::GeocodeCache;
use super::client::{GeocodeError, Geocoder};
use super::normalize::{collapse_whitespace, normalize_location_key};
use super::types::{GeoPoint, GeocodeCacheEntry, GeocodeOutcome};
use crate::db::Database;
use crate::TARGET_GEOCODE;

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Appended to every query to keep short names from resolving elsewhere in the world.
    pub qualifier: String,
    pub min_interval: Duration,
    pub timeout: Duration,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        ResolverSettings {
            qualifier: "Singapore".to_string(),
            min_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Serializes callers so consecutive external calls start at least `min_interval` apart.
pub struct Throttle {
    min_interval: Duration,
    next_call: Mutex<Instant>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Throttle {
            min_interval,
            next_call: Mutex::new(Instant::now()),
        }
    }

    pub async fn wait(&self) {
        let mut next_call = self.next_call.lock().await;
        if *next_call > Instant::now() {
            sleep_until(*next_call).await;
        }
        *next_call = Instant::now() + self.min_interval;
    }
}

/// The outcome of one `resolve` call, and whether it reached the external service.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub entry: GeocodeCacheEntry,
    pub fresh: bool,
}

impl Resolution {
    pub fn point(&self) -> Option<GeoPoint> {
        self.entry.point()
    }
}

pub struct GeocodeResolver {
    geocoder: Arc<dyn Geocoder>,
    cache: Arc<GeocodeCache>,
    settings: ResolverSettings,
    throttle: Throttle,
    store: Option<Database>,
}

impl GeocodeResolver {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        cache: Arc<GeocodeCache>,
        settings: ResolverSettings,
    ) -> Self {
        GeocodeResolver {
            geocoder,
            cache,
            throttle: Throttle::new(settings.min_interval),
            settings,
            store: None,
        }
    }

    /// Writes settled results through to `store` so they survive restarts.
    pub fn with_store(mut self, store: Database) -> Self {
        self.store = Some(store);
        self
    }

    pub fn cache(&self) -> &Arc<GeocodeCache> {
        &self.cache
    }

    pub async fn resolve(&self, location_name: &str) -> Option<GeoPoint> {
        self.resolve_detailed(location_name).await.point()
    }

    pub async fn resolve_detailed(&self, location_name: &str) -> Resolution {
        let key = normalize_location_key(location_name);
        if key.is_empty() {
            return Resolution {
                entry: GeocodeCacheEntry::new("", GeocodeOutcome::NotFound),
                fresh: false,
            };
        }

        let fresh = AtomicBool::new(false);
        let (fresh_flag, key_ref) = (&fresh, key.as_str());
        let entry = self
            .cache
            .get_or_resolve(key_ref, || async move {
                fresh_flag.store(true, Ordering::Relaxed);
                self.lookup(key_ref, location_name).await
            })
            .await;

        let fresh = fresh.load(Ordering::Relaxed);
        if !fresh {
            debug!(target: TARGET_GEOCODE, "Cache hit for '{}'", key);
        }
        Resolution { entry, fresh }
    }

    async fn lookup(&self, key: &str, location_name: &str) -> GeocodeCacheEntry {
        let query = format!(
            "{}, {}",
            collapse_whitespace(location_name),
            self.settings.qualifier
        );

        self.throttle.wait().await;
        debug!(target: TARGET_GEOCODE, "Geocoding '{}'", query);

        let result = match timeout(self.settings.timeout, self.geocoder.geocode(&query)).await {
            Ok(result) => result,
            Err(_) => Err(GeocodeError::Timeout(self.settings.timeout)),
        };

        let outcome = match result {
            Ok(Some(point)) => {
                info!(target: TARGET_GEOCODE, "Geocoded '{}' to {}", location_name, point);
                GeocodeOutcome::Found(point)
            }
            Ok(None) => {
                warn!(target: TARGET_GEOCODE, "Could not geocode location: {}", location_name);
                GeocodeOutcome::NotFound
            }
            Err(GeocodeError::Timeout(limit)) => {
                warn!(
                    target: TARGET_GEOCODE,
                    "Geocoder timed out after {:?} for '{}', caching as unresolved", limit, location_name
                );
                GeocodeOutcome::Failed
            }
            Err(GeocodeError::RateLimited) => {
                warn!(
                    target: TARGET_GEOCODE,
                    "Geocoder rate limited lookup for '{}', caching as unresolved", location_name
                );
                GeocodeOutcome::Failed
            }
            Err(err) => {
                error!(
                    target: TARGET_GEOCODE,
                    "Geocoder service error for '{}': {}", location_name, err
                );
                GeocodeOutcome::Failed
            }
        };

        let entry = GeocodeCacheEntry::new(key, outcome);
        if outcome != GeocodeOutcome::Failed {
            if let Some(store) = &self.store {
                if let Err(err) = store.save_geocode_entry(&entry).await {
                    error!(target: TARGET_GEOCODE, "Failed to persist geocode result for '{}': {}", key, err);
                }
            }
        }
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    /// Scripted geocoder that records every query it receives.
    struct FakeGeocoder {
        answers: HashMap<String, Result<Option<GeoPoint>, ()>>,
        delay: Duration,
        queries: StdMutex<Vec<String>>,
    }

    impl FakeGeocoder {
        fn new(answers: &[(&str, Result<Option<GeoPoint>, ()>)]) -> Self {
            FakeGeocoder {
                answers: answers
                    .iter()
                    .map(|(query, answer)| (query.to_string(), *answer))
                    .collect(),
                delay: Duration::ZERO,
                queries: StdMutex::new(Vec::new()),
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn calls(&self) -> usize {
            self.queries.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Geocoder for FakeGeocoder {
        async fn geocode(&self, query: &str) -> Result<Option<GeoPoint>, GeocodeError> {
            self.queries.lock().unwrap().push(query.to_string());
            tokio::time::sleep(self.delay).await;
            match self.answers.get(query) {
                Some(Ok(point)) => Ok(*point),
                Some(Err(())) => Err(GeocodeError::Status(503)),
                None => Ok(None),
            }
        }
    }

    fn settings() -> ResolverSettings {
        ResolverSettings {
            min_interval: Duration::ZERO,
            ..ResolverSettings::default()
        }
    }

    fn bishan() -> GeoPoint {
        GeoPoint::new(1.3508, 103.8486).unwrap()
    }

    #[tokio::test]
    async fn test_second_resolve_is_a_cache_hit() {
        let geocoder = Arc::new(FakeGeocoder::new(&[("Bishan, Singapore", Ok(Some(bishan())))]));
        let resolver =
            GeocodeResolver::new(geocoder.clone(), Arc::new(GeocodeCache::new()), settings());

        let first = resolver.resolve_detailed("Bishan").await;
        assert!(first.fresh);
        assert_eq!(first.point(), Some(bishan()));

        let second = resolver.resolve_detailed("  bishan ").await;
        assert!(!second.fresh);
        assert_eq!(second.point(), Some(bishan()));
        assert_eq!(geocoder.calls(), 1);
    }

    #[tokio::test]
    async fn test_query_carries_qualifier() {
        let geocoder = Arc::new(FakeGeocoder::new(&[]));
        let resolver =
            GeocodeResolver::new(geocoder.clone(), Arc::new(GeocodeCache::new()), settings());

        assert_eq!(resolver.resolve("  Ang   Mo Kio ").await, None);
        assert_eq!(
            geocoder.queries.lock().unwrap().as_slice(),
            ["Ang Mo Kio, Singapore".to_string()]
        );
    }

    #[tokio::test]
    async fn test_service_error_is_cached_as_unresolved() {
        let geocoder = Arc::new(FakeGeocoder::new(&[("Sembawang, Singapore", Err(()))]));
        let cache = Arc::new(GeocodeCache::new());
        let resolver = GeocodeResolver::new(geocoder.clone(), cache.clone(), settings());

        let first = resolver.resolve_detailed("Sembawang").await;
        assert!(first.fresh);
        assert_eq!(first.entry.outcome, GeocodeOutcome::Failed);

        assert_eq!(resolver.resolve("Sembawang").await, None);
        assert_eq!(geocoder.calls(), 1);
        assert_eq!(cache.get("sembawang").unwrap().outcome, GeocodeOutcome::Failed);
    }

    #[tokio::test]
    async fn test_slow_lookup_times_out_and_is_cached() {
        let geocoder = Arc::new(
            FakeGeocoder::new(&[("Tuas, Singapore", Ok(Some(bishan())))])
                .with_delay(Duration::from_millis(500)),
        );
        let resolver = GeocodeResolver::new(
            geocoder.clone(),
            Arc::new(GeocodeCache::new()),
            ResolverSettings {
                timeout: Duration::from_millis(20),
                ..settings()
            },
        );

        let resolution = resolver.resolve_detailed("Tuas").await;
        assert_eq!(resolution.entry.outcome, GeocodeOutcome::Failed);
        assert_eq!(resolver.resolve("Tuas").await, None);
        assert_eq!(geocoder.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_external_call() {
        let geocoder = Arc::new(
            FakeGeocoder::new(&[("Bishan, Singapore", Ok(Some(bishan())))])
                .with_delay(Duration::from_millis(30)),
        );
        let resolver = Arc::new(GeocodeResolver::new(
            geocoder.clone(),
            Arc::new(GeocodeCache::new()),
            settings(),
        ));

        let tasks: Vec<_> = (0..10)
            .map(|i| {
                let resolver = resolver.clone();
                let name = if i % 2 == 0 { "Bishan" } else { "BISHAN" };
                tokio::spawn(async move { resolver.resolve(name).await })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap(), Some(bishan()));
        }
        assert_eq!(geocoder.calls(), 1);
    }

    #[tokio::test]
    async fn test_preseeded_cache_skips_service() {
        let geocoder = Arc::new(FakeGeocoder::new(&[]));
        let cache = Arc::new(GeocodeCache::with_entries([GeocodeCacheEntry::new(
            "Bishan",
            GeocodeOutcome::Found(bishan()),
        )]));
        let resolver = GeocodeResolver::new(geocoder.clone(), cache, settings());

        assert_eq!(resolver.resolve("Bishan").await, Some(bishan()));
        assert_eq!(geocoder.calls(), 0);
    }

    #[tokio::test]
    async fn test_throttle_spaces_calls() {
        let throttle = Throttle::new(Duration::from_millis(40));
        let started = Instant::now();
        throttle.wait().await;
        throttle.wait().await;
        throttle.wait().await;
        assert!(started.elapsed() >= Duration::from_millis(80));
    }
}
