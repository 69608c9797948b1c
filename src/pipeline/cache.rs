use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::PipelineError;
use crate::clustering::Cluster;
use crate::TARGET_PIPELINE;

/// One computed cluster list and when it was computed.
#[derive(Debug, Clone)]
pub struct PipelineCacheEntry {
    pub clusters: Arc<Vec<Cluster>>,
    pub computed_at: DateTime<Utc>,
    computed: Instant,
}

impl PipelineCacheEntry {
    fn new(clusters: Vec<Cluster>) -> Self {
        PipelineCacheEntry {
            clusters: Arc::new(clusters),
            computed_at: Utc::now(),
            computed: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.computed.elapsed()
    }
}

/// TTL-bounded memo of the last pipeline result.
///
/// At most one recompute runs at a time. While it runs, callers that already have a stale
/// entry get that entry back; callers with nothing to return wait for it. A failed recompute
/// leaves the previous entry in place with its original timestamp, so the next call retries.
pub struct ClusterCache {
    ttl: Duration,
    entry: RwLock<Option<PipelineCacheEntry>>,
    refresh: Mutex<()>,
}

impl ClusterCache {
    pub fn new(ttl: Duration) -> Self {
        ClusterCache {
            ttl,
            entry: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The current entry, fresh or not.
    pub async fn peek(&self) -> Option<PipelineCacheEntry> {
        self.entry.read().await.clone()
    }

    fn is_fresh(&self, entry: &PipelineCacheEntry) -> bool {
        entry.age() < self.ttl
    }

    pub async fn get_or_compute<F, Fut>(&self, compute: F) -> Result<Arc<Vec<Cluster>>, PipelineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Cluster>, PipelineError>>,
    {
        let current = self.peek().await;
        if let Some(entry) = &current {
            if self.is_fresh(entry) {
                debug!(target: TARGET_PIPELINE, "Serving cached clusters ({:?} old)", entry.age());
                return Ok(entry.clusters.clone());
            }
        }

        let _guard = match current {
            Some(stale) => match self.refresh.try_lock() {
                Ok(guard) => guard,
                Err(_) => {
                    warn!(
                        target: TARGET_PIPELINE,
                        "Recompute in progress, serving stale clusters from {}", stale.computed_at
                    );
                    return Ok(stale.clusters);
                }
            },
            None => self.refresh.lock().await,
        };

        // Whoever held the guard before us may have just refreshed the entry.
        let previous = self.peek().await;
        if let Some(entry) = &previous {
            if self.is_fresh(entry) {
                return Ok(entry.clusters.clone());
            }
        }

        info!(target: TARGET_PIPELINE, "Recomputing clusters");
        match compute().await {
            Ok(clusters) => {
                let entry = PipelineCacheEntry::new(clusters);
                let result = entry.clusters.clone();
                *self.entry.write().await = Some(entry);
                info!(target: TARGET_PIPELINE, "Cached {} clusters", result.len());
                Ok(result)
            }
            Err(err) => match previous {
                Some(stale) => {
                    error!(target: TARGET_PIPELINE, "Cluster recompute failed: {}", err);
                    warn!(
                        target: TARGET_PIPELINE,
                        "Serving stale clusters from {}", stale.computed_at
                    );
                    Ok(stale.clusters)
                }
                None => {
                    error!(target: TARGET_PIPELINE, "Cluster recompute failed with no cached data: {}", err);
                    Err(err)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::Article;
    use crate::geocode::GeoPoint;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cluster(name: &str) -> Cluster {
        Cluster {
            location_name: name.to_string(),
            point: GeoPoint::new(1.3508, 103.8486).unwrap(),
            constituency: None,
            articles: vec![Article::new(name, "https://a/1", "", "test")],
        }
    }

    #[tokio::test]
    async fn test_computes_once_within_ttl() {
        let cache = ClusterCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let clusters = cache
                .get_or_compute(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![cluster("Bishan")])
                })
                .await
                .unwrap();
            assert_eq!(clusters.len(), 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recomputes_after_ttl() {
        let cache = ClusterCache::new(Duration::from_millis(20));
        let calls = AtomicUsize::new(0);
        let compute = || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![cluster(&format!("run {}", n))])
        };

        assert_eq!(cache.get_or_compute(compute).await.unwrap()[0].location_name, "run 0");
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get_or_compute(compute).await.unwrap()[0].location_name, "run 1");
    }

    #[tokio::test]
    async fn test_failed_recompute_keeps_stale_entry() {
        let cache = ClusterCache::new(Duration::from_millis(20));
        cache
            .get_or_compute(|| async { Ok(vec![cluster("Bishan")]) })
            .await
            .unwrap();
        let first = cache.peek().await.unwrap().computed_at;
        tokio::time::sleep(Duration::from_millis(40)).await;

        let served = cache
            .get_or_compute(|| async { Err(PipelineError::GeocoderUnavailable { failed: 3 }) })
            .await
            .unwrap();
        assert_eq!(served[0].location_name, "Bishan");
        // The timestamp is not reset, so the next call tries again.
        assert_eq!(cache.peek().await.unwrap().computed_at, first);

        let refreshed = cache
            .get_or_compute(|| async { Ok(vec![cluster("Tampines")]) })
            .await
            .unwrap();
        assert_eq!(refreshed[0].location_name, "Tampines");
    }

    #[tokio::test]
    async fn test_failure_without_entry_is_an_error() {
        let cache = ClusterCache::new(Duration::from_secs(60));
        let result = cache
            .get_or_compute(|| async { Err(PipelineError::GeocoderUnavailable { failed: 1 }) })
            .await;
        assert!(result.is_err());
        assert!(cache.peek().await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_recompute() {
        let cache = Arc::new(ClusterCache::new(Duration::from_secs(60)));
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let calls = calls.clone();
                tokio::spawn(async move {
                    cache
                        .get_or_compute(|| async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(30)).await;
                            Ok(vec![cluster("Bishan")])
                        })
                        .await
                        .unwrap()
                        .len()
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap(), 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_entry_served_while_recompute_in_flight() {
        let cache = Arc::new(ClusterCache::new(Duration::from_millis(10)));
        cache
            .get_or_compute(|| async { Ok(vec![cluster("old")]) })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let slow = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_compute(|| async {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok(vec![cluster("new")])
                    })
                    .await
                    .unwrap()
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let during = cache
            .get_or_compute(|| async { panic!("second recompute started") })
            .await
            .unwrap();
        assert_eq!(during[0].location_name, "old");
        assert_eq!(slow.await.unwrap()[0].location_name, "new");
    }
}
