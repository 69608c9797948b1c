use std::sync::Arc;
use tokio::time::Duration;
use tracing::info;

use super::cache::ClusterCache;
use super::runner::Pipeline;
use super::PipelineError;
use crate::clustering::Cluster;
use crate::rss::ArticleSource;
use crate::TARGET_PIPELINE;

/// The "get current clusters" operation: fetch articles, run the pipeline, cache the result.
pub struct ClusterService {
    source: Arc<dyn ArticleSource>,
    pipeline: Arc<Pipeline>,
    cache: Arc<ClusterCache>,
}

impl ClusterService {
    pub fn new(source: Arc<dyn ArticleSource>, pipeline: Arc<Pipeline>, ttl: Duration) -> Self {
        ClusterService {
            source,
            pipeline,
            cache: Arc::new(ClusterCache::new(ttl)),
        }
    }

    pub fn cache(&self) -> &ClusterCache {
        &self.cache
    }

    /// Clusters no older than the cache TTL, or stale ones if a refresh fails.
    ///
    /// The lookup and any recompute run on their own task, so dropping the returned
    /// future never abandons a refresh halfway.
    pub async fn current_clusters(&self) -> Result<Arc<Vec<Cluster>>, PipelineError> {
        let cache = self.cache.clone();
        let source = self.source.clone();
        let pipeline = self.pipeline.clone();
        tokio::spawn(async move {
            cache
                .get_or_compute(move || compute(source, pipeline))
                .await
        })
        .await?
    }

    /// Runs the whole pipeline once, bypassing the cache.
    pub async fn compute_clusters(&self) -> Result<Vec<Cluster>, PipelineError> {
        compute(self.source.clone(), self.pipeline.clone()).await
    }
}

async fn compute(
    source: Arc<dyn ArticleSource>,
    pipeline: Arc<Pipeline>,
) -> Result<Vec<Cluster>, PipelineError> {
    let articles = source.fetch_articles().await.map_err(PipelineError::Source)?;
    info!(target: TARGET_PIPELINE, "Fetched {} articles", articles.len());
    pipeline.run(articles).await
}
