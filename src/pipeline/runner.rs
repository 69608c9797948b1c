use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use super::PipelineError;
use crate::article::Article;
use crate::clustering::{build_clusters, Cluster, ClusterInput};
use crate::config::AppConfig;
use crate::constituency::{ConstituencyIndex, RegionResolver};
use crate::db::Database;
use crate::geocode::{GeocodeCache, GeocodeOutcome, GeocodeResolver, NominatimGeocoder};
use crate::location::{Gazetteer, LocationExtractor};
use crate::TARGET_PIPELINE;

/// Counters for one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub articles: usize,
    pub unusable: usize,
    pub unmatched: usize,
    pub unresolved: usize,
    pub outside_boundaries: usize,
    /// External lookups made during this run.
    pub fresh_lookups: usize,
    /// Fresh lookups that failed rather than answering.
    pub failed_lookups: usize,
    /// Place names that went through the resolver, cached or not.
    pub resolutions: usize,
    /// Resolutions whose settled outcome is a failure, including ones cached by earlier runs.
    pub failed_resolutions: usize,
    pub clusters: usize,
}

enum Step {
    Unusable,
    Unmatched,
    Unresolved { fresh: bool, failed: bool },
    Located { input: ClusterInput, fresh: bool },
}

/// Everything one run needs: the extractor, the resolver and the region lookup.
pub struct Pipeline {
    extractor: LocationExtractor,
    resolver: Arc<GeocodeResolver>,
    regions: Arc<dyn RegionResolver>,
    workers: usize,
}

impl Pipeline {
    pub fn new(
        extractor: LocationExtractor,
        resolver: Arc<GeocodeResolver>,
        regions: Arc<dyn RegionResolver>,
        workers: usize,
    ) -> Self {
        Pipeline {
            extractor,
            resolver,
            regions,
            workers: workers.max(1),
        }
    }

    /// Builds the production pipeline. Any error here is a configuration problem and fatal.
    #[instrument(target = "pipeline", level = "info", skip(config))]
    pub async fn initialize(config: &AppConfig) -> Result<Self, PipelineError> {
        let gazetteer = Gazetteer::singapore().with_extra_names(config.gazetteer_extra.as_slice());
        info!(target: TARGET_PIPELINE, "Gazetteer holds {} place names", gazetteer.len());
        let extractor = LocationExtractor::new(&gazetteer)?;

        let index = ConstituencyIndex::load(&config.boundaries_path, &config.constituency_property)
            .map_err(|err| {
                error!(target: TARGET_PIPELINE, "Failed to load electoral boundaries: {}", err);
                err
            })?;

        let geocoder = NominatimGeocoder::new(&config.geocoder_url, &config.geocoder_user_agent)?;

        let resolver = match &config.database_path {
            Some(path) => {
                let db = Database::new(path).await?;
                let entries = db.load_geocode_entries().await?;
                info!(
                    target: TARGET_PIPELINE,
                    "Loaded {} stored geocode results from {}", entries.len(), path
                );
                GeocodeResolver::new(
                    Arc::new(geocoder),
                    Arc::new(GeocodeCache::with_entries(entries)),
                    config.resolver_settings(),
                )
                .with_store(db)
            }
            None => GeocodeResolver::new(
                Arc::new(geocoder),
                Arc::new(GeocodeCache::new()),
                config.resolver_settings(),
            ),
        };

        Ok(Pipeline::new(
            extractor,
            Arc::new(resolver),
            Arc::new(index),
            config.worker_count,
        ))
    }

    pub fn resolver(&self) -> &Arc<GeocodeResolver> {
        &self.resolver
    }

    /// Runs every article through the pipeline and groups the results.
    ///
    /// Articles are processed concurrently, at most `workers` at a time, and results keep
    /// input order. A miss or failure for one article never stops the others.
    pub async fn run(&self, articles: Vec<Article>) -> Result<Vec<Cluster>, PipelineError> {
        let (clusters, stats) = self.run_with_stats(articles).await;

        info!(
            target: TARGET_PIPELINE,
            "Pipeline run: {} articles, {} unusable, {} without location, {} unresolved, {} outside boundaries, {}/{} lookups failed, {}/{} resolutions failed, {} clusters",
            stats.articles,
            stats.unusable,
            stats.unmatched,
            stats.unresolved,
            stats.outside_boundaries,
            stats.failed_lookups,
            stats.fresh_lookups,
            stats.failed_resolutions,
            stats.resolutions,
            stats.clusters
        );

        // Cached failures count, so an outage keeps failing runs after its first one.
        if stats.resolutions > 0 && stats.failed_resolutions == stats.resolutions && clusters.is_empty() {
            return Err(PipelineError::GeocoderUnavailable {
                failed: stats.failed_resolutions,
            });
        }
        Ok(clusters)
    }

    pub async fn run_with_stats(&self, articles: Vec<Article>) -> (Vec<Cluster>, RunStats) {
        let mut stats = RunStats {
            articles: articles.len(),
            ..RunStats::default()
        };

        let steps: Vec<Step> = stream::iter(articles)
            .map(|article| self.process(article))
            .buffered(self.workers)
            .collect()
            .await;

        let mut inputs = Vec::with_capacity(steps.len());
        for step in steps {
            match step {
                Step::Unusable => stats.unusable += 1,
                Step::Unmatched => stats.unmatched += 1,
                Step::Unresolved { fresh, failed } => {
                    stats.unresolved += 1;
                    stats.resolutions += 1;
                    if failed {
                        stats.failed_resolutions += 1;
                    }
                    if fresh {
                        stats.fresh_lookups += 1;
                        if failed {
                            stats.failed_lookups += 1;
                        }
                    }
                }
                Step::Located { input, fresh } => {
                    stats.resolutions += 1;
                    if fresh {
                        stats.fresh_lookups += 1;
                    }
                    if input.constituency.is_none() {
                        stats.outside_boundaries += 1;
                    }
                    inputs.push(input);
                }
            }
        }

        let clusters = build_clusters(inputs);
        stats.clusters = clusters.len();
        (clusters, stats)
    }

    async fn process(&self, article: Article) -> Step {
        if !article.is_usable() {
            warn!(target: TARGET_PIPELINE, "Skipping article without title or url: {:?}", article.url);
            return Step::Unusable;
        }

        let Some(location) = self.extractor.extract(article) else {
            return Step::Unmatched;
        };

        let resolution = self.resolver.resolve_detailed(&location.location_name).await;
        let Some(point) = resolution.point() else {
            debug!(target: TARGET_PIPELINE, "No coordinates for '{}'", location.location_name);
            return Step::Unresolved {
                fresh: resolution.fresh,
                failed: resolution.entry.outcome == GeocodeOutcome::Failed,
            };
        };

        let constituency = self.regions.locate(point).map(str::to_string);
        Step::Located {
            input: ClusterInput::new(location, point, constituency),
            fresh: resolution.fresh,
        }
    }
}
