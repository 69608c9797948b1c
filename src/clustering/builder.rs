use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::types::{Cluster, ClusterInput, ClusterKey};
use crate::TARGET_PIPELINE;

/// Groups located articles into clusters.
///
/// Clusters come out in the order their first article was seen, and articles keep their input
/// order within a cluster. An article whose URL is already in its cluster is skipped. The
/// coordinate and constituency of a cluster are taken from its first article.
pub fn build_clusters<I>(inputs: I) -> Vec<Cluster>
where
    I: IntoIterator<Item = ClusterInput>,
{
    let mut clusters: Vec<Cluster> = Vec::new();
    let mut positions: HashMap<ClusterKey, usize> = HashMap::new();
    let mut seen_urls: Vec<HashSet<String>> = Vec::new();

    for input in inputs {
        let key = ClusterKey::new(&input.location.location_name, input.point);
        let article = input.location.article;

        match positions.get(&key) {
            Some(&idx) => {
                if seen_urls[idx].insert(article.url.clone()) {
                    clusters[idx].articles.push(article);
                } else {
                    debug!(
                        target: TARGET_PIPELINE,
                        "Skipping duplicate article {} in cluster '{}'", article.url, clusters[idx].location_name
                    );
                }
            }
            None => {
                positions.insert(key, clusters.len());
                seen_urls.push(HashSet::from([article.url.clone()]));
                clusters.push(Cluster {
                    location_name: input.location.location_name,
                    point: input.point,
                    constituency: input.constituency,
                    articles: vec![article],
                });
            }
        }
    }

    clusters
}
