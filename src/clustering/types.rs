use serde::{Serialize, Serializer};

use crate::article::Article;
use crate::geocode::GeoPoint;
use crate::location::LocationMatch;

/// Decimal places kept when comparing cluster coordinates.
pub const KEY_PRECISION: i32 = 5;

/// A located article, ready to be grouped.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterInput {
    pub location: LocationMatch,
    pub point: GeoPoint,
    pub constituency: Option<String>,
}

impl ClusterInput {
    pub fn new(location: LocationMatch, point: GeoPoint, constituency: Option<String>) -> Self {
        ClusterInput {
            location,
            point,
            constituency,
        }
    }
}

/// Grouping identity: the place name plus the coordinate rounded to [`KEY_PRECISION`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClusterKey {
    location_name: String,
    latitude: i64,
    longitude: i64,
}

impl ClusterKey {
    pub fn new(location_name: &str, point: GeoPoint) -> Self {
        let scale = 10f64.powi(KEY_PRECISION);
        ClusterKey {
            location_name: location_name.to_string(),
            latitude: (point.latitude * scale).round() as i64,
            longitude: (point.longitude * scale).round() as i64,
        }
    }
}

/// One map marker: every article that mentioned the same place.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub location_name: String,
    pub point: GeoPoint,
    pub constituency: Option<String>,
    pub articles: Vec<Article>,
}

impl Cluster {
    pub fn key(&self) -> ClusterKey {
        ClusterKey::new(&self.location_name, self.point)
    }

    pub fn article_count(&self) -> usize {
        self.articles.len()
    }
}

/// Per-article fields shown on the map.
#[derive(Serialize)]
struct ArticleRecord<'a> {
    title: &'a str,
    url: &'a str,
    summary: &'a str,
    source: &'a str,
}

impl<'a> From<&'a Article> for ArticleRecord<'a> {
    fn from(article: &'a Article) -> Self {
        ArticleRecord {
            title: &article.title,
            url: &article.url,
            summary: &article.summary,
            source: &article.source,
        }
    }
}

#[derive(Serialize)]
struct ClusterRecord<'a> {
    latitude: f64,
    longitude: f64,
    location_name: &'a str,
    constituency: Option<&'a str>,
    article_count: usize,
    articles: Vec<ArticleRecord<'a>>,
}

impl Serialize for Cluster {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ClusterRecord {
            latitude: self.point.latitude,
            longitude: self.point.longitude,
            location_name: &self.location_name,
            constituency: self.constituency.as_deref(),
            article_count: self.article_count(),
            articles: self.articles.iter().map(ArticleRecord::from).collect(),
        }
        .serialize(serializer)
    }
}
