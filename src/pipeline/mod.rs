//! The extract → resolve → locate → cluster pipeline and its TTL cache.

pub mod cache;
pub mod runner;
pub mod service;

use thiserror::Error;

use crate::constituency::BoundaryError;
use crate::geocode::GeocodeError;
use crate::location::GazetteerError;

pub use cache::{ClusterCache, PipelineCacheEntry};
pub use runner::{Pipeline, RunStats};
pub use service::ClusterService;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("gazetteer error: {0}")]
    Gazetteer(#[from] GazetteerError),

    #[error("boundary dataset error: {0}")]
    Boundary(#[from] BoundaryError),

    #[error("geocoder setup failed: {0}")]
    Geocoder(#[from] GeocodeError),

    #[error("geocode store error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("article source failed: {0:#}")]
    Source(anyhow::Error),

    #[error("geocoding service unavailable: all {failed} lookups failed")]
    GeocoderUnavailable { failed: usize },

    #[error("cluster recompute task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
