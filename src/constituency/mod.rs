//! Electoral boundary polygons and point-in-polygon attribution.

pub mod index;
pub mod loader;
pub mod polygon;

use std::path::PathBuf;
use thiserror::Error;

pub use index::{Constituency, ConstituencyIndex, RegionResolver};
pub use polygon::{BoundingBox, Coord, Polygon, Ring, RingDefect};

#[derive(Error, Debug)]
pub enum BoundaryError {
    #[error("boundary file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read boundary file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported boundary format '{0}' (expected .kml, .geojson or .json)")]
    UnsupportedFormat(String),

    #[error("invalid GeoJSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid GeoJSON structure: {0}")]
    GeoJson(String),

    #[error("invalid KML: {0}")]
    Kml(String),

    #[error("name property '{property}' not found in any feature (available: {available:?})")]
    MissingNameProperty {
        property: String,
        available: Vec<String>,
    },

    #[error("boundary dataset contains no valid polygons")]
    NoValidPolygons,
}
