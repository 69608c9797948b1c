use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// WGS84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Returns `None` for non-finite or out-of-range coordinates.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        valid.then_some(GeoPoint {
            latitude,
            longitude,
        })
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.5}, {:.5})", self.latitude, self.longitude)
    }
}

/// What a single lookup concluded about a place name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeocodeOutcome {
    Found(GeoPoint),
    /// The service answered and had no result.
    NotFound,
    /// The service could not be reached or did not answer in time.
    Failed,
}

impl GeocodeOutcome {
    pub fn point(&self) -> Option<GeoPoint> {
        match self {
            GeocodeOutcome::Found(point) => Some(*point),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeCacheEntry {
    /// Normalized cache key.
    pub location_name: String,
    pub outcome: GeocodeOutcome,
    pub resolved_at: DateTime<Utc>,
}

impl GeocodeCacheEntry {
    pub fn new(location_name: &str, outcome: GeocodeOutcome) -> Self {
        GeocodeCacheEntry {
            location_name: location_name.to_string(),
            outcome,
            resolved_at: Utc::now(),
        }
    }

    /// `None` records a confirmed miss or a failed lookup.
    pub fn point(&self) -> Option<GeoPoint> {
        self.outcome.point()
    }
}
