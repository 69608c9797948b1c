//! Place name to coordinate resolution with process-lifetime memoization.

pub mod cache;
pub mod client;
pub mod normalize;
pub mod resolver;
pub mod types;

pub use cache::GeocodeCache;
pub use client::{GeocodeError, Geocoder, NominatimGeocoder};
pub use normalize::normalize_location_key;
pub use resolver::{GeocodeResolver, Resolution, ResolverSettings, Throttle};
pub use types::{GeoPoint, GeocodeCacheEntry, GeocodeOutcome};
