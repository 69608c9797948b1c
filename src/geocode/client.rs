//! The external geocoding service boundary.

use async_trait::async_trait;
use reqwest::{header, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::types::GeoPoint;
use crate::TARGET_WEB_REQUEST;

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("geocoding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("geocoding service rate limited the request")]
    RateLimited,

    #[error("geocoding service returned HTTP {0}")]
    Status(u16),

    #[error("invalid geocoding response: {0}")]
    InvalidResponse(String),

    #[error("geocoding request timed out after {0:?}")]
    Timeout(Duration),
}

/// One textual query in, at most one coordinate out.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, query: &str) -> Result<Option<GeoPoint>, GeocodeError>;
}

/// Nominatim `/search` returns coordinates as strings; other deployments use numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Coordinate {
    Text(String),
    Number(f64),
}

impl Coordinate {
    fn value(&self) -> Result<f64, GeocodeError> {
        match self {
            Coordinate::Number(value) => Ok(*value),
            Coordinate::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| GeocodeError::InvalidResponse(format!("bad coordinate '{}'", text))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    lat: Coordinate,
    lon: Coordinate,
}

/// Client for a Nominatim-compatible search endpoint.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    endpoint: String,
}

impl NominatimGeocoder {
    pub fn new(endpoint: &str, user_agent: &str) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .build()?;
        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: reqwest::Client, endpoint: &str) -> Self {
        NominatimGeocoder {
            client,
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<GeoPoint>, GeocodeError> {
        debug!(target: TARGET_WEB_REQUEST, "Geocoding query '{}' via {}", query, self.endpoint);

        let response = self
            .client
            .get(&self.endpoint)
            .header(header::ACCEPT, "application/json")
            .query(&[("q", query), ("format", "jsonv2"), ("limit", "1")])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }
        if !status.is_success() {
            return Err(GeocodeError::Status(status.as_u16()));
        }

        let results: Vec<SearchResult> = response
            .json()
            .await
            .map_err(|e| GeocodeError::InvalidResponse(e.to_string()))?;

        let Some(first) = results.first() else {
            return Ok(None);
        };

        let (latitude, longitude) = (first.lat.value()?, first.lon.value()?);
        GeoPoint::new(latitude, longitude).map(Some).ok_or_else(|| {
            GeocodeError::InvalidResponse(format!(
                "coordinate out of range: {}, {}",
                latitude, longitude
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, http::StatusCode as HttpStatus, routing::get, Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;

    async fn spawn_search_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/search", addr)
    }

    fn local_geocoder(endpoint: &str) -> NominatimGeocoder {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        NominatimGeocoder::with_client(client, endpoint)
    }

    async fn search(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        match params.get("q").map(String::as_str) {
            Some("Bishan, Singapore") => Json(json!([
                {"lat": "1.3508", "lon": "103.8486", "display_name": "Bishan"}
            ])),
            Some("Numeric, Singapore") => Json(json!([{"lat": 1.25, "lon": 103.5}])),
            Some("Broken, Singapore") => Json(json!([{"lat": "north", "lon": "103.5"}])),
            _ => Json(json!([])),
        }
    }

    #[tokio::test]
    async fn test_parses_first_result() {
        let endpoint = spawn_search_server(Router::new().route("/search", get(search))).await;
        let geocoder = local_geocoder(&endpoint);

        let point = geocoder.geocode("Bishan, Singapore").await.unwrap();
        assert_eq!(point, GeoPoint::new(1.3508, 103.8486));

        let point = geocoder.geocode("Numeric, Singapore").await.unwrap();
        assert_eq!(point, GeoPoint::new(1.25, 103.5));
    }

    #[tokio::test]
    async fn test_empty_result_is_not_found() {
        let endpoint = spawn_search_server(Router::new().route("/search", get(search))).await;
        let geocoder = local_geocoder(&endpoint);
        assert_eq!(geocoder.geocode("Atlantis, Singapore").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_malformed_coordinate_is_invalid_response() {
        let endpoint = spawn_search_server(Router::new().route("/search", get(search))).await;
        let geocoder = local_geocoder(&endpoint);
        assert!(matches!(
            geocoder.geocode("Broken, Singapore").await,
            Err(GeocodeError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_http_errors_are_classified() {
        let router = Router::new()
            .route("/search", get(|| async { (HttpStatus::TOO_MANY_REQUESTS, "slow down") }))
            .route("/broken", get(|| async { (HttpStatus::BAD_GATEWAY, "upstream") }));
        let endpoint = spawn_search_server(router).await;

        let geocoder = local_geocoder(&endpoint);
        assert!(matches!(
            geocoder.geocode("Bishan, Singapore").await,
            Err(GeocodeError::RateLimited)
        ));

        let geocoder = local_geocoder(&endpoint.replace("/search", "/broken"));
        assert!(matches!(
            geocoder.geocode("Bishan, Singapore").await,
            Err(GeocodeError::Status(502))
        ));
    }
}
