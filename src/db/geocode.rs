use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::{debug, warn};

use super::core::Database;
use crate::geocode::{GeoPoint, GeocodeCacheEntry, GeocodeOutcome};
use crate::TARGET_DB;

impl Database {
    /// Stores a found or confirmed-missing result. Transient failures are never persisted.
    pub async fn save_geocode_entry(&self, entry: &GeocodeCacheEntry) -> Result<(), sqlx::Error> {
        let point = match entry.outcome {
            GeocodeOutcome::Found(point) => Some(point),
            GeocodeOutcome::NotFound => None,
            GeocodeOutcome::Failed => return Ok(()),
        };

        sqlx::query(
            r#"
            INSERT INTO geocode_cache (location_key, latitude, longitude, resolved_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(location_key) DO UPDATE SET
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                resolved_at = excluded.resolved_at
            "#,
        )
        .bind(&entry.location_name)
        .bind(point.map(|p| p.latitude))
        .bind(point.map(|p| p.longitude))
        .bind(entry.resolved_at.to_rfc3339())
        .execute(self.pool())
        .await?;

        debug!(target: TARGET_DB, "Persisted geocode entry for '{}'", entry.location_name);
        Ok(())
    }

    /// Loads every persisted result, skipping rows that no longer parse.
    pub async fn load_geocode_entries(&self) -> Result<Vec<GeocodeCacheEntry>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT location_key, latitude, longitude, resolved_at FROM geocode_cache",
        )
        .fetch_all(self.pool())
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let key: String = row.try_get("location_key")?;
            let latitude: Option<f64> = row.try_get("latitude")?;
            let longitude: Option<f64> = row.try_get("longitude")?;
            let resolved_at: String = row.try_get("resolved_at")?;

            let outcome = match (latitude, longitude) {
                (Some(lat), Some(lon)) => match GeoPoint::new(lat, lon) {
                    Some(point) => GeocodeOutcome::Found(point),
                    None => {
                        warn!(target: TARGET_DB, "Ignoring out-of-range coordinate stored for '{}'", key);
                        continue;
                    }
                },
                _ => GeocodeOutcome::NotFound,
            };

            let resolved_at = DateTime::parse_from_rfc3339(&resolved_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());

            entries.push(GeocodeCacheEntry {
                location_name: key,
                outcome,
                resolved_at,
            });
        }

        Ok(entries)
    }
}
