//! Boundary dataset parsing (GeoJSON and KML) into a [`ConstituencyIndex`].

use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use super::index::{Constituency, ConstituencyIndex};
use super::polygon::{Coord, Polygon, Ring};
use super::BoundaryError;
use crate::TARGET_BOUNDARY;

/// KML `<name>` is exposed under this property, matching what GIS tools call the column.
pub const KML_NAME_PROPERTY: &str = "Name";

/// Polygon as read from the file, before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPolygon {
    pub exterior: Vec<Coord>,
    pub holes: Vec<Vec<Coord>>,
}

/// One feature as read from the file, before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFeature {
    pub properties: BTreeMap<String, String>,
    pub polygons: Vec<RawPolygon>,
}

impl ConstituencyIndex {
    /// Loads a boundary dataset, choosing the parser from the file extension.
    pub fn load(path: impl AsRef<Path>, name_property: &str) -> Result<Self, BoundaryError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(BoundaryError::NotFound(path.to_path_buf()));
        }

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .unwrap_or_default();

        info!(target: TARGET_BOUNDARY, "Loading electoral boundaries from: {}", path.display());
        let text = fs::read_to_string(path).map_err(|source| BoundaryError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let features = match extension.as_str() {
            "kml" => parse_kml(&text)?,
            "geojson" | "json" => parse_geojson(&text)?,
            other => return Err(BoundaryError::UnsupportedFormat(other.to_string())),
        };

        let index = build_index(features, name_property)?;
        info!(
            target: TARGET_BOUNDARY,
            "Successfully loaded and indexed {} electoral boundaries", index.len()
        );
        Ok(index)
    }

    pub fn from_geojson_str(text: &str, name_property: &str) -> Result<Self, BoundaryError> {
        build_index(parse_geojson(text)?, name_property)
    }

    pub fn from_kml_str(text: &str, name_property: &str) -> Result<Self, BoundaryError> {
        build_index(parse_kml(text)?, name_property)
    }
}

/// Validates raw features and builds the index. Degenerate rings are skipped with a warning.
pub fn build_index(
    features: Vec<RawFeature>,
    name_property: &str,
) -> Result<ConstituencyIndex, BoundaryError> {
    if !features.is_empty()
        && !features
            .iter()
            .any(|feature| feature.properties.contains_key(name_property))
    {
        let available: BTreeSet<String> = features
            .iter()
            .flat_map(|feature| feature.properties.keys().cloned())
            .collect();
        return Err(BoundaryError::MissingNameProperty {
            property: name_property.to_string(),
            available: available.into_iter().collect(),
        });
    }

    let mut regions = Vec::with_capacity(features.len());
    for (position, feature) in features.into_iter().enumerate() {
        let name = match feature.properties.get(name_property) {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => {
                warn!(
                    target: TARGET_BOUNDARY,
                    "Skipping feature #{}: no '{}' value", position, name_property
                );
                continue;
            }
        };

        let polygons: Vec<Polygon> = feature
            .polygons
            .into_iter()
            .filter_map(|raw| validate_polygon(&name, raw))
            .collect();

        match Constituency::new(&name, polygons) {
            Some(region) => regions.push(region),
            None => warn!(
                target: TARGET_BOUNDARY,
                "Skipping constituency '{}': no valid polygons", name
            ),
        }
    }

    ConstituencyIndex::new(regions)
}

fn validate_polygon(name: &str, raw: RawPolygon) -> Option<Polygon> {
    let exterior = match Ring::new(raw.exterior) {
        Ok(ring) => ring,
        Err(defect) => {
            warn!(
                target: TARGET_BOUNDARY,
                "Skipping invalid polygon in '{}': {}", name, defect
            );
            return None;
        }
    };

    let holes = raw
        .holes
        .into_iter()
        .filter_map(|hole| match Ring::new(hole) {
            Ok(ring) => Some(ring),
            Err(defect) => {
                warn!(
                    target: TARGET_BOUNDARY,
                    "Ignoring invalid hole in '{}': {}", name, defect
                );
                None
            }
        })
        .collect();

    Some(Polygon::new(exterior, holes))
}

/// Parses a GeoJSON `FeatureCollection` or single `Feature`.
pub fn parse_geojson(text: &str) -> Result<Vec<RawFeature>, BoundaryError> {
    let root: Value = serde_json::from_str(text)?;

    let features = match root.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => root
            .get("features")
            .and_then(Value::as_array)
            .ok_or_else(|| BoundaryError::GeoJson("FeatureCollection without features".into()))?
            .iter()
            .collect::<Vec<_>>(),
        Some("Feature") => vec![&root],
        other => {
            return Err(BoundaryError::GeoJson(format!(
                "expected FeatureCollection or Feature, found {:?}",
                other
            )))
        }
    };

    Ok(features.into_iter().map(geojson_feature).collect())
}

fn geojson_feature(feature: &Value) -> RawFeature {
    let properties = feature
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| {
            props
                .iter()
                .filter_map(|(key, value)| {
                    let text = match value {
                        Value::String(s) => s.clone(),
                        Value::Number(n) => n.to_string(),
                        Value::Bool(b) => b.to_string(),
                        _ => return None,
                    };
                    Some((key.clone(), text))
                })
                .collect()
        })
        .unwrap_or_default();

    let mut polygons = Vec::new();
    if let Some(geometry) = feature.get("geometry") {
        collect_geojson_polygons(geometry, &mut polygons);
    }

    RawFeature {
        properties,
        polygons,
    }
}

fn collect_geojson_polygons(geometry: &Value, out: &mut Vec<RawPolygon>) {
    let coordinates = geometry.get("coordinates");
    match geometry.get("type").and_then(Value::as_str) {
        Some("Polygon") => {
            if let Some(polygon) = coordinates.and_then(geojson_polygon) {
                out.push(polygon);
            }
        }
        Some("MultiPolygon") => {
            if let Some(parts) = coordinates.and_then(Value::as_array) {
                out.extend(parts.iter().filter_map(geojson_polygon));
            }
        }
        Some("GeometryCollection") => {
            if let Some(members) = geometry.get("geometries").and_then(Value::as_array) {
                for member in members {
                    collect_geojson_polygons(member, out);
                }
            }
        }
        other => {
            debug!(target: TARGET_BOUNDARY, "Ignoring non-areal geometry {:?}", other);
        }
    }
}

fn geojson_polygon(rings: &Value) -> Option<RawPolygon> {
    let mut rings = rings.as_array()?.iter().map(geojson_ring);
    let exterior = rings.next()?;
    Some(RawPolygon {
        exterior,
        holes: rings.collect(),
    })
}

/// Positions that are not `[lon, lat, ...]` number arrays are dropped; the ring
/// validation that follows rejects whatever is left if it is no longer a polygon.
fn geojson_ring(ring: &Value) -> Vec<Coord> {
    ring.as_array()
        .map(|positions| {
            positions
                .iter()
                .filter_map(|position| {
                    let position = position.as_array()?;
                    let x = position.first()?.as_f64()?;
                    let y = position.get(1)?.as_f64()?;
                    Some(Coord::new(x, y))
                })
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq)]
enum KmlText {
    Name,
    SimpleData(String),
    DataValue(String),
    Coordinates,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BoundaryKind {
    Outer,
    Inner,
}

/// Parses `Placemark` elements from a KML document.
pub fn parse_kml(text: &str) -> Result<Vec<RawFeature>, BoundaryError> {
    let mut reader = Reader::from_str(text);

    let mut features = Vec::new();
    let mut feature: Option<RawFeature> = None;
    let mut polygon: Option<RawPolygon> = None;
    let mut boundary: Option<BoundaryKind> = None;
    let mut data_name: Option<String> = None;
    let mut target: Option<KmlText> = None;
    let mut buffer = String::new();

    loop {
        let event = reader.read_event().map_err(|e| {
            BoundaryError::Kml(format!("at byte {}: {}", reader.buffer_position(), e))
        })?;

        match event {
            Event::Start(e) => {
                let local = e.local_name();
                match local.as_ref() {
                    b"Placemark" => feature = Some(RawFeature::default()),
                    b"Polygon" if feature.is_some() => polygon = Some(RawPolygon::default()),
                    b"outerBoundaryIs" => boundary = Some(BoundaryKind::Outer),
                    b"innerBoundaryIs" => boundary = Some(BoundaryKind::Inner),
                    b"name" if feature.is_some() && polygon.is_none() => {
                        target = Some(KmlText::Name)
                    }
                    b"SimpleData" if feature.is_some() => {
                        target = kml_name_attribute(&e)?.map(KmlText::SimpleData);
                    }
                    b"Data" if feature.is_some() => data_name = kml_name_attribute(&e)?,
                    b"value" => target = data_name.clone().map(KmlText::DataValue),
                    b"coordinates" if polygon.is_some() => target = Some(KmlText::Coordinates),
                    _ => {}
                }
                if target.is_some() {
                    buffer.clear();
                }
            }
            Event::Text(e) => {
                if target.is_some() {
                    let text = e
                        .unescape()
                        .map_err(|e| BoundaryError::Kml(e.to_string()))?;
                    buffer.push_str(&text);
                }
            }
            Event::CData(e) => {
                if target.is_some() {
                    buffer.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::End(e) => {
                let local = e.local_name();
                match local.as_ref() {
                    b"Placemark" => {
                        if let Some(done) = feature.take() {
                            features.push(done);
                        }
                    }
                    b"Polygon" => {
                        if let (Some(done), Some(current)) = (polygon.take(), feature.as_mut()) {
                            current.polygons.push(done);
                        }
                    }
                    b"outerBoundaryIs" | b"innerBoundaryIs" => boundary = None,
                    b"Data" => data_name = None,
                    b"name" | b"SimpleData" | b"value" | b"coordinates" => {
                        if let Some(kind) = target.take() {
                            apply_kml_text(kind, buffer.trim(), &mut feature, &mut polygon, boundary);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    debug!(target: TARGET_BOUNDARY, "Parsed {} KML placemarks", features.len());
    Ok(features)
}

fn kml_name_attribute(
    e: &quick_xml::events::BytesStart<'_>,
) -> Result<Option<String>, BoundaryError> {
    let attribute = e
        .try_get_attribute("name")
        .map_err(|e| BoundaryError::Kml(e.to_string()))?;
    attribute
        .map(|attr| {
            attr.unescape_value()
                .map(|value| value.into_owned())
                .map_err(|e| BoundaryError::Kml(e.to_string()))
        })
        .transpose()
}

fn apply_kml_text(
    kind: KmlText,
    text: &str,
    feature: &mut Option<RawFeature>,
    polygon: &mut Option<RawPolygon>,
    boundary: Option<BoundaryKind>,
) {
    match kind {
        KmlText::Name => {
            if let Some(current) = feature.as_mut() {
                current
                    .properties
                    .insert(KML_NAME_PROPERTY.to_string(), text.to_string());
            }
        }
        KmlText::SimpleData(key) | KmlText::DataValue(key) => {
            if let Some(current) = feature.as_mut() {
                current.properties.insert(key, text.to_string());
            }
        }
        KmlText::Coordinates => {
            let Some(current) = polygon.as_mut() else {
                return;
            };
            let ring = parse_kml_coordinates(text);
            match boundary {
                Some(BoundaryKind::Outer) => current.exterior = ring,
                Some(BoundaryKind::Inner) => current.holes.push(ring),
                None => {}
            }
        }
    }
}

/// Parses whitespace-separated `lon,lat[,alt]` tuples, dropping malformed ones.
fn parse_kml_coordinates(text: &str) -> Vec<Coord> {
    text.split_whitespace()
        .filter_map(|tuple| {
            let mut parts = tuple.split(',');
            let x = parts.next()?.trim().parse().ok()?;
            let y = parts.next()?.trim().parse().ok()?;
            Some(Coord::new(x, y))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::GeoPoint;

    const GEOJSON: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"ED_DESC": "Bishan-Toa Payoh", "code": 7},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[103.82, 1.33], [103.87, 1.33], [103.87, 1.37], [103.82, 1.37], [103.82, 1.33]]]
                }
            },
            {
                "type": "Feature",
                "properties": {"ED_DESC": "Broken"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[103.0, 1.0], [103.1, 1.1], [103.2, 1.2], [103.0, 1.0]]]
                }
            },
            {
                "type": "Feature",
                "properties": {"ED_DESC": "Marine Parade"},
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[103.88, 1.29], [103.93, 1.29], [103.93, 1.32], [103.88, 1.32], [103.88, 1.29]],
                         [[103.90, 1.30], [103.91, 1.30], [103.91, 1.31], [103.90, 1.31], [103.90, 1.30]]],
                        [[[103.0, 1.0], [103.1, 1.1], [103.0, 1.1], [103.1, 1.0], [103.0, 1.0]]]
                    ]
                }
            },
            {
                "type": "Feature",
                "properties": {"other": "no name"},
                "geometry": {"type": "Point", "coordinates": [103.8, 1.3]}
            }
        ]
    }"#;

    const KML: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <name>Electoral Boundary 2025</name>
    <Placemark>
      <name>kml_1</name>
      <ExtendedData>
        <SchemaData schemaUrl="#kml_schema">
          <SimpleData name="ED_DESC">BISHAN-TOA PAYOH</SimpleData>
        </SchemaData>
        <Data name="region"><value>Central</value></Data>
      </ExtendedData>
      <MultiGeometry>
        <Polygon>
          <outerBoundaryIs><LinearRing><coordinates>
            103.82,1.33,0 103.87,1.33,0 103.87,1.37,0 103.82,1.37,0 103.82,1.33,0
          </coordinates></LinearRing></outerBoundaryIs>
          <innerBoundaryIs><LinearRing><coordinates>
            103.84,1.34 103.85,1.34 103.85,1.35 103.84,1.35 103.84,1.34
          </coordinates></LinearRing></innerBoundaryIs>
        </Polygon>
      </MultiGeometry>
    </Placemark>
    <Placemark>
      <name><![CDATA[Sembawang]]></name>
      <Polygon>
        <outerBoundaryIs><LinearRing><coordinates>
          103.80,1.43 103.84,1.43 103.84,1.47 103.80,1.47 103.80,1.43
        </coordinates></LinearRing></outerBoundaryIs>
      </Polygon>
    </Placemark>
  </Document>
</kml>"##;

    fn point(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    #[test]
    fn test_geojson_skips_degenerate_polygons() {
        let index = ConstituencyIndex::from_geojson_str(GEOJSON, "ED_DESC").unwrap();
        let names: Vec<_> = index.names().collect();
        assert_eq!(names, vec!["Bishan-Toa Payoh", "Marine Parade"]);

        assert_eq!(index.locate(point(1.3508, 103.8486)), Some("Bishan-Toa Payoh"));
        assert_eq!(index.locate(point(1.30, 103.89)), Some("Marine Parade"));
        // Inside Marine Parade's hole.
        assert_eq!(index.locate(point(1.305, 103.905)), None);
    }

    #[test]
    fn test_missing_name_property_lists_available() {
        match ConstituencyIndex::from_geojson_str(GEOJSON, "Name") {
            Err(BoundaryError::MissingNameProperty { property, available }) => {
                assert_eq!(property, "Name");
                assert_eq!(available, vec!["ED_DESC", "code", "other"]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_dataset_without_valid_polygons_is_fatal() {
        let text = r#"{"type": "Feature", "properties": {"Name": "Flat"},
            "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 1], [2, 2], [0, 0]]]}}"#;
        assert!(matches!(
            ConstituencyIndex::from_geojson_str(text, "Name"),
            Err(BoundaryError::NoValidPolygons)
        ));
    }

    #[test]
    fn test_invalid_geojson_is_an_error() {
        assert!(matches!(
            ConstituencyIndex::from_geojson_str("{not json", "Name"),
            Err(BoundaryError::Json(_))
        ));
        assert!(matches!(
            ConstituencyIndex::from_geojson_str(r#"{"type": "Point"}"#, "Name"),
            Err(BoundaryError::GeoJson(_))
        ));
    }

    #[test]
    fn test_kml_placemarks_and_extended_data() {
        let features = parse_kml(KML).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].properties.get("Name").unwrap(), "kml_1");
        assert_eq!(features[0].properties.get("ED_DESC").unwrap(), "BISHAN-TOA PAYOH");
        assert_eq!(features[0].properties.get("region").unwrap(), "Central");
        assert_eq!(features[0].polygons[0].exterior.len(), 5);
        assert_eq!(features[0].polygons[0].holes.len(), 1);
        assert_eq!(features[1].properties.get("Name").unwrap(), "Sembawang");
    }

    #[test]
    fn test_kml_index_uses_configured_property() {
        let index = ConstituencyIndex::from_kml_str(KML, "Name").unwrap();
        assert_eq!(index.locate(point(1.45, 103.82)), Some("Sembawang"));
        assert_eq!(index.locate(point(1.36, 103.83)), Some("kml_1"));
        assert_eq!(index.locate(point(1.345, 103.845)), None);
    }

    #[test]
    fn test_load_from_file_and_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.kml");
        assert!(matches!(
            ConstituencyIndex::load(&missing, "Name"),
            Err(BoundaryError::NotFound(_))
        ));

        let geojson = dir.path().join("boundaries.geojson");
        fs::write(&geojson, GEOJSON).unwrap();
        let index = ConstituencyIndex::load(&geojson, "ED_DESC").unwrap();
        assert_eq!(index.len(), 2);

        let shapefile = dir.path().join("boundaries.shp");
        fs::write(&shapefile, "binary").unwrap();
        assert!(matches!(
            ConstituencyIndex::load(&shapefile, "Name"),
            Err(BoundaryError::UnsupportedFormat(_))
        ));
    }
}
