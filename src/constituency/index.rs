use rstar::{RTree, RTreeObject, AABB};
use tracing::debug;

use super::polygon::{BoundingBox, Coord, Polygon};
use super::BoundaryError;
use crate::geocode::GeoPoint;
use crate::TARGET_BOUNDARY;

/// Anything that can attribute a coordinate to a named region.
pub trait RegionResolver: Send + Sync {
    /// Returns `None` when the point lies outside every known region.
    fn locate(&self, point: GeoPoint) -> Option<&str>;
}

/// A named district made of one or more polygons.
#[derive(Debug, Clone)]
pub struct Constituency {
    name: String,
    polygons: Vec<Polygon>,
    bbox: BoundingBox,
}

impl Constituency {
    /// Returns `None` when no polygon is supplied.
    pub fn new(name: &str, polygons: Vec<Polygon>) -> Option<Self> {
        let bbox = polygons
            .iter()
            .map(Polygon::bbox)
            .reduce(|a, b| a.union(&b))?;
        Some(Constituency {
            name: name.to_string(),
            polygons,
            bbox,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    pub fn contains(&self, c: Coord) -> bool {
        self.bbox.contains(c) && self.polygons.iter().any(|polygon| polygon.contains(c))
    }
}

/// R-tree entry: a region's bounding box and its position in the dataset.
#[derive(Debug, Clone)]
struct RegionEnvelope {
    position: usize,
    bounds: AABB<[f64; 2]>,
}

impl RegionEnvelope {
    fn new(position: usize, bbox: BoundingBox) -> Self {
        RegionEnvelope {
            position,
            bounds: AABB::from_corners([bbox.min_x, bbox.min_y], [bbox.max_x, bbox.max_y]),
        }
    }
}

impl RTreeObject for RegionEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.bounds
    }
}

/// Read-only constituency polygons with an R-tree bounding-box pre-filter.
///
/// An index only exists once loading succeeded, so "not loaded" cannot be observed at
/// query time.
pub struct ConstituencyIndex {
    regions: Vec<Constituency>,
    tree: RTree<RegionEnvelope>,
}

impl std::fmt::Debug for ConstituencyIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstituencyIndex")
            .field("regions", &self.regions.len())
            .field("tree", &self.tree.size())
            .finish()
    }
}

impl ConstituencyIndex {
    pub fn new(regions: Vec<Constituency>) -> Result<Self, BoundaryError> {
        if regions.is_empty() {
            return Err(BoundaryError::NoValidPolygons);
        }
        let envelopes = regions
            .iter()
            .enumerate()
            .map(|(position, region)| RegionEnvelope::new(position, region.bbox()))
            .collect();
        Ok(ConstituencyIndex {
            regions,
            tree: RTree::bulk_load(envelopes),
        })
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.regions.iter().map(Constituency::name)
    }

    /// Name of the first constituency, in dataset order, whose boundary contains `point`.
    pub fn locate(&self, point: GeoPoint) -> Option<&str> {
        let c = Coord::new(point.longitude, point.latitude);
        let target = AABB::from_point([c.x, c.y]);
        let mut candidates: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&target)
            .map(|entry| entry.position)
            .collect();
        // The tree yields candidates in no particular order; overlaps resolve by dataset order.
        candidates.sort_unstable();

        let found = candidates
            .into_iter()
            .map(|idx| &self.regions[idx])
            .find(|region| region.contains(c))
            .map(Constituency::name);

        if found.is_none() {
            debug!(target: TARGET_BOUNDARY, "Point {} is not within any constituency", point);
        }
        found
    }
}

impl RegionResolver for ConstituencyIndex {
    fn locate(&self, point: GeoPoint) -> Option<&str> {
        ConstituencyIndex::locate(self, point)
    }
}
