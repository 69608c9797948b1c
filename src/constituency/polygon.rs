use std::fmt;

// Tolerance for collinearity and boundary tests, in squared degrees.
const EPSILON: f64 = 1e-12;

/// Planar coordinate; `x` is longitude and `y` is latitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    pub fn new(x: f64, y: f64) -> Self {
        Coord { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn from_coords(coords: &[Coord]) -> Option<Self> {
        let first = coords.first()?;
        let mut bbox = BoundingBox {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        for c in &coords[1..] {
            bbox.min_x = bbox.min_x.min(c.x);
            bbox.min_y = bbox.min_y.min(c.y);
            bbox.max_x = bbox.max_x.max(c.x);
            bbox.max_y = bbox.max_y.max(c.y);
        }
        Some(bbox)
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Inclusive of the edges.
    pub fn contains(&self, c: Coord) -> bool {
        c.x >= self.min_x && c.x <= self.max_x && c.y >= self.min_y && c.y <= self.max_y
    }

    fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }
}

/// Why a ring was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum RingDefect {
    TooFewVertices(usize),
    ZeroArea,
    SelfIntersecting,
    NonFinite,
}

impl fmt::Display for RingDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RingDefect::TooFewVertices(n) => write!(f, "ring has only {} distinct vertices", n),
            RingDefect::ZeroArea => write!(f, "ring encloses zero area"),
            RingDefect::SelfIntersecting => write!(f, "ring intersects itself"),
            RingDefect::NonFinite => write!(f, "ring has non-finite coordinates"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    Inside,
    Boundary,
    Outside,
}

/// A validated simple closed ring, stored without the repeated closing vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct Ring {
    coords: Vec<Coord>,
    bbox: BoundingBox,
}

impl Ring {
    pub fn new(coords: Vec<Coord>) -> Result<Self, RingDefect> {
        if coords.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
            return Err(RingDefect::NonFinite);
        }

        let mut open: Vec<Coord> = Vec::with_capacity(coords.len());
        for c in coords {
            if open.last() != Some(&c) {
                open.push(c);
            }
        }
        while open.len() > 1 && open.first() == open.last() {
            open.pop();
        }

        if open.len() < 3 {
            return Err(RingDefect::TooFewVertices(open.len()));
        }
        if signed_area(&open).abs() <= EPSILON {
            return Err(RingDefect::ZeroArea);
        }
        if is_self_intersecting(&open) {
            return Err(RingDefect::SelfIntersecting);
        }

        let bbox = BoundingBox::from_coords(&open).ok_or(RingDefect::TooFewVertices(0))?;
        Ok(Ring { coords: open, bbox })
    }

    pub fn coords(&self) -> &[Coord] {
        &self.coords
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    pub fn area(&self) -> f64 {
        signed_area(&self.coords).abs()
    }

    /// Even-odd ray casting, with points on an edge reported separately.
    pub fn classify(&self, p: Coord) -> Containment {
        if !self.bbox.contains(p) {
            return Containment::Outside;
        }

        let n = self.coords.len();
        let mut inside = false;
        for i in 0..n {
            let a = self.coords[i];
            let b = self.coords[(i + 1) % n];
            if on_segment(p, a, b) {
                return Containment::Boundary;
            }
            if (a.y > p.y) != (b.y > p.y) {
                let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if p.x < x_cross {
                    inside = !inside;
                }
            }
        }

        if inside {
            Containment::Inside
        } else {
            Containment::Outside
        }
    }
}

/// An exterior ring with optional holes.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    exterior: Ring,
    holes: Vec<Ring>,
}

impl Polygon {
    pub fn new(exterior: Ring, holes: Vec<Ring>) -> Self {
        Polygon { exterior, holes }
    }

    pub fn bbox(&self) -> BoundingBox {
        self.exterior.bbox()
    }

    /// Boundary-inclusive containment. A point on a hole's edge is still inside.
    pub fn contains(&self, p: Coord) -> bool {
        match self.exterior.classify(p) {
            Containment::Outside => false,
            Containment::Boundary => true,
            Containment::Inside => !self
                .holes
                .iter()
                .any(|hole| hole.classify(p) == Containment::Inside),
        }
    }
}

fn signed_area(coords: &[Coord]) -> f64 {
    let n = coords.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let a = coords[i];
            let b = coords[(i + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum();
    twice / 2.0
}

fn orientation(a: Coord, b: Coord, c: Coord) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn within_span(p: Coord, a: Coord, b: Coord) -> bool {
    p.x >= a.x.min(b.x) - EPSILON
        && p.x <= a.x.max(b.x) + EPSILON
        && p.y >= a.y.min(b.y) - EPSILON
        && p.y <= a.y.max(b.y) + EPSILON
}

fn on_segment(p: Coord, a: Coord, b: Coord) -> bool {
    orientation(a, b, p).abs() <= EPSILON && within_span(p, a, b)
}

fn segments_intersect(p1: Coord, p2: Coord, q1: Coord, q2: Coord) -> bool {
    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);

    let straddles = |u: f64, v: f64| (u > EPSILON && v < -EPSILON) || (u < -EPSILON && v > EPSILON);
    if straddles(d1, d2) && straddles(d3, d4) {
        return true;
    }

    (d1.abs() <= EPSILON && within_span(p1, q1, q2))
        || (d2.abs() <= EPSILON && within_span(p2, q1, q2))
        || (d3.abs() <= EPSILON && within_span(q1, p1, p2))
        || (d4.abs() <= EPSILON && within_span(q2, p1, p2))
}

/// Checks every pair of non-adjacent edges. Quadratic, but only run once at load time.
fn is_self_intersecting(coords: &[Coord]) -> bool {
    let n = coords.len();
    let edges: Vec<(Coord, Coord, BoundingBox)> = (0..n)
        .map(|i| {
            let a = coords[i];
            let b = coords[(i + 1) % n];
            let bbox = BoundingBox {
                min_x: a.x.min(b.x),
                min_y: a.y.min(b.y),
                max_x: a.x.max(b.x),
                max_y: a.y.max(b.y),
            };
            (a, b, bbox)
        })
        .collect();

    for i in 0..n {
        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            let (a1, a2, abox) = edges[i];
            let (b1, b2, bbox) = edges[j];
            if abox.intersects(&bbox) && segments_intersect(a1, a2, b1, b2) {
                return true;
            }
        }
    }
    false
}
