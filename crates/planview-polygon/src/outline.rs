//! Accumulated outline polygon.

use geo::{BooleanOps, Coord, LineString, MultiPolygon, Polygon, TriangulateEarcut};
use planview_geom::Point2;

use crate::error::{PolygonError, Result};
use crate::ring::{triangle_contains, IntPoint, IntRing};

/// Largest accepted coordinate scale.
pub const MAX_SCALE: f64 = 1e12;

/// Largest fixed-point magnitude; keeps every coordinate exact as an `f64`.
pub const MAX_COORD: f64 = (1u64 << 52) as f64;

/// One connected piece of the outline: an outer ring and its holes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    /// Counter-clockwise outer ring.
    pub outer: IntRing,
    /// Clockwise hole rings.
    pub holes: Vec<IntRing>,
}

impl Shape {
    fn rings(&self) -> impl Iterator<Item = &IntRing> {
        std::iter::once(&self.outer).chain(self.holes.iter())
    }
}

/// A ring converted back to projection-plane coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineRing {
    /// Ring vertices (closing point implicit).
    pub points: Vec<Point2>,
    /// True for a hole ring.
    pub is_hole: bool,
}

/// Fixed-point polygon set grown by repeated union.
#[derive(Debug, Clone)]
pub struct OutlinePolygon {
    shapes: Vec<Shape>,
    bounds: Option<(IntPoint, IntPoint)>,
    scale: f64,
    tolerance: f64,
}

impl OutlinePolygon {
    /// Create an empty outline.
    ///
    /// `scale` maps projection-plane units to integer units and must be
    /// finite and in `(0, MAX_SCALE]`. `tolerance` is the compaction
    /// distance in projection-plane units.
    pub fn new(scale: f64, tolerance: f64) -> Result<Self> {
        if !scale.is_finite() || scale <= 0.0 || scale > MAX_SCALE {
            return Err(PolygonError::InvalidScale(scale));
        }
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(PolygonError::InvalidTolerance(tolerance));
        }
        Ok(Self {
            shapes: Vec::new(),
            bounds: None,
            scale,
            tolerance,
        })
    }

    /// Coordinate scale.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Compaction tolerance in integer units.
    pub fn int_tolerance(&self) -> f64 {
        self.tolerance * self.scale
    }

    /// Outward inflation applied to footprints before union, in integer units.
    pub fn inflation(&self) -> i64 {
        (self.scale * 1e-4).round().max(1.0) as i64
    }

    /// Convert a projection-plane point to fixed point.
    pub fn quantize(&self, p: &Point2) -> Result<IntPoint> {
        Ok(IntPoint::new(self.quantize_coord(p.x)?, self.quantize_coord(p.y)?))
    }

    fn quantize_coord(&self, v: f64) -> Result<i64> {
        let scaled = (v * self.scale).round();
        if !scaled.is_finite() || scaled.abs() > MAX_COORD {
            return Err(PolygonError::CoordinateOverflow(v));
        }
        Ok(scaled as i64)
    }

    /// Convert a fixed-point point back to the projection plane.
    pub fn dequantize(&self, p: IntPoint) -> Point2 {
        Point2::new(p.x as f64 / self.scale, p.y as f64 / self.scale)
    }

    /// True if nothing has been unioned yet (or everything compacted away).
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Connected pieces of the outline.
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Total number of ring vertices.
    pub fn vertex_count(&self) -> usize {
        self.shapes
            .iter()
            .flat_map(Shape::rings)
            .map(IntRing::len)
            .sum()
    }

    /// Enclosed area in projection-plane units.
    pub fn area(&self) -> f64 {
        let area2: i128 = self
            .shapes
            .iter()
            .flat_map(Shape::rings)
            .map(IntRing::signed_area2)
            .sum();
        area2 as f64 / 2.0 / (self.scale * self.scale)
    }

    /// True if the triangle lies strictly inside the outline.
    ///
    /// Every vertex must be inside by even-odd parity, no triangle edge may
    /// touch any ring and no ring vertex may lie in the closed triangle.
    /// Boundary contact counts as not enclosed.
    pub fn encloses_triangle(&self, tri: &[IntPoint; 3]) -> bool {
        let Some((lo, hi)) = self.bounds else {
            return false;
        };
        if tri
            .iter()
            .any(|p| p.x <= lo.x || p.y <= lo.y || p.x >= hi.x || p.y >= hi.y)
        {
            return false;
        }

        let rings = || self.shapes.iter().flat_map(Shape::rings);
        let inside = tri
            .iter()
            .all(|&p| rings().map(|r| r.crossings(p)).sum::<usize>() % 2 == 1);
        if !inside {
            return false;
        }

        let edges = [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])];
        if rings().any(|r| edges.iter().any(|&(a, b)| r.touches_segment(a, b))) {
            return false;
        }

        // With no edge contact a ring is wholly inside or wholly outside.
        !rings().any(|r| r.points().iter().any(|&p| triangle_contains(tri, p)))
    }

    /// Union a ring into the outline and compact the result.
    pub fn union_ring(&mut self, ring: &IntRing) {
        let mut ring = ring.clone();
        ring.orient(true);
        let addition = MultiPolygon::new(vec![Polygon::new(to_line_string(&ring), Vec::new())]);
        let merged = if self.shapes.is_empty() {
            addition
        } else {
            self.to_geo().union(&addition)
        };
        self.shapes = shapes_from_geo(&merged);
        self.compact();
    }

    /// Drop near-duplicate and near-collinear vertices from every ring.
    pub fn compact(&mut self) {
        let tolerance = self.int_tolerance();
        self.shapes = self
            .shapes
            .iter()
            .filter_map(|shape| {
                let outer = shape.outer.compacted(tolerance)?;
                let holes = shape
                    .holes
                    .iter()
                    .filter_map(|h| h.compacted(tolerance))
                    .collect();
                Some(Shape { outer, holes })
            })
            .collect();
        self.update_bounds();
    }

    fn update_bounds(&mut self) {
        self.bounds = self
            .shapes
            .iter()
            .filter_map(|s| s.outer.bounds())
            .reduce(|(alo, ahi), (blo, bhi)| {
                (
                    IntPoint::new(alo.x.min(blo.x), alo.y.min(blo.y)),
                    IntPoint::new(ahi.x.max(bhi.x), ahi.y.max(bhi.y)),
                )
            });
    }

    fn to_geo(&self) -> MultiPolygon<f64> {
        MultiPolygon::new(
            self.shapes
                .iter()
                .map(|s| {
                    Polygon::new(
                        to_line_string(&s.outer),
                        s.holes.iter().map(to_line_string).collect(),
                    )
                })
                .collect(),
        )
    }

    /// Rings in projection-plane coordinates.
    pub fn rings(&self) -> Vec<OutlineRing> {
        self.shapes
            .iter()
            .flat_map(|s| {
                std::iter::once((&s.outer, false)).chain(s.holes.iter().map(|h| (h, true)))
            })
            .map(|(ring, is_hole)| OutlineRing {
                points: ring.points().iter().map(|&p| self.dequantize(p)).collect(),
                is_hole,
            })
            .collect()
    }

    /// Boundary edges of every ring in projection-plane coordinates.
    pub fn boundary_segments(&self) -> Vec<[Point2; 2]> {
        self.shapes
            .iter()
            .flat_map(Shape::rings)
            .flat_map(|r| r.segments())
            .map(|(a, b)| [self.dequantize(a), self.dequantize(b)])
            .collect()
    }

    /// Triangulate the filled outline (holes respected).
    pub fn fill_triangles(&self) -> Vec<[Point2; 3]> {
        let inv = 1.0 / self.scale;
        self.shapes
            .iter()
            .flat_map(|s| {
                let polygon = Polygon::new(
                    scaled_line_string(&s.outer, inv),
                    s.holes.iter().map(|h| scaled_line_string(h, inv)).collect(),
                );
                polygon.earcut_triangles()
            })
            .map(|t| t.to_array().map(|c| Point2::new(c.x, c.y)))
            .collect()
    }
}

fn to_line_string(ring: &IntRing) -> LineString<f64> {
    scaled_line_string(ring, 1.0)
}

fn scaled_line_string(ring: &IntRing, factor: f64) -> LineString<f64> {
    LineString::new(
        ring.points()
            .iter()
            .map(|p| Coord {
                x: p.x as f64 * factor,
                y: p.y as f64 * factor,
            })
            .collect(),
    )
}

fn ring_from_geo(line: &LineString<f64>, ccw: bool) -> IntRing {
    let mut points: Vec<IntPoint> = line
        .coords()
        .map(|c| IntPoint::new(c.x.round() as i64, c.y.round() as i64))
        .collect();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    let mut ring = IntRing::new(points);
    ring.orient(ccw);
    ring
}

fn shapes_from_geo(mp: &MultiPolygon<f64>) -> Vec<Shape> {
    mp.iter()
        .map(|poly| Shape {
            outer: ring_from_geo(poly.exterior(), true),
            holes: poly
                .interiors()
                .iter()
                .map(|h| ring_from_geo(h, false))
                .collect(),
        })
        .collect()
}
