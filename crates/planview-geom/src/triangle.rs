//! Triangles with a lazily cached supporting plane.

use std::sync::OnceLock;

use crate::{Aabb3, Line3, Point3, Transform, Vec3, AREA_EPSILON};

/// An oriented plane: `normal · p = d`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit normal.
    pub normal: Vec3,
    /// Offset along the normal.
    pub d: f64,
}

impl Plane {
    /// Plane through `point` with the given (unit) normal.
    pub fn from_normal_and_point(normal: Vec3, point: &Point3) -> Self {
        Self {
            normal,
            d: normal.dot(&point.coords),
        }
    }

    /// Signed distance from `p` to the plane; positive on the normal side.
    #[inline]
    pub fn signed_distance(&self, p: &Point3) -> f64 {
        self.normal.dot(&p.coords) - self.d
    }

    /// The same plane with the normal reversed.
    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            d: -self.d,
        }
    }

    /// Parameter along `line` where it crosses the plane, if not parallel.
    pub fn intersect_line(&self, line: &Line3) -> Option<f64> {
        let denom = self.normal.dot(&line.delta());
        if denom.abs() < crate::EPSILON {
            return None;
        }
        Some(-self.signed_distance(&line.start) / denom)
    }
}

/// A triangle `a, b, c` (counter-clockwise = front when seen from the normal side).
///
/// The plane is computed on first request and cached until the points change.
#[derive(Debug, Clone)]
pub struct Triangle {
    a: Point3,
    b: Point3,
    c: Point3,
    plane: OnceLock<Option<Plane>>,
}

impl Triangle {
    /// Create a triangle from its corners.
    pub fn new(a: Point3, b: Point3, c: Point3) -> Self {
        Self {
            a,
            b,
            c,
            plane: OnceLock::new(),
        }
    }

    /// Corner `a`.
    pub fn a(&self) -> Point3 {
        self.a
    }

    /// Corner `b`.
    pub fn b(&self) -> Point3 {
        self.b
    }

    /// Corner `c`.
    pub fn c(&self) -> Point3 {
        self.c
    }

    /// All three corners.
    pub fn points(&self) -> [Point3; 3] {
        [self.a, self.b, self.c]
    }

    /// Replace the corners, invalidating the cached plane.
    pub fn set_points(&mut self, a: Point3, b: Point3, c: Point3) {
        self.a = a;
        self.b = b;
        self.c = c;
        self.plane = OnceLock::new();
    }

    /// The three directed edges `ab`, `bc`, `ca`.
    pub fn edges(&self) -> [Line3; 3] {
        [
            Line3::new(self.a, self.b),
            Line3::new(self.b, self.c),
            Line3::new(self.c, self.a),
        ]
    }

    /// `(b - a) × (c - a)`: twice the area, along the normal.
    #[inline]
    pub fn area_vector(&self) -> Vec3 {
        (self.b - self.a).cross(&(self.c - self.a))
    }

    /// Triangle area.
    pub fn area(&self) -> f64 {
        self.area_vector().norm() * 0.5
    }

    /// Area of the shadow cast onto the XY plane (view-space footprint).
    pub fn projected_area(&self) -> f64 {
        self.area_vector().z.abs() * 0.5
    }

    /// True if every coordinate of every corner is finite.
    pub fn is_finite(&self) -> bool {
        [self.a, self.b, self.c]
            .iter()
            .all(|p| p.iter().all(|c| c.is_finite()))
    }

    /// True when the footprint on the XY plane is too small to matter.
    ///
    /// Non-finite triangles are always degenerate.
    pub fn is_degenerate_projected(&self) -> bool {
        !self.is_finite() || self.projected_area() < AREA_EPSILON
    }

    /// Supporting plane, or `None` for a zero-area or non-finite triangle.
    pub fn plane(&self) -> Option<Plane> {
        *self.plane.get_or_init(|| {
            let n = self.area_vector();
            let len = n.norm();
            if !len.is_finite() || !self.is_finite() || len * 0.5 < AREA_EPSILON {
                None
            } else {
                Some(Plane::from_normal_and_point(n / len, &self.a))
            }
        })
    }

    /// Unit normal, or `None` for a zero-area or non-finite triangle.
    pub fn normal(&self) -> Option<Vec3> {
        self.plane().map(|p| p.normal)
    }

    /// Centroid.
    pub fn centroid(&self) -> Point3 {
        Point3::from((self.a.coords + self.b.coords + self.c.coords) / 3.0)
    }

    /// Bounding box; empty for a non-finite triangle.
    pub fn bounds(&self) -> Aabb3 {
        if !self.is_finite() {
            return Aabb3::empty();
        }
        Aabb3::from_points([&self.a, &self.b, &self.c])
    }

    /// Highest z over the three corners.
    pub fn max_z(&self) -> f64 {
        self.a.z.max(self.b.z).max(self.c.z)
    }

    /// A transformed copy.
    pub fn transformed(&self, transform: &Transform) -> Triangle {
        Triangle::new(
            transform.apply_point(&self.a),
            transform.apply_point(&self.b),
            transform.apply_point(&self.c),
        )
    }

    /// True if `line` coincides with one of the triangle's edges.
    pub fn has_edge(&self, line: &Line3, tolerance: f64) -> bool {
        self.edges().iter().any(|e| e.matches(line, tolerance))
    }

    /// Number of corners of `other` that coincide with a corner of `self`.
    pub fn shared_vertex_count(&self, other: &Triangle, tolerance: f64) -> usize {
        let mine = self.points();
        other
            .points()
            .iter()
            .filter(|p| mine.iter().any(|q| (*p - q).norm() < tolerance))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_tri() -> Triangle {
        Triangle::new(
            Point3::origin(),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        )
    }

    #[test]
    fn test_plane_is_ccw_normal() {
        let tri = unit_tri();
        let n = tri.normal().unwrap();
        assert_relative_eq!(n.z, 1.0, epsilon = 1e-12);
        let plane = tri.plane().unwrap();
        assert_relative_eq!(plane.signed_distance(&Point3::new(0.0, 0.0, 2.0)), 2.0);
    }

    #[test]
    fn test_set_points_invalidates_plane() {
        let mut tri = unit_tri();
        assert!(tri.normal().unwrap().z > 0.0);
        tri.set_points(
            Point3::origin(),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
        );
        assert!(tri.normal().unwrap().z < 0.0);
    }

    #[test]
    fn test_degenerate_has_no_plane() {
        let tri = Triangle::new(
            Point3::origin(),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        );
        assert!(tri.plane().is_none());
        assert!(tri.is_degenerate_projected());
    }

    #[test]
    fn test_vertical_triangle_is_degenerate_in_projection() {
        let tri = Triangle::new(
            Point3::origin(),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        );
        assert!(tri.plane().is_some());
        assert!(tri.is_degenerate_projected());
    }

    #[test]
    fn test_non_finite_triangle_is_degenerate() {
        let tri = Triangle::new(
            Point3::origin(),
            Point3::new(f64::INFINITY, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        );
        assert!(!tri.is_finite());
        assert!(tri.is_degenerate_projected());
        assert!(tri.plane().is_none());
        assert!(tri.bounds().is_empty());

        let nan = Triangle::new(
            Point3::origin(),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, f64::NAN, 0.0),
        );
        assert!(nan.normal().is_none());
        assert!(nan.is_degenerate_projected());
        assert!(unit_tri().is_finite());
    }

    #[test]
    fn test_plane_line_intersection() {
        let plane = unit_tri().plane().unwrap();
        let line = Line3::new(Point3::new(0.0, 0.0, -1.0), Point3::new(0.0, 0.0, 3.0));
        assert_relative_eq!(plane.intersect_line(&line).unwrap(), 0.25);
        let parallel = Line3::new(Point3::new(0.0, 0.0, 1.0), Point3::new(1.0, 0.0, 1.0));
        assert!(plane.intersect_line(&parallel).is_none());
    }

    #[test]
    fn test_shared_vertices_and_edges() {
        let a = unit_tri();
        let b = Triangle::new(
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        );
        assert_eq!(a.shared_vertex_count(&b, 1e-9), 2);
        let diagonal = Line3::new(Point3::new(0.0, 1.0, 0.0), Point3::new(1.0, 0.0, 0.0));
        assert!(a.has_edge(&diagonal, 1e-9));
        assert!(b.has_edge(&diagonal, 1e-9));
    }
}
