//! Line segments.

use crate::{Aabb3, Point3, Transform, Vec3};

/// An ordered 3D line segment.
///
/// Segments are values: every re-slicing or transformation returns a new one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line3 {
    /// Start point.
    pub start: Point3,
    /// End point.
    pub end: Point3,
}

impl Line3 {
    /// Create a segment.
    pub fn new(start: Point3, end: Point3) -> Self {
        Self { start, end }
    }

    /// `end - start`.
    #[inline]
    pub fn delta(&self) -> Vec3 {
        self.end - self.start
    }

    /// Segment length.
    #[inline]
    pub fn length(&self) -> f64 {
        self.delta().norm()
    }

    /// Point at parameter `t` (0 = start, 1 = end).
    #[inline]
    pub fn at(&self, t: f64) -> Point3 {
        self.start + self.delta() * t
    }

    /// Sub-segment between parameters `t0` and `t1`.
    pub fn slice(&self, t0: f64, t1: f64) -> Line3 {
        Line3::new(self.at(t0), self.at(t1))
    }

    /// Same segment traversed the other way.
    pub fn reversed(&self) -> Line3 {
        Line3::new(self.end, self.start)
    }

    /// True if the segment is shorter than `tolerance`.
    pub fn is_degenerate(&self, tolerance: f64) -> bool {
        self.length() < tolerance
    }

    /// Bounding box of the two endpoints.
    pub fn bounds(&self) -> Aabb3 {
        Aabb3::from_points([&self.start, &self.end])
    }

    /// Apply a transform to both endpoints.
    pub fn transformed(&self, transform: &Transform) -> Line3 {
        Line3::new(
            transform.apply_point(&self.start),
            transform.apply_point(&self.end),
        )
    }

    /// Parameter of the point on the infinite line closest to `p`.
    pub fn closest_parameter(&self, p: &Point3) -> f64 {
        let d = self.delta();
        let len_sq = d.norm_squared();
        if len_sq == 0.0 {
            return 0.0;
        }
        (p - self.start).dot(&d) / len_sq
    }

    /// Distance from `p` to the segment.
    pub fn distance_to_point(&self, p: &Point3) -> f64 {
        let t = self.closest_parameter(p).clamp(0.0, 1.0);
        (self.at(t) - p).norm()
    }

    /// True if both endpoints match `other`'s, in either order, within `tolerance`.
    pub fn matches(&self, other: &Line3, tolerance: f64) -> bool {
        let same = (self.start - other.start).norm() < tolerance
            && (self.end - other.end).norm() < tolerance;
        let flipped = (self.start - other.end).norm() < tolerance
            && (self.end - other.start).norm() < tolerance;
        same || flipped
    }
}
