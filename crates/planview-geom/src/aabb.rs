//! Axis-aligned bounding boxes.

use crate::{Point3, Transform};

/// Axis-aligned bounding box in 3D.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb3 {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl Aabb3 {
    /// Create an AABB from min and max corners.
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Create an empty (inverted) AABB suitable for expansion.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Smallest box containing all `points`.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3>) -> Self {
        let mut aabb = Self::empty();
        for p in points {
            aabb.include_point(p);
        }
        aabb
    }

    /// True if no point has been included yet.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand this AABB to include a point.
    pub fn include_point(&mut self, p: &Point3) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    /// Expand this AABB to include another box.
    pub fn include_aabb(&mut self, other: &Aabb3) {
        if other.is_empty() {
            return;
        }
        self.include_point(&other.min);
        self.include_point(&other.max);
    }

    /// Test if two AABBs overlap (touching counts as overlap).
    pub fn overlaps(&self, other: &Aabb3) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Expand the AABB by a tolerance in all directions.
    pub fn expand(&mut self, tol: f64) {
        self.min.x -= tol;
        self.min.y -= tol;
        self.min.z -= tol;
        self.max.x += tol;
        self.max.y += tol;
        self.max.z += tol;
    }

    /// Centre of the box.
    pub fn center(&self) -> Point3 {
        nalgebra::center(&self.min, &self.max)
    }

    /// Surface area, used by the SAH cost model.
    pub fn surface_area(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let d = self.max - self.min;
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    /// The eight corners of the box.
    pub fn corners(&self) -> [Point3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Point3::new(a.x, a.y, a.z),
            Point3::new(b.x, a.y, a.z),
            Point3::new(a.x, b.y, a.z),
            Point3::new(b.x, b.y, a.z),
            Point3::new(a.x, a.y, b.z),
            Point3::new(b.x, a.y, b.z),
            Point3::new(a.x, b.y, b.z),
            Point3::new(b.x, b.y, b.z),
        ]
    }

    /// Conservative box around this box after transformation.
    pub fn transformed(&self, transform: &Transform) -> Aabb3 {
        if self.is_empty() {
            return *self;
        }
        let corners = self.corners();
        let moved: Vec<Point3> = corners.iter().map(|c| transform.apply_point(c)).collect();
        Aabb3::from_points(moved.iter())
    }
}

impl Default for Aabb3 {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_touching() {
        let a = Aabb3::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        let b = Aabb3::new(Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        let c = Aabb3::new(Point3::new(1.5, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_empty_box() {
        let mut aabb = Aabb3::empty();
        assert!(aabb.is_empty());
        assert_eq!(aabb.surface_area(), 0.0);
        aabb.include_point(&Point3::new(1.0, 2.0, 3.0));
        assert!(!aabb.is_empty());
    }

    #[test]
    fn test_transformed_box_is_conservative() {
        let aabb = Aabb3::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        let t = Transform::rotation_z(std::f64::consts::FRAC_PI_4);
        let moved = aabb.transformed(&t);
        let half_diag = std::f64::consts::SQRT_2 / 2.0;
        assert!(moved.min.x <= -half_diag + 1e-9);
        assert!(moved.max.x >= half_diag - 1e-9);
        assert!((moved.max.y - std::f64::consts::SQRT_2).abs() < 1e-9);
    }
}
