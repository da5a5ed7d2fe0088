//! Ray representation and the slab box test.

use crate::{Aabb3, Point3, Vec3};

/// A ray in 3D space defined by origin and unit direction.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// Origin point of the ray.
    pub origin: Point3,
    /// Unit direction of the ray.
    pub direction: Vec3,
    /// Reciprocal of direction components for fast AABB tests.
    inv_direction: Vec3,
    /// Sign of direction components (0 if positive, 1 if negative).
    sign: [usize; 3],
}

impl Ray {
    /// Create a new ray from origin and direction.
    ///
    /// The direction will be normalized.
    pub fn new(origin: Point3, direction: Vec3) -> Self {
        let dir = direction.normalize();
        let inv = Vec3::new(1.0 / dir.x, 1.0 / dir.y, 1.0 / dir.z);
        let sign = [
            usize::from(inv.x < 0.0),
            usize::from(inv.y < 0.0),
            usize::from(inv.z < 0.0),
        ];
        Self {
            origin,
            direction: dir,
            inv_direction: inv,
            sign,
        }
    }

    /// Evaluate the ray at parameter `t`: `origin + t * direction`.
    #[inline]
    pub fn at(&self, t: f64) -> Point3 {
        self.origin + t * self.direction
    }

    /// Test ray-AABB intersection using the slab method.
    ///
    /// Returns `Some((t_min, t_max))` with entry and exit parameters clamped
    /// to `t >= 0`, or `None` if the ray misses.
    #[inline]
    pub fn intersect_aabb(&self, aabb: &Aabb3) -> Option<(f64, f64)> {
        let bounds = [aabb.min, aabb.max];

        let mut t_min = f64::NEG_INFINITY;
        let mut t_max = f64::INFINITY;

        for axis in 0..3 {
            let lo = (bounds[self.sign[axis]][axis] - self.origin[axis]) * self.inv_direction[axis];
            let hi =
                (bounds[1 - self.sign[axis]][axis] - self.origin[axis]) * self.inv_direction[axis];
            // 0 * inf is NaN for rays lying on a slab face; treat as unbounded.
            if !lo.is_nan() {
                t_min = t_min.max(lo);
            }
            if !hi.is_nan() {
                t_max = t_max.min(hi);
            }
        }

        if t_max >= t_min && t_max >= 0.0 {
            Some((t_min.max(0.0), t_max))
        } else {
            None
        }
    }

    /// True if the ray enters `aabb` somewhere within `[0, max_t]`.
    #[inline]
    pub fn hits_aabb_within(&self, aabb: &Aabb3, max_t: f64) -> bool {
        matches!(self.intersect_aabb(aabb), Some((t_min, _)) if t_min <= max_t)
    }
}
