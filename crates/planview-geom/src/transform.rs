//! Affine transforms and the projection view frame.

use nalgebra::{Matrix3, Matrix4, Vector4};

use crate::{Point2, Point3, Vec3};

/// A 4x4 affine transformation matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Wrap an existing matrix.
    pub fn from_matrix(matrix: Matrix4<f64>) -> Self {
        Self { matrix }
    }

    /// Translation by `(dx, dy, dz)`.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            matrix: Matrix4::new_translation(&Vec3::new(dx, dy, dz)),
        }
    }

    /// Non-uniform scale by `(sx, sy, sz)`.
    pub fn scale(sx: f64, sy: f64, sz: f64) -> Self {
        Self {
            matrix: Matrix4::new_nonuniform_scaling(&Vec3::new(sx, sy, sz)),
        }
    }

    /// Rotation about the Z axis by `angle` radians.
    pub fn rotation_z(angle: f64) -> Self {
        Self {
            matrix: Matrix4::from_axis_angle(&Vec3::z_axis(), angle),
        }
    }

    /// Rotation about the X axis by `angle` radians.
    pub fn rotation_x(angle: f64) -> Self {
        Self {
            matrix: Matrix4::from_axis_angle(&Vec3::x_axis(), angle),
        }
    }

    /// Compose: `self` then `other` (self * other), so `other` is applied first.
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Transform a point.
    #[inline]
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }

    /// Transform a direction vector (ignores translation).
    #[inline]
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        let r = self.matrix * Vector4::new(v.x, v.y, v.z, 0.0);
        Vec3::new(r.x, r.y, r.z)
    }

    /// Inverse of this transform, if it exists.
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }

    /// Determinant of the linear (upper-left 3x3) part.
    pub fn determinant(&self) -> f64 {
        let m3: Matrix3<f64> = self.matrix.fixed_view::<3, 3>(0, 0).into_owned();
        m3.determinant()
    }

    /// True when the transform flips handedness (and therefore triangle winding).
    pub fn is_mirroring(&self) -> bool {
        self.determinant() < 0.0
    }

    /// True when this is exactly the identity matrix.
    pub fn is_identity(&self) -> bool {
        self.matrix == Matrix4::identity()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Orthonormal frame aligned with a projection direction.
///
/// View space is a rigid rotation of world space in which the projection
/// direction points along -Z: the viewer sits at +Z, "above" means larger z,
/// and the projection plane is XY.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewFrame {
    direction: Vec3,
    to_view: Transform,
    to_world: Transform,
}

impl ViewFrame {
    /// Build the frame for a projection direction.
    ///
    /// Returns `None` for a zero-length or non-finite direction.
    pub fn new(direction: Vec3) -> Option<Self> {
        let len = direction.norm();
        if !len.is_finite() || len < crate::EPSILON {
            return None;
        }
        let direction = direction / len;

        let z_axis = -direction;
        let helper = if direction.z.abs() < 0.999 {
            Vec3::z()
        } else {
            Vec3::y()
        };
        let x_axis = helper.cross(&z_axis).normalize();
        let y_axis = z_axis.cross(&x_axis);

        let rotation = Matrix4::new(
            x_axis.x, x_axis.y, x_axis.z, 0.0, //
            y_axis.x, y_axis.y, y_axis.z, 0.0, //
            z_axis.x, z_axis.y, z_axis.z, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        );

        Some(Self {
            direction,
            to_view: Transform::from_matrix(rotation),
            to_world: Transform::from_matrix(rotation.transpose()),
        })
    }

    /// The frame for looking straight down the world -Z axis.
    pub fn top_down() -> Self {
        Self {
            direction: -Vec3::z(),
            to_view: Transform::identity(),
            to_world: Transform::identity(),
        }
    }

    /// Unit projection direction in world space.
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    /// World-to-view transform.
    pub fn to_view(&self) -> &Transform {
        &self.to_view
    }

    /// View-to-world transform.
    pub fn to_world(&self) -> &Transform {
        &self.to_world
    }

    /// View-from-local transform for an instance placed with `local_to_world`.
    pub fn view_from(&self, local_to_world: &Transform) -> Transform {
        self.to_view.then(local_to_world)
    }

    /// Map a point on the projection plane back to world space.
    pub fn plane_point(&self, p: &Point2) -> Point3 {
        self.to_world.apply_point(&Point3::new(p.x, p.y, 0.0))
    }
}
