#![warn(missing_docs)]

//! Geometry primitives for planview.
//!
//! Thin layer over nalgebra with the pieces the projection pipeline needs:
//!
//! - [`Transform`] and [`ViewFrame`] for moving between local, world and view space
//! - [`Aabb3`] and [`Ray`] for broadphase tests
//! - [`Line3`] segments that are re-sliced, never mutated in place
//! - [`Triangle`] with a lazily cached [`Plane`]
//! - [`TriangleMesh`] position/index buffers
//! - [`intersect`] for triangle/triangle intersection segments

mod aabb;
mod error;
pub mod intersect;
mod line;
mod mesh;
mod ray;
mod transform;
mod triangle;

pub use aabb::Aabb3;
pub use error::{GeomError, Result};
pub use line::Line3;
pub use mesh::TriangleMesh;
pub use ray::Ray;
pub use transform::{Transform, ViewFrame};
pub use triangle::{Plane, Triangle};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = nalgebra::Vector3<f64>;

/// A point in 2D space (projection plane coordinates).
pub type Point2 = nalgebra::Point2<f64>;

/// A vector in 2D space.
pub type Vec2 = nalgebra::Vector2<f64>;

/// Distance below which two points are treated as the same vertex.
pub const POINT_EPSILON: f64 = 1e-10;

/// Projected area below which a triangle contributes nothing.
pub const AREA_EPSILON: f64 = 1e-10;

/// Generic tolerance for "is this scalar zero".
pub const EPSILON: f64 = 1e-10;

/// Check if a scalar is within [`EPSILON`] of zero.
#[inline]
pub fn is_near_zero(value: f64) -> bool {
    value.abs() < EPSILON
}
