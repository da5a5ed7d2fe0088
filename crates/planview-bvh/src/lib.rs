#![warn(missing_docs)]

//! Bounding volume hierarchy for planview.
//!
//! [`Bvh`] is a binary SAH tree over arbitrary primitive boxes. It supports:
//!
//! - ray casts ([`Bvh::raycast`])
//! - shape casts that descend only into nodes accepted by a caller
//!   predicate ([`Bvh::shapecast`])
//! - joint traversal of two trees under a relative transform, yielding
//!   every pair of primitives whose boxes overlap ([`Bvh::bvhcast`])
//!
//! [`MeshBvh`] wraps a [`Bvh`] over the triangles of a mesh.
//!
//! # Example
//!
//! ```ignore
//! use planview_bvh::MeshBvh;
//! use planview_geom::{Point3, Ray, Vec3};
//!
//! let bvh = MeshBvh::build(&mesh, 8);
//! let hit = bvh.raycast_first(&Ray::new(Point3::new(0.5, 0.5, 5.0), -Vec3::z()));
//! ```

mod build;
mod bvh;
mod mesh;

pub use bvh::{Bvh, BvhNode};
pub use mesh::{MeshBvh, RayHit};

/// Default number of primitives per leaf.
pub const DEFAULT_LEAF_SIZE: usize = 4;
