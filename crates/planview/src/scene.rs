//! Flat list of placed meshes.

use planview_bvh::MeshBvh;
use planview_geom::{Aabb3, Transform, TriangleMesh};
use rayon::prelude::*;
use tracing::debug;

use crate::error::Result;

/// A mesh placed in the world.
#[derive(Debug, Clone, Default)]
pub struct MeshInstance {
    /// Geometry in its local frame.
    pub mesh: TriangleMesh,
    /// Local-to-world placement.
    pub transform: Transform,
}

impl MeshInstance {
    /// Create an instance.
    pub fn new(mesh: TriangleMesh, transform: Transform) -> Self {
        Self { mesh, transform }
    }

    /// Bounds in world space.
    pub fn world_bounds(&self) -> Aabb3 {
        self.mesh.bounds().transformed(&self.transform)
    }
}

/// The meshes to project.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    /// Instances in visitation order.
    pub instances: Vec<MeshInstance>,
}

impl Scene {
    /// Empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// A scene holding one mesh at the origin.
    pub fn single(mesh: TriangleMesh) -> Self {
        Self {
            instances: vec![MeshInstance::new(mesh, Transform::identity())],
        }
    }

    /// Add an instance.
    pub fn push(&mut self, mesh: TriangleMesh, transform: Transform) {
        self.instances.push(MeshInstance::new(mesh, transform));
    }

    /// Total triangle count.
    pub fn num_triangles(&self) -> usize {
        self.instances.iter().map(|i| i.mesh.num_triangles()).sum()
    }

    /// True if there are no triangles at all.
    pub fn is_empty(&self) -> bool {
        self.num_triangles() == 0
    }

    /// Check every instance's buffers.
    ///
    /// Meshes are validated on construction, but their buffers are public and
    /// may have been edited since.
    pub fn validate(&self) -> Result<()> {
        for instance in &self.instances {
            instance.mesh.validate()?;
        }
        Ok(())
    }

    /// Bounds of every instance in world space.
    pub fn world_bounds(&self) -> Aabb3 {
        let mut bounds = Aabb3::empty();
        for instance in &self.instances {
            bounds.include_aabb(&instance.world_bounds());
        }
        bounds
    }
}

/// An instance with its triangle BVH built.
#[derive(Debug, Clone)]
pub struct IndexedInstance {
    /// BVH in the instance's local frame.
    pub bvh: MeshBvh,
    /// Local-to-world placement.
    pub transform: Transform,
    /// Bounds in world space.
    pub world_bounds: Aabb3,
}

impl IndexedInstance {
    /// Build the BVH of one instance.
    pub fn build(instance: &MeshInstance, max_leaf_size: usize) -> Self {
        Self {
            bvh: MeshBvh::build(&instance.mesh, max_leaf_size),
            transform: instance.transform.clone(),
            world_bounds: instance.world_bounds(),
        }
    }
}

/// Build a BVH per instance, in parallel.
pub fn index_scene(scene: &Scene, max_leaf_size: usize) -> Vec<IndexedInstance> {
    let indexed: Vec<IndexedInstance> = scene
        .instances
        .par_iter()
        .map(|instance| IndexedInstance::build(instance, max_leaf_size))
        .collect();
    debug!(
        instances = indexed.len(),
        max_depth = indexed.iter().map(|i| i.bvh.bvh().depth()).max().unwrap_or(0),
        "indexed scene"
    );
    indexed
}
