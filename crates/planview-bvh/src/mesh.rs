//! BVH over the triangles of a mesh.

use planview_geom::{Aabb3, Point3, Ray, Transform, Triangle, TriangleMesh, EPSILON};

use crate::Bvh;

/// Result of a ray/triangle intersection.
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    /// Parameter along the ray.
    pub t: f64,
    /// Intersection point.
    pub point: Point3,
    /// Index of the triangle that was hit.
    pub triangle: u32,
}

/// Bounding volume hierarchy over a triangle mesh, in the mesh's local frame.
#[derive(Debug, Clone)]
pub struct MeshBvh {
    bvh: Bvh,
    triangles: Vec<Triangle>,
}

impl MeshBvh {
    /// Build over every triangle of `mesh`.
    pub fn build(mesh: &TriangleMesh, max_leaf_size: usize) -> Self {
        Self::from_triangles(mesh.triangles().collect(), max_leaf_size)
    }

    /// Build over an explicit triangle list.
    pub fn from_triangles(triangles: Vec<Triangle>, max_leaf_size: usize) -> Self {
        let bounds: Vec<Aabb3> = triangles.iter().map(Triangle::bounds).collect();
        Self {
            bvh: Bvh::build(&bounds, max_leaf_size),
            triangles,
        }
    }

    /// The underlying tree.
    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    /// Triangle `index`.
    pub fn triangle(&self, index: u32) -> &Triangle {
        &self.triangles[index as usize]
    }

    /// All triangles in mesh order.
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// Bounds of the whole mesh.
    pub fn bounds(&self) -> Aabb3 {
        self.bvh.bounds()
    }

    /// All hits along the ray, sorted by `t`.
    pub fn raycast(&self, ray: &Ray) -> Vec<RayHit> {
        let mut hits = Vec::new();
        self.bvh.raycast(ray, f64::INFINITY, |p| {
            if let Some(t) = intersect_triangle(ray, &self.triangles[p as usize]) {
                hits.push(RayHit {
                    t,
                    point: ray.at(t),
                    triangle: p,
                });
            }
        });
        hits.sort_by(|a, b| a.t.total_cmp(&b.t));
        hits
    }

    /// Closest hit along the ray.
    pub fn raycast_first(&self, ray: &Ray) -> Option<RayHit> {
        self.raycast(ray).into_iter().next()
    }

    /// Shape cast over triangles; see [`Bvh::shapecast`].
    pub fn shapecast<B, P>(&self, intersects_bounds: B, mut intersects_triangle: P) -> bool
    where
        B: FnMut(&Aabb3) -> bool,
        P: FnMut(u32, &Triangle) -> bool,
    {
        self.bvh.shapecast(intersects_bounds, |p| {
            intersects_triangle(p, &self.triangles[p as usize])
        })
    }

    /// Candidate triangle pairs between two meshes; see [`Bvh::bvhcast`].
    pub fn bvhcast<F>(&self, other: &MeshBvh, other_to_self: &Transform, visit: F) -> bool
    where
        F: FnMut(u32, u32) -> bool,
    {
        self.bvh.bvhcast(&other.bvh, other_to_self, visit)
    }
}

/// Möller–Trumbore ray/triangle test (double-sided).
fn intersect_triangle(ray: &Ray, tri: &Triangle) -> Option<f64> {
    let [a, b, c] = tri.points();
    let e1 = b - a;
    let e2 = c - a;
    let p = ray.direction.cross(&e2);
    let det = e1.dot(&p);
    if det.abs() < EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = ray.origin - a;
    let u = s.dot(&p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(&e1);
    let v = ray.direction.dot(&q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(&q) * inv_det;
    (t >= 0.0).then_some(t)
}
