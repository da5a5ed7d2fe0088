//! Edges where surfaces cross each other.

use planview_bvh::MeshBvh;
use planview_geom::intersect::triangle_intersection;
use planview_geom::{Line3, Transform, Triangle, POINT_EPSILON};

/// Distance under which two corners count as the same vertex.
pub const VERTEX_MATCH_EPSILON: f64 = 1e-7;

/// Pairs with `|n1 . n2|` above `1 - COPLANAR_EPSILON` are treated as coplanar.
pub const COPLANAR_EPSILON: f64 = 1e-9;

/// Intersection segment of two triangles that genuinely cross.
///
/// Rejects adjacent pairs (two or more shared corners), near-coplanar pairs
/// and segments that coincide with an edge of either triangle.
pub fn crossing_segment(a: &Triangle, b: &Triangle) -> Option<Line3> {
    if a.shared_vertex_count(b, VERTEX_MATCH_EPSILON) >= 2 {
        return None;
    }
    let (na, nb) = (a.normal()?, b.normal()?);
    if na.dot(&nb).abs() > 1.0 - COPLANAR_EPSILON {
        return None;
    }
    let segment = triangle_intersection(a, b)?;
    if segment.is_degenerate(POINT_EPSILON)
        || a.has_edge(&segment, VERTEX_MATCH_EPSILON)
        || b.has_edge(&segment, VERTEX_MATCH_EPSILON)
    {
        return None;
    }
    Some(segment)
}

/// Crossing segments of a mesh with itself, in the mesh's frame.
///
/// Each unordered triangle pair is tested once.
pub fn self_intersections(mesh: &MeshBvh) -> Vec<Line3> {
    let mut segments = Vec::new();
    mesh.bvhcast(mesh, &Transform::identity(), |i, j| {
        if i < j {
            if let Some(s) = crossing_segment(mesh.triangle(i), mesh.triangle(j)) {
                segments.push(s);
            }
        }
        false
    });
    segments
}

/// Crossing segments between two meshes, in `a`'s frame.
///
/// `b_to_a` maps `b`'s frame into `a`'s.
pub fn mesh_intersections(a: &MeshBvh, b: &MeshBvh, b_to_a: &Transform) -> Vec<Line3> {
    let mut segments = Vec::new();
    let identity = b_to_a.is_identity();
    a.bvhcast(b, b_to_a, |i, j| {
        let tb = if identity {
            b.triangle(j).clone()
        } else {
            b.triangle(j).transformed(b_to_a)
        };
        if let Some(s) = crossing_segment(a.triangle(i), &tb) {
            segments.push(s);
        }
        false
    });
    segments
}
