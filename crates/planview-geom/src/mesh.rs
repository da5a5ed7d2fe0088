//! Triangle mesh buffers.

use crate::{Aabb3, GeomError, Point3, Result, Triangle};

/// Triangle mesh as flat position and optional index buffers.
///
/// Without an index buffer every three consecutive vertices form a triangle.
///
/// The buffers are public. After editing them, call [`TriangleMesh::validate`]
/// again before handing the mesh to anything that reads triangles: the
/// accessors index the buffers directly and panic on out-of-range indices.
#[derive(Debug, Clone, Default)]
pub struct TriangleMesh {
    /// Flat array of vertex positions: `[x0, y0, z0, x1, y1, z1, ...]`.
    pub vertices: Vec<f32>,
    /// Optional flat array of triangle indices.
    pub indices: Option<Vec<u32>>,
}

impl TriangleMesh {
    /// Create a mesh, checking buffer shapes and index bounds.
    pub fn new(vertices: Vec<f32>, indices: Option<Vec<u32>>) -> Result<Self> {
        let mesh = Self { vertices, indices };
        mesh.validate()?;
        Ok(mesh)
    }

    /// Create an unindexed mesh (triangle soup).
    pub fn from_soup(vertices: Vec<f32>) -> Result<Self> {
        Self::new(vertices, None)
    }

    /// Check buffer shapes and index bounds.
    pub fn validate(&self) -> Result<()> {
        if self.vertices.len() % 3 != 0 {
            return Err(GeomError::MalformedVertices(self.vertices.len()));
        }
        let vertex_count = self.num_vertices();
        match &self.indices {
            Some(indices) => {
                if indices.len() % 3 != 0 {
                    return Err(GeomError::MalformedIndices(indices.len()));
                }
                if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
                    return Err(GeomError::IndexOutOfRange {
                        index,
                        vertex_count,
                    });
                }
            }
            None => {
                if vertex_count % 3 != 0 {
                    return Err(GeomError::MalformedIndices(vertex_count));
                }
            }
        }
        Ok(())
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len() / 3,
            None => self.num_vertices() / 3,
        }
    }

    /// True if the mesh has no triangles.
    pub fn is_empty(&self) -> bool {
        self.num_triangles() == 0
    }

    /// Position of vertex `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of range.
    #[inline]
    pub fn vertex(&self, i: usize) -> Point3 {
        Point3::new(
            self.vertices[i * 3] as f64,
            self.vertices[i * 3 + 1] as f64,
            self.vertices[i * 3 + 2] as f64,
        )
    }

    /// Vertex indices of triangle `t`.
    ///
    /// # Panics
    ///
    /// Panics if `t` is out of range.
    #[inline]
    pub fn triangle_indices(&self, t: usize) -> [usize; 3] {
        match &self.indices {
            Some(indices) => [
                indices[t * 3] as usize,
                indices[t * 3 + 1] as usize,
                indices[t * 3 + 2] as usize,
            ],
            None => [t * 3, t * 3 + 1, t * 3 + 2],
        }
    }

    /// Corner positions of triangle `t`.
    #[inline]
    pub fn triangle_points(&self, t: usize) -> [Point3; 3] {
        let [i0, i1, i2] = self.triangle_indices(t);
        [self.vertex(i0), self.vertex(i1), self.vertex(i2)]
    }

    /// Triangle `t`.
    pub fn triangle(&self, t: usize) -> Triangle {
        let [a, b, c] = self.triangle_points(t);
        Triangle::new(a, b, c)
    }

    /// Iterate over all triangles in input order.
    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        (0..self.num_triangles()).map(|t| self.triangle(t))
    }

    /// Bounding box of all referenced vertices.
    ///
    /// Triangles with a non-finite corner are left out.
    pub fn bounds(&self) -> Aabb3 {
        let mut aabb = Aabb3::empty();
        for tri in self.triangles() {
            aabb.include_aabb(&tri.bounds());
        }
        aabb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexed_triangles() {
        let mesh = TriangleMesh::new(
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0],
            Some(vec![0, 1, 2, 1, 3, 2]),
        )
        .unwrap();
        assert_eq!(mesh.num_triangles(), 2);
        assert_eq!(mesh.triangle_points(1)[1], Point3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_soup_triangles() {
        let mesh = TriangleMesh::from_soup(vec![
            0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0,
        ])
        .unwrap();
        assert_eq!(mesh.num_triangles(), 1);
        assert!((mesh.triangle(0).area() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_index_out_of_range() {
        let err = TriangleMesh::new(vec![0.0; 9], Some(vec![0, 1, 3])).unwrap_err();
        assert_eq!(
            err,
            GeomError::IndexOutOfRange {
                index: 3,
                vertex_count: 3
            }
        );
    }

    #[test]
    fn test_bounds_skip_non_finite_triangles() {
        let mesh = TriangleMesh::from_soup(vec![
            0.0, 0.0, 0.0, f32::INFINITY, 0.0, 0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 1.0, 2.0, 0.0, 1.0, 0.0, 3.0, 1.0,
        ])
        .unwrap();
        let bounds = mesh.bounds();
        assert_eq!(bounds.min, Point3::new(0.0, 0.0, 1.0));
        assert_eq!(bounds.max, Point3::new(2.0, 3.0, 1.0));
    }

    #[test]
    fn test_malformed_buffers() {
        assert!(TriangleMesh::new(vec![0.0; 4], None).is_err());
        assert!(TriangleMesh::new(vec![0.0; 9], Some(vec![0, 1])).is_err());
        assert!(TriangleMesh::from_soup(vec![0.0; 6]).is_err());
    }
}
