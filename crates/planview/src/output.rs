//! Flat, renderable output buffers.

use planview_geom::{Line3, Point3};
use serde::{Deserialize, Serialize};

/// Line segments as a flat position buffer.
///
/// Segment `i` spans `positions[6i..6i + 6]` and came from input edge
/// `edge_indices[i]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineGeometry {
    /// `[x0, y0, z0, x1, y1, z1, ...]`, two points per segment.
    pub positions: Vec<f32>,
    /// Originating edge of each segment.
    pub edge_indices: Vec<u32>,
}

impl LineGeometry {
    /// Empty geometry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment.
    pub fn push(&mut self, line: &Line3, edge_index: u32) {
        for p in [line.start, line.end] {
            self.positions
                .extend([p.x as f32, p.y as f32, p.z as f32]);
        }
        self.edge_indices.push(edge_index);
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.edge_indices.len()
    }

    /// True if there are no segments.
    pub fn is_empty(&self) -> bool {
        self.edge_indices.is_empty()
    }

    /// Segment `i`.
    pub fn segment(&self, i: usize) -> Line3 {
        let p = &self.positions[i * 6..i * 6 + 6];
        Line3::new(
            Point3::new(p[0] as f64, p[1] as f64, p[2] as f64),
            Point3::new(p[3] as f64, p[4] as f64, p[5] as f64),
        )
    }
}

/// Filled triangles as a flat position buffer, nine floats per triangle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FillGeometry {
    /// `[x0, y0, z0, x1, y1, z1, x2, y2, z2, ...]`.
    pub positions: Vec<f32>,
}

impl FillGeometry {
    /// Append a triangle.
    pub fn push(&mut self, tri: &[Point3; 3]) {
        for p in tri {
            self.positions
                .extend([p.x as f32, p.y as f32, p.z as f32]);
        }
    }

    /// Number of triangles.
    pub fn len(&self) -> usize {
        self.positions.len() / 9
    }

    /// True if there are no triangles.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
