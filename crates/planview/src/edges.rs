//! Candidate edge extraction from mesh topology.
//!
//! Vertices are merged by quantizing coordinates to `10^-precision` and
//! keying on the resulting integer triple, so unindexed triangle soups pair
//! up the same way indexed meshes do.

use std::collections::HashMap;

use planview_geom::{Line3, Point3, Transform, TriangleMesh, Vec3};
use serde::{Deserialize, Serialize};

use crate::task::{run_to_completion, Resumable, Step};

/// Why an edge is a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Dihedral angle above the threshold.
    Crease,
    /// Adjacent faces point to opposite sides of the projection direction.
    Silhouette,
    /// Edge used by a single triangle.
    Boundary,
    /// Curve where two surfaces cross.
    Intersection,
}

/// A candidate edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    /// Segment in world (or local, before placement) space.
    pub line: Line3,
    /// Origin of the edge.
    pub kind: EdgeKind,
}

impl Edge {
    /// Create an edge.
    pub fn new(line: Line3, kind: EdgeKind) -> Self {
        Self { line, kind }
    }

    /// A transformed copy.
    pub fn transformed(&self, transform: &Transform) -> Self {
        Self {
            line: self.line.transformed(transform),
            kind: self.kind,
        }
    }
}

type VertexKey = (i64, i64, i64);
type EdgeKey = (VertexKey, VertexKey);

struct EdgeRecord {
    normal: Vec3,
    line: Line3,
}

/// Resumable edge extraction over one mesh; one triangle per step.
pub struct EdgeExtractor<'a> {
    mesh: &'a TriangleMesh,
    direction: Option<Vec3>,
    cos_threshold: f64,
    quantum: f64,
    cursor: usize,
    pending: HashMap<EdgeKey, usize>,
    records: Vec<Option<EdgeRecord>>,
    edges: Vec<Edge>,
    skipped_triangles: usize,
    flushed: bool,
}

impl<'a> EdgeExtractor<'a> {
    /// Set up extraction.
    ///
    /// `direction` enables the silhouette test; `angle_threshold` is in
    /// degrees; `precision` is the number of decimal digits kept when merging
    /// vertices.
    pub fn new(
        mesh: &'a TriangleMesh,
        direction: Option<Vec3>,
        angle_threshold: f64,
        precision: u32,
    ) -> Self {
        Self {
            mesh,
            direction,
            cos_threshold: angle_threshold.to_radians().cos(),
            quantum: 10f64.powi(precision as i32),
            cursor: 0,
            pending: HashMap::new(),
            records: Vec::new(),
            edges: Vec::new(),
            skipped_triangles: 0,
            flushed: false,
        }
    }

    /// Number of triangles skipped as degenerate so far.
    pub fn skipped_triangles(&self) -> usize {
        self.skipped_triangles
    }

    fn key(&self, p: &Point3) -> VertexKey {
        (
            (p.x * self.quantum).round() as i64,
            (p.y * self.quantum).round() as i64,
            (p.z * self.quantum).round() as i64,
        )
    }

    fn visit_triangle(&mut self, t: usize) {
        let tri = self.mesh.triangle(t);
        if !tri.is_finite() {
            self.skipped_triangles += 1;
            return;
        }
        let points = tri.points();
        let keys = points.map(|p| self.key(&p));
        if keys[0] == keys[1] || keys[1] == keys[2] || keys[2] == keys[0] {
            self.skipped_triangles += 1;
            return;
        }
        let Some(normal) = tri.normal() else {
            self.skipped_triangles += 1;
            return;
        };

        for i in 0..3 {
            let j = (i + 1) % 3;
            let forward = (keys[i], keys[j]);
            let reverse = (keys[j], keys[i]);

            // Inconsistently wound neighbours share the edge in the same direction.
            let matched = self
                .pending
                .remove(&reverse)
                .or_else(|| self.pending.remove(&forward));
            match matched {
                Some(slot) => {
                    if let Some(record) = self.records[slot].take() {
                        if let Some(kind) = self.classify(&record.normal, &normal) {
                            self.edges.push(Edge::new(record.line, kind));
                        }
                    }
                }
                None => {
                    self.pending.insert(forward, self.records.len());
                    self.records.push(Some(EdgeRecord {
                        normal,
                        line: Line3::new(points[i], points[j]),
                    }));
                }
            }
        }
    }

    fn classify(&self, n1: &Vec3, n2: &Vec3) -> Option<EdgeKind> {
        if let Some(d) = self.direction {
            if n1.dot(&d) * n2.dot(&d) < 0.0 {
                return Some(EdgeKind::Silhouette);
            }
        }
        (n1.dot(n2) <= self.cos_threshold).then_some(EdgeKind::Crease)
    }

    fn flush_boundary(&mut self) {
        let boundary = self
            .records
            .drain(..)
            .flatten()
            .map(|r| Edge::new(r.line, EdgeKind::Boundary));
        self.edges.extend(boundary);
        self.pending.clear();
        self.flushed = true;
    }
}

impl Resumable for EdgeExtractor<'_> {
    type Output = Vec<Edge>;
    type Snapshot = [Edge];

    fn step(&mut self) -> Step {
        if self.cursor < self.mesh.num_triangles() {
            self.visit_triangle(self.cursor);
            self.cursor += 1;
        }
        if self.cursor >= self.mesh.num_triangles() {
            if !self.flushed {
                self.flush_boundary();
            }
            Step::Done
        } else {
            Step::Continue
        }
    }

    fn progress(&self) -> f64 {
        match self.mesh.num_triangles() {
            0 => 1.0,
            n => self.cursor as f64 / n as f64,
        }
    }

    fn snapshot(&self) -> &[Edge] {
        &self.edges
    }

    fn finish(mut self) -> Vec<Edge> {
        if !self.flushed {
            self.flush_boundary();
        }
        self.edges
    }
}

/// Extract candidate edges from a mesh in one call.
pub fn extract_edges(
    mesh: &TriangleMesh,
    direction: Option<Vec3>,
    angle_threshold: f64,
    precision: u32,
) -> Vec<Edge> {
    run_to_completion(EdgeExtractor::new(
        mesh,
        direction,
        angle_threshold,
        precision,
    ))
}

/// Projection direction expressed in an instance's local frame.
///
/// The world direction is inverse-transformed and negated when the placement
/// mirrors, matching the flipped winding of mirrored triangles. Returns `None`
/// for a singular placement.
pub fn local_direction(world_direction: &Vec3, local_to_world: &Transform) -> Option<Vec3> {
    let inverse = local_to_world.inverse()?;
    let local = inverse.apply_vec(world_direction);
    let len = local.norm();
    if !len.is_finite() || len < planview_geom::EPSILON {
        return None;
    }
    let local = local / len;
    Some(if local_to_world.is_mirroring() {
        -local
    } else {
        local
    })
}
