//! Hidden-interval resolution for candidate edges.
//!
//! All tests run in the view frame, where the viewer sits at +Z. A triangle
//! hides the part of an edge that lies strictly beneath its plane and inside
//! its footprint on the XY plane. Each edge accumulates an [`IntervalSet`] of
//! hidden parameter ranges; once that set covers the whole edge no further
//! triangles are tested against it.

use planview_bvh::{Bvh, MeshBvh};
use planview_geom::{Aabb3, Line3, Point3, Ray, Transform, Triangle, ViewFrame};
use rayon::prelude::*;
use tracing::debug;

use crate::edges::{Edge, EdgeKind};
use crate::intervals::{Interval, IntervalSet, INTERVAL_EPSILON};
use crate::output::LineGeometry;
use crate::scene::IndexedInstance;
use crate::settings::OcclusionStrategy;
use crate::task::{Resumable, Step};

/// Depth and footprint tolerance, relative to the scene's view-space diagonal.
pub const RELATIVE_TOLERANCE: f64 = 1e-7;

/// Share of progress spent collecting candidate pairs in the batched strategy.
const COLLECT_WEIGHT: f64 = 0.2;

/// A piece of an edge, tagged with where it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaggedSegment {
    /// Segment in world space.
    pub line: Line3,
    /// Index of the originating edge in [`EdgeVisibility::edges`].
    pub edge_index: u32,
    /// Kind of the originating edge.
    pub kind: EdgeKind,
}

/// Which side of the visibility split to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSet {
    /// Parts not covered by any triangle.
    Visible,
    /// Parts beneath some triangle.
    Hidden,
}

/// Edges with their hidden intervals.
#[derive(Debug, Clone, Default)]
pub struct EdgeVisibility {
    edges: Vec<Edge>,
    hidden: Vec<IntervalSet>,
}

impl EdgeVisibility {
    /// Fully visible edges.
    pub fn from_edges(edges: Vec<Edge>) -> Self {
        let hidden = vec![IntervalSet::new(); edges.len()];
        Self { edges, hidden }
    }

    /// Append a fully visible edge.
    pub fn push_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
        self.hidden.push(IntervalSet::new());
    }

    /// The edges, in world space.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// True if there are no edges.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Hidden intervals of edge `index`.
    pub fn hidden_intervals(&self, index: usize) -> &IntervalSet {
        &self.hidden[index]
    }

    /// Mark part of edge `index` as hidden.
    pub fn hide(&mut self, index: usize, interval: Interval) {
        self.hidden[index].insert(interval);
    }

    /// Keep only the edges for which `keep` returns true.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Edge) -> bool,
    {
        let edges = std::mem::take(&mut self.edges);
        let hidden = std::mem::take(&mut self.hidden);
        for (edge, set) in edges.into_iter().zip(hidden) {
            if keep(&edge) {
                self.edges.push(edge);
                self.hidden.push(set);
            }
        }
    }

    /// Drop everything but the edges.
    pub fn into_edges(self) -> Vec<Edge> {
        self.edges
    }

    /// Number of edges hidden end to end.
    pub fn fully_hidden_count(&self) -> usize {
        self.hidden.iter().filter(|s| s.is_full()).count()
    }

    /// Visible pieces of every edge.
    pub fn visible_segments(&self) -> Vec<TaggedSegment> {
        self.segments(LineSet::Visible)
    }

    /// Hidden pieces of every edge.
    pub fn hidden_segments(&self) -> Vec<TaggedSegment> {
        self.segments(LineSet::Hidden)
    }

    /// One side of the split as a flat line buffer.
    pub fn to_line_geometry(&self, set: LineSet) -> LineGeometry {
        let mut geometry = LineGeometry::new();
        for segment in self.segments(set) {
            geometry.push(&segment.line, segment.edge_index);
        }
        geometry
    }

    fn segments(&self, set: LineSet) -> Vec<TaggedSegment> {
        let mut out = Vec::new();
        for (index, (edge, hidden)) in self.edges.iter().zip(&self.hidden).enumerate() {
            let ranges = match set {
                LineSet::Visible => hidden.complement(),
                LineSet::Hidden => hidden.intervals().to_vec(),
            };
            out.extend(ranges.into_iter().map(|r| TaggedSegment {
                line: edge.line.slice(r.start, r.end),
                edge_index: index as u32,
                kind: edge.kind,
            }));
        }
        out
    }
}

/// The range of `edge` hidden by `triangle`, both in view space.
///
/// Returns `None` when the triangle sits entirely below the edge, has no
/// footprint, owns the edge, or covers less than [`INTERVAL_EPSILON`] of it.
pub fn hidden_range(edge: &Line3, triangle: &Triangle, tolerance: f64) -> Option<Interval> {
    let edge_min_z = edge.start.z.min(edge.end.z);
    if triangle.max_z() <= edge_min_z + tolerance
        || triangle.is_degenerate_projected()
        || triangle.has_edge(edge, tolerance)
    {
        return None;
    }

    let plane = triangle.plane()?;
    let plane = if plane.normal.z < 0.0 {
        plane.flipped()
    } else {
        plane
    };
    let s0 = plane.signed_distance(&edge.start);
    let s1 = plane.signed_distance(&edge.end);
    let (t0, t1) = match (s0 < -tolerance, s1 < -tolerance) {
        (true, true) => (0.0, 1.0),
        (false, false) => return None,
        (below_start, _) => {
            let t = (s0 / (s0 - s1)).clamp(0.0, 1.0);
            if below_start {
                (0.0, t)
            } else {
                (t, 1.0)
            }
        }
    };

    let (lo, hi) = clip_to_footprint(&edge.at(t0), &edge.at(t1), triangle, tolerance)?;
    let interval = Interval::new(t0 + lo * (t1 - t0), t0 + hi * (t1 - t0))?;
    (interval.length() > INTERVAL_EPSILON).then_some(interval)
}

/// Parameter range of `p0 -> p1` inside the triangle's XY footprint.
///
/// Boundaries count as inside, widened by `tolerance`.
fn clip_to_footprint(
    p0: &Point3,
    p1: &Point3,
    triangle: &Triangle,
    tolerance: f64,
) -> Option<(f64, f64)> {
    let [a, b, c] = triangle.points();
    let winding = ((b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)).signum();
    let (mut lo, mut hi) = (0.0f64, 1.0f64);
    for (u, v) in [(a, b), (b, c), (c, a)] {
        let (ex, ey) = (v.x - u.x, v.y - u.y);
        let slack = tolerance * ex.hypot(ey);
        let side = |p: &Point3| winding * (ex * (p.y - u.y) - ey * (p.x - u.x)) + slack;
        let (g0, g1) = (side(p0), side(p1));
        if g0 < 0.0 && g1 < 0.0 {
            return None;
        }
        if g0 < 0.0 {
            lo = lo.max(g0 / (g0 - g1));
        } else if g1 < 0.0 {
            hi = hi.min(g0 / (g0 - g1));
        }
        if lo > hi {
            return None;
        }
    }
    Some((lo, hi))
}

/// One mesh as seen by the resolver.
struct ViewMesh {
    bvh: MeshBvh,
    view_from_local: Transform,
    triangles: Vec<Triangle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Candidate {
    edge: u32,
    mesh: u32,
    triangle: u32,
}

enum Stage {
    Collect {
        next_mesh: usize,
        edge_bvh: Bvh,
        candidates: Vec<Candidate>,
    },
    Batched {
        candidates: Vec<Candidate>,
        next: usize,
    },
    PerEdge {
        next_edge: usize,
    },
    Done,
}

/// Resumable hidden-interval computation over a placed scene.
///
/// The batched strategy takes one step per mesh while collecting candidate
/// pairs and then one step per edge; the per-edge strategy takes one step
/// per edge.
pub struct OcclusionResolver {
    meshes: Vec<ViewMesh>,
    view_lines: Vec<Line3>,
    visibility: EdgeVisibility,
    tolerance: f64,
    stage: Stage,
    filtered: usize,
    pair_tests: usize,
}

impl OcclusionResolver {
    /// Prepare resolution of `edges` (world space) against `instances`.
    ///
    /// Edges with no extent on the projection plane are dropped here.
    pub fn new(
        instances: Vec<IndexedInstance>,
        frame: &ViewFrame,
        edges: Vec<Edge>,
        strategy: OcclusionStrategy,
        edge_leaf_size: usize,
    ) -> Self {
        let meshes: Vec<ViewMesh> = instances
            .into_par_iter()
            .map(|instance| {
                let view_from_local = frame.view_from(&instance.transform);
                let triangles = instance
                    .bvh
                    .triangles()
                    .iter()
                    .map(|t| t.transformed(&view_from_local))
                    .collect();
                ViewMesh {
                    bvh: instance.bvh,
                    view_from_local,
                    triangles,
                }
            })
            .collect();

        let mut view_bounds = Aabb3::empty();
        for mesh in &meshes {
            for t in &mesh.triangles {
                view_bounds.include_aabb(&t.bounds());
            }
        }
        let tolerance = if view_bounds.is_empty() {
            f64::EPSILON
        } else {
            ((view_bounds.max - view_bounds.min).norm() * RELATIVE_TOLERANCE).max(f64::EPSILON)
        };

        let total = edges.len();
        let (kept, view_lines): (Vec<Edge>, Vec<Line3>) = edges
            .into_iter()
            .map(|e| {
                let view = e.line.transformed(frame.to_view());
                (e, view)
            })
            .filter(|(_, v)| (v.end.x - v.start.x).hypot(v.end.y - v.start.y) > tolerance)
            .unzip();
        let filtered = total - kept.len();
        if filtered > 0 {
            debug!(filtered, "dropped edges parallel to the projection axis");
        }

        let stage = if kept.is_empty() || meshes.is_empty() {
            Stage::Done
        } else {
            match strategy {
                OcclusionStrategy::PerEdge => Stage::PerEdge { next_edge: 0 },
                OcclusionStrategy::Batched => {
                    let top = view_bounds.max.z;
                    let boxes: Vec<Aabb3> = view_lines
                        .iter()
                        .map(|line| {
                            let mut b = line.bounds();
                            b.max.z = b.max.z.max(top);
                            b.expand(tolerance);
                            b
                        })
                        .collect();
                    Stage::Collect {
                        next_mesh: 0,
                        edge_bvh: Bvh::build(&boxes, edge_leaf_size.max(2)),
                        candidates: Vec::new(),
                    }
                }
            }
        };

        Self {
            meshes,
            view_lines,
            visibility: EdgeVisibility::from_edges(kept),
            tolerance,
            stage,
            filtered,
            pair_tests: 0,
        }
    }

    /// Edges dropped for having no projected length.
    pub fn filtered_edges(&self) -> usize {
        self.filtered
    }

    /// Edge-triangle pairs evaluated so far.
    pub fn pair_tests(&self) -> usize {
        self.pair_tests
    }

    /// Depth and footprint tolerance in view units.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    fn step_collect(&mut self) -> Option<Stage> {
        let Stage::Collect {
            next_mesh,
            edge_bvh,
            candidates,
        } = &mut self.stage
        else {
            return None;
        };
        let mesh_index = *next_mesh;
        let mesh = &self.meshes[mesh_index];
        edge_bvh.bvhcast(mesh.bvh.bvh(), &mesh.view_from_local, |edge, triangle| {
            candidates.push(Candidate {
                edge,
                mesh: mesh_index as u32,
                triangle,
            });
            false
        });
        *next_mesh += 1;
        if *next_mesh < self.meshes.len() {
            return None;
        }

        let mut candidates = std::mem::take(candidates);
        candidates.sort_unstable();
        debug!(pairs = candidates.len(), "collected occlusion candidates");
        Some(if candidates.is_empty() {
            Stage::Done
        } else {
            Stage::Batched {
                candidates,
                next: 0,
            }
        })
    }

    fn step_batch(&mut self) -> Option<Stage> {
        let Stage::Batched { candidates, next } = &mut self.stage else {
            return None;
        };
        let edge = candidates[*next].edge as usize;
        let line = &self.view_lines[edge];
        let hidden = &mut self.visibility.hidden[edge];
        let mut cursor = *next;
        while cursor < candidates.len() && candidates[cursor].edge as usize == edge {
            if !hidden.is_full() {
                let c = candidates[cursor];
                let triangle = &self.meshes[c.mesh as usize].triangles[c.triangle as usize];
                self.pair_tests += 1;
                if let Some(range) = hidden_range(line, triangle, self.tolerance) {
                    hidden.insert(range);
                }
            }
            cursor += 1;
        }
        *next = cursor;
        (cursor >= candidates.len()).then_some(Stage::Done)
    }

    fn step_edge(&mut self) -> Option<Stage> {
        let Stage::PerEdge { next_edge } = &mut self.stage else {
            return None;
        };
        let edge = *next_edge;
        let line = self.view_lines[edge];
        let tolerance = self.tolerance;
        let hidden = &mut self.visibility.hidden[edge];
        let edge_box = line.bounds();
        let (z_min, z_max) = (edge_box.min.z, edge_box.max.z);
        let ray = Ray::new(line.start, line.delta());
        let length = line.length();

        for mesh in &self.meshes {
            let tests = &mut self.pair_tests;
            let done = mesh.bvh.shapecast(
                |local| {
                    let b = local.transformed(&mesh.view_from_local);
                    if b.max.z <= z_min {
                        return false;
                    }
                    if b.max.x < edge_box.min.x - tolerance
                        || b.min.x > edge_box.max.x + tolerance
                        || b.max.y < edge_box.min.y - tolerance
                        || b.min.y > edge_box.max.y + tolerance
                    {
                        return false;
                    }
                    let column = Aabb3::new(
                        Point3::new(b.min.x - tolerance, b.min.y - tolerance, z_min - tolerance),
                        Point3::new(b.max.x + tolerance, b.max.y + tolerance, z_max + tolerance),
                    );
                    ray.hits_aabb_within(&column, length)
                },
                |index, _| {
                    *tests += 1;
                    if let Some(range) =
                        hidden_range(&line, &mesh.triangles[index as usize], tolerance)
                    {
                        hidden.insert(range);
                    }
                    hidden.is_full()
                },
            );
            if done {
                break;
            }
        }

        *next_edge += 1;
        (*next_edge >= self.view_lines.len()).then_some(Stage::Done)
    }
}

impl Resumable for OcclusionResolver {
    type Output = EdgeVisibility;
    type Snapshot = EdgeVisibility;

    fn step(&mut self) -> Step {
        let next = match self.stage {
            Stage::Collect { .. } => self.step_collect(),
            Stage::Batched { .. } => self.step_batch(),
            Stage::PerEdge { .. } => self.step_edge(),
            Stage::Done => return Step::Done,
        };
        if let Some(stage) = next {
            self.stage = stage;
        }
        match self.stage {
            Stage::Done => {
                debug!(
                    edges = self.visibility.len(),
                    fully_hidden = self.visibility.fully_hidden_count(),
                    pair_tests = self.pair_tests,
                    "occlusion resolved"
                );
                Step::Done
            }
            _ => Step::Continue,
        }
    }

    fn progress(&self) -> f64 {
        match &self.stage {
            Stage::Collect { next_mesh, .. } => {
                COLLECT_WEIGHT * *next_mesh as f64 / self.meshes.len().max(1) as f64
            }
            Stage::Batched { candidates, next } => {
                COLLECT_WEIGHT
                    + (1.0 - COLLECT_WEIGHT) * *next as f64 / candidates.len().max(1) as f64
            }
            Stage::PerEdge { next_edge } => {
                *next_edge as f64 / self.view_lines.len().max(1) as f64
            }
            Stage::Done => 1.0,
        }
    }

    fn snapshot(&self) -> &EdgeVisibility {
        &self.visibility
    }

    fn finish(self) -> EdgeVisibility {
        self.visibility
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{index_scene, Scene};
    use crate::task::run_to_completion;
    use approx::assert_relative_eq;
    use planview_geom::TriangleMesh;

    /// Unit square at height `z`, facing +Z.
    fn plate(z: f32) -> TriangleMesh {
        TriangleMesh::from_soup(vec![
            0.0, 0.0, z, 1.0, 0.0, z, 1.0, 1.0, z, //
            0.0, 0.0, z, 1.0, 1.0, z, 0.0, 1.0, z,
        ])
        .unwrap()
    }

    fn line(a: [f64; 3], b: [f64; 3]) -> Line3 {
        Line3::new(Point3::new(a[0], a[1], a[2]), Point3::new(b[0], b[1], b[2]))
    }

    fn big_triangle(z: f64) -> Triangle {
        Triangle::new(
            Point3::new(-10.0, -10.0, z),
            Point3::new(10.0, -10.0, z),
            Point3::new(0.0, 10.0, z),
        )
    }

    fn resolve(edges: Vec<Edge>, strategy: OcclusionStrategy) -> EdgeVisibility {
        let scene = Scene::single(plate(1.0));
        let instances = index_scene(&scene, 2);
        run_to_completion(OcclusionResolver::new(
            instances,
            &ViewFrame::top_down(),
            edges,
            strategy,
            2,
        ))
    }

    #[test]
    fn test_edge_below_is_fully_hidden() {
        let e = line([-1.0, 0.0, 0.0], [1.0, 0.0, 0.0]);
        assert_eq!(hidden_range(&e, &big_triangle(1.0), 1e-9), Some(Interval::FULL));
    }

    #[test]
    fn test_edge_above_is_untouched() {
        let e = line([-1.0, 0.0, 2.0], [1.0, 0.0, 2.0]);
        assert!(hidden_range(&e, &big_triangle(1.0), 1e-9).is_none());
    }

    #[test]
    fn test_edge_crossing_plane_is_trimmed() {
        // Rises from z = 0 to z = 2 through a plate at z = 1.
        let e = line([-1.0, 0.0, 0.0], [1.0, 0.0, 2.0]);
        let range = hidden_range(&e, &big_triangle(1.0), 1e-9).unwrap();
        assert_relative_eq!(range.start, 0.0);
        assert_relative_eq!(range.end, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_partial_footprint_overlap() {
        let t = Triangle::new(
            Point3::new(0.0, -1.0, 1.0),
            Point3::new(1.0, -1.0, 1.0),
            Point3::new(0.5, 5.0, 1.0),
        );
        let e = line([-1.0, -0.5, 0.0], [3.0, -0.5, 0.0]);
        let range = hidden_range(&e, &t, 1e-9).unwrap();
        // Footprint spans x in [0.0417, 0.9583] at y = -0.5.
        let width = 1.0 - 1.0 / 12.0;
        assert_relative_eq!(range.length() * 4.0, width, epsilon = 1e-9);
    }

    #[test]
    fn test_own_edge_is_skipped() {
        let t = big_triangle(1.0);
        let own = t.edges()[0];
        assert!(hidden_range(&own, &t, 1e-9).is_none());
    }

    #[test]
    fn test_vertical_triangle_is_skipped() {
        let wall = Triangle::new(
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 5.0),
        );
        let e = line([-1.0, 0.0, -1.0], [1.0, 0.0, -1.0]);
        assert!(hidden_range(&e, &wall, 1e-9).is_none());
    }

    #[test]
    fn test_resolver_hides_middle_third() {
        let e = Edge::new(line([-1.0, 0.5, 0.0], [2.0, 0.5, 0.0]), EdgeKind::Crease);
        let vis = resolve(vec![e], OcclusionStrategy::Batched);
        let hidden = vis.hidden_intervals(0).intervals();
        assert_eq!(hidden.len(), 1);
        assert_relative_eq!(hidden[0].start, 1.0 / 3.0, epsilon = 1e-6);
        assert_relative_eq!(hidden[0].end, 2.0 / 3.0, epsilon = 1e-6);

        let visible = vis.visible_segments();
        assert_eq!(visible.len(), 2);
        assert!(visible.iter().all(|s| s.edge_index == 0));
        assert_relative_eq!(visible[0].line.end.x, 0.0, epsilon = 1e-6);
        assert_eq!(vis.to_line_geometry(LineSet::Hidden).len(), 1);
    }

    #[test]
    fn test_vertical_edges_are_filtered() {
        let vertical = Edge::new(line([0.5, 0.5, 0.0], [0.5, 0.5, 3.0]), EdgeKind::Crease);
        let flat = Edge::new(line([0.2, 0.5, 0.0], [0.8, 0.5, 0.0]), EdgeKind::Boundary);
        let scene = Scene::single(plate(1.0));
        let mut resolver = OcclusionResolver::new(
            index_scene(&scene, 2),
            &ViewFrame::top_down(),
            vec![vertical, flat],
            OcclusionStrategy::PerEdge,
            2,
        );
        assert_eq!(resolver.filtered_edges(), 1);
        while resolver.step() == Step::Continue {}
        let vis = resolver.finish();
        assert_eq!(vis.len(), 1);
        assert!(vis.hidden_intervals(0).is_full());
    }

    #[test]
    fn test_strategies_agree() {
        let edges: Vec<Edge> = (0..12)
            .map(|i| {
                let y = -0.25 + i as f64 * 0.125;
                let z = if i % 3 == 0 { 2.0 } else { 0.5 };
                Edge::new(line([-0.5, y, z], [1.5, y + 0.3, 0.0]), EdgeKind::Crease)
            })
            .collect();
        let batched = resolve(edges.clone(), OcclusionStrategy::Batched);
        let per_edge = resolve(edges, OcclusionStrategy::PerEdge);
        assert_eq!(batched.len(), per_edge.len());
        for i in 0..batched.len() {
            let a = batched.hidden_intervals(i).intervals();
            let b = per_edge.hidden_intervals(i).intervals();
            assert_eq!(a.len(), b.len(), "edge {i}");
            for (x, y) in a.iter().zip(b) {
                assert_relative_eq!(x.start, y.start, epsilon = 1e-12);
                assert_relative_eq!(x.end, y.end, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_empty_scene_leaves_edges_visible() {
        let e = Edge::new(line([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]), EdgeKind::Boundary);
        let resolver = OcclusionResolver::new(
            Vec::new(),
            &ViewFrame::top_down(),
            vec![e],
            OcclusionStrategy::Batched,
            4,
        );
        let vis = run_to_completion(resolver);
        assert_eq!(vis.visible_segments().len(), 1);
        assert!(vis.hidden_segments().is_empty());
    }

    #[test]
    fn test_retain_keeps_intervals_aligned() {
        let mut vis = EdgeVisibility::from_edges(vec![
            Edge::new(line([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]), EdgeKind::Crease),
            Edge::new(line([0.0, 1.0, 0.0], [1.0, 1.0, 0.0]), EdgeKind::Boundary),
        ]);
        vis.hide(1, Interval::FULL);
        vis.retain(|e| e.kind == EdgeKind::Boundary);
        assert_eq!(vis.len(), 1);
        assert!(vis.hidden_intervals(0).is_full());
    }
}
