//! End-to-end projection pipelines over a scene.
//!
//! [`EdgeProjector`] chains edge extraction, BVH construction, intersection
//! edges and occlusion into a single [`Resumable`], so the whole job can be
//! time-sliced or cancelled like any of its parts. [`OutlineProjector`] does
//! the same for the silhouette outline.

use planview_bvh::DEFAULT_LEAF_SIZE;
use planview_geom::ViewFrame;
use tracing::{debug, info, instrument};

use crate::edges::{local_direction, Edge, EdgeExtractor, EdgeKind};
use crate::error::Result;
use crate::intersections::{mesh_intersections, self_intersections};
use crate::occlusion::{EdgeVisibility, OcclusionResolver};
use crate::output::{FillGeometry, LineGeometry};
use crate::scene::{IndexedInstance, Scene};
use crate::settings::{OutlineOutput, ProjectionSettings};
use crate::silhouette::{OutlineState, SilhouetteAccumulator};
use crate::task::{drive, CancelToken, Drive, Resumable, Step, TimeSlicer};

const EXTRACT_WEIGHT: f64 = 0.2;
const INDEX_WEIGHT: f64 = 0.05;
const INTERSECT_WEIGHT: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Extract,
    Index,
    Intersect,
    Resolve,
    Done,
}

/// Resumable hidden-line projection of a scene.
///
/// One step is one triangle while extracting, one instance BVH while
/// indexing, one instance pair while intersecting, and one resolver step
/// while resolving occlusion.
pub struct EdgeProjector<'a> {
    scene: &'a Scene,
    settings: ProjectionSettings,
    frame: ViewFrame,
    phase: Phase,
    next_instance: usize,
    extractor: Option<EdgeExtractor<'a>>,
    visibility: EdgeVisibility,
    instances: Vec<IndexedInstance>,
    pairs: Vec<(usize, usize)>,
    next_pair: usize,
    resolver: Option<OcclusionResolver>,
}

impl<'a> EdgeProjector<'a> {
    /// Validate `settings` and prepare the pipeline.
    pub fn new(scene: &'a Scene, settings: &ProjectionSettings) -> Result<Self> {
        settings.validate()?;
        scene.validate()?;
        let frame = settings.view_frame()?;
        Ok(Self {
            scene,
            settings: settings.clone(),
            frame,
            phase: Phase::Extract,
            next_instance: 0,
            extractor: None,
            visibility: EdgeVisibility::default(),
            instances: Vec::new(),
            pairs: Vec::new(),
            next_pair: 0,
            resolver: None,
        })
    }

    fn step_extract(&mut self) {
        let scene = self.scene;
        if self.extractor.is_none() {
            let Some(instance) = scene.instances.get(self.next_instance) else {
                debug!(edges = self.visibility.len(), "extracted candidate edges");
                self.phase = Phase::Index;
                return;
            };
            let Some(direction) = local_direction(&self.frame.direction(), &instance.transform)
            else {
                debug!(instance = self.next_instance, "skipping singular placement");
                self.next_instance += 1;
                return;
            };
            self.extractor = Some(EdgeExtractor::new(
                &instance.mesh,
                Some(direction),
                self.settings.angle_threshold,
                self.settings.precision,
            ));
        }

        let finished = match self.extractor.as_mut() {
            Some(extractor) => extractor.step() == Step::Done,
            None => false,
        };
        if finished {
            if let Some(extractor) = self.extractor.take() {
                let transform = &scene.instances[self.next_instance].transform;
                for edge in extractor.finish() {
                    self.visibility.push_edge(edge.transformed(transform));
                }
            }
            self.next_instance += 1;
        }
    }

    fn step_index(&mut self) {
        let scene = self.scene;
        if let Some(instance) = scene.instances.get(self.instances.len()) {
            self.instances.push(IndexedInstance::build(instance, DEFAULT_LEAF_SIZE));
        }
        if self.instances.len() < scene.instances.len() {
            return;
        }
        debug!(instances = self.instances.len(), "indexed scene");
        if self.settings.include_intersection_edges {
            self.pairs = intersection_pairs(&self.instances);
        }
        self.phase = Phase::Intersect;
    }

    fn step_intersect(&mut self) {
        if let Some(&(a, b)) = self.pairs.get(self.next_pair) {
            let first = &self.instances[a];
            let segments = if a == b {
                self_intersections(&first.bvh)
            } else {
                let second = &self.instances[b];
                match first.transform.inverse() {
                    Some(inverse) => mesh_intersections(
                        &first.bvh,
                        &second.bvh,
                        &inverse.then(&second.transform),
                    ),
                    None => Vec::new(),
                }
            };
            for segment in segments {
                self.visibility.push_edge(Edge::new(
                    segment.transformed(&first.transform),
                    EdgeKind::Intersection,
                ));
            }
            self.next_pair += 1;
        }
        if self.next_pair >= self.pairs.len() {
            self.start_resolve();
        }
    }

    fn start_resolve(&mut self) {
        let edges = std::mem::take(&mut self.visibility).into_edges();
        let instances = std::mem::take(&mut self.instances);
        debug!(edges = edges.len(), "resolving occlusion");
        self.resolver = Some(OcclusionResolver::new(
            instances,
            &self.frame,
            edges,
            self.settings.occlusion_strategy,
            self.settings.edge_leaf_size,
        ));
        self.phase = Phase::Resolve;
    }

    fn step_resolve(&mut self) {
        let finished = match self.resolver.as_mut() {
            Some(resolver) => resolver.step() == Step::Done,
            None => true,
        };
        if finished {
            if let Some(resolver) = self.resolver.take() {
                self.visibility = resolver.finish();
            }
            self.phase = Phase::Done;
        }
    }
}

/// Every instance with itself, then every pair whose world bounds overlap.
fn intersection_pairs(instances: &[IndexedInstance]) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for (i, a) in instances.iter().enumerate() {
        pairs.push((i, i));
        for (j, b) in instances.iter().enumerate().skip(i + 1) {
            if a.world_bounds.overlaps(&b.world_bounds) {
                pairs.push((i, j));
            }
        }
    }
    pairs
}

impl Resumable for EdgeProjector<'_> {
    type Output = EdgeVisibility;
    type Snapshot = EdgeVisibility;

    fn step(&mut self) -> Step {
        match self.phase {
            Phase::Extract => self.step_extract(),
            Phase::Index => self.step_index(),
            Phase::Intersect => self.step_intersect(),
            Phase::Resolve => self.step_resolve(),
            Phase::Done => {}
        }
        if self.phase == Phase::Done {
            Step::Done
        } else {
            Step::Continue
        }
    }

    fn progress(&self) -> f64 {
        let resolve_start = EXTRACT_WEIGHT + INDEX_WEIGHT + INTERSECT_WEIGHT;
        match self.phase {
            Phase::Extract => {
                let total = self.scene.instances.len().max(1) as f64;
                let current = self.extractor.as_ref().map_or(0.0, |e| e.progress());
                EXTRACT_WEIGHT * (self.next_instance as f64 + current) / total
            }
            Phase::Index => {
                let total = self.scene.instances.len().max(1) as f64;
                EXTRACT_WEIGHT + INDEX_WEIGHT * self.instances.len() as f64 / total
            }
            Phase::Intersect => {
                let total = self.pairs.len().max(1) as f64;
                EXTRACT_WEIGHT + INDEX_WEIGHT + INTERSECT_WEIGHT * self.next_pair as f64 / total
            }
            Phase::Resolve => {
                let current = self.resolver.as_ref().map_or(0.0, |r| r.progress());
                resolve_start + (1.0 - resolve_start) * current
            }
            Phase::Done => 1.0,
        }
    }

    fn snapshot(&self) -> &EdgeVisibility {
        match &self.resolver {
            Some(resolver) => resolver.snapshot(),
            None => &self.visibility,
        }
    }

    fn finish(self) -> EdgeVisibility {
        match self.resolver {
            Some(resolver) => resolver.finish(),
            None => self.visibility,
        }
    }
}

/// Outline geometry in the forms requested by [`OutlineOutput`].
#[derive(Debug, Clone)]
pub struct OutlineResult {
    /// The accumulated outline.
    pub state: OutlineState,
    /// Triangulated fill in world space, if requested.
    pub fill: Option<FillGeometry>,
    /// Boundary segments in world space, if requested.
    pub lines: Option<LineGeometry>,
}

/// Resumable silhouette outline of a scene; one triangle per step.
pub struct OutlineProjector<'a> {
    accumulator: SilhouetteAccumulator<'a>,
    output: OutlineOutput,
}

impl<'a> OutlineProjector<'a> {
    /// Validate `settings` and prepare the accumulator.
    pub fn new(scene: &'a Scene, settings: &ProjectionSettings) -> Result<Self> {
        Ok(Self {
            accumulator: SilhouetteAccumulator::new(scene, settings)?,
            output: settings.outline_output,
        })
    }
}

impl Resumable for OutlineProjector<'_> {
    type Output = OutlineResult;
    type Snapshot = OutlineState;

    fn step(&mut self) -> Step {
        self.accumulator.step()
    }

    fn progress(&self) -> f64 {
        self.accumulator.progress()
    }

    fn snapshot(&self) -> &OutlineState {
        self.accumulator.snapshot()
    }

    fn finish(self) -> OutlineResult {
        let state = self.accumulator.finish();
        OutlineResult {
            fill: self.output.wants_fill().then(|| state.to_fill_geometry()),
            lines: self.output.wants_lines().then(|| state.to_line_geometry()),
            state,
        }
    }
}

/// Project a scene's edges, blocking until done.
pub fn project_edges(scene: &Scene, settings: &ProjectionSettings) -> Result<EdgeVisibility> {
    project_edges_with_progress(scene, settings, |_, _| {})
}

/// Project a scene's edges, reporting progress after every time slice.
#[instrument(skip_all, fields(instances = scene.instances.len(), triangles = scene.num_triangles()))]
pub fn project_edges_with_progress<F>(
    scene: &Scene,
    settings: &ProjectionSettings,
    on_progress: F,
) -> Result<EdgeVisibility>
where
    F: FnMut(f64, &EdgeVisibility),
{
    let projector = EdgeProjector::new(scene, settings)?;
    let visibility =
        TimeSlicer::new(projector, settings.time_budget()).run_with_progress(on_progress);
    info!(
        edges = visibility.len(),
        fully_hidden = visibility.fully_hidden_count(),
        "edge projection finished"
    );
    Ok(visibility)
}

/// Compute a scene's silhouette outline, blocking until done.
pub fn project_outline(scene: &Scene, settings: &ProjectionSettings) -> Result<OutlineResult> {
    project_outline_with_progress(scene, settings, |_, _| {})
}

/// Compute a scene's silhouette outline, reporting progress after every slice.
#[instrument(skip_all, fields(instances = scene.instances.len(), triangles = scene.num_triangles()))]
pub fn project_outline_with_progress<F>(
    scene: &Scene,
    settings: &ProjectionSettings,
    on_progress: F,
) -> Result<OutlineResult>
where
    F: FnMut(f64, &OutlineState),
{
    let projector = OutlineProjector::new(scene, settings)?;
    let result = TimeSlicer::new(projector, settings.time_budget()).run_with_progress(on_progress);
    info!(
        rings = result.state.polygon().shapes().len(),
        area = result.state.area(),
        "outline finished"
    );
    Ok(result)
}

/// Edge projection as a future that runs one time slice per poll.
///
/// Settings errors are reported here, before anything is polled.
pub fn drive_edges<'a, F>(
    scene: &'a Scene,
    settings: &ProjectionSettings,
    cancel: CancelToken,
    on_progress: F,
) -> Result<Drive<EdgeProjector<'a>, F>>
where
    F: FnMut(f64, &EdgeVisibility),
{
    let projector = EdgeProjector::new(scene, settings)?;
    Ok(drive(projector, settings.time_budget(), cancel, on_progress))
}

/// Outline computation as a future that runs one time slice per poll.
pub fn drive_outline<'a, F>(
    scene: &'a Scene,
    settings: &ProjectionSettings,
    cancel: CancelToken,
    on_progress: F,
) -> Result<Drive<OutlineProjector<'a>, F>>
where
    F: FnMut(f64, &OutlineState),
{
    let projector = OutlineProjector::new(scene, settings)?;
    Ok(drive(projector, settings.time_budget(), cancel, on_progress))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProjectionError;
    use crate::occlusion::LineSet;
    use approx::assert_relative_eq;
    use planview_geom::{GeomError, Transform, TriangleMesh};

    fn cube() -> TriangleMesh {
        #[rustfmt::skip]
        let mesh = TriangleMesh::new(
            vec![
                0.0, 0.0, 0.0,  1.0, 0.0, 0.0,  1.0, 1.0, 0.0,  0.0, 1.0, 0.0,
                0.0, 0.0, 1.0,  1.0, 0.0, 1.0,  1.0, 1.0, 1.0,  0.0, 1.0, 1.0,
            ],
            Some(vec![
                0, 2, 1,  0, 3, 2,  4, 5, 6,  4, 6, 7,
                0, 1, 5,  0, 5, 4,  2, 3, 7,  2, 7, 6,
                0, 4, 7,  0, 7, 3,  1, 2, 6,  1, 6, 5,
            ]),
        )
        .unwrap();
        mesh
    }

    #[test]
    fn test_cube_from_above() {
        let scene = Scene::single(cube());
        let vis = project_edges(&scene, &ProjectionSettings::default()).unwrap();
        // Vertical edges have no projected length and are dropped.
        assert_eq!(vis.len(), 8);
        for (i, edge) in vis.edges().iter().enumerate() {
            let hidden = vis.hidden_intervals(i);
            if edge.line.start.z > 0.5 {
                assert!(hidden.is_empty(), "top edge {i} should be visible");
            } else {
                assert!(hidden.is_full(), "bottom edge {i} should be hidden");
            }
        }
        assert_eq!(vis.to_line_geometry(LineSet::Visible).len(), 4);
        assert_eq!(vis.to_line_geometry(LineSet::Hidden).len(), 4);
    }

    #[test]
    fn test_progress_is_monotonic_and_ends_at_one() {
        let scene = Scene::single(cube());
        let settings = ProjectionSettings {
            time_budget_ms: Some(0.0),
            ..ProjectionSettings::default()
        };
        let mut reports = Vec::new();
        project_edges_with_progress(&scene, &settings, |p, _| reports.push(p)).unwrap();
        assert!(reports.len() > 2);
        assert!(reports.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(reports.iter().filter(|&&p| p == 1.0).count(), 1);
        assert_eq!(reports.last().copied(), Some(1.0));
    }

    #[test]
    fn test_index_builds_one_instance_per_step() {
        let mut scene = Scene::single(cube());
        scene.push(cube(), Transform::translation(3.0, 0.0, 0.0));
        scene.push(cube(), Transform::translation(6.0, 0.0, 0.0));
        let mut projector = EdgeProjector::new(&scene, &ProjectionSettings::default()).unwrap();
        while projector.phase == Phase::Extract {
            projector.step();
        }

        let mut index_steps = 0;
        let mut last = projector.progress();
        while projector.phase == Phase::Index {
            projector.step();
            index_steps += 1;
            assert!(projector.progress() > last);
            last = projector.progress();
        }
        assert_eq!(index_steps, 3);
        assert_eq!(projector.instances.len(), 3);
        // Three cubes apart: each is only paired with itself.
        assert_eq!(projector.pairs, vec![(0, 0), (1, 1), (2, 2)]);
    }

    #[test]
    fn test_edited_mesh_is_rejected_up_front() {
        let mut mesh = cube();
        if let Some(indices) = mesh.indices.as_mut() {
            indices[4] = 99;
        }
        let scene = Scene::single(mesh);
        let settings = ProjectionSettings::default();
        assert!(matches!(
            EdgeProjector::new(&scene, &settings).err(),
            Some(ProjectionError::Geometry(GeomError::IndexOutOfRange { index: 99, .. }))
        ));
        assert!(matches!(
            OutlineProjector::new(&scene, &settings).err(),
            Some(ProjectionError::Geometry(_))
        ));
    }

    #[test]
    fn test_intersection_edges_between_instances() {
        let mut scene = Scene::single(cube());
        scene.push(cube(), Transform::translation(0.5, 0.5, 0.5));
        let vis = project_edges(&scene, &ProjectionSettings::default()).unwrap();
        assert!(vis.edges().iter().any(|e| e.kind == EdgeKind::Intersection));

        let without = ProjectionSettings {
            include_intersection_edges: false,
            ..ProjectionSettings::default()
        };
        let vis = project_edges(&scene, &without).unwrap();
        assert!(vis.edges().iter().all(|e| e.kind != EdgeKind::Intersection));
    }

    #[test]
    fn test_invalid_settings_fail_before_running() {
        let scene = Scene::single(cube());
        let settings = ProjectionSettings {
            direction: [0.0, 0.0, 0.0],
            ..ProjectionSettings::default()
        };
        let mut called = false;
        let err = project_edges_with_progress(&scene, &settings, |_, _| called = true);
        assert!(matches!(err, Err(ProjectionError::InvalidSettings(_))));
        assert!(!called);
    }

    #[test]
    fn test_drive_matches_blocking() {
        let scene = Scene::single(cube());
        let settings = ProjectionSettings {
            time_budget_ms: Some(0.0),
            ..ProjectionSettings::default()
        };
        let future = drive_edges(&scene, &settings, CancelToken::new(), |_, _| {}).unwrap();
        let driven = pollster::block_on(future).finished().unwrap();
        let blocking = project_edges(&scene, &settings).unwrap();
        assert_eq!(driven.len(), blocking.len());
        for i in 0..driven.len() {
            assert_eq!(driven.hidden_intervals(i), blocking.hidden_intervals(i));
        }
    }

    #[test]
    fn test_outline_of_cube() {
        let scene = Scene::single(cube());
        let settings = ProjectionSettings {
            outline_output: OutlineOutput::Both,
            ..ProjectionSettings::default()
        };
        let result = project_outline(&scene, &settings).unwrap();
        assert_relative_eq!(result.state.area(), 1.0, epsilon = 1e-2);
        assert!(!result.fill.unwrap().is_empty());
        assert!(result.lines.unwrap().len() >= 4);

        let fill_only = project_outline(&scene, &ProjectionSettings::default()).unwrap();
        assert!(fill_only.lines.is_none());
    }

    #[test]
    fn test_cancelled_outline_is_aborted() {
        let scene = Scene::single(cube());
        let cancel = CancelToken::new();
        cancel.cancel();
        let future = drive_outline(&scene, &ProjectionSettings::default(), cancel, |_, _| {
            panic!("no progress after cancellation")
        })
        .unwrap();
        assert!(pollster::block_on(future).is_aborted());
    }
}
