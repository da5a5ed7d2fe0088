//! Silhouette outline accumulation.
//!
//! Every front-facing triangle is flattened onto the projection plane,
//! snapped to the outline's fixed-point grid and unioned into a growing
//! polygon. Triangles already strictly inside the outline are skipped
//! without touching the polygon. The rest are inflated slightly before the
//! union so that neighbours sharing an edge weld together instead of leaving
//! hairline slivers between them.

use planview_geom::{Line3, Point2, Point3, Transform, ViewFrame, AREA_EPSILON};
use planview_polygon::{inflate_triangle, orient, IntPoint, OutlinePolygon, OutlineRing};
use rayon::prelude::*;
use tracing::debug;

use crate::error::Result;
use crate::output::{FillGeometry, LineGeometry};
use crate::scene::Scene;
use crate::settings::{ProjectionSettings, TriangleOrder};
use crate::task::{Resumable, Step};

/// The accumulated outline together with the frame it lives in.
#[derive(Debug, Clone)]
pub struct OutlineState {
    polygon: OutlinePolygon,
    frame: ViewFrame,
}

impl OutlineState {
    /// The fixed-point polygon.
    pub fn polygon(&self) -> &OutlinePolygon {
        &self.polygon
    }

    /// The view frame the outline was projected in.
    pub fn frame(&self) -> &ViewFrame {
        &self.frame
    }

    /// True if nothing has been accumulated.
    pub fn is_empty(&self) -> bool {
        self.polygon.is_empty()
    }

    /// Enclosed area on the projection plane.
    pub fn area(&self) -> f64 {
        self.polygon.area()
    }

    /// Rings in projection-plane coordinates.
    pub fn rings(&self) -> Vec<OutlineRing> {
        self.polygon.rings()
    }

    /// Triangulated fill in projection-plane coordinates.
    pub fn fill_triangles(&self) -> Vec<[Point2; 3]> {
        self.polygon.fill_triangles()
    }

    /// Ring edges lifted back into world space.
    pub fn boundary_lines(&self) -> Vec<Line3> {
        self.polygon
            .boundary_segments()
            .iter()
            .map(|[a, b]| Line3::new(self.frame.plane_point(a), self.frame.plane_point(b)))
            .collect()
    }

    /// Ring edges as a flat line buffer in world space.
    ///
    /// Every segment carries edge index 0.
    pub fn to_line_geometry(&self) -> LineGeometry {
        let mut geometry = LineGeometry::new();
        for line in self.boundary_lines() {
            geometry.push(&line, 0);
        }
        geometry
    }

    /// Fill triangles in world space.
    pub fn to_fill_geometry(&self) -> FillGeometry {
        let mut geometry = FillGeometry::default();
        for tri in self.fill_triangles() {
            geometry.push(&tri.map(|p| self.frame.plane_point(&p)));
        }
        geometry
    }
}

/// Per-instance data needed while visiting triangles.
struct Placement {
    view_from_local: Transform,
    mirrored: bool,
}

/// Resumable outline accumulation over a scene; one triangle per step.
pub struct SilhouetteAccumulator<'a> {
    scene: &'a Scene,
    placements: Vec<Placement>,
    order: Vec<(u32, u32)>,
    cursor: usize,
    double_sided: bool,
    state: OutlineState,
    culled: usize,
    degenerate: usize,
    enclosed: usize,
    unioned: usize,
}

impl<'a> SilhouetteAccumulator<'a> {
    /// Prepare accumulation of `scene`.
    ///
    /// Fails on invalid settings or when the scene is too large for the
    /// outline's fixed-point range at the configured scale.
    pub fn new(scene: &'a Scene, settings: &ProjectionSettings) -> Result<Self> {
        settings.validate()?;
        scene.validate()?;
        let frame = settings.view_frame()?;
        let polygon = OutlinePolygon::new(settings.outline_scale, settings.outline_tolerance)?;

        let bounds = scene.world_bounds();
        if !bounds.is_empty() {
            for corner in bounds.transformed(frame.to_view()).corners() {
                polygon.quantize(&Point2::new(corner.x, corner.y))?;
            }
        }

        let placements: Vec<Placement> = scene
            .instances
            .iter()
            .map(|i| Placement {
                view_from_local: frame.view_from(&i.transform),
                mirrored: i.transform.is_mirroring(),
            })
            .collect();

        let mut order: Vec<(u32, u32)> = scene
            .instances
            .iter()
            .enumerate()
            .flat_map(|(i, inst)| {
                (0..inst.mesh.num_triangles()).map(move |t| (i as u32, t as u32))
            })
            .collect();
        if settings.triangle_order == TriangleOrder::LargestFirst {
            let areas: Vec<f64> = order
                .par_iter()
                .map(|&(i, t)| {
                    let [a, b, c] = view_points(scene, &placements, i, t);
                    footprint_area2(&a, &b, &c).abs()
                })
                .collect();
            let mut keyed: Vec<(f64, (u32, u32))> = areas.into_iter().zip(order).collect();
            keyed.sort_by(|x, y| y.0.total_cmp(&x.0));
            order = keyed.into_iter().map(|(_, key)| key).collect();
        }

        Ok(Self {
            scene,
            placements,
            order,
            cursor: 0,
            double_sided: settings.double_sided,
            state: OutlineState { polygon, frame },
            culled: 0,
            degenerate: 0,
            enclosed: 0,
            unioned: 0,
        })
    }

    /// Triangles skipped because they were already inside the outline.
    pub fn enclosed_count(&self) -> usize {
        self.enclosed
    }

    /// Triangles unioned into the outline.
    pub fn unioned_count(&self) -> usize {
        self.unioned
    }

    fn snap(&self, points: &[Point3; 3]) -> Option<[IntPoint; 3]> {
        let polygon = &self.state.polygon;
        let mut out = [IntPoint::new(0, 0); 3];
        for (slot, p) in out.iter_mut().zip(points) {
            *slot = polygon.quantize(&Point2::new(p.x, p.y)).ok()?;
        }
        Some(out)
    }
}

fn view_points(scene: &Scene, placements: &[Placement], instance: u32, t: u32) -> [Point3; 3] {
    let transform = &placements[instance as usize].view_from_local;
    scene.instances[instance as usize]
        .mesh
        .triangle_points(t as usize)
        .map(|p| transform.apply_point(&p))
}

/// Twice the signed XY area; positive when counter-clockwise seen from +Z.
fn footprint_area2(a: &Point3, b: &Point3, c: &Point3) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

impl Resumable for SilhouetteAccumulator<'_> {
    type Output = OutlineState;
    type Snapshot = OutlineState;

    fn step(&mut self) -> Step {
        let Some(&(instance, t)) = self.order.get(self.cursor) else {
            return Step::Done;
        };
        self.cursor += 1;

        let points = view_points(self.scene, &self.placements, instance, t);
        let mut area2 = footprint_area2(&points[0], &points[1], &points[2]);
        if self.placements[instance as usize].mirrored {
            area2 = -area2;
        }
        let finite = points.iter().all(|p| p.iter().all(|c| c.is_finite()));
        if !finite {
            self.degenerate += 1;
        } else if !self.double_sided && area2 <= 0.0 {
            self.culled += 1;
        } else if area2.abs() * 0.5 < AREA_EPSILON {
            self.degenerate += 1;
        } else {
            match self.snap(&points) {
                Some(tri) if orient(tri[0], tri[1], tri[2]) != 0 => {
                    let polygon = &mut self.state.polygon;
                    if polygon.encloses_triangle(&tri) {
                        self.enclosed += 1;
                    } else {
                        let ring = inflate_triangle(&tri, polygon.inflation());
                        polygon.union_ring(&ring);
                        self.unioned += 1;
                    }
                }
                _ => self.degenerate += 1,
            }
        }

        if self.cursor < self.order.len() {
            Step::Continue
        } else {
            debug!(
                culled = self.culled,
                degenerate = self.degenerate,
                enclosed = self.enclosed,
                unioned = self.unioned,
                vertices = self.state.polygon.vertex_count(),
                "outline accumulated"
            );
            Step::Done
        }
    }

    fn progress(&self) -> f64 {
        if self.order.is_empty() {
            1.0
        } else {
            self.cursor as f64 / self.order.len() as f64
        }
    }

    fn snapshot(&self) -> &OutlineState {
        &self.state
    }

    fn finish(self) -> OutlineState {
        self.state
    }
}
