#![warn(missing_docs)]

//! Hidden-line projection and silhouette outlines for triangle meshes.
//!
//! Given a scene of placed meshes and a projection direction, this crate
//! finds the edges worth drawing (creases, silhouettes, open boundaries and
//! surface crossings), works out which parts of each edge are hidden behind
//! other geometry, and accumulates the projected outline of everything that
//! faces the viewer.
//!
//! Every long-running stage is a [`Resumable`] state machine. It can be run
//! to completion, sliced under a wall-clock [`TimeBudget`] with progress
//! callbacks, driven as a cancellable future ([`Drive`]), or handed to a
//! background [`ProjectionWorker`].
//!
//! # Example
//!
//! ```ignore
//! use planview::{project_edges, LineSet, ProjectionSettings, Scene};
//!
//! let scene = Scene::single(mesh);
//! let settings = ProjectionSettings {
//!     direction: [0.0, -1.0, -1.0],
//!     ..ProjectionSettings::default()
//! };
//! let visibility = project_edges(&scene, &settings)?;
//!
//! let visible = visibility.to_line_geometry(LineSet::Visible);
//! let hidden = visibility.to_line_geometry(LineSet::Hidden);
//! println!("{} visible, {} hidden segments", visible.len(), hidden.len());
//! ```

pub mod edges;
pub mod error;
pub mod intersections;
pub mod intervals;
pub mod occlusion;
pub mod output;
pub mod projector;
pub mod scene;
pub mod settings;
pub mod silhouette;
pub mod task;
pub mod worker;

pub use edges::{extract_edges, local_direction, Edge, EdgeExtractor, EdgeKind};
pub use error::{ProjectionError, Result};
pub use intersections::{crossing_segment, mesh_intersections, self_intersections};
pub use intervals::{Interval, IntervalSet, INTERVAL_EPSILON};
pub use occlusion::{hidden_range, EdgeVisibility, LineSet, OcclusionResolver, TaggedSegment};
pub use output::{FillGeometry, LineGeometry};
pub use projector::{
    drive_edges, drive_outline, project_edges, project_edges_with_progress, project_outline,
    project_outline_with_progress, EdgeProjector, OutlineProjector, OutlineResult,
};
pub use scene::{index_scene, IndexedInstance, MeshInstance, Scene};
pub use settings::{OcclusionStrategy, OutlineOutput, ProjectionSettings, TriangleOrder};
pub use silhouette::{OutlineState, SilhouetteAccumulator};
pub use task::{
    drive, run_to_completion, CancelToken, Completion, Drive, Resumable, SliceStatus, Step,
    TimeBudget, TimeSlicer,
};
pub use worker::{
    JobKind, ProjectionOutput, ProjectionWorker, RingPoints, WorkerMessage, WorkerRequest,
};

pub use planview_geom::{Line3, Point2, Point3, Transform, TriangleMesh, Vec3, ViewFrame};
