//! Off-thread projection.
//!
//! A [`ProjectionWorker`] owns one named OS thread. Requests carry their own
//! position and index buffers, so nothing is shared with the caller; replies
//! come back over a per-request channel as [`WorkerMessage`]s. Every request
//! gets exactly one final message, `Error` or `Finished`, even if the job
//! panics.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use planview_geom::TriangleMesh;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ProjectionError, Result};
use crate::occlusion::LineSet;
use crate::output::{FillGeometry, LineGeometry};
use crate::projector::{project_edges_with_progress, project_outline_with_progress};
use crate::scene::Scene;
use crate::settings::ProjectionSettings;

const THREAD_NAME: &str = "planview-worker";

/// What a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Visible and hidden edges.
    #[default]
    Edges,
    /// Silhouette outline.
    Outline,
    /// Both, edges first.
    Both,
}

/// A projection job with its input buffers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerRequest {
    /// Caller-chosen id echoed in every reply.
    pub id: u64,
    /// Flat `[x, y, z, ...]` vertex positions.
    pub positions: Vec<f32>,
    /// Optional triangle indices.
    pub indices: Option<Vec<u32>>,
    /// Projection parameters.
    pub settings: ProjectionSettings,
    /// Requested outputs.
    pub job: JobKind,
}

/// An outline ring as plain coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingPoints {
    /// Projection-plane vertices.
    pub points: Vec<[f64; 2]>,
    /// True for a hole.
    pub is_hole: bool,
}

/// Serialized result of a finished request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectionOutput {
    /// Visible edge segments.
    pub visible: Option<LineGeometry>,
    /// Hidden edge segments.
    pub hidden: Option<LineGeometry>,
    /// Outline rings on the projection plane.
    pub outline_rings: Vec<RingPoints>,
    /// Outline fill in world space.
    pub outline_fill: Option<FillGeometry>,
    /// Outline boundary in world space.
    pub outline_lines: Option<LineGeometry>,
}

/// Reply to a [`WorkerRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    /// Partial progress in `[0, 1]`.
    Progress {
        /// Request id.
        id: u64,
        /// Fraction complete.
        fraction: f64,
    },
    /// The request failed; final.
    Error {
        /// Request id.
        id: u64,
        /// Human-readable cause.
        message: String,
    },
    /// The request succeeded; final.
    Finished {
        /// Request id.
        id: u64,
        /// The result.
        output: ProjectionOutput,
    },
}

impl WorkerMessage {
    /// True for `Error` and `Finished`.
    pub fn is_final(&self) -> bool {
        !matches!(self, WorkerMessage::Progress { .. })
    }

    /// Id of the request this message answers.
    pub fn id(&self) -> u64 {
        match self {
            WorkerMessage::Progress { id, .. }
            | WorkerMessage::Error { id, .. }
            | WorkerMessage::Finished { id, .. } => *id,
        }
    }
}

struct Job {
    request: WorkerRequest,
    reply: Sender<WorkerMessage>,
}

/// A background thread that runs projection requests one at a time.
pub struct ProjectionWorker {
    jobs: Option<Sender<Job>>,
    handle: Option<JoinHandle<()>>,
}

impl ProjectionWorker {
    /// Start the worker thread.
    pub fn spawn() -> Result<Self> {
        let (jobs, queue) = mpsc::channel::<Job>();
        let handle = thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || {
                for job in queue {
                    run_job(job);
                }
                debug!("worker queue closed");
            })
            .map_err(|e| ProjectionError::WorkerSpawn(e.to_string()))?;
        Ok(Self {
            jobs: Some(jobs),
            handle: Some(handle),
        })
    }

    /// Queue a request; replies arrive on the returned receiver.
    pub fn submit(&self, request: WorkerRequest) -> Result<Receiver<WorkerMessage>> {
        let (reply, replies) = mpsc::channel();
        let jobs = self.jobs.as_ref().ok_or(ProjectionError::WorkerDisconnected)?;
        jobs.send(Job { request, reply })
            .map_err(|_| ProjectionError::WorkerDisconnected)?;
        Ok(replies)
    }
}

impl Drop for ProjectionWorker {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("worker thread panicked");
            }
        }
    }
}

fn run_job(job: Job) {
    let Job { request, reply } = job;
    let id = request.id;
    debug!(id, job = ?request.job, "running projection request");

    let progress = reply.clone();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        execute(request, |fraction| {
            // A dropped receiver only means nobody is listening.
            let _ = progress.send(WorkerMessage::Progress { id, fraction });
        })
    }));
    let message = match outcome {
        Ok(Ok(output)) => WorkerMessage::Finished { id, output },
        Ok(Err(e)) => WorkerMessage::Error {
            id,
            message: e.to_string(),
        },
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(id, %message, "projection request panicked");
            WorkerMessage::Error { id, message }
        }
    };
    let _ = reply.send(message);
}

fn execute<P>(request: WorkerRequest, mut on_progress: P) -> Result<ProjectionOutput>
where
    P: FnMut(f64),
{
    let WorkerRequest {
        positions,
        indices,
        settings,
        job,
        ..
    } = request;
    settings.validate()?;
    let scene = Scene::single(TriangleMesh::new(positions, indices)?);
    let share = if job == JobKind::Both { 0.5 } else { 1.0 };
    let mut output = ProjectionOutput::default();

    if job != JobKind::Outline {
        let vis = project_edges_with_progress(&scene, &settings, |p, _| on_progress(p * share))?;
        output.visible = Some(vis.to_line_geometry(LineSet::Visible));
        output.hidden = Some(vis.to_line_geometry(LineSet::Hidden));
    }
    if job != JobKind::Edges {
        let offset = 1.0 - share;
        let result = project_outline_with_progress(&scene, &settings, |p, _| {
            on_progress(offset + p * share)
        })?;
        output.outline_rings = result
            .state
            .rings()
            .into_iter()
            .map(|r| RingPoints {
                points: r.points.iter().map(|p| [p.x, p.y]).collect(),
                is_hole: r.is_hole,
            })
            .collect();
        output.outline_fill = result.fill;
        output.outline_lines = result.lines;
    }
    Ok(output)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "projection panicked".to_string()
    }
}
