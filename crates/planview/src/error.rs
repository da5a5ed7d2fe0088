//! Error types for projection.

use planview_geom::GeomError;
use planview_polygon::PolygonError;
use thiserror::Error;

/// Errors that can occur while setting up or running a projection.
///
/// Degenerate geometry is never an error; it is skipped. Cancellation is
/// reported as [`Completion::Aborted`](crate::Completion::Aborted).
#[derive(Error, Debug)]
pub enum ProjectionError {
    /// Invalid projection settings.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Malformed mesh buffers.
    #[error("invalid mesh: {0}")]
    Geometry(#[from] GeomError),

    /// Outline polygon configuration error.
    #[error("outline polygon: {0}")]
    Polygon(#[from] PolygonError),

    /// Settings file could not be parsed.
    #[error("failed to parse settings: {0}")]
    Toml(#[from] toml::de::Error),

    /// Settings could not be written as TOML.
    #[error("failed to serialize settings: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    /// The worker thread could not be started.
    #[error("failed to start worker: {0}")]
    WorkerSpawn(String),

    /// The worker thread is gone.
    #[error("worker disconnected")]
    WorkerDisconnected,
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
