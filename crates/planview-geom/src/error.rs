//! Error types for geometry input.

use thiserror::Error;

/// Errors raised while reading mesh buffers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeomError {
    /// Position buffer length is not a multiple of three.
    #[error("vertex buffer length {0} is not a multiple of 3")]
    MalformedVertices(usize),

    /// Index buffer length is not a multiple of three.
    #[error("index buffer length {0} is not a multiple of 3")]
    MalformedIndices(usize),

    /// An index points past the end of the vertex buffer.
    #[error("index {index} out of range (vertex count = {vertex_count})")]
    IndexOutOfRange {
        /// The offending index.
        index: u32,
        /// Number of vertices available.
        vertex_count: usize,
    },
}

/// Result type for geometry operations.
pub type Result<T> = std::result::Result<T, GeomError>;
