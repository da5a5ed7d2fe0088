//! Error types for outline polygons.

use thiserror::Error;

/// Errors raised when configuring or feeding an outline polygon.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolygonError {
    /// Scale must be finite and in `(0, MAX_SCALE]`.
    #[error("invalid coordinate scale: {0}")]
    InvalidScale(f64),

    /// Compaction tolerance must be finite and non-negative.
    #[error("invalid compaction tolerance: {0}")]
    InvalidTolerance(f64),

    /// A scaled coordinate does not fit the exact integer range.
    #[error("coordinate {0} overflows the fixed-point range")]
    CoordinateOverflow(f64),
}

/// Result type for polygon operations.
pub type Result<T> = std::result::Result<T, PolygonError>;
