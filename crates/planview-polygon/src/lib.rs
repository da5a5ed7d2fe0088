#![warn(missing_docs)]

//! Fixed-point outline polygons for planview.
//!
//! Footprints are quantized to `i64` coordinates (`round(coord * scale)`),
//! unioned with [`geo`]'s boolean operations and compacted after every
//! union so the ring count and vertex count stay bounded over thousands of
//! unions.
//!
//! # Example
//!
//! ```ignore
//! use planview_polygon::{inflate_triangle, OutlinePolygon};
//!
//! let mut outline = OutlinePolygon::new(1e6, 1e-6)?;
//! let tri = [outline.quantize(&a)?, outline.quantize(&b)?, outline.quantize(&c)?];
//! if !outline.encloses_triangle(&tri) {
//!     outline.union_ring(&inflate_triangle(&tri, outline.inflation()));
//! }
//! let fill = outline.fill_triangles();
//! ```

mod error;
mod outline;
mod ring;

pub use error::{PolygonError, Result};
pub use outline::{OutlinePolygon, OutlineRing, Shape, MAX_COORD, MAX_SCALE};
pub use ring::{
    inflate_triangle, on_segment, orient, segments_touch, triangle_contains, IntPoint, IntRing,
};
