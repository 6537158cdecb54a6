//! Compute layer for the clustering engine.
//!
//! Pure functions and static structures with no shared state:
//! - Coordinate validation
//! - Spherical Mercator projection
//! - Static KD-tree used by every zoom level of an index
//! - Viewport to bounding box / zoom conversion
//! - Cluster marker sizing

pub mod kdtree;
pub mod projection;
pub mod style;
pub mod validation;
pub mod viewport;
