//! # mapcluster-types
//!
//! Core geographic value types for the mapcluster engine.
//!
//! - **Point types**: `GeoPoint`, an identified location carrying an opaque payload
//! - **Bounding box types**: `BoundingBox`, the visible `[west, south, east, north]` rectangle
//! - **Viewport types**: `Region`, `ViewportSize`, `EdgePadding`
//!
//! All types are serializable with Serde and built on top of the `geo` crate's
//! geometric primitives.
//!
//! ## Examples
//!
//! ```rust
//! use mapcluster_types::point::GeoPoint;
//! use mapcluster_types::region::Region;
//!
//! let offer = GeoPoint::from_lat_lng("sharing-17", 22.30, 114.15, "masks x 20");
//! let region = Region::new(22.3, 114.15, 0.5, 0.5);
//! assert!(region.to_bounding_box().contains_point(&offer.location));
//! ```

pub mod bbox;
pub mod point;
pub mod region;
