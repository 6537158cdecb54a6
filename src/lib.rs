//! Hierarchical map marker clustering with viewport-driven queries.
//!
//! Points are indexed once per point-set version into an immutable
//! [`IndexEpoch`] holding one KD-tree per zoom level. A [`ClusterController`]
//! turns settled map regions into a bounding box and zoom, queries the epoch
//! and keeps the resulting node list for the rendering surface.
//!
//! ```rust
//! use mapcluster::prelude::*;
//! use std::sync::Arc;
//!
//! struct Map;
//!
//! impl MapSurface<u32> for Map {
//!     fn fit_to_coordinates(&mut self, _coordinates: &[Point], _padding: EdgePadding) {}
//!     fn show_list(&mut self, _entities: Vec<u32>) {}
//! }
//!
//! let controller = ClusterControllerBuilder::new()
//!     .viewport(ViewportSize::new(400.0, 800.0))
//!     .build(Map)?;
//!
//! let sharings: Arc<[GeoPoint<u32>]> = Arc::from(vec![
//!     GeoPoint::from_lat_lng("1", 22.30, 114.15, 1),
//!     GeoPoint::from_lat_lng("2", 22.31, 114.16, 2),
//!     GeoPoint::from_lat_lng("3", 22.98, 114.90, 3),
//! ]);
//! controller.set_points(sharings)?;
//! controller.on_region_change_complete(Region::new(22.6, 114.5, 1.0, 1.0));
//!
//! assert_eq!(controller.nodes().len(), 2);
//! # Ok::<(), mapcluster::ClusterError>(())
//! ```

pub mod builder;
pub mod compute;
pub mod config;
pub mod controller;
pub mod error;
pub mod index;

pub use builder::ClusterControllerBuilder;
pub use controller::{
    ClusterController, Commit, CommitHook, ControllerStats, MapSurface, Phase, RenderItem, Stage,
    TapAction, ViewState,
};
pub use error::{ClusterError, Result};

pub use geo::Point;

pub use config::{BoundingBox, ClusterConfig, EdgePadding, GeoPoint, Region, ViewportSize};

pub use compute::style::{MarkerStyle, size_for};
pub use index::{AggregateId, AggregateNode, ClusterNode, IndexEpoch, LeafNode};

pub use compute::validation;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{ClusterController, ClusterControllerBuilder, ClusterError, Result};

    pub use crate::{Commit, MapSurface, TapAction};

    pub use crate::{BoundingBox, ClusterConfig, EdgePadding, GeoPoint, Region, ViewportSize};

    pub use crate::{AggregateId, ClusterNode, IndexEpoch};

    pub use geo::Point;
}
