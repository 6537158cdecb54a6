//! Clustering configuration
//!
//! This module provides the configuration record shared by the index builder
//! and the controller, and re-exports the viewport types from the
//! `mapcluster-types` crate for convenience.

use crate::error::{ClusterError, Result};

pub use mapcluster_types::bbox::BoundingBox;
pub use mapcluster_types::point::GeoPoint;
pub use mapcluster_types::region::{EdgePadding, Region, ViewportSize};

/// Fraction of the viewport width used as the default clustering radius.
pub const RADIUS_VIEWPORT_FRACTION: f64 = 0.06;

/// Highest zoom level a cluster id can encode.
pub const MAX_SUPPORTED_ZOOM: u8 = 30;

/// Clustering configuration
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterConfig {
    /// Clustering radius in pixels
    #[serde(default = "ClusterConfig::default_radius")]
    pub radius: f64,

    #[serde(default = "ClusterConfig::default_min_zoom")]
    pub min_zoom: u8,

    #[serde(default = "ClusterConfig::default_max_zoom")]
    pub max_zoom: u8,

    /// Tile extent the radius is measured against
    #[serde(default = "ClusterConfig::default_extent")]
    pub extent: u32,

    /// Leaf size of the per-zoom KD-trees
    #[serde(default = "ClusterConfig::default_node_size")]
    pub node_size: usize,

    /// Padding applied when fitting the map to an expanded cluster
    #[serde(default)]
    pub edge_padding: EdgePadding,
}

impl ClusterConfig {
    fn default_radius() -> f64 {
        ViewportSize::default().width * RADIUS_VIEWPORT_FRACTION
    }

    const fn default_min_zoom() -> u8 {
        1
    }

    const fn default_max_zoom() -> u8 {
        20
    }

    const fn default_extent() -> u32 {
        512
    }

    const fn default_node_size() -> usize {
        64
    }

    /// Defaults with the radius scaled to a viewport `width` pixels wide.
    pub fn for_viewport_width(width: f64) -> Self {
        Self::default().with_radius(width * RADIUS_VIEWPORT_FRACTION)
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_zoom_range(mut self, min_zoom: u8, max_zoom: u8) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }

    pub fn with_extent(mut self, extent: u32) -> Self {
        self.extent = extent;
        self
    }

    pub fn with_node_size(mut self, node_size: usize) -> Self {
        self.node_size = node_size;
        self
    }

    pub fn with_edge_padding(mut self, padding: EdgePadding) -> Self {
        self.edge_padding = padding;
        self
    }

    /// Check the configuration is usable for building an index.
    pub fn validate(&self) -> Result<()> {
        if self.min_zoom > self.max_zoom {
            return Err(ClusterError::InvalidConfig(format!(
                "min_zoom ({}) must not exceed max_zoom ({})",
                self.min_zoom, self.max_zoom
            )));
        }

        if self.max_zoom > MAX_SUPPORTED_ZOOM {
            return Err(ClusterError::InvalidConfig(format!(
                "max_zoom must be at most {}, got: {}",
                MAX_SUPPORTED_ZOOM, self.max_zoom
            )));
        }

        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(ClusterError::InvalidConfig(format!(
                "radius must be a positive number of pixels, got: {}",
                self.radius
            )));
        }

        if self.extent == 0 {
            return Err(ClusterError::InvalidConfig(
                "extent must be greater than zero".to_string(),
            ));
        }

        if self.node_size == 0 {
            return Err(ClusterError::InvalidConfig(
                "node_size must be greater than zero".to_string(),
            ));
        }

        if self
            .edge_padding
            .edges()
            .iter()
            .any(|edge| !edge.is_finite() || *edge < 0.0)
        {
            return Err(ClusterError::InvalidConfig(format!(
                "edge padding must be finite and non-negative, got: {:?}",
                self.edge_padding
            )));
        }

        if self.radius > f64::from(self.extent) {
            log::warn!(
                "Clustering radius {} exceeds tile extent {}; most points will merge at every zoom",
                self.radius,
                self.extent
            );
        }

        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: ClusterConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: ClusterConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            radius: Self::default_radius(),
            min_zoom: Self::default_min_zoom(),
            max_zoom: Self::default_max_zoom(),
            extent: Self::default_extent(),
            node_size: Self::default_node_size(),
            edge_padding: EdgePadding::default(),
        }
    }
}
