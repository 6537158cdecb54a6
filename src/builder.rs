//! Controller builder for flexible configuration
//!
//! This module provides a builder pattern for creating controllers with an
//! initial region, a viewport size and an optional commit hook.

use crate::config::ClusterConfig;
use crate::controller::{ClusterController, CommitHook, MapSurface};
use crate::error::Result;
use mapcluster_types::region::{Region, ViewportSize};
use std::sync::Arc;

/// Builder for [`ClusterController`].
pub struct ClusterControllerBuilder {
    config: ClusterConfig,
    viewport: ViewportSize,
    region: Option<Region>,
    hook: Option<Arc<dyn CommitHook>>,
}

impl ClusterControllerBuilder {
    /// Create a new builder with default configuration and viewport.
    pub fn new() -> Self {
        Self {
            config: ClusterConfig::default(),
            viewport: ViewportSize::default(),
            region: None,
            hook: None,
        }
    }

    /// Set the clustering configuration.
    pub fn config(mut self, config: ClusterConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the viewport size in pixels.
    pub fn viewport(mut self, viewport: ViewportSize) -> Self {
        self.viewport = viewport;
        self
    }

    /// Region to cluster against as soon as the first point set is committed.
    pub fn initial_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    /// Observe results between computation and commit.
    pub fn commit_hook<H: CommitHook + 'static>(mut self, hook: H) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Build the controller around `surface`.
    ///
    /// Fails with a configuration error if the config does not validate.
    pub fn build<T, S: MapSurface<T>>(self, surface: S) -> Result<ClusterController<T, S>> {
        ClusterController::with_parts(self.config, self.viewport, self.region, self.hook, surface)
    }
}

impl Default for ClusterControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ClusterControllerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterControllerBuilder")
            .field("config", &self.config)
            .field("viewport", &self.viewport)
            .field("region", &self.region)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}
