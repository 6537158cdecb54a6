//! Collaborator seams of the controller: the map surface it drives and the
//! hook observed just before results are committed.

use geo::Point;
use mapcluster_types::region::{EdgePadding, Region};

/// The map rendering surface driven by a [`ClusterController`].
///
/// The surface draws nodes, reports region changes and taps back to the
/// controller, and receives the side effects of a cluster tap.
///
/// Callbacks may call the controller's event methods synchronously, e.g. an
/// instant camera move reporting its settled region from inside
/// `fit_to_coordinates`. Effects of such a nested call reach the surface after
/// the current callback returns. Callbacks must not call
/// [`ClusterController::surface`], which would wait on the surface being
/// delivered to.
///
/// [`ClusterController`]: super::ClusterController
/// [`ClusterController::surface`]: super::ClusterController::surface
pub trait MapSurface<T> {
    /// Animate the camera so that every coordinate is visible.
    fn fit_to_coordinates(&mut self, coordinates: &[Point], padding: EdgePadding);

    /// Present the entities behind a cluster that can no longer be split by zooming.
    fn show_list(&mut self, entities: Vec<T>);

    /// A settled region change has been clustered.
    fn region_changed(&mut self, _region: &Region) {}
}

/// Which computation is about to be committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// A new index epoch built by `set_points` or `update_config`
    Rebuild,
    /// A node list computed for a region change or resize
    Query,
}

/// Called after a computation finishes and before its result is committed.
///
/// The sequence number is the one the computation was issued with. Hooks
/// may block; the controller holds no lock while calling them.
pub trait CommitHook: Send + Sync {
    fn before_commit(&self, stage: Stage, sequence: u64);
}

impl<F> CommitHook for F
where
    F: Fn(Stage, u64) + Send + Sync,
{
    fn before_commit(&self, stage: Stage, sequence: u64) {
        self(stage, sequence)
    }
}
