//! Stateful clustering controller.
//!
//! The controller owns the current index epoch and the current view (region,
//! bounding box, zoom and visible nodes). The rendering surface calls its
//! event methods explicitly:
//!
//! - `set_points` rebuilds the epoch when the point set's identity changes
//! - `on_region_change_complete` re-clusters for a settled region
//! - `on_cluster_tap` zooms to a cluster or, at max zoom, lists its entities
//!
//! Builds and queries run outside the state lock. Every write is issued a
//! sequence number and a finished computation is committed only if no newer
//! write of the same kind was issued meanwhile; superseded results are
//! dropped and counted in [`ControllerStats::stale_discarded`].
//!
//! Surface calls are made one at a time. A surface may call back into the
//! controller from inside a callback; the side effects of such a nested call
//! are delivered once the outer callback returns.

mod surface;

pub use surface::{CommitHook, MapSurface, Stage};

use crate::compute::style::{MarkerStyle, marker_z_index, size_for};
use crate::compute::validation::validate_points;
use crate::compute::viewport::{region_to_zoom, to_bounding_box};
use crate::config::ClusterConfig;
use crate::error::{ClusterError, Result};
use crate::index::{AggregateId, AggregateNode, ClusterNode, IndexEpoch, LeafNode};
use geo::{BoundingRect, MultiPoint, Point};
use mapcluster_types::bbox::BoundingBox;
use mapcluster_types::point::GeoPoint;
use mapcluster_types::region::{EdgePadding, Region, ViewportSize};
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};

/// Lifecycle of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No epoch has been committed yet
    Idle,
    /// An epoch is live; the cached view follows every event
    Ready,
}

/// Outcome of an event that may change visible state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    /// The result became the visible state
    Applied,
    /// Nothing needed recomputing
    Unchanged,
    /// A newer event superseded this one; its result was dropped
    Discarded,
}

/// Side effect dispatched for a cluster tap.
#[derive(Debug, Clone, PartialEq)]
pub enum TapAction {
    /// The surface was asked to fit these bounds
    FitToBounds { bounds: BoundingBox, point_count: usize },
    /// The surface was asked to list the cluster's entities
    ShowList { point_count: usize },
}

/// The clustered view of the current region.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub region: Region,
    pub bbox: BoundingBox,
    pub zoom: u8,
    pub nodes: Arc<[ClusterNode]>,
}

/// One drawable entry: an original point, or a sized cluster badge.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderItem {
    Point(LeafNode),
    Cluster {
        node: AggregateNode,
        style: MarkerStyle,
        z_index: usize,
    },
}

/// Counters exposed for instrumentation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ControllerStats {
    pub epochs_built: u64,
    pub queries_committed: u64,
    pub stale_discarded: u64,
    pub rejected_point_sets: u64,
}

#[derive(Debug, Default)]
struct StatCounters {
    epochs_built: AtomicU64,
    queries_committed: AtomicU64,
    stale_discarded: AtomicU64,
    rejected_point_sets: AtomicU64,
}

impl StatCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ControllerStats {
        ControllerStats {
            epochs_built: self.epochs_built.load(Ordering::Relaxed),
            queries_committed: self.queries_committed.load(Ordering::Relaxed),
            stale_discarded: self.stale_discarded.load(Ordering::Relaxed),
            rejected_point_sets: self.rejected_point_sets.load(Ordering::Relaxed),
        }
    }
}

/// A pending call on the map surface.
enum Effect<T> {
    Fit(Vec<Point>, EdgePadding),
    ShowList(Vec<T>),
    RegionChanged(Region),
}

impl<T> Effect<T> {
    fn apply<S: MapSurface<T>>(self, surface: &mut S) {
        match self {
            Effect::Fit(coordinates, padding) => surface.fit_to_coordinates(&coordinates, padding),
            Effect::ShowList(entities) => surface.show_list(entities),
            Effect::RegionChanged(region) => surface.region_changed(&region),
        }
    }
}

// Clears the delivering thread even if a surface callback panics.
struct Delivering<'a>(&'a Mutex<Option<ThreadId>>);

impl Drop for Delivering<'_> {
    fn drop(&mut self) {
        *self.0.lock() = None;
    }
}

struct State<T> {
    config: ClusterConfig,
    viewport: ViewportSize,
    /// Most recently requested point set; may not be committed yet
    points: Option<Arc<[GeoPoint<T>]>>,
    epoch: Option<Arc<IndexEpoch<T>>>,
    region: Option<Region>,
    view: Option<ViewState>,
}

impl<T> State<T> {
    fn cluster(&self, epoch: &IndexEpoch<T>, region: Region) -> ViewState {
        compute_view(epoch, region, &self.config, self.viewport)
    }
}

fn compute_view<T>(
    epoch: &IndexEpoch<T>,
    region: Region,
    config: &ClusterConfig,
    viewport: ViewportSize,
) -> ViewState {
    let bbox = to_bounding_box(&region);
    let zoom = region_to_zoom(&region, &bbox, config.min_zoom, config.max_zoom, viewport);
    let nodes = epoch.query(&bbox, zoom);
    ViewState {
        region,
        bbox,
        zoom,
        nodes: nodes.into(),
    }
}

/// Orchestrates index rebuilds, viewport queries and cluster taps.
pub struct ClusterController<T, S> {
    state: Mutex<State<T>>,
    surface: Mutex<S>,
    /// Thread currently inside a surface callback
    delivering: Mutex<Option<ThreadId>>,
    /// Effects raised from inside a surface callback, in order
    nested: Mutex<VecDeque<Effect<T>>>,
    rebuild_seq: AtomicU64,
    query_seq: AtomicU64,
    stats: StatCounters,
    hook: Option<Arc<dyn CommitHook>>,
}

impl<T, S> ClusterController<T, S>
where
    S: MapSurface<T>,
{
    /// Create an idle controller; fails if `config` does not validate.
    pub fn new(config: ClusterConfig, viewport: ViewportSize, surface: S) -> Result<Self> {
        Self::with_parts(config, viewport, None, None, surface)
    }

    pub(crate) fn with_parts(
        config: ClusterConfig,
        viewport: ViewportSize,
        region: Option<Region>,
        hook: Option<Arc<dyn CommitHook>>,
        surface: S,
    ) -> Result<Self> {
        if let Err(e) = config.validate() {
            log::warn!("Rejecting controller configuration: {}", e);
            return Err(e);
        }

        Ok(Self {
            state: Mutex::new(State {
                config,
                viewport,
                points: None,
                epoch: None,
                region,
                view: None,
            }),
            surface: Mutex::new(surface),
            delivering: Mutex::new(None),
            nested: Mutex::new(VecDeque::new()),
            rebuild_seq: AtomicU64::new(0),
            query_seq: AtomicU64::new(0),
            stats: StatCounters::default(),
            hook,
        })
    }

    /// Replace the point set.
    ///
    /// Rebuilds only when `points` is a different allocation than the last
    /// accepted set; equal contents in a new `Arc` still rebuild. On a
    /// validation error the previous epoch and view stay in place.
    pub fn set_points(&self, points: Arc<[GeoPoint<T>]>) -> Result<Commit> {
        if let Err(e) = validate_points(&points) {
            StatCounters::bump(&self.stats.rejected_point_sets);
            log::warn!("Rejecting point set of {} points: {}", points.len(), e);
            return Err(e);
        }

        let (sequence, config) = {
            let mut state = self.state.lock();
            if state
                .points
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, &points))
            {
                return Ok(Commit::Unchanged);
            }
            state.points = Some(Arc::clone(&points));
            let sequence = self.rebuild_seq.fetch_add(1, Ordering::SeqCst) + 1;
            (sequence, state.config.clone())
        };

        self.rebuild(sequence, points, &config)
    }

    /// Replace the configuration and rebuild the current point set with it.
    ///
    /// An invalid configuration is rejected and the previous one retained.
    pub fn update_config(&self, config: ClusterConfig) -> Result<Commit> {
        if let Err(e) = config.validate() {
            log::warn!("Rejecting configuration update: {}", e);
            return Err(e);
        }

        let (sequence, points) = {
            let mut state = self.state.lock();
            if state.config == config {
                return Ok(Commit::Unchanged);
            }
            state.config = config.clone();
            let sequence = self.rebuild_seq.fetch_add(1, Ordering::SeqCst) + 1;
            (sequence, state.points.clone())
        };

        match points {
            Some(points) => self.rebuild(sequence, points, &config),
            None => Ok(Commit::Applied),
        }
    }

    fn rebuild(
        &self,
        sequence: u64,
        points: Arc<[GeoPoint<T>]>,
        config: &ClusterConfig,
    ) -> Result<Commit> {
        // Point sets are validated before a sequence number is issued.
        let epoch = Arc::new(IndexEpoch::build_validated(points, config)?);
        StatCounters::bump(&self.stats.epochs_built);

        if let Some(hook) = &self.hook {
            hook.before_commit(Stage::Rebuild, sequence);
        }

        let mut state = self.state.lock();
        if sequence != self.rebuild_seq.load(Ordering::SeqCst) {
            StatCounters::bump(&self.stats.stale_discarded);
            log::debug!(
                "Discarding epoch {} from superseded rebuild #{}",
                epoch.id(),
                sequence
            );
            return Ok(Commit::Discarded);
        }

        // Queries still running against the old epoch must not land.
        self.query_seq.fetch_add(1, Ordering::SeqCst);
        let view = state.region.map(|region| state.cluster(&epoch, region));
        state.view = view;
        if state.view.is_some() {
            StatCounters::bump(&self.stats.queries_committed);
        }

        log::debug!(
            "Committed epoch {} ({} points) from rebuild #{}",
            epoch.id(),
            epoch.len(),
            sequence
        );
        state.epoch = Some(epoch);
        Ok(Commit::Applied)
    }

    /// Re-cluster for a settled region.
    ///
    /// The region is remembered even while idle so that the first epoch is
    /// clustered against it. The region is forwarded to
    /// [`MapSurface::region_changed`] only when its view is committed; a
    /// superseded region never reaches the surface.
    pub fn on_region_change_complete(&self, region: Region) -> Commit {
        let (sequence, epoch, config, viewport) = {
            let mut state = self.state.lock();
            state.region = Some(region);
            let sequence = self.query_seq.fetch_add(1, Ordering::SeqCst) + 1;
            (
                sequence,
                state.epoch.clone(),
                state.config.clone(),
                state.viewport,
            )
        };

        let Some(epoch) = epoch else {
            return Commit::Unchanged;
        };

        let view = compute_view(&epoch, region, &config, viewport);
        let commit = self.commit_view(sequence, &epoch, view);
        if commit == Commit::Applied {
            self.dispatch(Effect::RegionChanged(region));
        }
        commit
    }

    /// Change the viewport size and re-cluster the current region.
    pub fn resize(&self, viewport: ViewportSize) -> Commit {
        let (sequence, epoch, config, region) = {
            let mut state = self.state.lock();
            state.viewport = viewport;
            let sequence = self.query_seq.fetch_add(1, Ordering::SeqCst) + 1;
            (
                sequence,
                state.epoch.clone(),
                state.config.clone(),
                state.region,
            )
        };

        let (Some(epoch), Some(region)) = (epoch, region) else {
            return Commit::Unchanged;
        };

        let view = compute_view(&epoch, region, &config, viewport);
        self.commit_view(sequence, &epoch, view)
    }

    fn commit_view(&self, sequence: u64, epoch: &Arc<IndexEpoch<T>>, view: ViewState) -> Commit {
        if let Some(hook) = &self.hook {
            hook.before_commit(Stage::Query, sequence);
        }

        let mut state = self.state.lock();
        let same_epoch = state
            .epoch
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, epoch));
        if sequence != self.query_seq.load(Ordering::SeqCst) || !same_epoch {
            StatCounters::bump(&self.stats.stale_discarded);
            log::debug!("Discarding superseded query #{}", sequence);
            return Commit::Discarded;
        }

        log::debug!(
            "Committed query #{}: {} nodes at zoom {}",
            sequence,
            view.nodes.len(),
            view.zoom
        );
        state.view = Some(view);
        StatCounters::bump(&self.stats.queries_committed);
        Commit::Applied
    }

    /// Handle a tap on a cluster badge.
    ///
    /// Below `max_zoom` the surface is asked to fit the cluster's points with
    /// the configured edge padding. At `max_zoom` zooming cannot split the
    /// cluster any further, so the surface is asked to list its entities.
    pub fn on_cluster_tap(&self, cluster: AggregateId) -> Result<TapAction>
    where
        T: Clone,
    {
        let (epoch, zoom, config) = {
            let state = self.state.lock();
            let epoch = state.epoch.clone().ok_or(ClusterError::NoEpoch)?;
            (epoch, state.view.as_ref().map(|v| v.zoom), state.config.clone())
        };

        let leaves = epoch.expand(cluster)?;
        let point_count = leaves.len();

        if zoom.is_some_and(|zoom| zoom >= config.max_zoom) {
            let entities = leaves.iter().map(|p| p.payload.clone()).collect();
            self.dispatch(Effect::ShowList(entities));
            return Ok(TapAction::ShowList { point_count });
        }

        let coordinates: Vec<Point> = leaves.iter().map(|p| p.location).collect();
        let bounds = MultiPoint::from(coordinates.clone())
            .bounding_rect()
            .map(BoundingBox::from_rect)
            .ok_or(ClusterError::UnknownCluster(cluster))?;

        self.dispatch(Effect::Fit(coordinates, config.edge_padding));
        Ok(TapAction::FitToBounds {
            bounds,
            point_count,
        })
    }

    /// Deliver `effect` to the surface.
    ///
    /// Called from inside a surface callback on the same thread, the effect
    /// is queued and delivered by the outer call after the callback returns.
    fn dispatch(&self, effect: Effect<T>) {
        let current = thread::current().id();
        if *self.delivering.lock() == Some(current) {
            self.nested.lock().push_back(effect);
            return;
        }

        let mut surface = self.surface.lock();
        *self.delivering.lock() = Some(current);
        let _delivering = Delivering(&self.delivering);

        effect.apply(&mut *surface);
        while let Some(next) = self.next_nested() {
            next.apply(&mut *surface);
        }
    }

    fn next_nested(&self) -> Option<Effect<T>> {
        self.nested.lock().pop_front()
    }

    pub fn phase(&self) -> Phase {
        if self.state.lock().epoch.is_some() {
            Phase::Ready
        } else {
            Phase::Idle
        }
    }

    /// Nodes of the current view; empty while idle or before the first region.
    pub fn nodes(&self) -> Arc<[ClusterNode]> {
        self.state
            .lock()
            .view
            .as_ref()
            .map_or_else(|| Arc::from(Vec::new()), |view| Arc::clone(&view.nodes))
    }

    /// Current view with cluster nodes sized for drawing.
    pub fn render_set(&self) -> Vec<RenderItem> {
        self.nodes()
            .iter()
            .map(|node| match node {
                ClusterNode::Leaf(leaf) => RenderItem::Point(leaf.clone()),
                ClusterNode::Aggregate(aggregate) => RenderItem::Cluster {
                    style: size_for(aggregate.point_count),
                    z_index: marker_z_index(aggregate.point_count),
                    node: aggregate.clone(),
                },
            })
            .collect()
    }

    pub fn view(&self) -> Option<ViewState> {
        self.state.lock().view.clone()
    }

    pub fn current_zoom(&self) -> Option<u8> {
        self.state.lock().view.as_ref().map(|view| view.zoom)
    }

    pub fn region(&self) -> Option<Region> {
        self.state.lock().region
    }

    pub fn epoch(&self) -> Option<Arc<IndexEpoch<T>>> {
        self.state.lock().epoch.clone()
    }

    /// Input point behind a leaf node of the current epoch.
    pub fn point(&self, index: usize) -> Option<GeoPoint<T>>
    where
        T: Clone,
    {
        self.state
            .lock()
            .epoch
            .as_ref()
            .and_then(|epoch| epoch.point(index).cloned())
    }

    pub fn config(&self) -> ClusterConfig {
        self.state.lock().config.clone()
    }

    pub fn viewport(&self) -> ViewportSize {
        self.state.lock().viewport
    }

    pub fn stats(&self) -> ControllerStats {
        self.stats.snapshot()
    }

    /// Exclusive access to the map surface.
    ///
    /// Must not be called from inside a surface callback; the surface is
    /// already locked there.
    pub fn surface(&self) -> MutexGuard<'_, S> {
        self.surface.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        fits: Vec<(Vec<Point>, mapcluster_types::region::EdgePadding)>,
        lists: Vec<Vec<u32>>,
        regions: Vec<Region>,
    }

    impl MapSurface<u32> for Recorder {
        fn fit_to_coordinates(
            &mut self,
            coordinates: &[Point],
            padding: mapcluster_types::region::EdgePadding,
        ) {
            self.fits.push((coordinates.to_vec(), padding));
        }

        fn show_list(&mut self, entities: Vec<u32>) {
            self.lists.push(entities);
        }

        fn region_changed(&mut self, region: &Region) {
            self.regions.push(*region);
        }
    }

    fn pair() -> Arc<[GeoPoint<u32>]> {
        Arc::from(vec![
            GeoPoint::from_lat_lng("a", 22.30, 114.15, 1),
            GeoPoint::from_lat_lng("b", 22.31, 114.16, 2),
        ])
    }

    fn controller() -> ClusterController<u32, Recorder> {
        ClusterController::new(
            ClusterConfig::default(),
            ViewportSize::new(400.0, 800.0),
            Recorder::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_idle_until_points() {
        let ctrl = controller();
        assert_eq!(ctrl.phase(), Phase::Idle);

        let region = Region::new(22.3, 114.15, 1.0, 1.0);
        assert_eq!(ctrl.on_region_change_complete(region), Commit::Unchanged);
        assert!(ctrl.nodes().is_empty());
        assert!(ctrl.surface().regions.is_empty());

        assert_eq!(ctrl.set_points(pair()).unwrap(), Commit::Applied);
        assert_eq!(ctrl.phase(), Phase::Ready);
        // The remembered region is clustered right away.
        assert_eq!(ctrl.nodes().len(), 1);
    }

    #[test]
    fn test_same_arc_does_not_rebuild() {
        let ctrl = controller();
        let points = pair();
        ctrl.set_points(Arc::clone(&points)).unwrap();
        assert_eq!(ctrl.set_points(Arc::clone(&points)).unwrap(), Commit::Unchanged);
        assert_eq!(ctrl.stats().epochs_built, 1);

        // Equal contents, new allocation.
        assert_eq!(ctrl.set_points(pair()).unwrap(), Commit::Applied);
        assert_eq!(ctrl.stats().epochs_built, 2);
    }

    #[test]
    fn test_region_forwarded_after_clustering() {
        let ctrl = controller();
        ctrl.set_points(pair()).unwrap();

        let region = Region::new(22.3, 114.15, 0.5, 0.5);
        assert_eq!(ctrl.on_region_change_complete(region), Commit::Applied);
        assert_eq!(ctrl.surface().regions, vec![region]);
        assert_eq!(ctrl.region(), Some(region));
        assert!(ctrl.current_zoom().is_some());
    }

    #[test]
    fn test_tap_at_max_zoom_lists_entities() {
        let config = ClusterConfig::default().with_zoom_range(1, 8);
        let ctrl = ClusterController::new(config, ViewportSize::default(), Recorder::default())
            .unwrap();
        ctrl.set_points(pair()).unwrap();
        ctrl.on_region_change_complete(Region::new(22.3, 114.15, 0.01, 0.01));
        assert_eq!(ctrl.current_zoom(), Some(8));

        let cluster = ctrl.nodes()[0].as_aggregate().unwrap().id;
        let action = ctrl.on_cluster_tap(cluster).unwrap();
        assert_eq!(action, TapAction::ShowList { point_count: 2 });

        let surface = ctrl.surface();
        assert!(surface.fits.is_empty());
        let mut listed = surface.lists[0].clone();
        listed.sort();
        assert_eq!(listed, vec![1, 2]);
    }

    #[test]
    fn test_tap_without_epoch() {
        let ctrl = controller();
        let bogus = AggregateId { epoch: 0, local: 0 };
        assert!(matches!(ctrl.on_cluster_tap(bogus), Err(ClusterError::NoEpoch)));
    }

    #[test]
    fn test_resize_requeries() {
        let ctrl = controller();
        ctrl.set_points(pair()).unwrap();
        ctrl.on_region_change_complete(Region::new(22.3, 114.15, 1.0, 1.0));
        let before = ctrl.current_zoom().unwrap();

        assert_eq!(ctrl.resize(ViewportSize::new(1600.0, 3200.0)), Commit::Applied);
        assert_eq!(ctrl.current_zoom(), Some(before + 2));
        assert_eq!(ctrl.viewport(), ViewportSize::new(1600.0, 3200.0));
    }
}
