//! Hierarchical cluster index over one immutable point set.
//!
//! An [`IndexEpoch`] is built once from a snapshot of points and never edited.
//! Building runs greedy clustering from `max_zoom` down to `min_zoom`: every
//! node of the level above absorbs the not-yet-claimed nodes within the
//! clustering radius at that zoom, and each level keeps its own KD-tree so
//! that queries at any zoom are a single range search.
//!
//! ```rust
//! use mapcluster::{BoundingBox, ClusterConfig, GeoPoint, IndexEpoch};
//! use std::sync::Arc;
//!
//! let points: Arc<[GeoPoint<&str>]> = Arc::from(vec![
//!     GeoPoint::from_lat_lng("a", 22.30, 114.15, "masks"),
//!     GeoPoint::from_lat_lng("b", 22.31, 114.16, "rice"),
//!     GeoPoint::from_lat_lng("c", 22.98, 114.90, "water"),
//! ]);
//! let epoch = IndexEpoch::build(points, &ClusterConfig::default())?;
//!
//! let bbox = BoundingBox::new(114.0, 22.1, 115.0, 23.1);
//! let nodes = epoch.query(&bbox, 9);
//! assert_eq!(nodes.len(), 2);
//! # Ok::<(), mapcluster::ClusterError>(())
//! ```

mod node;
mod query;

pub use node::{AggregateNode, ClusterNode, LeafNode, nodes_to_feature_collection};

use crate::compute::kdtree::KdTree;
use crate::compute::projection::{lat_y, lng_x, zoom_radius};
use crate::compute::validation::validate_points;
use crate::config::ClusterConfig;
use crate::error::{ClusterError, Result};
use mapcluster_types::point::GeoPoint;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

static EPOCH_COUNTER: AtomicU64 = AtomicU64::new(0);

const ZOOM_BITS: u32 = 5;
const ZOOM_MASK: u64 = (1 << ZOOM_BITS) - 1;

/// Identifier of a cluster, unique across every epoch built by the process.
///
/// `local` packs the position of the cluster's seed node in the level it was
/// formed from together with that level's zoom, which is enough to find its
/// children again without storing them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AggregateId {
    pub epoch: u64,
    pub local: u64,
}

impl AggregateId {
    fn new(epoch: u64, origin_index: usize, origin_zoom: u8) -> Self {
        Self {
            epoch,
            local: ((origin_index as u64) << ZOOM_BITS) | u64::from(origin_zoom),
        }
    }

    /// Zoom of the level holding this cluster's children.
    pub(crate) fn origin_zoom(&self) -> u8 {
        (self.local & ZOOM_MASK) as u8
    }

    pub(crate) fn origin_index(&self) -> usize {
        (self.local >> ZOOM_BITS) as usize
    }
}

impl fmt::Display for AggregateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.epoch, self.local)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum NodeKind {
    /// Index into the epoch's input points
    Leaf(usize),
    Cluster(AggregateId),
}

/// One entry of a zoom level: an input point or a cluster formed below it.
#[derive(Debug, Clone)]
pub(crate) struct LevelNode {
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) lng: f64,
    pub(crate) lat: f64,
    pub(crate) num_points: usize,
    pub(crate) kind: NodeKind,
    /// Cluster that absorbed this node one zoom level down
    pub(crate) parent: Option<AggregateId>,
}

impl LevelNode {
    fn new(lng: f64, lat: f64, num_points: usize, kind: NodeKind) -> Self {
        Self {
            x: lng_x(lng),
            y: lat_y(lat),
            lng,
            lat,
            num_points,
            kind,
            parent: None,
        }
    }

    fn carried(&self) -> Self {
        Self {
            parent: None,
            ..self.clone()
        }
    }
}

#[derive(Debug)]
pub(crate) struct Level {
    pub(crate) nodes: Vec<LevelNode>,
    pub(crate) tree: KdTree,
}

impl Level {
    fn new(nodes: Vec<LevelNode>, node_size: usize) -> Self {
        let tree = KdTree::build(nodes.iter().map(|n| [n.x, n.y]), node_size);
        Self { nodes, tree }
    }
}

/// Immutable spatial index built from one point-set snapshot.
///
/// Safe to share across threads; queries never mutate it.
#[derive(Debug)]
pub struct IndexEpoch<T> {
    id: u64,
    points: Arc<[GeoPoint<T>]>,
    config: ClusterConfig,
    /// Levels for `min_zoom..=max_zoom + 1`; the last one holds the raw points.
    levels: Vec<Level>,
}

impl<T> IndexEpoch<T> {
    /// Validate `points` and build every zoom level.
    ///
    /// Fails with [`ClusterError::InvalidPoint`] naming the first point with a
    /// non-finite or out-of-range coordinate, or with
    /// [`ClusterError::InvalidConfig`] if `config` does not validate.
    pub fn build(points: Arc<[GeoPoint<T>]>, config: &ClusterConfig) -> Result<Self> {
        validate_points(&points)?;
        Self::build_validated(points, config)
    }

    /// Build from points the caller has already run through
    /// [`validate_points`].
    pub(crate) fn build_validated(
        points: Arc<[GeoPoint<T>]>,
        config: &ClusterConfig,
    ) -> Result<Self> {
        config.validate()?;

        let started = Instant::now();
        let id = EPOCH_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;

        let leaves = points
            .iter()
            .enumerate()
            .map(|(i, p)| LevelNode::new(p.lng(), p.lat(), 1, NodeKind::Leaf(i)))
            .collect();

        let mut levels = Vec::with_capacity(usize::from(config.max_zoom - config.min_zoom) + 2);
        let mut current = Level::new(leaves, config.node_size);
        for zoom in (config.min_zoom..=config.max_zoom).rev() {
            let merged = cluster_level(&mut current, zoom, id, config);
            levels.push(current);
            current = Level::new(merged, config.node_size);
        }
        levels.push(current);
        levels.reverse();

        log::debug!(
            "Built index epoch {} over {} points ({} levels) in {:?}",
            id,
            points.len(),
            levels.len(),
            started.elapsed()
        );

        Ok(Self {
            id,
            points,
            config: config.clone(),
            levels,
        })
    }

    /// Process-unique identifier of this epoch.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The point set the epoch was built from.
    pub fn points(&self) -> &Arc<[GeoPoint<T>]> {
        &self.points
    }

    pub fn point(&self, index: usize) -> Option<&GeoPoint<T>> {
        self.points.get(index)
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Level used to answer queries at `zoom`.
    pub(crate) fn level_for_query(&self, zoom: u8) -> &Level {
        let zoom = zoom.clamp(self.config.min_zoom, self.config.max_zoom + 1);
        &self.levels[usize::from(zoom - self.config.min_zoom)]
    }

    /// Level stored for exactly `zoom`, if it exists.
    pub(crate) fn level_at(&self, zoom: u8) -> Option<&Level> {
        let offset = zoom.checked_sub(self.config.min_zoom)?;
        self.levels.get(usize::from(offset))
    }

    pub(crate) fn check_epoch(&self, cluster: AggregateId) -> Result<()> {
        if cluster.epoch != self.id {
            return Err(ClusterError::StaleCluster {
                cluster,
                current: self.id,
            });
        }
        Ok(())
    }
}

/// Merge the nodes of `level` at `zoom`, returning the nodes of the level below.
///
/// Nodes are visited in level order, so the first-seen node seeds a cluster
/// and claims every unclaimed neighbour within the radius.
fn cluster_level(level: &mut Level, zoom: u8, epoch: u64, config: &ClusterConfig) -> Vec<LevelNode> {
    let radius = zoom_radius(config.radius, config.extent, zoom);
    let mut claimed = vec![false; level.nodes.len()];
    let mut merged = Vec::new();

    for i in 0..level.nodes.len() {
        if claimed[i] {
            continue;
        }
        claimed[i] = true;

        let seed = &level.nodes[i];
        let neighbors: Vec<usize> = level
            .tree
            .within(seed.x, seed.y, radius)
            .into_iter()
            .filter(|&j| !claimed[j])
            .collect();

        if neighbors.is_empty() {
            merged.push(seed.carried());
            continue;
        }

        let id = AggregateId::new(epoch, i, zoom + 1);
        let mut num_points = seed.num_points;
        let mut sum_lng = seed.lng;
        let mut sum_lat = seed.lat;
        level.nodes[i].parent = Some(id);

        for &j in &neighbors {
            claimed[j] = true;
            let neighbor = &mut level.nodes[j];
            neighbor.parent = Some(id);
            num_points += neighbor.num_points;
            sum_lng += neighbor.lng;
            sum_lat += neighbor.lat;
        }

        let members = (neighbors.len() + 1) as f64;
        merged.push(LevelNode::new(
            sum_lng / members,
            sum_lat / members,
            num_points,
            NodeKind::Cluster(id),
        ));
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(coords: &[(f64, f64)]) -> Arc<[GeoPoint<usize>]> {
        coords
            .iter()
            .enumerate()
            .map(|(i, &(lat, lng))| GeoPoint::from_lat_lng(format!("p{}", i), lat, lng, i))
            .collect()
    }

    #[test]
    fn test_aggregate_id_packing() {
        let id = AggregateId::new(7, 12_345, 21);
        assert_eq!(id.origin_index(), 12_345);
        assert_eq!(id.origin_zoom(), 21);
        assert_eq!(id.epoch, 7);
        assert_eq!(id.to_string(), format!("7:{}", id.local));
    }

    #[test]
    fn test_build_rejects_bad_point_by_id() {
        let pts = points(&[(22.3, 114.1), (91.0, 114.1)]);
        match IndexEpoch::build(pts, &ClusterConfig::default()) {
            Err(ClusterError::InvalidPoint { id, index, .. }) => {
                assert_eq!(id, "p1");
                assert_eq!(index, 1);
            }
            other => panic!("expected invalid point, got ok={}", other.is_ok()),
        }
    }

    #[test]
    fn test_build_rejects_bad_config() {
        let pts = points(&[(22.3, 114.1)]);
        let config = ClusterConfig::default().with_zoom_range(5, 2);
        assert!(matches!(
            IndexEpoch::build(pts, &config),
            Err(ClusterError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_level_layout() {
        let config = ClusterConfig::default().with_zoom_range(3, 6);
        let epoch = IndexEpoch::build(points(&[(1.0, 1.0), (1.0, 1.0001)]), &config).unwrap();

        // min..=max plus the raw level
        assert_eq!(epoch.levels.len(), 5);
        assert_eq!(epoch.levels.last().unwrap().nodes.len(), 2);
        assert_eq!(epoch.level_for_query(0).nodes.len(), 1);
        assert_eq!(epoch.level_for_query(200).nodes.len(), 2);
        assert!(epoch.level_at(2).is_none());
        assert!(epoch.level_at(7).is_some());
        assert!(epoch.level_at(8).is_none());
    }

    #[test]
    fn test_prevalidated_build_matches_checked_build() {
        let pts = points(&[(22.30, 114.15), (22.31, 114.16), (22.98, 114.90)]);
        let config = ClusterConfig::default();
        let checked = IndexEpoch::build(Arc::clone(&pts), &config).unwrap();
        let trusted = IndexEpoch::build_validated(pts, &config).unwrap();

        assert_eq!(checked.levels.len(), trusted.levels.len());
        let counts =
            |level: &Level| level.nodes.iter().map(|n| n.num_points).collect::<Vec<_>>();
        for (a, b) in checked.levels.iter().zip(&trusted.levels) {
            assert_eq!(counts(a), counts(b));
        }

        // Config is still checked on the trusted path.
        let bad = ClusterConfig::default().with_node_size(0);
        assert!(matches!(
            IndexEpoch::build_validated(points(&[(1.0, 1.0)]), &bad),
            Err(ClusterError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_epoch_ids_are_unique() {
        let a = IndexEpoch::build(points(&[]), &ClusterConfig::default()).unwrap();
        let b = IndexEpoch::build(points(&[]), &ClusterConfig::default()).unwrap();
        assert_ne!(a.id(), b.id());
        assert!(a.is_empty());
    }

    #[test]
    fn test_cluster_centroid_is_unweighted_mean() {
        let config = ClusterConfig::default().with_zoom_range(1, 1);
        let epoch =
            IndexEpoch::build(points(&[(10.0, 10.0), (10.0, 10.2), (10.2, 10.0)]), &config)
                .unwrap();
        let level = epoch.level_for_query(1);
        assert_eq!(level.nodes.len(), 1);

        let cluster = &level.nodes[0];
        assert_eq!(cluster.num_points, 3);
        assert!((cluster.lng - 10.2 / 3.0 - 20.0 / 3.0).abs() < 1e-9);
        assert!((cluster.lat - 30.2 / 3.0).abs() < 1e-9);
    }
}
