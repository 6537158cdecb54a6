//! Read-only queries over an epoch: visible nodes and cluster expansion.

use super::{AggregateId, ClusterNode, IndexEpoch, LevelNode, NodeKind};
use crate::compute::projection::{lat_y, lng_x, zoom_radius};
use crate::error::{ClusterError, Result};
use mapcluster_types::bbox::BoundingBox;
use mapcluster_types::point::GeoPoint;

impl<T> IndexEpoch<T> {
    /// Nodes visible inside `bbox` at `zoom`.
    ///
    /// Longitudes outside `[-180, 180]` are wrapped; a box crossing the
    /// antimeridian is answered as its eastern part followed by its western
    /// part. The order is the index's traversal order and is stable for equal
    /// inputs, but carries no geographic meaning.
    pub fn query(&self, bbox: &BoundingBox, zoom: u8) -> Vec<ClusterNode> {
        if !bbox.to_array().iter().all(|v| v.is_finite()) {
            log::warn!("Rejecting cluster query with non-finite bounding box");
            return Vec::new();
        }

        let min_lat = bbox.south().clamp(-90.0, 90.0);
        let max_lat = bbox.north().clamp(-90.0, 90.0);

        if bbox.east() - bbox.west() >= 360.0 {
            return self.query_wrapped(-180.0, min_lat, 180.0, max_lat, zoom);
        }

        let min_lng = wrap_lng(bbox.west());
        let max_lng = if bbox.east() == 180.0 {
            180.0
        } else {
            wrap_lng(bbox.east())
        };

        if min_lng > max_lng {
            let mut nodes = self.query_wrapped(min_lng, min_lat, 180.0, max_lat, zoom);
            nodes.extend(self.query_wrapped(-180.0, min_lat, max_lng, max_lat, zoom));
            return nodes;
        }

        self.query_wrapped(min_lng, min_lat, max_lng, max_lat, zoom)
    }

    fn query_wrapped(
        &self,
        min_lng: f64,
        min_lat: f64,
        max_lng: f64,
        max_lat: f64,
        zoom: u8,
    ) -> Vec<ClusterNode> {
        let level = self.level_for_query(zoom);
        level
            .tree
            .range(lng_x(min_lng), lat_y(max_lat), lng_x(max_lng), lat_y(min_lat))
            .into_iter()
            .map(|i| ClusterNode::from_level_node(&level.nodes[i], &self.points))
            .collect()
    }

    /// Direct members of a cluster, one zoom level below where it was formed.
    pub fn children(&self, cluster: AggregateId) -> Result<Vec<ClusterNode>> {
        Ok(self
            .child_nodes(cluster)?
            .into_iter()
            .map(|node| ClusterNode::from_level_node(node, &self.points))
            .collect())
    }

    /// Every input point inside a cluster, flattened through all sub-clusters.
    pub fn expand(&self, cluster: AggregateId) -> Result<Vec<&GeoPoint<T>>> {
        self.leaves(cluster, usize::MAX, 0)
    }

    /// A page of a cluster's input points: skip `offset`, return at most `limit`.
    pub fn leaves(
        &self,
        cluster: AggregateId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<&GeoPoint<T>>> {
        let mut leaves = Vec::new();
        let mut skipped = 0;
        self.append_leaves(&mut leaves, cluster, limit, offset, &mut skipped)?;
        Ok(leaves)
    }

    /// Zoom at which the cluster breaks up into its children.
    pub fn expansion_zoom(&self, cluster: AggregateId) -> Result<u8> {
        self.child_nodes(cluster)?;
        Ok(cluster.origin_zoom())
    }

    fn append_leaves<'a>(
        &'a self,
        leaves: &mut Vec<&'a GeoPoint<T>>,
        cluster: AggregateId,
        limit: usize,
        offset: usize,
        skipped: &mut usize,
    ) -> Result<()> {
        for child in self.child_nodes(cluster)? {
            if leaves.len() >= limit {
                break;
            }
            match child.kind {
                NodeKind::Cluster(id) => {
                    if *skipped + child.num_points <= offset {
                        *skipped += child.num_points;
                    } else {
                        self.append_leaves(leaves, id, limit, offset, skipped)?;
                    }
                }
                NodeKind::Leaf(index) => {
                    if *skipped < offset {
                        *skipped += 1;
                    } else {
                        leaves.push(&self.points[index]);
                    }
                }
            }
        }
        Ok(())
    }

    fn child_nodes(&self, cluster: AggregateId) -> Result<Vec<&LevelNode>> {
        self.check_epoch(cluster)?;

        let origin_zoom = cluster.origin_zoom();
        if origin_zoom <= self.config.min_zoom || origin_zoom > self.config.max_zoom + 1 {
            return Err(ClusterError::UnknownCluster(cluster));
        }
        let level = self
            .level_at(origin_zoom)
            .ok_or(ClusterError::UnknownCluster(cluster))?;
        let origin = level
            .nodes
            .get(cluster.origin_index())
            .ok_or(ClusterError::UnknownCluster(cluster))?;

        let radius = zoom_radius(self.config.radius, self.config.extent, origin_zoom - 1);
        let children: Vec<&LevelNode> = level
            .tree
            .within(origin.x, origin.y, radius)
            .into_iter()
            .map(|i| &level.nodes[i])
            .filter(|node| node.parent == Some(cluster))
            .collect();

        if children.is_empty() {
            return Err(ClusterError::UnknownCluster(cluster));
        }
        Ok(children)
    }
}

fn wrap_lng(lng: f64) -> f64 {
    (lng + 180.0).rem_euclid(360.0) - 180.0
}
