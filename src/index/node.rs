use super::{AggregateId, LevelNode, NodeKind};
use geo::Point;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use mapcluster_types::point::GeoPoint;
use serde::Serialize;

/// A single input point visible at the queried zoom.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeafNode {
    /// Position of the point in the epoch's input array
    pub index: usize,
    pub id: String,
    pub location: Point,
}

/// A synthetic group of at least two input points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateNode {
    pub id: AggregateId,
    /// Mean position of the cluster's direct members
    pub location: Point,
    pub point_count: usize,
}

/// One entry of a query result.
///
/// Leaves stand for one original point and should be drawn with that point's
/// own marker; aggregates are drawn as a count badge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClusterNode {
    Leaf(LeafNode),
    Aggregate(AggregateNode),
}

impl ClusterNode {
    pub(crate) fn from_level_node<T>(node: &LevelNode, points: &[GeoPoint<T>]) -> Self {
        let location = Point::new(node.lng, node.lat);
        match node.kind {
            NodeKind::Leaf(index) => ClusterNode::Leaf(LeafNode {
                index,
                id: points[index].id.clone(),
                location,
            }),
            NodeKind::Cluster(id) => ClusterNode::Aggregate(AggregateNode {
                id,
                location,
                point_count: node.num_points,
            }),
        }
    }

    /// Number of points behind a cluster; 0 for a leaf.
    pub fn point_count(&self) -> usize {
        match self {
            ClusterNode::Leaf(_) => 0,
            ClusterNode::Aggregate(aggregate) => aggregate.point_count,
        }
    }

    /// Number of input points this node accounts for.
    pub fn weight(&self) -> usize {
        self.point_count().max(1)
    }

    pub fn location(&self) -> Point {
        match self {
            ClusterNode::Leaf(leaf) => leaf.location,
            ClusterNode::Aggregate(aggregate) => aggregate.location,
        }
    }

    pub fn is_cluster(&self) -> bool {
        matches!(self, ClusterNode::Aggregate(_))
    }

    pub fn as_leaf(&self) -> Option<&LeafNode> {
        match self {
            ClusterNode::Leaf(leaf) => Some(leaf),
            ClusterNode::Aggregate(_) => None,
        }
    }

    pub fn as_aggregate(&self) -> Option<&AggregateNode> {
        match self {
            ClusterNode::Leaf(_) => None,
            ClusterNode::Aggregate(aggregate) => Some(aggregate),
        }
    }

    /// GeoJSON point feature for this node.
    ///
    /// Leaves carry `point_count = 0` and their input `index`; clusters carry
    /// `cluster = true`, `cluster_id`, `point_count` and a short count label.
    pub fn to_feature(&self) -> Feature {
        let location = self.location();
        let mut properties = JsonObject::new();
        properties.insert("point_count".to_string(), self.point_count().into());

        let id = match self {
            ClusterNode::Leaf(leaf) => {
                properties.insert("index".to_string(), leaf.index.into());
                leaf.id.clone()
            }
            ClusterNode::Aggregate(aggregate) => {
                properties.insert("cluster".to_string(), true.into());
                properties.insert("cluster_id".to_string(), aggregate.id.to_string().into());
                properties.insert(
                    "point_count_abbreviated".to_string(),
                    abbreviate_count(aggregate.point_count).into(),
                );
                format!("cluster-{}", aggregate.id)
            }
        };

        Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Point(vec![location.x(), location.y()]))),
            id: Some(geojson::feature::Id::String(id)),
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

/// GeoJSON collection of a whole query result, in result order.
pub fn nodes_to_feature_collection(nodes: &[ClusterNode]) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: nodes.iter().map(ClusterNode::to_feature).collect(),
        foreign_members: None,
    }
}

/// Short label for a count: `999`, `1.2k`, `15k`.
pub(crate) fn abbreviate_count(count: usize) -> String {
    if count >= 10_000 {
        format!("{}k", (count as f64 / 1000.0).round())
    } else if count >= 1000 {
        format!("{}k", (count as f64 / 100.0).round() / 10.0)
    } else {
        count.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbreviate_count() {
        assert_eq!(abbreviate_count(2), "2");
        assert_eq!(abbreviate_count(999), "999");
        assert_eq!(abbreviate_count(1000), "1k");
        assert_eq!(abbreviate_count(1249), "1.2k");
        assert_eq!(abbreviate_count(15_400), "15k");
    }

    #[test]
    fn test_leaf_feature() {
        let node = ClusterNode::Leaf(LeafNode {
            index: 4,
            id: "sharing-9".to_string(),
            location: Point::new(114.15, 22.3),
        });
        let feature = node.to_feature();
        let props = feature.properties.unwrap();
        assert_eq!(props["point_count"], 0);
        assert_eq!(props["index"], 4);
        assert!(props.get("cluster").is_none());
        assert_eq!(
            feature.id,
            Some(geojson::feature::Id::String("sharing-9".to_string()))
        );
    }

    #[test]
    fn test_cluster_feature_collection() {
        let node = ClusterNode::Aggregate(AggregateNode {
            id: AggregateId::new(3, 1, 10),
            location: Point::new(114.15, 22.3),
            point_count: 1500,
        });
        let collection = nodes_to_feature_collection(&[node.clone(), node]);
        assert_eq!(collection.features.len(), 2);

        let props = collection.features[0].properties.as_ref().unwrap();
        assert_eq!(props["cluster"], true);
        assert_eq!(props["point_count"], 1500);
        assert_eq!(props["point_count_abbreviated"], "1.5k");
        assert!(collection.to_string().contains("\"Point\""));
    }
}
