//! Error types for the clustering engine.

use crate::index::AggregateId;
use thiserror::Error;

/// Errors reported by index builds, cluster lookups and configuration updates.
///
/// Every failure is a deterministic function of its input and is returned to
/// the caller synchronously; nothing is retried.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// A point in a submitted set has an unusable coordinate.
    #[error("invalid point '{id}' at index {index}: {reason}")]
    InvalidPoint {
        id: String,
        index: usize,
        reason: String,
    },

    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown cluster {0}")]
    UnknownCluster(AggregateId),

    /// The cluster id was minted by another epoch than the one queried.
    #[error("cluster {cluster} belongs to a replaced index (current epoch {current})")]
    StaleCluster { cluster: AggregateId, current: u64 },

    #[error("no points have been loaded yet")]
    NoEpoch,

    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "toml")]
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ClusterError>;
