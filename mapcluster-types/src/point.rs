use geo::Point;
use serde::{Deserialize, Serialize};

/// A geo-tagged input entity.
///
/// `location` follows the `geo` convention of `x = longitude`, `y = latitude`
/// (degrees, WGS84). The payload is opaque to the clustering engine and is only
/// handed back to callers, e.g. when a cluster is expanded into a list view.
///
/// # Examples
///
/// ```
/// use mapcluster_types::point::GeoPoint;
///
/// let offer = GeoPoint::from_lat_lng("sharing-1", 22.30, 114.15, 42u32);
/// assert_eq!(offer.lat(), 22.30);
/// assert_eq!(offer.lng(), 114.15);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint<T> {
    /// Stable unique identifier of the entity
    pub id: String,
    /// Longitude/latitude of the entity
    pub location: Point<f64>,
    /// Application-level entity being mapped
    pub payload: T,
}

impl<T> GeoPoint<T> {
    /// Create a point from an identifier, a `geo` point and a payload.
    pub fn new(id: impl Into<String>, location: Point<f64>, payload: T) -> Self {
        Self {
            id: id.into(),
            location,
            payload,
        }
    }

    /// Create a point from latitude and longitude in that order.
    ///
    /// Map collaborators usually speak lat/lng while `geo` stores x/y; this
    /// constructor keeps call sites from swapping the two.
    pub fn from_lat_lng(id: impl Into<String>, lat: f64, lng: f64, payload: T) -> Self {
        Self::new(id, Point::new(lng, lat), payload)
    }

    /// Latitude in degrees.
    pub fn lat(&self) -> f64 {
        self.location.y()
    }

    /// Longitude in degrees.
    pub fn lng(&self) -> f64 {
        self.location.x()
    }
}
