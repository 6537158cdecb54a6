//! Validation for geographic coordinates.

use crate::error::{ClusterError, Result};
use geo::Point;
use mapcluster_types::point::GeoPoint;

fn coordinate_issue(lng: f64, lat: f64) -> Option<String> {
    if !lng.is_finite() {
        return Some(format!("Longitude must be finite, got: {}", lng));
    }

    if !lat.is_finite() {
        return Some(format!("Latitude must be finite, got: {}", lat));
    }

    if !(-180.0..=180.0).contains(&lng) {
        return Some(format!("Longitude out of range [-180.0, 180.0]: {}", lng));
    }

    if !(-90.0..=90.0).contains(&lat) {
        return Some(format!("Latitude out of range [-90.0, 90.0]: {}", lat));
    }

    None
}

/// Validates a 2D point has valid longitude and latitude.
///
/// Longitude: [-180.0, 180.0], Latitude: [-90.0, 90.0]
///
/// # Examples
///
/// ```
/// use mapcluster::compute::validation::validate_geographic_point;
/// use geo::Point;
///
/// let hong_kong = Point::new(114.15, 22.30);
/// assert!(validate_geographic_point(&hong_kong).is_ok());
///
/// // Invalid latitude
/// let invalid = Point::new(114.15, 95.0);
/// assert!(validate_geographic_point(&invalid).is_err());
/// ```
pub fn validate_geographic_point(point: &Point) -> Result<()> {
    match coordinate_issue(point.x(), point.y()) {
        Some(reason) => Err(ClusterError::InvalidCoordinate(reason)),
        None => Ok(()),
    }
}

/// Validates every point of a set, reporting the first offender by id.
///
/// # Examples
///
/// ```
/// use mapcluster::compute::validation::validate_points;
/// use mapcluster::{ClusterError, GeoPoint};
///
/// let points = vec![
///     GeoPoint::from_lat_lng("a", 22.30, 114.15, ()),
///     GeoPoint::from_lat_lng("b", 22.31, 999.0, ()), // Invalid
/// ];
///
/// match validate_points(&points) {
///     Err(ClusterError::InvalidPoint { id, index, .. }) => {
///         assert_eq!(id, "b");
///         assert_eq!(index, 1);
///     }
///     other => panic!("unexpected result: {:?}", other),
/// }
/// ```
pub fn validate_points<T>(points: &[GeoPoint<T>]) -> Result<()> {
    for (index, point) in points.iter().enumerate() {
        if let Some(reason) = coordinate_issue(point.lng(), point.lat()) {
            return Err(ClusterError::InvalidPoint {
                id: point.id.clone(),
                index,
                reason,
            });
        }
    }
    Ok(())
}

/// Builds a point from textual coordinates, as sharings arrive from the API.
///
/// Fails when either coordinate does not parse as a number or lies outside
/// the geographic range.
pub fn parse_lat_lng<T>(
    id: impl Into<String>,
    lat: &str,
    lng: &str,
    payload: T,
) -> Result<GeoPoint<T>> {
    let id = id.into();
    let parse = |label: &str, raw: &str| {
        raw.trim()
            .parse::<f64>()
            .map_err(|e| ClusterError::InvalidPoint {
                id: id.clone(),
                index: 0,
                reason: format!("{} '{}' is not a number: {}", label, raw, e),
            })
    };
    let lat = parse("Latitude", lat)?;
    let lng = parse("Longitude", lng)?;

    if let Some(reason) = coordinate_issue(lng, lat) {
        return Err(ClusterError::InvalidPoint {
            id,
            index: 0,
            reason,
        });
    }

    Ok(GeoPoint::from_lat_lng(id, lat, lng, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_geographic_point() {
        let hong_kong = Point::new(114.1694, 22.3193);
        assert!(validate_geographic_point(&hong_kong).is_ok());

        // Edge cases
        assert!(validate_geographic_point(&Point::new(180.0, 0.0)).is_ok());
        assert!(validate_geographic_point(&Point::new(-180.0, 0.0)).is_ok());
        assert!(validate_geographic_point(&Point::new(0.0, 90.0)).is_ok());
        assert!(validate_geographic_point(&Point::new(0.0, -90.0)).is_ok());
    }

    #[test]
    fn test_invalid_coordinates() {
        assert!(validate_geographic_point(&Point::new(180.1, 40.0)).is_err());
        assert!(validate_geographic_point(&Point::new(-200.0, 40.0)).is_err());
        assert!(validate_geographic_point(&Point::new(-74.0, 90.1)).is_err());
        assert!(validate_geographic_point(&Point::new(f64::NAN, 40.0)).is_err());
        assert!(validate_geographic_point(&Point::new(-74.0, f64::INFINITY)).is_err());
    }

    #[test]
    fn test_validate_points_names_offender() {
        let points = vec![
            GeoPoint::from_lat_lng("ok", 22.3, 114.1, ()),
            GeoPoint::from_lat_lng("nan", f64::NAN, 114.1, ()),
            GeoPoint::from_lat_lng("far", 95.0, 114.1, ()),
        ];

        let err = validate_points(&points).unwrap_err();
        assert!(err.to_string().contains("'nan'"));
        assert!(matches!(err, ClusterError::InvalidPoint { index: 1, .. }));

        assert!(validate_points::<()>(&[]).is_ok());
    }

    #[test]
    fn test_parse_lat_lng() {
        let point = parse_lat_lng("17", "22.30", " 114.15", "rice").unwrap();
        assert_eq!(point.lat(), 22.30);
        assert_eq!(point.lng(), 114.15);
        assert_eq!(point.payload, "rice");

        assert!(matches!(
            parse_lat_lng("18", "north", "114.15", ()),
            Err(ClusterError::InvalidPoint { id, .. }) if id == "18"
        ));
        assert!(parse_lat_lng("19", "91", "114.15", ()).is_err());
    }
}
