use crate::bbox::BoundingBox;
use geo::Point;
use serde::{Deserialize, Serialize};

/// A map region as reported by the rendering surface: a centre plus the
/// latitude/longitude span currently visible.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub latitude: f64,
    pub longitude: f64,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

impl Region {
    pub fn new(latitude: f64, longitude: f64, latitude_delta: f64, longitude_delta: f64) -> Self {
        Self {
            latitude,
            longitude,
            latitude_delta,
            longitude_delta,
        }
    }

    /// Centre of the region as a `geo` point (x = longitude).
    pub fn center(&self) -> Point {
        Point::new(self.longitude, self.latitude)
    }

    /// Longitude span with the sign convention normalized.
    ///
    /// Some surfaces report a negative span when the visible area crosses the
    /// antimeridian; adding a full turn yields the real span.
    pub fn normalized_longitude_delta(&self) -> f64 {
        if self.longitude_delta < 0.0 {
            self.longitude_delta + 360.0
        } else {
            self.longitude_delta
        }
    }

    /// The visible rectangle, obtained by moving half a span out from the centre.
    ///
    /// # Examples
    ///
    /// ```
    /// use mapcluster_types::region::Region;
    ///
    /// let bbox = Region::new(22.0, 114.0, 2.0, 4.0).to_bounding_box();
    /// assert_eq!(bbox.to_array(), [112.0, 21.0, 116.0, 23.0]);
    /// ```
    pub fn to_bounding_box(&self) -> BoundingBox {
        let half_lng = self.normalized_longitude_delta() / 2.0;
        let half_lat = self.latitude_delta / 2.0;
        BoundingBox::new(
            self.longitude - half_lng,
            self.latitude - half_lat,
            self.longitude + half_lng,
            self.latitude + half_lat,
        )
    }
}

/// Pixel dimensions of the map viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: f64,
    pub height: f64,
}

impl ViewportSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl Default for ViewportSize {
    fn default() -> Self {
        Self {
            width: 400.0,
            height: 800.0,
        }
    }
}

/// Padding, in pixels, kept between fitted coordinates and the viewport edges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgePadding {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl EdgePadding {
    /// Same padding on every edge.
    pub fn uniform(pixels: f64) -> Self {
        Self {
            top: pixels,
            right: pixels,
            bottom: pixels,
            left: pixels,
        }
    }

    pub fn edges(&self) -> [f64; 4] {
        [self.top, self.right, self.bottom, self.left]
    }
}

impl Default for EdgePadding {
    fn default() -> Self {
        Self::uniform(50.0)
    }
}
