use geo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// The visible `[west, south, east, north]` rectangle of a map, in degrees.
///
/// Longitudes are not wrapped: a box crossing the antimeridian is stored with
/// `east > 180`. Consumers that index wrapped longitudes are expected to split
/// the box themselves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// The underlying geometric rectangle
    pub rect: Rect,
}

impl BoundingBox {
    /// Create a bounding box from its four edges.
    ///
    /// An `east` edge west of `west` means the box crosses the antimeridian;
    /// it is moved a full turn east rather than swapped with `west`.
    ///
    /// # Examples
    ///
    /// ```
    /// use mapcluster_types::bbox::BoundingBox;
    ///
    /// let hong_kong = BoundingBox::new(113.8, 22.1, 114.5, 22.6);
    /// assert_eq!(hong_kong.to_array(), [113.8, 22.1, 114.5, 22.6]);
    ///
    /// let fiji = BoundingBox::new(177.0, -19.0, -178.0, -16.0);
    /// assert_eq!(fiji.to_array(), [177.0, -19.0, 182.0, -16.0]);
    /// ```
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        let east = if east < west { east + 360.0 } else { east };
        Self {
            rect: Rect::new(
                geo::coord! { x: west, y: south },
                geo::coord! { x: east, y: north },
            ),
        }
    }

    /// Create a bounding box from a `geo::Rect`.
    pub fn from_rect(rect: Rect) -> Self {
        Self { rect }
    }

    /// Western edge (minimum longitude).
    pub fn west(&self) -> f64 {
        self.rect.min().x
    }

    /// Southern edge (minimum latitude).
    pub fn south(&self) -> f64 {
        self.rect.min().y
    }

    /// Eastern edge (maximum longitude).
    pub fn east(&self) -> f64 {
        self.rect.max().x
    }

    /// Northern edge (maximum latitude).
    pub fn north(&self) -> f64 {
        self.rect.max().y
    }

    /// Edges in `[west, south, east, north]` order.
    pub fn to_array(&self) -> [f64; 4] {
        [self.west(), self.south(), self.east(), self.north()]
    }

    /// Longitude span in degrees.
    pub fn width(&self) -> f64 {
        self.east() - self.west()
    }

    /// Latitude span in degrees.
    pub fn height(&self) -> f64 {
        self.north() - self.south()
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.west() + self.east()) / 2.0,
            (self.south() + self.north()) / 2.0,
        )
    }

    /// Check if a point lies inside the box, edges included.
    pub fn contains_point(&self, point: &Point) -> bool {
        point.x() >= self.west()
            && point.x() <= self.east()
            && point.y() >= self.south()
            && point.y() <= self.north()
    }
}
