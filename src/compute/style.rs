//! Cluster marker sizing.

use serde::{Deserialize, Serialize};

/// Visual size of a cluster badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerStyle {
    /// Outer halo diameter
    pub diameter_px: u32,
    /// Inner badge diameter
    pub badge_diameter_px: u32,
    /// Font size of the point count label
    pub font_size_px: u32,
}

impl MarkerStyle {
    const fn new(diameter_px: u32, badge_diameter_px: u32, font_size_px: u32) -> Self {
        Self {
            diameter_px,
            badge_diameter_px,
            font_size_px,
        }
    }
}

// Lower bound of each bucket, largest first.
const BUCKETS: [(usize, MarkerStyle); 6] = [
    (50, MarkerStyle::new(84, 64, 20)),
    (25, MarkerStyle::new(78, 58, 19)),
    (15, MarkerStyle::new(72, 54, 18)),
    (10, MarkerStyle::new(66, 50, 17)),
    (8, MarkerStyle::new(60, 46, 17)),
    (4, MarkerStyle::new(54, 40, 16)),
];

const SMALLEST: MarkerStyle = MarkerStyle::new(48, 36, 15);

/// Size bucket for a cluster holding `point_count` points.
///
/// A step function: counts between thresholds get the lower bucket, never an
/// interpolated size. Total over all counts, including 0 and 1.
///
/// # Examples
///
/// ```
/// use mapcluster::compute::style::size_for;
///
/// assert_eq!(size_for(49).diameter_px, 78);
/// assert_eq!(size_for(50).diameter_px, 84);
/// ```
pub fn size_for(point_count: usize) -> MarkerStyle {
    BUCKETS
        .iter()
        .find(|(threshold, _)| point_count >= *threshold)
        .map_or(SMALLEST, |(_, style)| *style)
}

/// Stacking order for a cluster marker; bigger clusters draw on top.
pub fn marker_z_index(point_count: usize) -> usize {
    point_count.saturating_add(1)
}
