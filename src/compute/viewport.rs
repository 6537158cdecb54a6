//! Viewport math: map regions to bounding boxes and integer zoom levels.
//!
//! Zoom follows slippy-map conventions: at zoom `z` the world is
//! `256 * 2^z` pixels wide. The zoom for a region is the largest integer level
//! at which its bounding box still fits inside the viewport on both axes.

use mapcluster_types::bbox::BoundingBox;
use mapcluster_types::region::{Region, ViewportSize};
use std::f64::consts::PI;

/// Tile size of the slippy-map pyramid, in pixels.
pub const TILE_SIZE: f64 = 256.0;

/// Longitude span at or beyond which the zoom is pinned to the minimum.
pub const WORLD_SCALE_LONGITUDE_DELTA: f64 = 40.0;

// Keeps the Mercator y finite near the poles.
const MAX_SIN_LAT: f64 = 0.9999;

/// Convert a region into the box it shows. See [`Region::to_bounding_box`].
pub fn to_bounding_box(region: &Region) -> BoundingBox {
    region.to_bounding_box()
}

/// Integer zoom at which `bbox` fits a viewport of `viewport` pixels.
///
/// Regions spanning at least [`WORLD_SCALE_LONGITUDE_DELTA`] degrees of
/// longitude, after [`Region::normalized_longitude_delta`], always map to
/// `min_zoom`. The result is clamped to
/// `[min_zoom, max_zoom]`; degenerate inputs (zero-sized boxes or viewports,
/// non-finite values) clamp to one end of the range rather than failing.
///
/// # Examples
///
/// ```
/// use mapcluster::compute::viewport::{region_to_zoom, to_bounding_box};
/// use mapcluster::{Region, ViewportSize};
///
/// let region = Region::new(22.6, 114.5, 1.0, 1.0);
/// let bbox = to_bounding_box(&region);
/// assert_eq!(region_to_zoom(&region, &bbox, 1, 20, ViewportSize::new(400.0, 800.0)), 9);
///
/// let world = Region::new(0.0, 0.0, 80.0, 45.0);
/// let bbox = to_bounding_box(&world);
/// assert_eq!(region_to_zoom(&world, &bbox, 1, 20, ViewportSize::new(4000.0, 4000.0)), 1);
/// ```
pub fn region_to_zoom(
    region: &Region,
    bbox: &BoundingBox,
    min_zoom: u8,
    max_zoom: u8,
    viewport: ViewportSize,
) -> u8 {
    if region.normalized_longitude_delta() >= WORLD_SCALE_LONGITUDE_DELTA {
        return min_zoom;
    }

    let fitted = fit_zoom(bbox, viewport);
    if fitted.is_nan() {
        return min_zoom;
    }

    let clamped = fitted
        .floor()
        .clamp(f64::from(min_zoom), f64::from(max_zoom.max(min_zoom)));
    clamped as u8
}

/// Fractional zoom at which `bbox` exactly fills the tighter viewport axis.
fn fit_zoom(bbox: &BoundingBox, viewport: ViewportSize) -> f64 {
    // Pixel extent at zoom 0; scaling by 2^z gives the extent at zoom z.
    let width = (bbox.east() - bbox.west()) * TILE_SIZE / 360.0;
    let height = (mercator_px_y(bbox.south()) - mercator_px_y(bbox.north())).abs();
    if width.is_nan() || height.is_nan() {
        return f64::NAN;
    }

    let by_width = (viewport.width / width).log2();
    let by_height = (viewport.height / height).log2();
    if by_width.is_nan() || by_height.is_nan() {
        return f64::NAN;
    }
    by_width.min(by_height)
}

fn mercator_px_y(lat: f64) -> f64 {
    let sin = (lat * PI / 180.0).sin().clamp(-MAX_SIN_LAT, MAX_SIN_LAT);
    TILE_SIZE / 2.0 - 0.5 * ((1.0 + sin) / (1.0 - sin)).ln() * TILE_SIZE / (2.0 * PI)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_scale_forces_min_zoom() {
        let region = Region::new(10.0, 20.0, 1.0, 45.0);
        let bbox = to_bounding_box(&region);
        for (w, h) in [(10.0, 10.0), (400.0, 800.0), (100_000.0, 100_000.0)] {
            assert_eq!(region_to_zoom(&region, &bbox, 3, 20, ViewportSize::new(w, h)), 3);
        }
    }

    #[test]
    fn test_exact_forty_degrees_is_world_scale() {
        let region = Region::new(0.0, 0.0, 0.01, 40.0);
        let bbox = to_bounding_box(&region);
        assert_eq!(region_to_zoom(&region, &bbox, 2, 20, ViewportSize::new(1e6, 1e6)), 2);
    }

    #[test]
    fn test_negative_span_is_normalized_before_world_scale_check() {
        // -10 degrees reported across the antimeridian is a 350 degree span.
        let region = Region::new(0.0, 180.0, 1.0, -10.0);
        let bbox = to_bounding_box(&region);
        assert_eq!(region_to_zoom(&region, &bbox, 2, 20, ViewportSize::new(1e6, 1e6)), 2);
    }

    #[test]
    fn test_zoom_grows_as_span_shrinks() {
        let viewport = ViewportSize::new(400.0, 800.0);
        let mut last = 0;
        for delta in [20.0, 5.0, 1.0, 0.1, 0.01] {
            let region = Region::new(22.3, 114.1, delta, delta);
            let zoom = region_to_zoom(&region, &to_bounding_box(&region), 1, 20, viewport);
            assert!(zoom >= last, "zoom {} after {} for delta {}", zoom, last, delta);
            last = zoom;
        }
        assert!(last > 10);
    }

    #[test]
    fn test_known_width_bound_zoom() {
        // 400 px across 1 degree: log2(400 * 360 / 256) = 9.13
        let region = Region::new(0.0, 0.0, 0.5, 1.0);
        let zoom = region_to_zoom(
            &region,
            &to_bounding_box(&region),
            1,
            20,
            ViewportSize::new(400.0, 4000.0),
        );
        assert_eq!(zoom, 9);
    }

    #[test]
    fn test_degenerate_inputs_clamp() {
        let point_region = Region::new(22.3, 114.1, 0.0, 0.0);
        let bbox = to_bounding_box(&point_region);
        assert_eq!(
            region_to_zoom(&point_region, &bbox, 1, 18, ViewportSize::default()),
            18
        );

        let region = Region::new(22.3, 114.1, 1.0, 1.0);
        let bbox = to_bounding_box(&region);
        assert_eq!(region_to_zoom(&region, &bbox, 1, 18, ViewportSize::new(0.0, 0.0)), 1);

        let nan_region = Region::new(f64::NAN, 114.1, 1.0, 1.0);
        let bbox = to_bounding_box(&nan_region);
        assert_eq!(region_to_zoom(&nan_region, &bbox, 4, 18, ViewportSize::default()), 4);
    }
}
