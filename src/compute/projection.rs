//! Spherical Mercator projection onto the unit square.
//!
//! `x` grows eastward from 0 at -180° to 1 at 180°; `y` grows southward from
//! 0 near the north pole to 1 near the south pole. Multiplying by
//! `extent * 2^zoom` gives pixel coordinates at that zoom.

use std::f64::consts::PI;

/// Project a longitude to `[0, 1]`.
#[inline]
pub fn lng_x(lng: f64) -> f64 {
    lng / 360.0 + 0.5
}

/// Project a latitude to `[0, 1]`, clamping the poles.
#[inline]
pub fn lat_y(lat: f64) -> f64 {
    let sin = (lat * PI / 180.0).sin();
    let y = 0.5 - 0.25 * ((1.0 + sin) / (1.0 - sin)).ln() / PI;
    y.clamp(0.0, 1.0)
}

/// Inverse of [`lng_x`].
#[inline]
pub fn x_lng(x: f64) -> f64 {
    (x - 0.5) * 360.0
}

/// Inverse of [`lat_y`].
#[inline]
pub fn y_lat(y: f64) -> f64 {
    let y2 = (180.0 - y * 360.0) * PI / 180.0;
    360.0 * y2.exp().atan() / PI - 90.0
}

/// Clustering radius in unit-square distance at `zoom`.
#[inline]
pub fn zoom_radius(radius_px: f64, extent: u32, zoom: u8) -> f64 {
    radius_px / (f64::from(extent) * 2f64.powi(i32::from(zoom)))
}
