//! Great-circle math on a spherical earth.
//!
//! All angles are in degrees, all distances in meters. Functions are pure and
//! use `libm` so they are available without `std`.
//!
//! - [`distance_m`]: Haversine distance
//! - [`initial_bearing`]: initial great-circle bearing in `[0, 360)`
//! - [`normalize_bearing`]: wrap any angle into `[0, 360)`
//! - [`wrap_180`]: wrap any angle into `(-180, 180]`
//! - [`relative_angle`]: signed turn from a heading to a bearing

use libm::{atan2, cos, fmod, sin, sqrt};

use crate::consts::EARTH_RADIUS_M;

/// Returns `true` when `latitude` lies in `[-90, 90]` and `longitude` in `[-180, 180]`.
///
/// Non-finite values are never valid.
pub fn is_valid_coordinate(latitude: f64, longitude: f64) -> bool {
    (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)
}

/// Haversine distance between two points, in meters.
///
/// Symmetric in its arguments.
pub fn distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let s_phi = sin(d_phi / 2.0);
    let s_lambda = sin(d_lambda / 2.0);
    let a = s_phi * s_phi + cos(phi1) * cos(phi2) * s_lambda * s_lambda;
    // Rounding can push `a` a hair outside [0, 1] for antipodal points.
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * atan2(sqrt(a), sqrt(1.0 - a));

    EARTH_RADIUS_M * c
}

/// Initial great-circle bearing from the first point to the second, in `[0, 360)`.
///
/// The bearing from a point to itself is meaningless; this returns `0.0` for it.
pub fn initial_bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let y = sin(d_lambda) * cos(phi2);
    let x = cos(phi1) * sin(phi2) - sin(phi1) * cos(phi2) * cos(d_lambda);

    normalize_bearing(atan2(y, x).to_degrees())
}

/// Wraps an angle into `[0, 360)`.
pub fn normalize_bearing(angle: f64) -> f64 {
    let wrapped = fmod(angle, 360.0);
    let wrapped = if wrapped < 0.0 { wrapped + 360.0 } else { wrapped };
    // -1e-15 + 360.0 rounds to 360.0
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Wraps an angle into `(-180, 180]`.
pub fn wrap_180(angle: f64) -> f64 {
    let wrapped = normalize_bearing(angle);
    if wrapped > 180.0 { wrapped - 360.0 } else { wrapped }
}

/// Signed angle to turn from `heading` to reach `bearing`, in `(-180, 180]`.
///
/// Positive means the target is clockwise of the heading (turn right).
pub fn relative_angle(bearing: f64, heading: f64) -> f64 {
    wrap_180(bearing - heading)
}
