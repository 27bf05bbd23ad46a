//! Spherical geometry and waypoint generation for planned flights.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::models::Waypoint;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Time between route samples.
pub const SAMPLE_INTERVAL_MIN: i64 = 30;

/// Below this great-circle distance the flight is treated as pattern work
/// around a single field rather than a cross-country route (1 statute mile).
const LOCAL_PATTERN_THRESHOLD_M: f64 = 1_609.34;

/// Radius of the sampling circle for pattern work (5 nautical miles).
const PATTERN_RADIUS_M: f64 = 9_260.0;

#[derive(Debug, Error, PartialEq)]
pub enum RouteError {
    /// Symbolic identifiers (ICAO codes etc.) would need an external lookup
    /// table; only decimal coordinates are accepted.
    #[error("unsupported location format: {0:?} (expected decimal \"lat,lon\")")]
    UnsupportedLocation(String),
    #[error("coordinate out of range: lat {lat}, lon {lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },
    #[error("flight duration must be positive, got {0} minutes")]
    InvalidDuration(i64),
}

/// Parse a decimal "lat,lon" location string.
///
/// Anything that does not parse as two decimal numbers is rejected as an
/// unsupported location format rather than silently approximated.
pub fn parse_location(raw: &str) -> Result<(f64, f64), RouteError> {
    let mut parts = raw.split(',');
    let (Some(lat_s), Some(lon_s), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(RouteError::UnsupportedLocation(raw.to_string()));
    };
    let (Ok(lat), Ok(lon)) = (lat_s.trim().parse::<f64>(), lon_s.trim().parse::<f64>()) else {
        return Err(RouteError::UnsupportedLocation(raw.to_string()));
    };
    validate_coordinate(lat, lon)?;
    Ok((lat, lon))
}

fn validate_coordinate(lat: f64, lon: f64) -> Result<(), RouteError> {
    if !lat.is_finite() || !lon.is_finite() || lat.abs() > 90.0 || lon.abs() > 180.0 {
        return Err(RouteError::InvalidCoordinate { lat, lon });
    }
    Ok(())
}

/// Generate the waypoint sequence for a flight.
///
/// Cross-country routes are sampled along the great-circle arc every
/// [`SAMPLE_INTERVAL_MIN`] minutes of flight, always including the exact
/// departure and arrival points. Same-field flights sample a circle of
/// fixed radius around the field instead, distributed evenly by time.
/// The final waypoint always snaps to `start + duration`.
pub fn generate_waypoints(
    dep: (f64, f64),
    arr: (f64, f64),
    start: DateTime<Utc>,
    duration_min: i64,
) -> Result<Vec<Waypoint>, RouteError> {
    validate_coordinate(dep.0, dep.1)?;
    validate_coordinate(arr.0, arr.1)?;
    if duration_min <= 0 {
        return Err(RouteError::InvalidDuration(duration_min));
    }

    let end = start + Duration::minutes(duration_min);
    let mut offsets_min: Vec<i64> = (0..duration_min)
        .step_by(SAMPLE_INTERVAL_MIN as usize)
        .collect();
    offsets_min.push(duration_min);

    let distance_m = haversine_distance(dep.0, dep.1, arr.0, arr.1);
    let waypoints: Vec<Waypoint> = if distance_m < LOCAL_PATTERN_THRESHOLD_M {
        // Pattern work: one lap of a circle around the field over the
        // flight's duration.
        offsets_min
            .iter()
            .map(|&offset| {
                let frac = offset as f64 / duration_min as f64;
                let angle = frac * std::f64::consts::TAU;
                let (lat, lon) = offset_by_bearing(dep.0, dep.1, PATTERN_RADIUS_M, angle);
                Waypoint {
                    lat,
                    lon,
                    time: start + Duration::minutes(offset),
                }
            })
            .collect()
    } else {
        offsets_min
            .iter()
            .map(|&offset| {
                let frac = offset as f64 / duration_min as f64;
                let (lat, lon) = great_circle_point(dep, arr, frac);
                Waypoint {
                    lat,
                    lon,
                    time: start + Duration::minutes(offset),
                }
            })
            .collect()
    };

    debug_assert_eq!(waypoints.last().map(|w| w.time), Some(end));
    Ok(waypoints)
}

/// Intermediate point at fraction `f` along the great circle from `a` to `b`.
///
/// Spherical interpolation, not linear lat/lon averaging, so samples stay on
/// the arc even for long legs.
pub fn great_circle_point(a: (f64, f64), b: (f64, f64), f: f64) -> (f64, f64) {
    let f = f.clamp(0.0, 1.0);
    let (phi1, lam1) = (a.0.to_radians(), a.1.to_radians());
    let (phi2, lam2) = (b.0.to_radians(), b.1.to_radians());

    let delta = angular_distance(a, b);
    if delta < 1e-12 {
        return a;
    }

    let sin_delta = delta.sin();
    let k1 = ((1.0 - f) * delta).sin() / sin_delta;
    let k2 = (f * delta).sin() / sin_delta;

    let x = k1 * phi1.cos() * lam1.cos() + k2 * phi2.cos() * lam2.cos();
    let y = k1 * phi1.cos() * lam1.sin() + k2 * phi2.cos() * lam2.sin();
    let z = k1 * phi1.sin() + k2 * phi2.sin();

    let lat = z.atan2((x * x + y * y).sqrt());
    let lon = y.atan2(x);
    (lat.to_degrees(), lon.to_degrees())
}

fn angular_distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    haversine_distance(a.0, a.1, b.0, b.1) / EARTH_RADIUS_M
}

/// Great-circle distance between two points in meters (Haversine formula).
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Offset a position by distance and bearing (0 = north, π/2 = east).
pub fn offset_by_bearing(lat: f64, lon: f64, distance_m: f64, bearing_rad: f64) -> (f64, f64) {
    if distance_m.abs() <= f64::EPSILON {
        return (lat, lon);
    }

    let lat1 = lat.to_radians();
    let lon1 = lon.to_radians();
    let angular = distance_m / EARTH_RADIUS_M;

    let sin_lat1 = lat1.sin();
    let cos_lat1 = lat1.cos();

    let sin_lat2 = sin_lat1 * angular.cos() + cos_lat1 * angular.sin() * bearing_rad.cos();
    let lat2 = sin_lat2.clamp(-1.0, 1.0).asin();

    let y = bearing_rad.sin() * angular.sin() * cos_lat1;
    let x = angular.cos() - sin_lat1 * sin_lat2;
    let mut lon2 = lon1 + y.atan2(x);
    lon2 =
        (lon2 + std::f64::consts::PI).rem_euclid(2.0 * std::f64::consts::PI) - std::f64::consts::PI;

    (lat2.to_degrees(), lon2.to_degrees())
}
