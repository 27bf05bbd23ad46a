//! Unit conversion at the provider boundary.
//!
//! The provider reports metric units (meters, m/s, cloud cover percent);
//! everything downstream works in aviation units (statute miles, knots,
//! feet). This module is the only place conversions happen.

const METERS_PER_STATUTE_MILE: f64 = 1_609.344;
const MPS_TO_KNOTS: f64 = 1.943_844;

pub fn meters_to_statute_miles(meters: f64) -> f64 {
    meters / METERS_PER_STATUTE_MILE
}

pub fn mps_to_knots(mps: f64) -> f64 {
    mps * MPS_TO_KNOTS
}

/// Estimate a ceiling from cloud-cover percentage.
///
/// The provider reports coverage, not cloud-base height, so this maps
/// coverage bands to representative ceilings. A documented approximation,
/// not a measured ceiling.
pub fn cloud_cover_to_ceiling_ft(cover_pct: f64) -> f64 {
    match cover_pct {
        c if c < 10.0 => 12_000.0,
        c if c < 30.0 => 8_000.0,
        c if c < 60.0 => 4_000.0,
        c if c < 85.0 => 2_000.0,
        _ => 800.0,
    }
}
