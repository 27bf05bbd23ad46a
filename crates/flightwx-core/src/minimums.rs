//! Weather minimums policy per certification tier.

use serde::{Deserialize, Serialize};

use crate::models::CertificationTier;

/// Safety limits for one certification tier.
///
/// Policy constants, not regulation: thresholds are conservative values a
/// school would tune with its chief instructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherMinimum {
    pub tier: CertificationTier,
    /// Minimum flight visibility in statute miles.
    pub visibility_mi: f64,
    /// Minimum ceiling in feet AGL.
    pub ceiling_ft: f64,
    /// Maximum sustained wind in knots.
    pub max_wind_kt: f64,
    /// Maximum gust in knots.
    pub max_gust_kt: f64,
    /// Phenomena codes that ground the flight regardless of other values.
    /// Matched case-insensitively as substrings (so "FZ" covers "FZRA").
    pub prohibited_phenomena: Vec<String>,
}

/// All tiers' minimums, loaded once at process start and immutable after.
///
/// Only constructible through `Default`, which guarantees the table is
/// never empty and every tier has an entry.
#[derive(Debug, Clone, Serialize)]
pub struct MinimumsTable {
    tiers: Vec<WeatherMinimum>,
}

impl Default for MinimumsTable {
    fn default() -> Self {
        let codes = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        Self {
            tiers: vec![
                WeatherMinimum {
                    tier: CertificationTier::StudentPilot,
                    visibility_mi: 5.0,
                    ceiling_ft: 3000.0,
                    max_wind_kt: 12.0,
                    max_gust_kt: 16.0,
                    prohibited_phenomena: codes(&["TS", "SN", "FZ", "GR", "FG"]),
                },
                WeatherMinimum {
                    tier: CertificationTier::PrivatePilot,
                    visibility_mi: 3.0,
                    ceiling_ft: 1500.0,
                    max_wind_kt: 20.0,
                    max_gust_kt: 25.0,
                    prohibited_phenomena: codes(&["TS", "FZ", "GR"]),
                },
                WeatherMinimum {
                    tier: CertificationTier::InstrumentRated,
                    visibility_mi: 1.0,
                    ceiling_ft: 500.0,
                    max_wind_kt: 25.0,
                    max_gust_kt: 30.0,
                    prohibited_phenomena: codes(&["TS", "FZ", "GR"]),
                },
            ],
        }
    }
}

impl MinimumsTable {
    /// Minimums for a tier. Falls back to the strictest entry, which always
    /// exists: construction goes through `Default` only.
    pub fn for_tier(&self, tier: CertificationTier) -> &WeatherMinimum {
        self.tiers
            .iter()
            .find(|m| m.tier == tier)
            .unwrap_or_else(|| &self.tiers[0])
    }
}
