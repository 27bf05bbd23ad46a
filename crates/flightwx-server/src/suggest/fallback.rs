//! Deterministic heuristic fallback for suggestion generation.
//!
//! A conflicted booking must never end up with zero candidates just
//! because the generative provider was down; these offer the same
//! time-of-day at fixed day offsets with deliberately low confidence.

use chrono::Duration;

use super::{Suggestion, SuggestionContext};

/// Day offsets tried by the heuristic.
pub const FALLBACK_DAY_OFFSETS: [i64; 3] = [2, 3, 7];

/// Confidence assigned to heuristic candidates — strictly below the
/// generative path's typical range so they sort last.
pub const FALLBACK_CONFIDENCE: f64 = 0.4;

pub fn fallback_suggestions(context: &SuggestionContext) -> Vec<Suggestion> {
    FALLBACK_DAY_OFFSETS
        .iter()
        .map(|&days| Suggestion {
            proposed_time: context.original_start + Duration::days(days),
            reasoning: format!(
                "Same time of day {} days later; offered without forecast guidance",
                days
            ),
            confidence: FALLBACK_CONFIDENCE,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike, Utc};
    use flightwx_core::models::{CertificationTier, InstructorAvailability};

    #[test]
    fn fallback_keeps_the_time_of_day() {
        let context = SuggestionContext {
            booking_id: "bk-1".to_string(),
            tier: CertificationTier::StudentPilot,
            original_start: Utc.with_ymd_and_hms(2025, 6, 2, 15, 30, 0).unwrap(),
            duration_min: 60,
            violation_summary: "WIND: 2 waypoints".to_string(),
            availability: InstructorAvailability::default(),
        };

        let suggestions = fallback_suggestions(&context);
        assert_eq!(suggestions.len(), 3);
        for s in &suggestions {
            assert_eq!(s.proposed_time.hour(), 15);
            assert_eq!(s.proposed_time.minute(), 30);
            assert_eq!(s.confidence, FALLBACK_CONFIDENCE);
        }
        assert_eq!(
            suggestions[2].proposed_time,
            context.original_start + Duration::days(7)
        );
    }
}
