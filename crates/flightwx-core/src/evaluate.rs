//! Route risk evaluation against tiered weather minimums.
//!
//! Pure functions, fully table-driven by [`WeatherMinimum`]: new tiers need
//! no changes here.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::minimums::WeatherMinimum;
use crate::models::{
    RouteEvaluation, RouteStatus, Violation, ViolationKind, Waypoint, WaypointEvaluation,
    WeatherObservation,
};

/// Evaluate one waypoint's weather against a tier's minimums.
///
/// Collects every violated dimension rather than short-circuiting; a single
/// waypoint can carry multiple violations.
pub fn evaluate_waypoint(
    waypoint: Waypoint,
    observation: WeatherObservation,
    minimum: &WeatherMinimum,
) -> WaypointEvaluation {
    let mut violations = Vec::new();

    if observation.visibility_mi < minimum.visibility_mi {
        violations.push(Violation {
            kind: ViolationKind::Visibility,
            reason: format!(
                "visibility {:.1} mi below minimum {:.1} mi",
                observation.visibility_mi, minimum.visibility_mi
            ),
            actual: Some(observation.visibility_mi),
            required: Some(minimum.visibility_mi),
        });
    }

    if observation.ceiling_ft < minimum.ceiling_ft {
        violations.push(Violation {
            kind: ViolationKind::Ceiling,
            reason: format!(
                "ceiling {:.0} ft below minimum {:.0} ft",
                observation.ceiling_ft, minimum.ceiling_ft
            ),
            actual: Some(observation.ceiling_ft),
            required: Some(minimum.ceiling_ft),
        });
    }

    if observation.wind_kt > minimum.max_wind_kt {
        violations.push(Violation {
            kind: ViolationKind::Wind,
            reason: format!(
                "wind {:.0} kt above maximum {:.0} kt",
                observation.wind_kt, minimum.max_wind_kt
            ),
            actual: Some(observation.wind_kt),
            required: Some(minimum.max_wind_kt),
        });
    }

    if let Some(gust) = observation.wind_gust_kt {
        if gust > minimum.max_gust_kt {
            violations.push(Violation {
                kind: ViolationKind::Gust,
                reason: format!(
                    "gusts {:.0} kt above maximum {:.0} kt",
                    gust, minimum.max_gust_kt
                ),
                actual: Some(gust),
                required: Some(minimum.max_gust_kt),
            });
        }
    }

    for observed in &observation.phenomena {
        let observed_upper = observed.to_uppercase();
        for prohibited in &minimum.prohibited_phenomena {
            if observed_upper.contains(&prohibited.to_uppercase()) {
                violations.push(Violation {
                    kind: ViolationKind::Phenomena,
                    reason: format!("prohibited phenomenon {} ({})", prohibited, observed),
                    actual: None,
                    required: None,
                });
            }
        }
    }

    WaypointEvaluation {
        waypoint,
        observation,
        safe: violations.is_empty(),
        violations,
    }
}

/// Evaluate a whole route.
///
/// Verdict rule: SAFE with zero unsafe waypoints, UNSAFE once at least half
/// are unsafe, MARGINAL strictly in between. One bad waypoint degrades the
/// route without condemning it outright.
pub fn evaluate_route(
    booking_id: &str,
    checked_at: DateTime<Utc>,
    samples: Vec<(Waypoint, WeatherObservation)>,
    minimum: &WeatherMinimum,
) -> RouteEvaluation {
    let waypoints: Vec<WaypointEvaluation> = samples
        .into_iter()
        .map(|(wp, obs)| evaluate_waypoint(wp, obs, minimum))
        .collect();

    let unsafe_count = waypoints.iter().filter(|w| !w.safe).count();
    let status = if unsafe_count == 0 {
        RouteStatus::Safe
    } else if unsafe_count * 2 >= waypoints.len() {
        RouteStatus::Unsafe
    } else {
        RouteStatus::Marginal
    };

    let violation_summary = summarize_violations(&waypoints);

    RouteEvaluation {
        booking_id: booking_id.to_string(),
        checked_at,
        waypoints,
        status,
        violation_summary,
    }
}

/// One aggregate line per violation kind across the route, with the count
/// of waypoints affected. Proportional to distinct risk categories, not to
/// route length.
fn summarize_violations(waypoints: &[WaypointEvaluation]) -> String {
    const KIND_ORDER: [ViolationKind; 5] = [
        ViolationKind::Visibility,
        ViolationKind::Ceiling,
        ViolationKind::Wind,
        ViolationKind::Gust,
        ViolationKind::Phenomena,
    ];

    let mut lines = Vec::new();
    for kind in KIND_ORDER {
        let affected = waypoints
            .iter()
            .filter(|w| w.violations.iter().any(|v| v.kind == kind))
            .count();
        if affected > 0 {
            let noun = if affected == 1 { "waypoint" } else { "waypoints" };
            lines.push(format!("{}: {} {}", kind.as_str(), affected, noun));
        }
    }
    lines.join("; ")
}

/// Detailed reasons: one line per (waypoint, violation) pair in waypoint
/// order, deduplicated only when the rendered string is byte-identical.
pub fn violation_reasons(evaluation: &RouteEvaluation) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut reasons = Vec::new();
    for eval in &evaluation.waypoints {
        for violation in &eval.violations {
            let line = format!(
                "{}: {}",
                eval.waypoint.time.format("%H:%MZ"),
                violation.reason
            );
            if seen.insert(line.clone()) {
                reasons.push(line);
            }
        }
    }
    reasons
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::minimums::MinimumsTable;
    use crate::models::CertificationTier;
    use chrono::TimeZone;

    fn wp(minute: u32) -> Waypoint {
        Waypoint {
            lat: 33.68,
            lon: -117.87,
            time: Utc.with_ymd_and_hms(2025, 6, 2, 15, minute, 0).unwrap(),
        }
    }

    fn clear_sky() -> WeatherObservation {
        WeatherObservation {
            visibility_mi: 10.0,
            ceiling_ft: 12_000.0,
            wind_kt: 5.0,
            wind_gust_kt: None,
            phenomena: Vec::new(),
        }
    }

    fn student() -> WeatherMinimum {
        MinimumsTable::default()
            .for_tier(CertificationTier::StudentPilot)
            .clone()
    }

    #[test]
    fn clear_weather_is_safe() {
        let eval = evaluate_waypoint(wp(0), clear_sky(), &student());
        assert!(eval.safe);
        assert!(eval.violations.is_empty());
    }

    #[test]
    fn low_visibility_yields_one_violation_with_actuals() {
        let obs = WeatherObservation {
            visibility_mi: 2.0,
            ..clear_sky()
        };
        let eval = evaluate_waypoint(wp(0), obs, &student());

        assert!(!eval.safe);
        assert_eq!(eval.violations.len(), 1);
        let v = &eval.violations[0];
        assert_eq!(v.kind, ViolationKind::Visibility);
        assert_eq!(v.actual, Some(2.0));
        assert_eq!(v.required, Some(5.0));
    }

    #[test]
    fn violations_accumulate_without_short_circuit() {
        let obs = WeatherObservation {
            visibility_mi: 1.0,
            ceiling_ft: 800.0,
            wind_kt: 18.0,
            wind_gust_kt: Some(25.0),
            phenomena: vec!["TSRA".to_string()],
        };
        let eval = evaluate_waypoint(wp(0), obs, &student());

        let kinds: Vec<ViolationKind> = eval.violations.iter().map(|v| v.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ViolationKind::Visibility,
                ViolationKind::Ceiling,
                ViolationKind::Wind,
                ViolationKind::Gust,
                ViolationKind::Phenomena,
            ]
        );
    }

    #[test]
    fn phenomena_match_is_case_insensitive_substring() {
        let obs = WeatherObservation {
            phenomena: vec!["fzra".to_string()],
            ..clear_sky()
        };
        let eval = evaluate_waypoint(wp(0), obs, &student());
        assert!(eval
            .violations
            .iter()
            .any(|v| v.kind == ViolationKind::Phenomena));
    }

    #[test]
    fn evaluation_is_deterministic() {
        let obs = WeatherObservation {
            visibility_mi: 2.0,
            ..clear_sky()
        };
        let a = evaluate_waypoint(wp(0), obs.clone(), &student());
        let b = evaluate_waypoint(wp(0), obs, &student());
        assert_eq!(a, b);
    }

    fn route_with_unsafe(total: usize, bad: usize) -> RouteEvaluation {
        let samples: Vec<(Waypoint, WeatherObservation)> = (0..total)
            .map(|i| {
                let obs = if i < bad {
                    WeatherObservation {
                        visibility_mi: 2.0,
                        ..clear_sky()
                    }
                } else {
                    clear_sky()
                };
                (wp(i as u32), obs)
            })
            .collect();
        evaluate_route("bk-1", Utc::now(), samples, &student())
    }

    #[test]
    fn verdict_boundaries() {
        assert_eq!(route_with_unsafe(4, 0).status, RouteStatus::Safe);
        assert_eq!(route_with_unsafe(4, 1).status, RouteStatus::Marginal);
        assert_eq!(route_with_unsafe(4, 2).status, RouteStatus::Unsafe);
        assert_eq!(route_with_unsafe(4, 4).status, RouteStatus::Unsafe);

        // Odd N: floor(N/2) unsafe is still marginal, ceil(N/2) is unsafe.
        assert_eq!(route_with_unsafe(5, 2).status, RouteStatus::Marginal);
        assert_eq!(route_with_unsafe(5, 3).status, RouteStatus::Unsafe);
    }

    #[test]
    fn summary_is_one_line_per_kind() {
        let route = route_with_unsafe(4, 3);
        assert_eq!(route.violation_summary, "VISIBILITY: 3 waypoints");

        let safe = route_with_unsafe(4, 0);
        assert!(safe.violation_summary.is_empty());
    }

    #[test]
    fn reasons_ordered_by_waypoint_and_deduplicated() {
        let route = route_with_unsafe(3, 2);
        let reasons = violation_reasons(&route);
        assert_eq!(reasons.len(), 2);
        assert!(reasons[0] < reasons[1] || reasons[0].contains("15:00"));

        // Identical rendered lines collapse.
        let samples = vec![
            (
                wp(0),
                WeatherObservation {
                    visibility_mi: 2.0,
                    ..clear_sky()
                },
            ),
            (
                wp(0),
                WeatherObservation {
                    visibility_mi: 2.0,
                    ..clear_sky()
                },
            ),
        ];
        let route = evaluate_route("bk-1", Utc::now(), samples, &student());
        assert_eq!(violation_reasons(&route).len(), 1);
    }
}
