pub mod evaluate;
pub mod geodesy;
pub mod minimums;
pub mod models;

pub use evaluate::{evaluate_route, evaluate_waypoint, violation_reasons};
pub use geodesy::{generate_waypoints, haversine_distance, parse_location, RouteError};
pub use minimums::{MinimumsTable, WeatherMinimum};
pub use models::{
    AvailabilityException, AvailabilityWindow, Booking, BookingStatus, CandidateDisposition,
    CertificationTier, ConflictMessage, InstructorAvailability, NotificationRecord,
    RescheduleCandidate, RouteEvaluation, RouteStatus, RunSummary, Violation, ViolationKind,
    Waypoint, WaypointEvaluation, WeatherObservation,
};
