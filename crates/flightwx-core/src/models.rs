//! Core data models for the weather risk pipeline.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A sampled point in space and time along a planned flight.
///
/// Waypoints are generated fresh per evaluation and only persisted as part
/// of a [`RouteEvaluation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub lat: f64,
    pub lon: f64,
    pub time: DateTime<Utc>,
}

/// Canonical weather record for a single point in space and time.
///
/// Always in aviation units (statute miles, feet, knots); provider-native
/// units are converted at the client boundary and never stored raw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub visibility_mi: f64,
    pub ceiling_ft: f64,
    pub wind_kt: f64,
    #[serde(default)]
    pub wind_gust_kt: Option<f64>,
    /// Active weather phenomena codes (e.g. "TS", "FZRA", "FG").
    #[serde(default)]
    pub phenomena: Vec<String>,
}

/// A student's training level, determining which weather minimums apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificationTier {
    StudentPilot,
    PrivatePilot,
    InstrumentRated,
}

impl CertificationTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificationTier::StudentPilot => "STUDENT_PILOT",
            CertificationTier::PrivatePilot => "PRIVATE_PILOT",
            CertificationTier::InstrumentRated => "INSTRUMENT_RATED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "STUDENT_PILOT" => Some(CertificationTier::StudentPilot),
            "PRIVATE_PILOT" => Some(CertificationTier::PrivatePilot),
            "INSTRUMENT_RATED" => Some(CertificationTier::InstrumentRated),
            _ => None,
        }
    }
}

/// Dimension of a weather minimums violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKind {
    Visibility,
    Ceiling,
    Wind,
    Gust,
    Phenomena,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::Visibility => "VISIBILITY",
            ViolationKind::Ceiling => "CEILING",
            ViolationKind::Wind => "WIND",
            ViolationKind::Gust => "GUST",
            ViolationKind::Phenomena => "PHENOMENA",
        }
    }
}

/// A single violated dimension at one waypoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub reason: String,
    /// Observed value, where the dimension is numeric.
    pub actual: Option<f64>,
    /// Policy limit, where the dimension is numeric.
    pub required: Option<f64>,
}

/// Evaluation of one waypoint against a tier's minimums.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointEvaluation {
    pub waypoint: Waypoint,
    pub observation: WeatherObservation,
    pub safe: bool,
    pub violations: Vec<Violation>,
}

/// SAFE/MARGINAL/UNSAFE classification of an entire route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteStatus {
    Safe,
    Marginal,
    Unsafe,
}

impl RouteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteStatus::Safe => "SAFE",
            RouteStatus::Marginal => "MARGINAL",
            RouteStatus::Unsafe => "UNSAFE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SAFE" => Some(RouteStatus::Safe),
            "MARGINAL" => Some(RouteStatus::Marginal),
            "UNSAFE" => Some(RouteStatus::Unsafe),
            _ => None,
        }
    }
}

/// Route-level weather check result. Append-only audit record: never
/// updated, only superseded by a newer record for the same booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteEvaluation {
    pub booking_id: String,
    pub checked_at: DateTime<Utc>,
    pub waypoints: Vec<WaypointEvaluation>,
    pub status: RouteStatus,
    /// One aggregate line per violation kind across the whole route.
    pub violation_summary: String,
}

// ========== BOOKING MODELS ==========

/// Lifecycle of a training booking as driven by this pipeline.
///
/// The pipeline only moves `Scheduled -> WeatherHold` (unsafe verdict) and
/// `WeatherHold -> AwaitingResponse` (candidates ready). The confirmation
/// subsystem owns the remaining transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Scheduled,
    WeatherHold,
    AwaitingResponse,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Scheduled => "SCHEDULED",
            BookingStatus::WeatherHold => "WEATHER_HOLD",
            BookingStatus::AwaitingResponse => "AWAITING_RESPONSE",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SCHEDULED" => Some(BookingStatus::Scheduled),
            "WEATHER_HOLD" => Some(BookingStatus::WeatherHold),
            "AWAITING_RESPONSE" => Some(BookingStatus::AwaitingResponse),
            "CONFIRMED" => Some(BookingStatus::Confirmed),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }
}

/// A scheduled training flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub student_id: String,
    pub instructor_id: String,
    /// None until the student's training record is complete; such bookings
    /// are skipped by the monitor rather than treated as errors.
    pub tier: Option<CertificationTier>,
    /// Departure/arrival locations as decimal "lat,lon" strings.
    pub departure: String,
    pub arrival: String,
    pub start_time: DateTime<Utc>,
    pub duration_min: i64,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

// ========== RESCHEDULING MODELS ==========

/// Disposition set by the external confirmation flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandidateDisposition {
    Pending,
    Selected,
    Declined,
}

impl CandidateDisposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateDisposition::Pending => "PENDING",
            CandidateDisposition::Selected => "SELECTED",
            CandidateDisposition::Declined => "DECLINED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(CandidateDisposition::Pending),
            "SELECTED" => Some(CandidateDisposition::Selected),
            "DECLINED" => Some(CandidateDisposition::Declined),
            _ => None,
        }
    }
}

/// A proposed alternative time for a conflicted booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleCandidate {
    pub id: String,
    pub booking_id: String,
    pub proposed_time: DateTime<Utc>,
    pub reasoning: String,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// Informational only; an unsafe-weather candidate is still offered.
    pub weather_safe: bool,
    pub instructor_available: bool,
    pub disposition: CandidateDisposition,
    pub created_at: DateTime<Utc>,
}

/// The unit of work handed from the monitor job to the rescheduling worker.
///
/// Transient: lives on the queue and in worker memory only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictMessage {
    pub booking_id: String,
    pub student_id: String,
    pub instructor_id: String,
    pub tier: CertificationTier,
    pub departure: String,
    pub arrival: String,
    pub scheduled_start: DateTime<Utc>,
    pub duration_min: i64,
    pub verdict: RouteStatus,
    pub violation_summary: String,
    pub checked_at: DateTime<Utc>,
}

/// An in-app notification row for one affected party. Written in the same
/// transaction as the candidates it announces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: String,
    pub recipient_id: String,
    pub booking_id: String,
    pub kind: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

// ========== INSTRUCTOR AVAILABILITY ==========

/// A recurring weekly availability window, minutes from local midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    /// 0 = Monday .. 6 = Sunday (chrono `num_days_from_monday`).
    pub weekday: u32,
    pub start_min: u32,
    pub end_min: u32,
}

/// A date-specific override of the weekly schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityException {
    pub date: NaiveDate,
    /// false blocks the whole day; true opens the given window regardless
    /// of the weekly schedule.
    pub available: bool,
    #[serde(default)]
    pub start_min: Option<u32>,
    #[serde(default)]
    pub end_min: Option<u32>,
}

/// An instructor's weekly schedule plus dated exceptions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstructorAvailability {
    pub weekly: Vec<AvailabilityWindow>,
    pub exceptions: Vec<AvailabilityException>,
}

impl InstructorAvailability {
    /// Check whether a lesson starting at `start` for `duration_min` fits
    /// entirely inside an available window.
    pub fn covers(&self, start: DateTime<Utc>, duration_min: i64) -> bool {
        use chrono::{Datelike, Timelike};

        if duration_min <= 0 {
            return false;
        }
        let date = start.date_naive();
        let start_min = (start.hour() * 60 + start.minute()) as i64;
        let end_min = start_min + duration_min;
        // Lessons spanning midnight never fit a same-day window.
        if end_min > 24 * 60 {
            return false;
        }

        if let Some(exc) = self.exceptions.iter().find(|e| e.date == date) {
            if !exc.available {
                return false;
            }
            let lo = exc.start_min.unwrap_or(0) as i64;
            let hi = exc.end_min.unwrap_or(24 * 60) as i64;
            return start_min >= lo && end_min <= hi;
        }

        let weekday = start.weekday().num_days_from_monday();
        self.weekly.iter().any(|w| {
            w.weekday == weekday
                && start_min >= w.start_min as i64
                && end_min <= w.end_min as i64
        })
    }
}

// ========== OBSERVABILITY ==========

/// Outcome of one weather monitor run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Bookings loaded in the look-ahead window.
    pub total: u32,
    /// Evaluated safe, left untouched.
    pub safe: u32,
    /// Held and enqueued for rescheduling.
    pub conflicted: u32,
    /// Skipped for missing certification tier.
    pub skipped: u32,
    /// Evaluation failed; booking left as-is for the next run.
    pub failed: u32,
}
