//! Booking and instructor-availability persistence.

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::SqlitePool;

use flightwx_core::models::{
    AvailabilityException, AvailabilityWindow, Booking, BookingStatus, CertificationTier,
    InstructorAvailability,
};

/// Load all SCHEDULED bookings starting within the look-ahead window.
pub async fn load_upcoming_scheduled(
    pool: &SqlitePool,
    now: DateTime<Utc>,
    window_hours: i64,
) -> Result<Vec<Booking>> {
    let until = now + Duration::hours(window_hours);
    let rows = sqlx::query_as::<_, BookingRow>(
        r#"
        SELECT id, student_id, instructor_id, tier, departure, arrival,
               start_time, duration_min, status, created_at
        FROM bookings
        WHERE status = 'SCHEDULED' AND start_time >= ?1 AND start_time <= ?2
        ORDER BY start_time
        "#,
    )
    .bind(now.to_rfc3339())
    .bind(until.to_rfc3339())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(|r| r.try_into()).collect()
}

/// Load a single booking by id.
pub async fn load_booking(pool: &SqlitePool, id: &str) -> Result<Option<Booking>> {
    let row = sqlx::query_as::<_, BookingRow>(
        r#"
        SELECT id, student_id, instructor_id, tier, departure, arrival,
               start_time, duration_min, status, created_at
        FROM bookings WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(r) => Ok(Some(r.try_into()?)),
        None => Ok(None),
    }
}

/// Transition a booking's status, guarded by the expected current state.
///
/// Returns false when the booking was not in `from` — the caller treats
/// that as an idempotent no-op, which is what makes duplicate queue
/// deliveries and overlapping monitor runs harmless.
pub async fn transition_status(
    pool: &SqlitePool,
    id: &str,
    from: BookingStatus,
    to: BookingStatus,
) -> Result<bool> {
    let result = sqlx::query("UPDATE bookings SET status = ?1 WHERE id = ?2 AND status = ?3")
        .bind(to.as_str())
        .bind(id)
        .bind(from.as_str())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Insert a booking (seeding and tests).
pub async fn insert_booking(pool: &SqlitePool, booking: &Booking) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO bookings (
            id, student_id, instructor_id, tier, departure, arrival,
            start_time, duration_min, status, created_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&booking.id)
    .bind(&booking.student_id)
    .bind(&booking.instructor_id)
    .bind(booking.tier.map(|t| t.as_str()))
    .bind(&booking.departure)
    .bind(&booking.arrival)
    .bind(booking.start_time.to_rfc3339())
    .bind(booking.duration_min)
    .bind(booking.status.as_str())
    .bind(booking.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load an instructor's weekly schedule and dated exceptions.
pub async fn load_availability(
    pool: &SqlitePool,
    instructor_id: &str,
) -> Result<InstructorAvailability> {
    let weekly_rows: Vec<(i64, i64, i64)> = sqlx::query_as(
        "SELECT weekday, start_min, end_min FROM instructor_availability WHERE instructor_id = ?1",
    )
    .bind(instructor_id)
    .fetch_all(pool)
    .await?;

    let exception_rows: Vec<(String, i64, Option<i64>, Option<i64>)> = sqlx::query_as(
        r#"
        SELECT date, available, start_min, end_min
        FROM availability_exceptions WHERE instructor_id = ?1
        "#,
    )
    .bind(instructor_id)
    .fetch_all(pool)
    .await?;

    let weekly = weekly_rows
        .into_iter()
        .map(|(weekday, start_min, end_min)| AvailabilityWindow {
            weekday: weekday as u32,
            start_min: start_min as u32,
            end_min: end_min as u32,
        })
        .collect();

    let mut exceptions = Vec::new();
    for (date, available, start_min, end_min) in exception_rows {
        let date = date
            .parse::<NaiveDate>()
            .map_err(|e| anyhow::anyhow!("bad exception date {date:?}: {e}"))?;
        exceptions.push(AvailabilityException {
            date,
            available: available != 0,
            start_min: start_min.map(|v| v as u32),
            end_min: end_min.map(|v| v as u32),
        });
    }

    Ok(InstructorAvailability { weekly, exceptions })
}

/// Add a recurring weekly window (seeding and tests).
pub async fn insert_weekly_window(
    pool: &SqlitePool,
    instructor_id: &str,
    window: &AvailabilityWindow,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO instructor_availability (instructor_id, weekday, start_min, end_min)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )
    .bind(instructor_id)
    .bind(window.weekday as i64)
    .bind(window.start_min as i64)
    .bind(window.end_min as i64)
    .execute(pool)
    .await?;

    Ok(())
}

/// Add a date-specific exception (seeding and tests).
pub async fn insert_exception(
    pool: &SqlitePool,
    instructor_id: &str,
    exception: &AvailabilityException,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO availability_exceptions (instructor_id, date, available, start_min, end_min)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(instructor_id)
    .bind(exception.date.to_string())
    .bind(exception.available as i64)
    .bind(exception.start_min.map(|v| v as i64))
    .bind(exception.end_min.map(|v| v as i64))
    .execute(pool)
    .await?;

    Ok(())
}

// Internal row type for SQLx
#[derive(sqlx::FromRow)]
struct BookingRow {
    id: String,
    student_id: String,
    instructor_id: String,
    tier: Option<String>,
    departure: String,
    arrival: String,
    start_time: String,
    duration_min: i64,
    status: String,
    created_at: String,
}

impl TryFrom<BookingRow> for Booking {
    type Error = anyhow::Error;

    fn try_from(row: BookingRow) -> Result<Self> {
        let status = BookingStatus::parse(&row.status)
            .ok_or_else(|| anyhow::anyhow!("unknown booking status {:?}", row.status))?;
        let tier = match row.tier.as_deref() {
            Some(raw) => Some(
                CertificationTier::parse(raw)
                    .ok_or_else(|| anyhow::anyhow!("unknown certification tier {raw:?}"))?,
            ),
            None => None,
        };

        let start_time = DateTime::parse_from_rfc3339(&row.start_time)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| anyhow::anyhow!("bad start_time: {e}"))?;
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| anyhow::anyhow!("bad created_at: {e}"))?;

        Ok(Booking {
            id: row.id,
            student_id: row.student_id,
            instructor_id: row.instructor_id,
            tier,
            departure: row.departure,
            arrival: row.arrival,
            start_time,
            duration_min: row.duration_min,
            status,
            created_at,
        })
    }
}
