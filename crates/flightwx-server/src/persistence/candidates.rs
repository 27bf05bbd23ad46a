//! Reschedule candidate persistence.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use flightwx_core::models::{
    BookingStatus, CandidateDisposition, NotificationRecord, RescheduleCandidate,
};

/// Atomically persist validated candidates, move the booking from
/// WEATHER_HOLD to AWAITING_RESPONSE, and write the notification rows.
///
/// All-or-nothing: candidates without the status flip (or vice versa) must
/// never be observable. Returns false without writing anything when the
/// booking was no longer in WEATHER_HOLD — the duplicate-delivery no-op.
pub async fn commit_candidates(
    pool: &SqlitePool,
    booking_id: &str,
    candidates: &[RescheduleCandidate],
    notifications: &[NotificationRecord],
) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let moved = sqlx::query("UPDATE bookings SET status = ?1 WHERE id = ?2 AND status = ?3")
        .bind(BookingStatus::AwaitingResponse.as_str())
        .bind(booking_id)
        .bind(BookingStatus::WeatherHold.as_str())
        .execute(&mut *tx)
        .await?;

    if moved.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    for candidate in candidates {
        sqlx::query(
            r#"
            INSERT INTO reschedule_candidates (
                id, booking_id, proposed_time, reasoning, confidence,
                weather_safe, instructor_available, disposition, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&candidate.id)
        .bind(&candidate.booking_id)
        .bind(candidate.proposed_time.to_rfc3339())
        .bind(&candidate.reasoning)
        .bind(candidate.confidence)
        .bind(candidate.weather_safe as i64)
        .bind(candidate.instructor_available as i64)
        .bind(candidate.disposition.as_str())
        .bind(candidate.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;
    }

    for notification in notifications {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, recipient_id, booking_id, kind, body, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&notification.id)
        .bind(&notification.recipient_id)
        .bind(&notification.booking_id)
        .bind(&notification.kind)
        .bind(&notification.body)
        .bind(notification.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(true)
}

/// Load all candidates for a booking, most confident first.
pub async fn load_candidates(
    pool: &SqlitePool,
    booking_id: &str,
) -> Result<Vec<RescheduleCandidate>> {
    let rows = sqlx::query_as::<_, CandidateRow>(
        r#"
        SELECT id, booking_id, proposed_time, reasoning, confidence,
               weather_safe, instructor_available, disposition, created_at
        FROM reschedule_candidates
        WHERE booking_id = ?1
        ORDER BY confidence DESC
        "#,
    )
    .bind(booking_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(|r| r.try_into()).collect()
}

/// Number of notification rows for a booking.
pub async fn count_notifications(pool: &SqlitePool, booking_id: &str) -> Result<i64> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE booking_id = ?1")
            .bind(booking_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

// Internal row type for SQLx
#[derive(sqlx::FromRow)]
struct CandidateRow {
    id: String,
    booking_id: String,
    proposed_time: String,
    reasoning: String,
    confidence: f64,
    weather_safe: i64,
    instructor_available: i64,
    disposition: String,
    created_at: String,
}

impl TryFrom<CandidateRow> for RescheduleCandidate {
    type Error = anyhow::Error;

    fn try_from(row: CandidateRow) -> Result<Self> {
        let disposition = CandidateDisposition::parse(&row.disposition)
            .ok_or_else(|| anyhow::anyhow!("unknown disposition {:?}", row.disposition))?;
        let proposed_time = DateTime::parse_from_rfc3339(&row.proposed_time)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| anyhow::anyhow!("bad proposed_time: {e}"))?;
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| anyhow::anyhow!("bad created_at: {e}"))?;

        Ok(RescheduleCandidate {
            id: row.id,
            booking_id: row.booking_id,
            proposed_time,
            reasoning: row.reasoning,
            confidence: row.confidence,
            weather_safe: row.weather_safe != 0,
            instructor_available: row.instructor_available != 0,
            disposition,
            created_at,
        })
    }
}
