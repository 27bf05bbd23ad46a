//! Durable conflict queue backed by SQLite.
//!
//! At-least-once delivery with leased receives: a message becomes invisible
//! for the visibility timeout once handed to a worker, reappears if never
//! acknowledged, and is parked as DEAD after the attempt budget is spent.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

use flightwx_core::models::{BookingStatus, ConflictMessage};

/// A message leased to one worker until its visibility timeout expires.
#[derive(Debug, Clone)]
pub struct LeasedMessage {
    pub id: i64,
    pub attempts: i64,
    pub message: ConflictMessage,
}

/// Queue depth snapshot for the status endpoint.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct QueueDepth {
    pub ready: i64,
    pub dead: i64,
}

/// Append a conflict message.
pub async fn enqueue_conflict(pool: &SqlitePool, message: &ConflictMessage) -> Result<i64> {
    let payload = serde_json::to_string(message)?;
    let now = Utc::now().to_rfc3339();

    let result = sqlx::query(
        r#"
        INSERT INTO conflict_queue (payload, state, attempts, enqueued_at, visible_at)
        VALUES (?1, 'READY', 0, ?2, ?2)
        "#,
    )
    .bind(&payload)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Atomically move a booking from SCHEDULED to WEATHER_HOLD and enqueue
/// its conflict message.
///
/// One transaction for both writes: a held booking without a queue message
/// would be invisible to future monitor runs (status filter) and to the
/// worker, stranding it. Returns false without writing anything when the
/// booking was no longer SCHEDULED.
pub async fn hold_and_enqueue(
    pool: &SqlitePool,
    booking_id: &str,
    message: &ConflictMessage,
) -> Result<bool> {
    let payload = serde_json::to_string(message)?;
    let now = Utc::now().to_rfc3339();

    let mut tx = pool.begin().await?;

    let held = sqlx::query("UPDATE bookings SET status = ?1 WHERE id = ?2 AND status = ?3")
        .bind(BookingStatus::WeatherHold.as_str())
        .bind(booking_id)
        .bind(BookingStatus::Scheduled.as_str())
        .execute(&mut *tx)
        .await?;

    if held.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query(
        r#"
        INSERT INTO conflict_queue (payload, state, attempts, enqueued_at, visible_at)
        VALUES (?1, 'READY', 0, ?2, ?2)
        "#,
    )
    .bind(&payload)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

/// Lease the next visible message, if any.
///
/// The lease increments the attempt counter and pushes `visible_at` past
/// the visibility timeout; a message that has exhausted its attempts is
/// marked DEAD instead of being handed out again.
pub async fn receive(
    pool: &SqlitePool,
    now: DateTime<Utc>,
    visibility_secs: i64,
    max_attempts: i64,
) -> Result<Option<LeasedMessage>> {
    loop {
        let mut tx = pool.begin().await?;

        let row: Option<(i64, String, i64)> = sqlx::query_as(
            r#"
            SELECT id, payload, attempts FROM conflict_queue
            WHERE state = 'READY' AND visible_at <= ?1
            ORDER BY id LIMIT 1
            "#,
        )
        .bind(now.to_rfc3339())
        .fetch_optional(&mut *tx)
        .await?;

        let Some((id, payload, attempts)) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        if attempts >= max_attempts {
            sqlx::query("UPDATE conflict_queue SET state = 'DEAD' WHERE id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            tracing::warn!(queue_id = id, attempts, "conflict message dead-lettered");
            continue;
        }

        let visible_at = (now + Duration::seconds(visibility_secs)).to_rfc3339();
        sqlx::query(
            "UPDATE conflict_queue SET attempts = attempts + 1, visible_at = ?1 WHERE id = ?2",
        )
        .bind(&visible_at)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        let message: ConflictMessage = match serde_json::from_str(&payload) {
            Ok(message) => message,
            Err(e) => {
                // Undecodable payloads can never succeed; park them.
                tracing::error!(queue_id = id, "dropping undecodable conflict payload: {e}");
                sqlx::query("UPDATE conflict_queue SET state = 'DEAD' WHERE id = ?1")
                    .bind(id)
                    .execute(pool)
                    .await?;
                continue;
            }
        };

        return Ok(Some(LeasedMessage {
            id,
            attempts: attempts + 1,
            message,
        }));
    }
}

/// Acknowledge a processed message.
pub async fn ack(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("UPDATE conflict_queue SET state = 'DONE' WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Current ready and dead-letter counts.
pub async fn depth(pool: &SqlitePool) -> Result<QueueDepth> {
    let (ready,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM conflict_queue WHERE state = 'READY'")
            .fetch_one(pool)
            .await?;
    let (dead,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM conflict_queue WHERE state = 'DEAD'")
            .fetch_one(pool)
            .await?;
    Ok(QueueDepth { ready, dead })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::bookings::{insert_booking, load_booking};
    use crate::persistence::db::init_database;
    use flightwx_core::models::{Booking, CertificationTier, RouteStatus};

    fn message(booking_id: &str) -> ConflictMessage {
        ConflictMessage {
            booking_id: booking_id.to_string(),
            student_id: "student-1".to_string(),
            instructor_id: "instructor-1".to_string(),
            tier: CertificationTier::StudentPilot,
            departure: "33.68,-117.87".to_string(),
            arrival: "33.68,-117.87".to_string(),
            scheduled_start: Utc::now(),
            duration_min: 60,
            verdict: RouteStatus::Unsafe,
            violation_summary: "VISIBILITY: 3 waypoints".to_string(),
            checked_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn hold_and_enqueue_writes_both_or_neither() {
        let db = init_database(":memory:", 1).await.unwrap();
        let booking = Booking {
            id: "bk-1".to_string(),
            student_id: "student-1".to_string(),
            instructor_id: "instructor-1".to_string(),
            tier: Some(CertificationTier::StudentPilot),
            departure: "33.68,-117.87".to_string(),
            arrival: "33.68,-117.87".to_string(),
            start_time: Utc::now(),
            duration_min: 60,
            status: BookingStatus::Scheduled,
            created_at: Utc::now(),
        };
        insert_booking(db.pool(), &booking).await.unwrap();

        let held = hold_and_enqueue(db.pool(), "bk-1", &message("bk-1"))
            .await
            .unwrap();
        assert!(held);

        let loaded = load_booking(db.pool(), "bk-1").await.unwrap().unwrap();
        assert_eq!(loaded.status, BookingStatus::WeatherHold);
        assert_eq!(depth(db.pool()).await.unwrap().ready, 1);

        // No longer SCHEDULED: the guard misses and nothing is enqueued.
        let again = hold_and_enqueue(db.pool(), "bk-1", &message("bk-1"))
            .await
            .unwrap();
        assert!(!again);
        assert_eq!(depth(db.pool()).await.unwrap().ready, 1);
    }

    #[tokio::test]
    async fn hold_and_enqueue_leaves_unknown_booking_alone() {
        let db = init_database(":memory:", 1).await.unwrap();

        let held = hold_and_enqueue(db.pool(), "bk-missing", &message("bk-missing"))
            .await
            .unwrap();
        assert!(!held);
        assert_eq!(depth(db.pool()).await.unwrap().ready, 0);
    }

    #[tokio::test]
    async fn leased_message_is_invisible_until_timeout() {
        let db = init_database(":memory:", 1).await.unwrap();
        enqueue_conflict(db.pool(), &message("bk-1")).await.unwrap();

        let now = Utc::now();
        let leased = receive(db.pool(), now, 60, 5).await.unwrap().unwrap();
        assert_eq!(leased.message.booking_id, "bk-1");
        assert_eq!(leased.attempts, 1);

        // Within the visibility window nothing is handed out.
        assert!(receive(db.pool(), now, 60, 5).await.unwrap().is_none());

        // After the window expires, the unacked message comes back.
        let later = now + Duration::seconds(61);
        let redelivered = receive(db.pool(), later, 60, 5).await.unwrap().unwrap();
        assert_eq!(redelivered.id, leased.id);
        assert_eq!(redelivered.attempts, 2);
    }

    #[tokio::test]
    async fn acked_message_never_returns() {
        let db = init_database(":memory:", 1).await.unwrap();
        enqueue_conflict(db.pool(), &message("bk-1")).await.unwrap();

        let now = Utc::now();
        let leased = receive(db.pool(), now, 60, 5).await.unwrap().unwrap();
        ack(db.pool(), leased.id).await.unwrap();

        let later = now + Duration::seconds(120);
        assert!(receive(db.pool(), later, 60, 5).await.unwrap().is_none());
        assert_eq!(depth(db.pool()).await.unwrap().ready, 0);
    }

    #[tokio::test]
    async fn exhausted_message_is_dead_lettered() {
        let db = init_database(":memory:", 1).await.unwrap();
        enqueue_conflict(db.pool(), &message("bk-1")).await.unwrap();

        let mut now = Utc::now();
        for _ in 0..3 {
            let leased = receive(db.pool(), now, 1, 3).await.unwrap();
            assert!(leased.is_some());
            now = now + Duration::seconds(2);
        }

        // Attempt budget spent; the next receive parks it.
        assert!(receive(db.pool(), now, 1, 3).await.unwrap().is_none());
        let depth = depth(db.pool()).await.unwrap();
        assert_eq!(depth.ready, 0);
        assert_eq!(depth.dead, 1);
    }
}
