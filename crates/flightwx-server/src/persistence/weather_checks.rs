//! Route evaluation audit records and monitor run summaries.
//!
//! Both tables are append-only: a newer record supersedes an older one,
//! nothing is ever updated in place.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use flightwx_core::models::{RouteEvaluation, RouteStatus, RunSummary, WaypointEvaluation};

/// Persist one route evaluation.
pub async fn insert_weather_check(pool: &SqlitePool, evaluation: &RouteEvaluation) -> Result<()> {
    let waypoints_json = serde_json::to_string(&evaluation.waypoints)?;

    sqlx::query(
        r#"
        INSERT INTO weather_checks (booking_id, checked_at, status, violation_summary, waypoints)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&evaluation.booking_id)
    .bind(evaluation.checked_at.to_rfc3339())
    .bind(evaluation.status.as_str())
    .bind(&evaluation.violation_summary)
    .bind(&waypoints_json)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load the most recent check for a booking.
pub async fn load_latest_check(
    pool: &SqlitePool,
    booking_id: &str,
) -> Result<Option<RouteEvaluation>> {
    let row: Option<(String, String, String, String)> = sqlx::query_as(
        r#"
        SELECT checked_at, status, violation_summary, waypoints
        FROM weather_checks
        WHERE booking_id = ?1
        ORDER BY id DESC LIMIT 1
        "#,
    )
    .bind(booking_id)
    .fetch_optional(pool)
    .await?;

    let Some((checked_at, status, violation_summary, waypoints)) = row else {
        return Ok(None);
    };

    let status = RouteStatus::parse(&status)
        .ok_or_else(|| anyhow::anyhow!("unknown route status {status:?}"))?;
    let waypoints: Vec<WaypointEvaluation> = serde_json::from_str(&waypoints)?;
    let checked_at = DateTime::parse_from_rfc3339(&checked_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| anyhow::anyhow!("bad checked_at: {e}"))?;

    Ok(Some(RouteEvaluation {
        booking_id: booking_id.to_string(),
        checked_at,
        waypoints,
        status,
        violation_summary,
    }))
}

/// Number of checks recorded for a booking.
pub async fn count_checks(pool: &SqlitePool, booking_id: &str) -> Result<i64> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM weather_checks WHERE booking_id = ?1")
            .bind(booking_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// Persist a monitor run summary.
pub async fn insert_run_summary(pool: &SqlitePool, summary: &RunSummary) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO monitor_runs (started_at, finished_at, total, safe, conflicted, skipped, failed)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(summary.started_at.map(|t| t.to_rfc3339()))
    .bind(summary.finished_at.map(|t| t.to_rfc3339()))
    .bind(summary.total as i64)
    .bind(summary.safe as i64)
    .bind(summary.conflicted as i64)
    .bind(summary.skipped as i64)
    .bind(summary.failed as i64)
    .execute(pool)
    .await?;

    Ok(())
}

/// Most recent run summary, if any run has completed.
pub async fn load_latest_run(pool: &SqlitePool) -> Result<Option<RunSummary>> {
    let row: Option<(Option<String>, Option<String>, i64, i64, i64, i64, i64)> = sqlx::query_as(
        r#"
        SELECT started_at, finished_at, total, safe, conflicted, skipped, failed
        FROM monitor_runs ORDER BY id DESC LIMIT 1
        "#,
    )
    .fetch_optional(pool)
    .await?;

    let Some((started_at, finished_at, total, safe, conflicted, skipped, failed)) = row else {
        return Ok(None);
    };

    let parse = |raw: Option<String>| -> Option<DateTime<Utc>> {
        raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    };

    Ok(Some(RunSummary {
        started_at: parse(started_at),
        finished_at: parse(finished_at),
        total: total as u32,
        safe: safe as u32,
        conflicted: conflicted as u32,
        skipped: skipped as u32,
        failed: failed as u32,
    }))
}
