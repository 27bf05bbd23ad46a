//! Weather monitor job.
//!
//! Runs on a fixed cadence: loads upcoming SCHEDULED bookings, evaluates
//! each route against the student's minimums, records the check, and puts
//! unsafe bookings on weather hold with a conflict message enqueued for
//! the rescheduling worker.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::time::interval;

use flightwx_core::evaluate::evaluate_route;
use flightwx_core::geodesy::{generate_waypoints, parse_location};
use flightwx_core::minimums::MinimumsTable;
use flightwx_core::models::{Booking, ConflictMessage, RouteStatus, RunSummary};
use flightwx_weather::ObservationSource;

use crate::backoff::retry_transient;
use crate::config::Config;
use crate::persistence::{bookings, queue, weather_checks, Database};
use crate::state::AppState;

const PERSIST_RETRY_ATTEMPTS: u32 = 3;
const PERSIST_RETRY_BASE: Duration = Duration::from_millis(200);

enum BookingOutcome {
    Safe,
    Conflicted,
    Skipped,
}

/// Start the monitor loop.
pub async fn run_monitor_loop(
    state: Arc<AppState>,
    config: Config,
    source: Arc<dyn ObservationSource>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let minimums = MinimumsTable::default();
    let mut ticker = interval(Duration::from_secs(config.monitor_interval_secs));

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Monitor loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                match run_monitor_once(
                    &state.db,
                    source.as_ref(),
                    &minimums,
                    Utc::now(),
                    config.lookahead_hours,
                )
                .await
                {
                    Ok(summary) => {
                        tracing::info!(
                            total = summary.total,
                            safe = summary.safe,
                            conflicted = summary.conflicted,
                            skipped = summary.skipped,
                            failed = summary.failed,
                            "Weather monitor run complete"
                        );
                        if let Err(e) =
                            weather_checks::insert_run_summary(state.db.pool(), &summary).await
                        {
                            tracing::warn!("Failed to persist run summary: {e}");
                        }
                        state.set_latest_run(summary);
                    }
                    Err(e) => tracing::error!("Weather monitor run failed: {e}"),
                }
            }
        }
    }
}

/// One full monitor pass. Stateless: everything it needs is the bookings'
/// persisted status, so overlapping or repeated runs are harmless.
pub async fn run_monitor_once(
    db: &Database,
    source: &dyn ObservationSource,
    minimums: &MinimumsTable,
    now: DateTime<Utc>,
    lookahead_hours: i64,
) -> Result<RunSummary> {
    let upcoming = bookings::load_upcoming_scheduled(db.pool(), now, lookahead_hours).await?;

    let mut summary = RunSummary {
        started_at: Some(now),
        total: upcoming.len() as u32,
        ..RunSummary::default()
    };

    for booking in &upcoming {
        // Per-booking isolation: one bad booking never aborts the batch.
        match process_booking(db, source, minimums, booking, now).await {
            Ok(BookingOutcome::Safe) => summary.safe += 1,
            Ok(BookingOutcome::Conflicted) => summary.conflicted += 1,
            Ok(BookingOutcome::Skipped) => summary.skipped += 1,
            Err(e) => {
                summary.failed += 1;
                tracing::error!(booking_id = %booking.id, "Booking evaluation failed: {e}");
            }
        }
    }

    summary.finished_at = Some(Utc::now());
    Ok(summary)
}

async fn process_booking(
    db: &Database,
    source: &dyn ObservationSource,
    minimums: &MinimumsTable,
    booking: &Booking,
    now: DateTime<Utc>,
) -> Result<BookingOutcome> {
    let Some(tier) = booking.tier else {
        // Not an error: the student's training record just isn't complete.
        tracing::warn!(booking_id = %booking.id, "Skipping booking without certification tier");
        return Ok(BookingOutcome::Skipped);
    };

    // Bad input data never becomes a retried failure: the booking itself is
    // unusable, so it is skipped with a warning until someone corrects it.
    let route = parse_location(&booking.departure)
        .and_then(|dep| parse_location(&booking.arrival).map(|arr| (dep, arr)))
        .and_then(|(dep, arr)| {
            generate_waypoints(dep, arr, booking.start_time, booking.duration_min)
        });
    let waypoints = match route {
        Ok(waypoints) => waypoints,
        Err(e) => {
            tracing::warn!(booking_id = %booking.id, "Skipping booking with unusable route: {e}");
            return Ok(BookingOutcome::Skipped);
        }
    };

    let samples = source.observe_route(&waypoints).await?;
    let evaluation = evaluate_route(&booking.id, now, samples, minimums.for_tier(tier));

    // The audit record is written for every verdict, safe or not.
    retry_transient(PERSIST_RETRY_ATTEMPTS, PERSIST_RETRY_BASE, || {
        weather_checks::insert_weather_check(db.pool(), &evaluation)
    })
    .await?;

    if evaluation.status == RouteStatus::Safe {
        return Ok(BookingOutcome::Safe);
    }

    tracing::warn!(
        booking_id = %booking.id,
        verdict = evaluation.status.as_str(),
        summary = %evaluation.violation_summary,
        "Unsafe weather on route, holding booking"
    );

    let message = ConflictMessage {
        booking_id: booking.id.clone(),
        student_id: booking.student_id.clone(),
        instructor_id: booking.instructor_id.clone(),
        tier,
        departure: booking.departure.clone(),
        arrival: booking.arrival.clone(),
        scheduled_start: booking.start_time,
        duration_min: booking.duration_min,
        verdict: evaluation.status,
        violation_summary: evaluation.violation_summary.clone(),
        checked_at: evaluation.checked_at,
    };

    // One transaction for the status flip and the queue insert: a held
    // booking without a message would never be seen again.
    let held = queue::hold_and_enqueue(db.pool(), &booking.id, &message).await?;
    if !held {
        // Concurrent run got there first; the queue already has a message.
        tracing::debug!(booking_id = %booking.id, "Booking already held by another run");
    }

    Ok(BookingOutcome::Conflicted)
}
