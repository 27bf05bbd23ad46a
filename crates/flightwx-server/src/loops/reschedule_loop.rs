//! Rescheduling worker.
//!
//! Drains the conflict queue: for each held booking it collects alternative
//! start times, validates them against instructor availability and forecast
//! weather, persists the survivors atomically, and notifies both parties.
//! Messages are acknowledged only after the commit, so a crash mid-way
//! results in redelivery rather than a lost conflict.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tokio::time::interval;
use uuid::Uuid;

use flightwx_core::evaluate::evaluate_route;
use flightwx_core::geodesy::{generate_waypoints, parse_location};
use flightwx_core::minimums::MinimumsTable;
use flightwx_core::models::{
    BookingStatus, CandidateDisposition, ConflictMessage, NotificationRecord, RescheduleCandidate,
    RouteStatus,
};
use flightwx_weather::ObservationSource;

use crate::backoff::Backoff;
use crate::config::Config;
use crate::notify::{NotificationPublisher, RescheduleEvent};
use crate::persistence::{bookings, candidates, queue};
use crate::state::AppState;
use crate::suggest::fallback::fallback_suggestions;
use crate::suggest::{Suggestion, SuggestionContext, SuggestionSource};

/// Outcome of one conflict message.
#[derive(Debug)]
pub enum ConflictOutcome {
    /// Candidates committed; carries the event to publish.
    Completed {
        candidate_count: usize,
        event: RescheduleEvent,
    },
    /// Nothing to do: booking gone, already handled, or redelivered.
    Skipped,
}

/// Start the worker loop.
pub async fn run_reschedule_loop(
    state: Arc<AppState>,
    config: Config,
    weather: Arc<dyn ObservationSource>,
    suggester: Arc<dyn SuggestionSource>,
    publisher: NotificationPublisher,
    mut shutdown: broadcast::Receiver<()>,
) {
    let minimums = MinimumsTable::default();
    let mut ticker = interval(Duration::from_secs(config.worker_poll_secs));
    let mut backoff = Backoff::new(Duration::from_secs(2), Duration::from_secs(60));

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Reschedule worker shutting down");
                break;
            }
            _ = ticker.tick() => {
                if !backoff.ready() {
                    continue;
                }
                match drain_queue(
                    state.as_ref(),
                    &config,
                    weather.as_ref(),
                    suggester.as_ref(),
                    &publisher,
                    &minimums,
                )
                .await
                {
                    Ok(()) => backoff.reset(),
                    Err(e) => {
                        tracing::error!("Reschedule worker pass failed: {e}");
                        backoff.fail();
                    }
                }
            }
        }
    }
}

/// Process every currently-visible message. A failed message is left
/// unacked for redelivery and stops the pass so the backoff can engage.
async fn drain_queue(
    state: &AppState,
    config: &Config,
    weather: &dyn ObservationSource,
    suggester: &dyn SuggestionSource,
    publisher: &NotificationPublisher,
    minimums: &MinimumsTable,
) -> Result<()> {
    loop {
        let Some(leased) = queue::receive(
            state.db.pool(),
            Utc::now(),
            config.queue_visibility_secs,
            config.queue_max_attempts,
        )
        .await?
        else {
            return Ok(());
        };

        tracing::info!(
            queue_id = leased.id,
            booking_id = %leased.message.booking_id,
            attempt = leased.attempts,
            "Processing weather conflict"
        );

        match process_conflict(
            state.db.pool(),
            weather,
            suggester,
            minimums,
            config,
            &leased.message,
        )
        .await
        {
            Ok(ConflictOutcome::Completed {
                candidate_count,
                event,
            }) => {
                // Publish after commit but before ack: a crash between the
                // two redelivers, and the duplicate guard makes that a no-op.
                publisher.publish(&event).await;
                queue::ack(state.db.pool(), leased.id).await?;
                tracing::info!(
                    booking_id = %leased.message.booking_id,
                    candidates = candidate_count,
                    "Reschedule candidates delivered"
                );
            }
            Ok(ConflictOutcome::Skipped) => {
                queue::ack(state.db.pool(), leased.id).await?;
            }
            Err(e) => {
                tracing::error!(
                    queue_id = leased.id,
                    booking_id = %leased.message.booking_id,
                    "Conflict processing failed, leaving for redelivery: {e}"
                );
                return Err(e);
            }
        }
    }
}

/// Handle one conflict message end to end.
pub async fn process_conflict(
    pool: &SqlitePool,
    weather: &dyn ObservationSource,
    suggester: &dyn SuggestionSource,
    minimums: &MinimumsTable,
    config: &Config,
    message: &ConflictMessage,
) -> Result<ConflictOutcome> {
    let Some(booking) = bookings::load_booking(pool, &message.booking_id).await? else {
        tracing::warn!(booking_id = %message.booking_id, "Conflict for unknown booking");
        return Ok(ConflictOutcome::Skipped);
    };
    if booking.status != BookingStatus::WeatherHold {
        // Redelivery after a crash-between-commit-and-ack, or the booking
        // was cancelled meanwhile.
        tracing::debug!(
            booking_id = %booking.id,
            status = booking.status.as_str(),
            "Booking no longer on weather hold, skipping"
        );
        return Ok(ConflictOutcome::Skipped);
    }

    let availability = bookings::load_availability(pool, &message.instructor_id).await?;
    let context = SuggestionContext {
        booking_id: message.booking_id.clone(),
        tier: message.tier,
        original_start: message.scheduled_start,
        duration_min: message.duration_min,
        violation_summary: message.violation_summary.clone(),
        availability: availability.clone(),
    };

    let suggestions = collect_suggestions(suggester, &context, config).await;

    // An instructor with no schedule on file can't be validated against;
    // treat every time as open rather than dropping all candidates.
    let has_schedule = !availability.weekly.is_empty() || !availability.exceptions.is_empty();

    let mut rows = Vec::new();
    for suggestion in suggestions.into_iter().take(config.max_candidates) {
        if has_schedule && !availability.covers(suggestion.proposed_time, message.duration_min) {
            tracing::debug!(
                booking_id = %message.booking_id,
                proposed = %suggestion.proposed_time,
                "Dropping candidate outside instructor availability"
            );
            continue;
        }

        let weather_safe =
            match candidate_weather_safe(weather, minimums, message, &suggestion).await {
                Ok(safe) => safe,
                Err(e) => {
                    // A forecast outage must not block rescheduling; keep the
                    // candidate and let the student judge.
                    tracing::warn!(
                        booking_id = %message.booking_id,
                        "Weather check for candidate failed, keeping it unverified: {e}"
                    );
                    true
                }
            };

        rows.push(RescheduleCandidate {
            id: Uuid::new_v4().to_string(),
            booking_id: message.booking_id.clone(),
            proposed_time: suggestion.proposed_time,
            reasoning: suggestion.reasoning,
            confidence: suggestion.confidence,
            weather_safe,
            instructor_available: true,
            disposition: CandidateDisposition::Pending,
            created_at: Utc::now(),
        });
    }

    if rows.is_empty() {
        tracing::warn!(
            booking_id = %message.booking_id,
            "No candidate survived validation, booking stays on hold"
        );
        return Ok(ConflictOutcome::Skipped);
    }

    let notifications = build_notifications(message, rows.len());
    let committed =
        candidates::commit_candidates(pool, &message.booking_id, &rows, &notifications).await?;
    if !committed {
        tracing::debug!(booking_id = %message.booking_id, "Duplicate delivery, commit skipped");
        return Ok(ConflictOutcome::Skipped);
    }

    Ok(ConflictOutcome::Completed {
        candidate_count: rows.len(),
        event: RescheduleEvent {
            booking_id: message.booking_id.clone(),
            student_id: message.student_id.clone(),
            instructor_id: message.instructor_id.clone(),
            candidate_count: rows.len(),
            original_start: message.scheduled_start,
            published_at: Utc::now(),
        },
    })
}

/// Ask the generative source, falling back to the heuristic when it fails
/// or when nothing clears the confidence floor.
async fn collect_suggestions(
    suggester: &dyn SuggestionSource,
    context: &SuggestionContext,
    config: &Config,
) -> Vec<Suggestion> {
    let generated = match suggester.suggest(context, config.max_candidates).await {
        Ok(suggestions) => suggestions,
        Err(e) => {
            tracing::warn!(
                booking_id = %context.booking_id,
                "Suggestion provider failed, using heuristic fallback: {e}"
            );
            return fallback_suggestions(context);
        }
    };

    let confident: Vec<Suggestion> = generated
        .into_iter()
        .filter(|s| s.confidence >= config.min_confidence)
        .collect();

    if confident.is_empty() {
        tracing::warn!(
            booking_id = %context.booking_id,
            "No suggestion cleared the confidence floor, using heuristic fallback"
        );
        return fallback_suggestions(context);
    }
    confident
}

/// Re-run the route evaluation at the proposed time.
async fn candidate_weather_safe(
    weather: &dyn ObservationSource,
    minimums: &MinimumsTable,
    message: &ConflictMessage,
    suggestion: &Suggestion,
) -> Result<bool> {
    let dep = parse_location(&message.departure)?;
    let arr = parse_location(&message.arrival)?;
    let waypoints =
        generate_waypoints(dep, arr, suggestion.proposed_time, message.duration_min)?;
    let samples = weather.observe_route(&waypoints).await?;
    let evaluation = evaluate_route(
        &message.booking_id,
        Utc::now(),
        samples,
        minimums.for_tier(message.tier),
    );
    Ok(evaluation.status == RouteStatus::Safe)
}

fn build_notifications(message: &ConflictMessage, candidate_count: usize) -> Vec<NotificationRecord> {
    let now = Utc::now();
    let body = format!(
        "Your lesson on {} was put on weather hold ({}). {} alternative {} \
         ready for review.",
        message.scheduled_start.format("%Y-%m-%d %H:%MZ"),
        message.violation_summary,
        candidate_count,
        if candidate_count == 1 { "time is" } else { "times are" }
    );

    [&message.student_id, &message.instructor_id]
        .into_iter()
        .map(|recipient| NotificationRecord {
            id: Uuid::new_v4().to_string(),
            recipient_id: recipient.clone(),
            booking_id: message.booking_id.clone(),
            kind: "RESCHEDULE_OPTIONS".to_string(),
            body: body.clone(),
            created_at: now,
        })
        .collect()
}
