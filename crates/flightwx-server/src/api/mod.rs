//! REST API for operators: service health, the latest monitor run, and
//! per-booking reschedule state.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use flightwx_core::models::{Booking, RescheduleCandidate, RouteEvaluation, RunSummary};

use crate::persistence::queue::{self, QueueDepth};
use crate::persistence::{bookings, candidates, weather_checks};
use crate::state::AppState;


pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/status", get(get_status))
        .route("/v1/bookings/:booking_id", get(get_booking))
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    latest_run: Option<RunSummary>,
    queue: QueueDepth,
}

#[derive(Debug, Serialize)]
struct BookingResponse {
    booking: Booking,
    latest_check: Option<RouteEvaluation>,
    candidates: Vec<RescheduleCandidate>,
}

async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, StatusCode> {
    let depth = queue::depth(state.db.pool()).await.map_err(|e| {
        tracing::error!("Failed to read queue depth: {e}");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    // In-memory copy first; after a restart, fall back to the persisted run.
    let latest_run = match state.latest_run() {
        Some(run) => Some(run),
        None => weather_checks::load_latest_run(state.db.pool())
            .await
            .map_err(|e| {
                tracing::error!("Failed to load latest run: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            })?,
    };

    Ok(Json(StatusResponse {
        latest_run,
        queue: depth,
    }))
}

async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
) -> Result<Json<BookingResponse>, StatusCode> {
    let booking = bookings::load_booking(state.db.pool(), &booking_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load booking {booking_id}: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    let latest_check = weather_checks::load_latest_check(state.db.pool(), &booking_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load weather check for {booking_id}: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let candidates = candidates::load_candidates(state.db.pool(), &booking_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load candidates for {booking_id}: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(BookingResponse {
        booking,
        latest_check,
        candidates,
    }))
}
