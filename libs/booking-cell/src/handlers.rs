// libs/booking-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::{BookingError, CancelRequest, ClaimRequest, WorkingHours};
use crate::services::availability::AvailabilityCalculator;
use crate::services::ledger::BookingLedger;

/// Shared booking state, wired once at startup and injected into every
/// handler. No per-request service construction and no global singletons.
pub struct BookingState {
    pub ledger: Arc<BookingLedger>,
    pub working_hours: WorkingHours,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
}

fn booking_error(e: BookingError) -> AppError {
    match e {
        BookingError::SlotTaken => AppError::Conflict("SlotTaken".to_string()),
        BookingError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        BookingError::AlreadyTerminal(status) => {
            AppError::Conflict(format!("AlreadyTerminal: appointment is {}", status))
        }
        BookingError::InvalidStatusTransition(status) => {
            AppError::Conflict(format!("Invalid transition from status {}", status))
        }
        BookingError::ValidationError(msg) => AppError::ValidationError(msg),
        BookingError::DatabaseError(msg) => AppError::Database(msg),
    }
}

/// GET /availability?doctor_id=&date=
#[axum::debug_handler]
pub async fn get_availability(
    State(state): State<Arc<BookingState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let bookings = state
        .ledger
        .bookings_for_doctor_date(query.doctor_id, query.date)
        .await
        .map_err(booking_error)?;

    let slots = AvailabilityCalculator::list_slots(
        query.doctor_id,
        query.date,
        &state.working_hours,
        &bookings,
    );

    Ok(Json(json!({ "slots": slots })))
}

/// POST /bookings
#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<BookingState>>,
    Json(request): Json<ClaimRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let appointment = state.ledger.claim(request).await.map_err(|e| match e {
        BookingError::SlotTaken => AppError::Conflict("SlotTaken".to_string()),
        BookingError::ValidationError(msg) => AppError::ValidationError(msg),
        other => AppError::Internal(other.to_string()),
    })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "appointment_id": appointment.id,
            "appointment": appointment,
        })),
    ))
}

/// GET /bookings/{appointment_id}
#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<BookingState>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .ledger
        .get(appointment_id)
        .await
        .map_err(booking_error)?;

    Ok(Json(json!(appointment)))
}

/// POST /bookings/{appointment_id}/cancel
#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<BookingState>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .ledger
        .cancel(appointment_id, request)
        .await
        .map_err(booking_error)?;

    Ok(Json(json!({ "appointment": appointment })))
}

/// POST /bookings/{appointment_id}/complete
#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<BookingState>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .ledger
        .complete(appointment_id)
        .await
        .map_err(booking_error)?;

    Ok(Json(json!({ "appointment": appointment })))
}

/// POST /bookings/{appointment_id}/confirm
#[axum::debug_handler]
pub async fn confirm_appointment(
    State(state): State<Arc<BookingState>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .ledger
        .confirm(appointment_id)
        .await
        .map_err(booking_error)?;

    Ok(Json(json!({ "appointment": appointment })))
}
