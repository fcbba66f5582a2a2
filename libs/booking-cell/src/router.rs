// libs/booking-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{self, BookingState};

pub fn booking_routes(state: Arc<BookingState>) -> Router {
    Router::new()
        .route("/availability", get(handlers::get_availability))
        .route("/bookings", post(handlers::book_appointment))
        .route("/bookings/{appointment_id}", get(handlers::get_appointment))
        .route("/bookings/{appointment_id}/confirm", post(handlers::confirm_appointment))
        .route("/bookings/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/bookings/{appointment_id}/complete", post(handlers::complete_appointment))
        .with_state(state)
}
