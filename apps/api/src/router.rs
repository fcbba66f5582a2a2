use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::json;

use booking_cell::{booking_routes, BookingState};

pub fn create_router(state: Arc<BookingState>) -> Router {
    Router::new()
        .route("/", get(|| async { "CareLink API is running!" }))
        .route(
            "/health",
            get(|| async { Json(json!({ "status": "ok" })) }),
        )
        .merge(booking_routes(state))
}
