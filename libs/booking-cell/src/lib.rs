pub mod handlers;
pub mod hooks;
pub mod models;
pub mod router;
pub mod services;
pub mod store;

pub use handlers::BookingState;
pub use hooks::{BookingEventHook, NoopHook};
pub use models::*;
pub use router::booking_routes;
pub use services::availability::AvailabilityCalculator;
pub use services::ledger::BookingLedger;
pub use store::{AppointmentStore, InMemoryAppointmentStore, StoreError, SupabaseAppointmentStore};
