// libs/booking-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{AppointmentStatus, BookingError};

/// Appointment state machine: pending -> confirmed -> completed, with
/// cancelled reachable from pending or confirmed only.
pub struct AppointmentLifecycle;

impl AppointmentLifecycle {
    /// Validate that a status transition is allowed.
    pub fn validate_transition(
        current: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<(), BookingError> {
        debug!("Validating status transition {} -> {}", current, next);

        if !Self::valid_transitions(current).contains(&next) {
            warn!("Invalid status transition attempted: {} -> {}", current, next);
            if current.is_terminal() {
                return Err(BookingError::AlreadyTerminal(current));
            }
            return Err(BookingError::InvalidStatusTransition(current));
        }

        Ok(())
    }

    pub fn valid_transitions(current: AppointmentStatus) -> &'static [AppointmentStatus] {
        match current {
            AppointmentStatus::Pending => {
                &[AppointmentStatus::Confirmed, AppointmentStatus::Cancelled]
            }
            AppointmentStatus::Confirmed => {
                &[AppointmentStatus::Completed, AppointmentStatus::Cancelled]
            }
            // Terminal states, no transitions allowed.
            AppointmentStatus::Completed | AppointmentStatus::Cancelled => &[],
        }
    }
}
