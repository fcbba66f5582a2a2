// libs/booking-cell/src/hooks.rs
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::Appointment;

/// Downstream reactions to booking lifecycle events, injected into the ledger
/// at construction time. The reminder scheduler implements this; the ledger
/// treats hook failures as best-effort (logged, never rolled back into the
/// booking result).
#[async_trait]
pub trait BookingEventHook: Send + Sync {
    async fn appointment_confirmed(&self, appointment: &Appointment) -> anyhow::Result<()>;

    /// Fired on cancellation and on reschedule, before the slot is reused.
    async fn appointment_cancelled(&self, appointment_id: Uuid) -> anyhow::Result<()>;
}

/// Hook that does nothing. Used when reminders are disabled and in tests.
pub struct NoopHook;

#[async_trait]
impl BookingEventHook for NoopHook {
    async fn appointment_confirmed(&self, _appointment: &Appointment) -> anyhow::Result<()> {
        Ok(())
    }

    async fn appointment_cancelled(&self, _appointment_id: Uuid) -> anyhow::Result<()> {
        Ok(())
    }
}
