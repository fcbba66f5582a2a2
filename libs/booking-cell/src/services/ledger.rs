// libs/booking-cell/src/services/ledger.rs
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_utils::time::{format_time_of_day, try_parse_time_of_day};

use crate::hooks::BookingEventHook;
use crate::models::{
    Appointment, AppointmentStatus, BookingError, CancelRequest, ClaimRequest, SLOT_MINUTES,
};
use crate::services::lifecycle::AppointmentLifecycle;
use crate::store::{AppointmentStore, StoreError};

/// Authoritative store of appointments. All slot claims go through
/// `insert_if_slot_free` on the storage layer, so correctness never depends
/// on in-process locks and multiple service instances can run concurrently.
pub struct BookingLedger {
    store: Arc<dyn AppointmentStore>,
    hook: Arc<dyn BookingEventHook>,
}

impl BookingLedger {
    pub fn new(store: Arc<dyn AppointmentStore>, hook: Arc<dyn BookingEventHook>) -> Self {
        Self { store, hook }
    }

    /// Atomically claim a slot. Exactly one of N concurrent claims for the
    /// same (doctor, date, slot) succeeds; the rest receive `SlotTaken` and
    /// create no record. The ledger never retries on the caller's behalf.
    pub async fn claim(&self, request: ClaimRequest) -> Result<Appointment, BookingError> {
        let time_slot = Self::validate_slot_label(&request.time_slot)?;
        info!(
            "Claiming slot {} on {} for doctor {} (patient {})",
            time_slot, request.date, request.doctor_id, request.patient_id
        );

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            date: request.date,
            time_slot,
            status: AppointmentStatus::Confirmed,
            price: request.appointment_type.default_price(),
            appointment_type: request.appointment_type,
            prescription: None,
            intake: request.intake,
            created_at: now,
            updated_at: now,
        };

        let appointment = self
            .store
            .insert_if_slot_free(appointment)
            .await
            .map_err(|e| match e {
                StoreError::SlotTaken => BookingError::SlotTaken,
                StoreError::Backend(msg) => BookingError::DatabaseError(msg),
            })?;

        info!("Appointment {} booked for slot {} on {}",
              appointment.id, appointment.time_slot, appointment.date);

        // Reminder scheduling is best-effort: a confirmed appointment stands
        // even when its reminders could not be queued.
        if let Err(e) = self.hook.appointment_confirmed(&appointment).await {
            error!(
                "Post-confirmation hook failed for appointment {}: {:#}",
                appointment.id, e
            );
        }

        Ok(appointment)
    }

    /// Confirm a pending appointment (e.g. after an external payment webhook).
    /// Idempotent when already confirmed.
    pub async fn confirm(&self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        let current = self.fetch(appointment_id).await?;

        if current.status == AppointmentStatus::Confirmed {
            debug!("Appointment {} already confirmed", appointment_id);
            return Ok(current);
        }

        let confirmed = self
            .transition(&current, AppointmentStatus::Confirmed)
            .await?;

        if let Err(e) = self.hook.appointment_confirmed(&confirmed).await {
            error!(
                "Post-confirmation hook failed for appointment {}: {:#}",
                confirmed.id, e
            );
        }

        Ok(confirmed)
    }

    /// Cancel an appointment. The freed slot is visible to availability reads
    /// immediately; there is no cache in between.
    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        request: CancelRequest,
    ) -> Result<Appointment, BookingError> {
        let current = self.fetch(appointment_id).await?;
        let cancelled = self
            .transition(&current, AppointmentStatus::Cancelled)
            .await?;

        info!(
            "Appointment {} cancelled by {:?}{}",
            appointment_id,
            request.cancelled_by,
            request
                .reason
                .as_deref()
                .map(|r| format!(": {}", r))
                .unwrap_or_default()
        );

        if let Err(e) = self.hook.appointment_cancelled(appointment_id).await {
            error!(
                "Post-cancellation hook failed for appointment {}: {:#}",
                appointment_id, e
            );
        }

        Ok(cancelled)
    }

    /// Mark a consultation as completed. Idempotent when already completed.
    pub async fn complete(&self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        let current = self.fetch(appointment_id).await?;

        if current.status == AppointmentStatus::Completed {
            debug!("Appointment {} already completed", appointment_id);
            return Ok(current);
        }

        self.transition(&current, AppointmentStatus::Completed).await
    }

    pub async fn get(&self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        self.fetch(appointment_id).await
    }

    /// All appointments (any status) for one doctor and date, for availability
    /// computation.
    pub async fn bookings_for_doctor_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, BookingError> {
        self.store
            .list_for_doctor_date(doctor_id, date)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))
    }

    // ==============================================================================
    // PRIVATE HELPERS
    // ==============================================================================

    async fn fetch(&self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        self.store
            .get(appointment_id)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?
            .ok_or(BookingError::NotFound)
    }

    /// Validated CAS transition. When the conditional update loses a race the
    /// row is re-read and the transition re-judged against its new status, so
    /// concurrent cancels surface as `AlreadyTerminal` rather than a blind
    /// overwrite.
    async fn transition(
        &self,
        current: &Appointment,
        next: AppointmentStatus,
    ) -> Result<Appointment, BookingError> {
        AppointmentLifecycle::validate_transition(current.status, next)?;

        let updated = self
            .store
            .transition_status(current.id, current.status, next)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        match updated {
            Some(appointment) => Ok(appointment),
            None => {
                warn!(
                    "Lost status transition race for appointment {} ({} -> {})",
                    current.id, current.status, next
                );
                let fresh = self.fetch(current.id).await?;
                if fresh.status == next {
                    return Ok(fresh);
                }
                AppointmentLifecycle::validate_transition(fresh.status, next)?;
                Err(BookingError::DatabaseError(
                    "status transition lost a concurrent race".to_string(),
                ))
            }
        }
    }

    /// A claimable slot label must parse strictly and sit on the platform's
    /// slot grid. Returns the canonical label so "09:00 am" and "9:00 AM"
    /// occupy the same key.
    fn validate_slot_label(label: &str) -> Result<String, BookingError> {
        let (hour, minute) = try_parse_time_of_day(label).ok_or_else(|| {
            BookingError::ValidationError(format!("invalid time slot: {:?}", label))
        })?;

        if minute % SLOT_MINUTES != 0 {
            return Err(BookingError::ValidationError(format!(
                "time slot {:?} is not on the {}-minute grid",
                label, SLOT_MINUTES
            )));
        }

        Ok(format_time_of_day(hour, minute))
    }
}
