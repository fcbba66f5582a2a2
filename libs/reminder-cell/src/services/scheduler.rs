// libs/reminder-cell/src/services/scheduler.rs
//
// Schedules reminder jobs off booking lifecycle events. The scheduler is
// plain injected state, constructed once at startup next to the ledger; it
// owns no worker and no clock beyond `Utc::now()` at the event boundary.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{error, info};
use uuid::Uuid;

use booking_cell::{Appointment, BookingEventHook};
use shared_utils::time::parse_time_of_day;

use crate::error::ReminderError;
use crate::models::{
    JobKind, RecipientRole, ReminderConfig, ReminderJob, ReminderPayload, ReminderStatus,
};
use crate::services::directory::ContactDirectory;
use crate::store::ReminderJobStore;

pub struct ReminderScheduler {
    store: Arc<dyn ReminderJobStore>,
    directory: Arc<dyn ContactDirectory>,
    config: ReminderConfig,
}

impl ReminderScheduler {
    pub fn new(
        store: Arc<dyn ReminderJobStore>,
        directory: Arc<dyn ContactDirectory>,
        config: ReminderConfig,
    ) -> Self {
        Self {
            store,
            directory,
            config,
        }
    }

    /// Reminder fire time for an appointment: lead time before the slot
    /// start. Appointment dates and slot labels are platform wall-clock
    /// time, read as UTC. A booking made inside the lead window still gets
    /// its reminder, pushed just far enough into the future to clear the
    /// enqueue.
    pub fn target_time(&self, appointment: &Appointment, now: DateTime<Utc>) -> DateTime<Utc> {
        let (hour, minute) = parse_time_of_day(&appointment.time_slot);
        let start = appointment
            .date
            .and_hms_opt(hour, minute, 0)
            .unwrap()
            .and_utc();

        let target = start - Duration::minutes(self.config.lead_time_minutes);
        if target <= now {
            now + Duration::seconds(self.config.late_grace_seconds)
        } else {
            target
        }
    }

    /// Enqueue the reminder jobs for a confirmed appointment: one for the
    /// patient, and one for the doctor when the directory has an address for
    /// them. Returns the jobs written.
    pub async fn schedule_for(
        &self,
        appointment: &Appointment,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReminderJob>, ReminderError> {
        let contacts = self
            .directory
            .lookup(appointment.patient_id, appointment.doctor_id)
            .await?;

        let target_time = self.target_time(appointment, now);
        let date_display = appointment.date.format("%B %-d, %Y").to_string();

        let mut recipients = vec![(RecipientRole::Patient, contacts.patient_address.clone())];
        if let Some(doctor_address) = contacts.doctor_address.clone() {
            recipients.push((RecipientRole::Doctor, doctor_address));
        }

        let mut jobs = Vec::with_capacity(recipients.len());
        for (recipient, to_address) in recipients {
            let job = ReminderJob {
                id: Uuid::new_v4(),
                kind: JobKind::AppointmentReminder,
                appointment_id: appointment.id,
                recipient,
                payload: ReminderPayload {
                    to_address,
                    patient_name: contacts.patient_name.clone(),
                    doctor_name: contacts.doctor_name.clone(),
                    date_display: date_display.clone(),
                    time_slot: appointment.time_slot.clone(),
                },
                target_time,
                status: ReminderStatus::Scheduled,
                lease_owner: None,
                lease_expires_at: None,
                attempts: 0,
                last_error: None,
                created_at: now,
                updated_at: now,
            };
            jobs.push(self.store.enqueue(job).await?);
        }

        info!(
            "Scheduled {} reminder job(s) for appointment {} at {}",
            jobs.len(),
            appointment.id,
            target_time
        );
        Ok(jobs)
    }

    /// Cancel every still-scheduled reminder for the appointment.
    pub async fn cancel_for(&self, appointment_id: Uuid) -> Result<usize, ReminderError> {
        let cancelled = self
            .store
            .cancel_scheduled_for_appointment(appointment_id)
            .await?;

        if cancelled > 0 {
            info!(
                "Cancelled {} reminder job(s) for appointment {}",
                cancelled, appointment_id
            );
        }
        Ok(cancelled)
    }
}

#[async_trait]
impl BookingEventHook for ReminderScheduler {
    async fn appointment_confirmed(&self, appointment: &Appointment) -> anyhow::Result<()> {
        self.schedule_for(appointment, Utc::now())
            .await
            .map_err(|e| {
                error!(
                    "Failed to schedule reminders for appointment {}: {}",
                    appointment.id, e
                );
                anyhow::Error::from(e)
            })?;
        Ok(())
    }

    async fn appointment_cancelled(&self, appointment_id: Uuid) -> anyhow::Result<()> {
        self.cancel_for(appointment_id).await?;
        Ok(())
    }
}
