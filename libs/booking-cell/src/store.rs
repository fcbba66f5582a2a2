// libs/booking-cell/src/store.rs
//
// Storage layer for appointments. The store is the single source of truth for
// the one-booking-per-slot invariant: `insert_if_slot_free` is an atomic
// conditional write, never a read-check-then-write sequence, so two
// simultaneous claims for the same (doctor, date, slot) can never both land.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::models::{Appointment, AppointmentStatus};

#[derive(Error, Debug)]
pub enum StoreError {
    /// The slot-uniqueness condition rejected the write.
    #[error("slot already booked")]
    SlotTaken,

    #[error("storage error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Insert the appointment iff no pending/confirmed appointment exists for
    /// its (doctor_id, date, time_slot). Exactly one of N concurrent inserts
    /// for the same key succeeds; losers get `SlotTaken` and leave no record.
    async fn insert_if_slot_free(&self, appointment: Appointment) -> Result<Appointment, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    async fn list_for_doctor_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Compare-and-set status transition. Returns the updated appointment, or
    /// `None` when the row no longer carries `expected` (lost race or missing).
    async fn transition_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<Option<Appointment>, StoreError>;
}

// ==============================================================================
// POSTGREST-BACKED STORE
// ==============================================================================

/// Production store over Supabase/PostgREST. The database carries a partial
/// unique index on (doctor_id, date, time_slot) restricted to pending and
/// confirmed rows; a conflicting insert comes back as HTTP 409.
pub struct SupabaseAppointmentStore {
    client: SupabaseClient,
}

impl SupabaseAppointmentStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn insert_if_slot_free(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        debug!("Inserting appointment {} for slot {} on {}",
               appointment.id, appointment.time_slot, appointment.date);

        let result: Result<Vec<Value>, _> = self
            .client
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(json!(appointment)),
                Some(SupabaseClient::return_representation()),
            )
            .await;

        let rows = result.map_err(|e| {
            if e.is_conflict() {
                StoreError::SlotTaken
            } else {
                StoreError::Backend(e.to_string())
            }
        })?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend("insert returned no row".to_string()))?;

        serde_json::from_value(row).map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        match rows.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| StoreError::Backend(e.to_string())),
            None => Ok(None),
        }
    }

    async fn list_for_doctor_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&date=eq.{}&order=created_at.asc",
            doctor_id, date
        );
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| StoreError::Backend(e.to_string())))
            .collect()
    }

    async fn transition_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<Option<Appointment>, StoreError> {
        // The status filter makes this a conditional update: PostgREST only
        // touches the row while it still carries `expected`, and the
        // representation tells us whether anything matched.
        let path = format!("/rest/v1/appointments?id=eq.{}&status=eq.{}", id, expected);
        let body = json!({
            "status": next.to_string(),
            "updated_at": chrono::Utc::now().to_rfc3339(),
        });

        let rows: Vec<Value> = self
            .client
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        match rows.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| StoreError::Backend(e.to_string())),
            None => Ok(None),
        }
    }
}

// ==============================================================================
// IN-MEMORY STORE
// ==============================================================================

/// Single-process store used by tests and local development. One mutex guards
/// the whole map, so the occupancy check and the insert are a single
/// linearization point, same guarantee the database index gives in production.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    rows: Mutex<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert_if_slot_free(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let mut rows = self.rows.lock().expect("appointment store poisoned");

        let occupied = rows.values().any(|existing| {
            existing.status.occupies_slot() && existing.slot_key() == appointment.slot_key()
        });
        if occupied {
            return Err(StoreError::SlotTaken);
        }

        rows.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let rows = self.rows.lock().expect("appointment store poisoned");
        Ok(rows.get(&id).cloned())
    }

    async fn list_for_doctor_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        let rows = self.rows.lock().expect("appointment store poisoned");
        let mut matching: Vec<Appointment> = rows
            .values()
            .filter(|apt| apt.doctor_id == doctor_id && apt.date == date)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matching)
    }

    async fn transition_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<Option<Appointment>, StoreError> {
        let mut rows = self.rows.lock().expect("appointment store poisoned");

        match rows.get_mut(&id) {
            Some(apt) if apt.status == expected => {
                apt.status = next;
                apt.updated_at = chrono::Utc::now();
                Ok(Some(apt.clone()))
            }
            _ => Ok(None),
        }
    }
}
