// libs/reminder-cell/src/services/directory.rs
//
// Contact lookup for reminder scheduling. The scheduler resolves names and
// addresses once, at schedule time, and bakes them into the job payload.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::error::ReminderError;

/// Names and addresses for one appointment's participants. A doctor without
/// a notification address just gets no copy.
#[derive(Debug, Clone)]
pub struct ContactCard {
    pub patient_name: String,
    pub patient_address: String,
    pub doctor_name: String,
    pub doctor_address: Option<String>,
}

#[async_trait]
pub trait ContactDirectory: Send + Sync {
    async fn lookup(&self, patient_id: Uuid, doctor_id: Uuid) -> Result<ContactCard, ReminderError>;
}

#[derive(Debug, Deserialize)]
struct PatientRow {
    full_name: String,
    email: String,
}

#[derive(Debug, Deserialize)]
struct DoctorRow {
    full_name: String,
    email: Option<String>,
}

pub struct SupabaseContactDirectory {
    client: SupabaseClient,
}

impl SupabaseContactDirectory {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContactDirectory for SupabaseContactDirectory {
    async fn lookup(&self, patient_id: Uuid, doctor_id: Uuid) -> Result<ContactCard, ReminderError> {
        let patients: Vec<PatientRow> = self
            .client
            .request(
                Method::GET,
                &format!("/rest/v1/patients?id=eq.{}&select=full_name,email", patient_id),
                None,
            )
            .await
            .map_err(|e| ReminderError::ContactLookup(e.to_string()))?;

        let patient = patients
            .into_iter()
            .next()
            .ok_or_else(|| ReminderError::ContactLookup(format!("patient {} not found", patient_id)))?;

        let doctors: Vec<DoctorRow> = self
            .client
            .request(
                Method::GET,
                &format!("/rest/v1/doctors?id=eq.{}&select=full_name,email", doctor_id),
                None,
            )
            .await
            .map_err(|e| ReminderError::ContactLookup(e.to_string()))?;

        let doctor = doctors
            .into_iter()
            .next()
            .ok_or_else(|| ReminderError::ContactLookup(format!("doctor {} not found", doctor_id)))?;

        Ok(ContactCard {
            patient_name: patient.full_name,
            patient_address: patient.email,
            doctor_name: doctor.full_name,
            doctor_address: doctor.email,
        })
    }
}

/// Fixed directory for tests and local development.
pub struct StaticContactDirectory {
    pub card: ContactCard,
}

#[async_trait]
impl ContactDirectory for StaticContactDirectory {
    async fn lookup(&self, _patient_id: Uuid, _doctor_id: Uuid) -> Result<ContactCard, ReminderError> {
        Ok(self.card.clone())
    }
}
