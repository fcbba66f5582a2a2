// libs/booking-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use shared_config::AppConfig;

/// Platform-wide slot granularity in minutes. Every bookable slot starts on
/// this grid.
pub const SLOT_MINUTES: u32 = 30;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    /// Calendar date of the appointment, no time component.
    pub date: NaiveDate,
    /// 12-hour slot label, e.g. "10:30 AM". The unit of booking.
    pub time_slot: String,
    pub status: AppointmentStatus,
    pub appointment_type: AppointmentType,
    pub price: Price,
    pub prescription: Option<String>,
    pub intake: Option<IntakePayload>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Slot-occupancy key. At most one non-terminal appointment may exist per key.
    pub fn slot_key(&self) -> (Uuid, NaiveDate, &str) {
        (self.doctor_id, self.date, self.time_slot.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Terminal statuses admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }

    /// Whether an appointment in this status blocks its slot.
    pub fn occupies_slot(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    #[serde(alias = "initial", alias = "new_patient")]
    InitialConsultation,

    #[serde(alias = "followup", alias = "follow_up")]
    FollowUpConsultation,

    #[serde(alias = "emergency")]
    EmergencyConsultation,

    #[serde(alias = "prescription", alias = "medication_renewal")]
    PrescriptionRenewal,

    #[serde(alias = "specialist")]
    SpecialtyConsultation,

    #[serde(alias = "telehealth", alias = "virtual")]
    TelehealthCheckIn,
}

impl AppointmentType {
    /// List price per consultation kind. Discounts and refunds are decided
    /// outside this core.
    pub fn default_price(&self) -> Price {
        let amount_cents = match self {
            AppointmentType::InitialConsultation => 6000,
            AppointmentType::FollowUpConsultation => 4000,
            AppointmentType::EmergencyConsultation => 9000,
            AppointmentType::PrescriptionRenewal => 2500,
            AppointmentType::SpecialtyConsultation => 8000,
            AppointmentType::TelehealthCheckIn => 3000,
        };
        Price {
            amount_cents,
            currency: "USD".to_string(),
        }
    }
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentType::InitialConsultation => write!(f, "initial_consultation"),
            AppointmentType::FollowUpConsultation => write!(f, "follow_up_consultation"),
            AppointmentType::EmergencyConsultation => write!(f, "emergency_consultation"),
            AppointmentType::PrescriptionRenewal => write!(f, "prescription_renewal"),
            AppointmentType::SpecialtyConsultation => write!(f, "specialty_consultation"),
            AppointmentType::TelehealthCheckIn => write!(f, "telehealth_checkin"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Price {
    pub amount_cents: i64,
    pub currency: String,
}

/// Free-text intake notes plus uploaded document references, captured at
/// booking time.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IntakePayload {
    pub notes: Option<String>,
    #[serde(default)]
    pub document_urls: Vec<String>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub time_slot: String,
    pub appointment_type: AppointmentType,
    pub intake: Option<IntakePayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRequest {
    pub cancelled_by: CancelledBy,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    Patient,
    Doctor,
    Admin,
}

/// One candidate slot in an availability listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotView {
    pub time_slot: String,
    pub free: bool,
}

/// A doctor's bookable window for one day. Dates and slot labels are
/// platform wall-clock time, treated as UTC when building absolute instants
/// (reminder fire times). Conversion to the requesting client's local time
/// is the caller's responsibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingHours {
    pub start: String,
    pub end: String,
    pub slot_minutes: u32,
}

impl WorkingHours {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            start: config.working_hours_start.clone(),
            end: config.working_hours_end.clone(),
            slot_minutes: SLOT_MINUTES,
        }
    }
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self {
            start: "9:00 AM".to_string(),
            end: "9:00 PM".to_string(),
            slot_minutes: SLOT_MINUTES,
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum BookingError {
    #[error("Appointment slot already taken")]
    SlotTaken,

    #[error("Appointment not found")]
    NotFound,

    #[error("Appointment is already in terminal status: {0}")]
    AlreadyTerminal(AppointmentStatus),

    #[error("Invalid status transition from {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
