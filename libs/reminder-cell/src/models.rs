// libs/reminder-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_config::AppConfig;

/// What a job does once it comes due. The worker routes on this enum, so a
/// job kind without a registered handler is a wiring bug caught at startup,
/// not a stringly-typed surprise at delivery time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    AppointmentReminder,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::AppointmentReminder => write!(f, "appointment_reminder"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecipientRole {
    Patient,
    Doctor,
}

impl fmt::Display for RecipientRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecipientRole::Patient => write!(f, "patient"),
            RecipientRole::Doctor => write!(f, "doctor"),
        }
    }
}

/// Lifecycle of a reminder job.
///
/// scheduled -> leased -> sent | failed, with leased falling back to
/// scheduled on a retryable delivery error or an expired lease. Cancelled is
/// reachable only from scheduled; a job already leased for delivery is past
/// the point of quiet withdrawal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    Scheduled,
    Leased,
    Sent,
    Failed,
    Cancelled,
}

impl fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReminderStatus::Scheduled => write!(f, "scheduled"),
            ReminderStatus::Leased => write!(f, "leased"),
            ReminderStatus::Sent => write!(f, "sent"),
            ReminderStatus::Failed => write!(f, "failed"),
            ReminderStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Everything the delivery handler needs, captured at schedule time so the
/// worker never has to re-join against patient or doctor records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReminderPayload {
    pub to_address: String,
    pub patient_name: String,
    pub doctor_name: String,
    /// Human-readable appointment date, e.g. "June 20, 2025".
    pub date_display: String,
    /// 12-hour slot label, e.g. "10:30 AM".
    pub time_slot: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderJob {
    pub id: Uuid,
    pub kind: JobKind,
    pub appointment_id: Uuid,
    pub recipient: RecipientRole,
    pub payload: ReminderPayload,
    /// When the reminder should go out.
    pub target_time: DateTime<Utc>,
    pub status: ReminderStatus,
    pub lease_owner: Option<String>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Scheduling policy knobs.
#[derive(Debug, Clone)]
pub struct ReminderConfig {
    /// How far before the appointment start the reminder fires.
    pub lead_time_minutes: i64,
    /// When a booking lands inside the lead window, the reminder is pushed
    /// this far into the future instead of firing in the past.
    pub late_grace_seconds: i64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            lead_time_minutes: 10,
            late_grace_seconds: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_id: String,
    pub poll_interval_seconds: u64,
    /// How long a lease holds before another worker may reclaim the job.
    pub lease_seconds: i64,
    /// Delivery attempts before the job is marked failed for good.
    pub max_attempts: u32,
    /// Upper bound on jobs leased per tick.
    pub batch_size: usize,
    /// Hard cap on a single delivery attempt. A dispatcher that hangs past
    /// this is treated as a failed attempt, so one dead notify endpoint
    /// cannot stall the whole poll loop.
    pub job_timeout_seconds: u64,
    /// Base spacing between retries; the actual delay grows with the
    /// attempt count.
    pub retry_delay_seconds: i64,
}

impl WorkerConfig {
    pub fn from_config(_config: &AppConfig) -> Self {
        Self::default()
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: format!("reminder-worker-{}", Uuid::new_v4()),
            poll_interval_seconds: 15,
            lease_seconds: 60,
            max_attempts: 3,
            batch_size: 16,
            job_timeout_seconds: 30,
            retry_delay_seconds: 30,
        }
    }
}
