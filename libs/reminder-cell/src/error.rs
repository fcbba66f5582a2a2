// libs/reminder-cell/src/error.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReminderError {
    #[error("reminder job not found")]
    NotFound,

    #[error("contact lookup failed: {0}")]
    ContactLookup(String),

    #[error("notification delivery failed: {0}")]
    Delivery(String),

    #[error("no handler registered for job kind {0}")]
    UnknownJobKind(String),

    #[error("storage error: {0}")]
    Storage(String),
}
