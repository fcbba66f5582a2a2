pub mod error;
pub mod models;
pub mod services;
pub mod store;

pub use error::ReminderError;
pub use models::*;
pub use services::directory::{
    ContactCard, ContactDirectory, StaticContactDirectory, SupabaseContactDirectory,
};
pub use services::dispatch::{
    DispatchError, HttpNotificationDispatcher, NotificationDispatcher, OutboundMessage,
};
pub use services::scheduler::ReminderScheduler;
pub use services::template::{build_reminder_template, ReminderTemplate};
pub use services::worker::{
    JobHandler, ReminderDeliveryHandler, ReminderWorkerService, TickSummary,
};
pub use store::{InMemoryReminderJobStore, ReminderJobStore, SupabaseReminderJobStore};
