// libs/reminder-cell/src/services/template.rs
//
// Reminder message rendering. Pure string assembly, no I/O.

use crate::models::{RecipientRole, ReminderPayload};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderTemplate {
    pub subject: String,
    pub html: String,
}

/// Render the reminder for one recipient. The patient copy leads with the
/// doctor's name, the doctor copy with the patient's.
pub fn build_reminder_template(payload: &ReminderPayload, recipient: RecipientRole) -> ReminderTemplate {
    match recipient {
        RecipientRole::Patient => ReminderTemplate {
            subject: format!(
                "Reminder: your appointment with {} at {}",
                payload.doctor_name, payload.time_slot
            ),
            html: format!(
                "<p>Hi {},</p>\
                 <p>This is a reminder of your upcoming appointment with {} on {} at {}.</p>\
                 <p>Please be ready a few minutes early.</p>",
                payload.patient_name, payload.doctor_name, payload.date_display, payload.time_slot
            ),
        },
        RecipientRole::Doctor => ReminderTemplate {
            subject: format!(
                "Upcoming appointment: {} at {}",
                payload.patient_name, payload.time_slot
            ),
            html: format!(
                "<p>Hi {},</p>\
                 <p>You have an appointment with {} on {} at {}.</p>",
                payload.doctor_name, payload.patient_name, payload.date_display, payload.time_slot
            ),
        },
    }
}
