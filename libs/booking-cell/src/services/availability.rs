// libs/booking-cell/src/services/availability.rs
use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use shared_utils::time::{format_time_of_day, parse_time_of_day};

use crate::models::{Appointment, SlotView, WorkingHours};

/// Computes the free/occupied slot listing for one doctor and date. Pure and
/// read-only: safe to call concurrently and repeatedly.
pub struct AvailabilityCalculator;

impl AvailabilityCalculator {
    /// Generate candidate slots across the working-hours window at the
    /// configured granularity and mark each occupied or free against the
    /// given bookings.
    ///
    /// Working hours and the output slots share one wall-clock
    /// representation (platform time, UTC); converting to the requesting
    /// client's timezone is the caller's job, so no conversion can happen
    /// twice.
    pub fn list_slots(
        doctor_id: Uuid,
        date: NaiveDate,
        working_hours: &WorkingHours,
        existing_bookings: &[Appointment],
    ) -> Vec<SlotView> {
        let (start_hour, start_minute) = parse_time_of_day(&working_hours.start);
        let (end_hour, end_minute) = parse_time_of_day(&working_hours.end);

        let start = start_hour * 60 + start_minute;
        let end = end_hour * 60 + end_minute;
        let step = working_hours.slot_minutes.max(1);

        let mut slots = Vec::new();
        let mut cursor = start;

        // A slot must fit entirely inside the window; nothing wraps past the
        // given date.
        while cursor + step <= end {
            let label = format_time_of_day(cursor / 60, cursor % 60);

            let occupied = existing_bookings.iter().any(|apt| {
                apt.doctor_id == doctor_id
                    && apt.date == date
                    && apt.status.occupies_slot()
                    && apt.time_slot == label
            });

            slots.push(SlotView {
                time_slot: label,
                free: !occupied,
            });

            cursor += step;
        }

        debug!(
            "Computed {} slots for doctor {} on {} ({} free)",
            slots.len(),
            doctor_id,
            date,
            slots.iter().filter(|s| s.free).count()
        );

        slots
    }
}
