// libs/booking-cell/tests/ledger_test.rs
//
// Ledger semantics against the in-memory store: atomic claims, the
// one-booking-per-slot invariant, and the appointment state machine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use booking_cell::{
    Appointment, AppointmentType, BookingError, BookingEventHook, BookingLedger, CancelRequest,
    CancelledBy, ClaimRequest, InMemoryAppointmentStore, NoopHook,
};

fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 20).unwrap()
}

fn claim_request(doctor_id: Uuid, time_slot: &str) -> ClaimRequest {
    ClaimRequest {
        doctor_id,
        patient_id: Uuid::new_v4(),
        date: test_date(),
        time_slot: time_slot.to_string(),
        appointment_type: AppointmentType::InitialConsultation,
        intake: None,
    }
}

fn cancel_request() -> CancelRequest {
    CancelRequest {
        cancelled_by: CancelledBy::Patient,
        reason: Some("schedule change".to_string()),
    }
}

fn ledger_with_store() -> (Arc<BookingLedger>, Arc<InMemoryAppointmentStore>) {
    let store = Arc::new(InMemoryAppointmentStore::new());
    let ledger = Arc::new(BookingLedger::new(store.clone(), Arc::new(NoopHook)));
    (ledger, store)
}

// ==============================================================================
// ATOMIC CLAIM PROPERTIES
// ==============================================================================

#[tokio::test]
async fn concurrent_claims_have_exactly_one_winner() {
    let (ledger, _store) = ledger_with_store();
    let doctor_id = Uuid::new_v4();

    let mut handles = Vec::new();
    for _ in 0..24 {
        let ledger = Arc::clone(&ledger);
        let request = claim_request(doctor_id, "10:00 AM");
        handles.push(tokio::spawn(async move { ledger.claim(request).await }));
    }

    let mut winners = 0;
    let mut slot_taken = 0;
    for handle in handles {
        match handle.await.expect("claim task panicked") {
            Ok(_) => winners += 1,
            Err(BookingError::SlotTaken) => slot_taken += 1,
            Err(other) => panic!("unexpected claim error: {other}"),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(slot_taken, 23);

    // Exactly one non-cancelled appointment exists for the key afterward.
    let bookings = ledger
        .bookings_for_doctor_date(doctor_id, test_date())
        .await
        .unwrap();
    let occupying: Vec<&Appointment> = bookings
        .iter()
        .filter(|apt| apt.status.occupies_slot() && apt.time_slot == "10:00 AM")
        .collect();
    assert_eq!(occupying.len(), 1);
    assert_eq!(bookings.len(), 1, "losers must not have created records");
}

#[tokio::test]
async fn cancelled_slot_can_be_reclaimed() {
    let (ledger, _store) = ledger_with_store();
    let doctor_id = Uuid::new_v4();

    let first = ledger.claim(claim_request(doctor_id, "2:30 PM")).await.unwrap();

    // Slot is held.
    assert_matches!(
        ledger.claim(claim_request(doctor_id, "2:30 PM")).await,
        Err(BookingError::SlotTaken)
    );

    ledger.cancel(first.id, cancel_request()).await.unwrap();

    // Freed slot is immediately claimable again.
    let second = ledger.claim(claim_request(doctor_id, "2:30 PM")).await.unwrap();
    assert_ne!(first.id, second.id);
}

#[tokio::test]
async fn equivalent_slot_labels_collide() {
    let (ledger, _store) = ledger_with_store();
    let doctor_id = Uuid::new_v4();

    ledger.claim(claim_request(doctor_id, "9:00 AM")).await.unwrap();

    // Same instant, different spelling: must still be one slot.
    assert_matches!(
        ledger.claim(claim_request(doctor_id, "09:00 am")).await,
        Err(BookingError::SlotTaken)
    );
}

#[tokio::test]
async fn malformed_or_off_grid_slots_are_rejected() {
    let (ledger, _store) = ledger_with_store();
    let doctor_id = Uuid::new_v4();

    assert_matches!(
        ledger.claim(claim_request(doctor_id, "noon")).await,
        Err(BookingError::ValidationError(_))
    );
    assert_matches!(
        ledger.claim(claim_request(doctor_id, "10:17 AM")).await,
        Err(BookingError::ValidationError(_))
    );

    let bookings = ledger
        .bookings_for_doctor_date(doctor_id, test_date())
        .await
        .unwrap();
    assert!(bookings.is_empty());
}

// ==============================================================================
// STATE MACHINE
// ==============================================================================

#[tokio::test]
async fn cancel_is_rejected_once_terminal() {
    let (ledger, _store) = ledger_with_store();
    let appointment = ledger
        .claim(claim_request(Uuid::new_v4(), "11:00 AM"))
        .await
        .unwrap();

    ledger.cancel(appointment.id, cancel_request()).await.unwrap();

    assert_matches!(
        ledger.cancel(appointment.id, cancel_request()).await,
        Err(BookingError::AlreadyTerminal(_))
    );
}

#[tokio::test]
async fn complete_is_idempotent_but_terminal() {
    let (ledger, _store) = ledger_with_store();
    let appointment = ledger
        .claim(claim_request(Uuid::new_v4(), "3:00 PM"))
        .await
        .unwrap();

    let completed = ledger.complete(appointment.id).await.unwrap();
    let again = ledger.complete(appointment.id).await.unwrap();
    assert_eq!(completed.status, again.status);

    // Completed appointments cannot be cancelled.
    assert_matches!(
        ledger.cancel(appointment.id, cancel_request()).await,
        Err(BookingError::AlreadyTerminal(_))
    );
}

#[tokio::test]
async fn unknown_appointment_is_not_found() {
    let (ledger, _store) = ledger_with_store();

    assert_matches!(
        ledger.cancel(Uuid::new_v4(), cancel_request()).await,
        Err(BookingError::NotFound)
    );
    assert_matches!(ledger.complete(Uuid::new_v4()).await, Err(BookingError::NotFound));
}

// ==============================================================================
// EVENT HOOK BEHAVIOR
// ==============================================================================

#[derive(Default)]
struct RecordingHook {
    confirmed: Mutex<Vec<Uuid>>,
    cancelled: Mutex<Vec<Uuid>>,
}

#[async_trait]
impl BookingEventHook for RecordingHook {
    async fn appointment_confirmed(&self, appointment: &Appointment) -> anyhow::Result<()> {
        self.confirmed.lock().unwrap().push(appointment.id);
        Ok(())
    }

    async fn appointment_cancelled(&self, appointment_id: Uuid) -> anyhow::Result<()> {
        self.cancelled.lock().unwrap().push(appointment_id);
        Ok(())
    }
}

struct FailingHook {
    calls: AtomicUsize,
}

#[async_trait]
impl BookingEventHook for FailingHook {
    async fn appointment_confirmed(&self, _appointment: &Appointment) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("job store unavailable")
    }

    async fn appointment_cancelled(&self, _appointment_id: Uuid) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("job store unavailable")
    }
}

#[tokio::test]
async fn claim_and_cancel_fire_the_hook() {
    let store = Arc::new(InMemoryAppointmentStore::new());
    let hook = Arc::new(RecordingHook::default());
    let ledger = BookingLedger::new(store, hook.clone());

    let appointment = ledger
        .claim(claim_request(Uuid::new_v4(), "4:00 PM"))
        .await
        .unwrap();
    ledger.cancel(appointment.id, cancel_request()).await.unwrap();

    assert_eq!(hook.confirmed.lock().unwrap().as_slice(), &[appointment.id]);
    assert_eq!(hook.cancelled.lock().unwrap().as_slice(), &[appointment.id]);
}

#[tokio::test]
async fn hook_failure_never_fails_the_booking() {
    let store = Arc::new(InMemoryAppointmentStore::new());
    let hook = Arc::new(FailingHook { calls: AtomicUsize::new(0) });
    let ledger = BookingLedger::new(store, hook.clone());

    // The hook errors, the booking stands.
    let appointment = ledger
        .claim(claim_request(Uuid::new_v4(), "5:00 PM"))
        .await
        .expect("booking must stand when reminder scheduling fails");

    assert_eq!(hook.calls.load(Ordering::SeqCst), 1);

    let fetched = ledger.get(appointment.id).await.unwrap();
    assert!(fetched.status.occupies_slot());
}
