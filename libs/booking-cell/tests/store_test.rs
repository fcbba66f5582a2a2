// libs/booking-cell/tests/store_test.rs
//
// PostgREST store tests against a wiremock server. These pin down how the
// store interprets PostgREST responses: a 409 on insert is the uniqueness
// index firing, an empty representation on a conditional PATCH is a lost
// compare-and-set race.

use assert_matches::assert_matches;
use chrono::{NaiveDate, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use booking_cell::{
    Appointment, AppointmentStatus, AppointmentStore, AppointmentType, Price,
    SupabaseAppointmentStore,
};
use shared_config::AppConfig;
use shared_database::SupabaseClient;

fn store_for(server: &MockServer) -> SupabaseAppointmentStore {
    let config = AppConfig {
        supabase_url: server.uri(),
        supabase_anon_key: "test-anon-key".to_string(),
        notify_api_url: String::new(),
        notify_api_key: String::new(),
        working_hours_start: "9:00 AM".to_string(),
        working_hours_end: "9:00 PM".to_string(),
    };
    SupabaseAppointmentStore::new(SupabaseClient::new(&config))
}

fn sample_appointment() -> Appointment {
    let now = Utc::now();
    Appointment {
        id: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        doctor_id: Uuid::new_v4(),
        date: NaiveDate::from_ymd_opt(2025, 6, 20).unwrap(),
        time_slot: "10:30 AM".to_string(),
        status: AppointmentStatus::Confirmed,
        appointment_type: AppointmentType::InitialConsultation,
        price: Price {
            amount_cents: 15_000,
            currency: "USD".to_string(),
        },
        prescription: None,
        intake: None,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn insert_returns_the_written_row() {
    let server = MockServer::start().await;
    let appointment = sample_appointment();

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(header("apikey", "test-anon-key"))
        .and(header("Prefer", "return=representation"))
        .and(body_partial_json(json!({ "id": appointment.id })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([appointment])))
        .expect(1)
        .mount(&server)
        .await;

    let written = store_for(&server)
        .insert_if_slot_free(appointment.clone())
        .await
        .unwrap();
    assert_eq!(written.id, appointment.id);
    assert_eq!(written.time_slot, "10:30 AM");
}

#[tokio::test]
async fn a_409_from_the_uniqueness_index_becomes_slot_taken() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint"
        })))
        .mount(&server)
        .await;

    let result = store_for(&server)
        .insert_if_slot_free(sample_appointment())
        .await;
    assert_matches!(result, Err(booking_cell::StoreError::SlotTaken));
}

#[tokio::test]
async fn lost_compare_and_set_yields_none() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    // The row no longer carries the expected status, so the filtered PATCH
    // matches nothing and the representation comes back empty.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{id}")))
        .and(query_param("status", "eq.confirmed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let updated = store_for(&server)
        .transition_status(id, AppointmentStatus::Confirmed, AppointmentStatus::Cancelled)
        .await
        .unwrap();
    assert!(updated.is_none());
}
