// libs/reminder-cell/tests/worker_test.rs
//
// Delivery worker tests: a due job goes out once while its lease holds,
// failures retry up to the attempt cap, and a dead worker's lease is
// reclaimable after it expires.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use reminder_cell::{
    DispatchError, InMemoryReminderJobStore, JobKind, NotificationDispatcher, OutboundMessage,
    RecipientRole, ReminderDeliveryHandler, ReminderJob, ReminderJobStore, ReminderPayload,
    ReminderStatus, ReminderWorkerService, WorkerConfig,
};

struct RecordingDispatcher {
    sent: Mutex<Vec<OutboundMessage>>,
}

impl RecordingDispatcher {
    fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }

    fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn dispatch(&self, message: &OutboundMessage) -> Result<(), DispatchError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

struct FailingDispatcher;

#[async_trait]
impl NotificationDispatcher for FailingDispatcher {
    async fn dispatch(&self, _message: &OutboundMessage) -> Result<(), DispatchError> {
        Err(DispatchError::Api {
            status: 503,
            body: "mailbox on fire".to_string(),
        })
    }
}

fn job_due_at(target_time: DateTime<Utc>) -> ReminderJob {
    let now = target_time - Duration::hours(1);
    ReminderJob {
        id: Uuid::new_v4(),
        kind: JobKind::AppointmentReminder,
        appointment_id: Uuid::new_v4(),
        recipient: RecipientRole::Patient,
        payload: ReminderPayload {
            to_address: "pat@example.com".to_string(),
            patient_name: "Pat Jones".to_string(),
            doctor_name: "Dr. Lee".to_string(),
            date_display: "June 20, 2025".to_string(),
            time_slot: "10:00 AM".to_string(),
        },
        target_time,
        status: ReminderStatus::Scheduled,
        lease_owner: None,
        lease_expires_at: None,
        attempts: 0,
        last_error: None,
        created_at: now,
        updated_at: now,
    }
}

fn worker_with(
    worker_id: &str,
    store: Arc<InMemoryReminderJobStore>,
    dispatcher: Arc<dyn NotificationDispatcher>,
) -> ReminderWorkerService {
    let config = WorkerConfig {
        worker_id: worker_id.to_string(),
        ..WorkerConfig::default()
    };
    ReminderWorkerService::new(config, store).with_handler(
        JobKind::AppointmentReminder,
        Arc::new(ReminderDeliveryHandler::new(dispatcher)),
    )
}

#[tokio::test]
async fn due_job_is_delivered_exactly_once_across_ticks() {
    let store = Arc::new(InMemoryReminderJobStore::new());
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let worker = worker_with("w1", store.clone(), dispatcher.clone());

    let due = Utc.with_ymd_and_hms(2025, 6, 20, 9, 50, 0).unwrap();
    let job = store.enqueue(job_due_at(due)).await.unwrap();

    let first = worker.tick(due).await.unwrap();
    assert_eq!(first.leased, 1);
    assert_eq!(first.sent, 1);

    let second = worker.tick(due + Duration::seconds(1)).await.unwrap();
    assert_eq!(second.leased, 0);

    assert_eq!(dispatcher.sent_count(), 1);
    let stored = store.get(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ReminderStatus::Sent);
}

#[tokio::test]
async fn job_not_yet_due_is_left_alone() {
    let store = Arc::new(InMemoryReminderJobStore::new());
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let worker = worker_with("w1", store.clone(), dispatcher.clone());

    let due = Utc.with_ymd_and_hms(2025, 6, 20, 9, 50, 0).unwrap();
    store.enqueue(job_due_at(due)).await.unwrap();

    let summary = worker.tick(due - Duration::minutes(5)).await.unwrap();
    assert_eq!(summary.leased, 0);
    assert_eq!(dispatcher.sent_count(), 0);
}

#[tokio::test]
async fn delivery_failures_retry_then_fail_for_good() {
    let store = Arc::new(InMemoryReminderJobStore::new());
    let worker = worker_with("w1", store.clone(), Arc::new(FailingDispatcher));

    let due = Utc.with_ymd_and_hms(2025, 6, 20, 9, 50, 0).unwrap();
    let job = store.enqueue(job_due_at(due)).await.unwrap();

    // Default cap is three attempts: two retries, then failed. Each tick
    // lands at the retry time the previous failure pushed the job to.
    let first = worker.tick(due).await.unwrap();
    assert_eq!(first.retried, 1);

    let second = worker.tick(due + Duration::seconds(30)).await.unwrap();
    assert_eq!(second.retried, 1);

    let third = worker.tick(due + Duration::seconds(90)).await.unwrap();
    assert_eq!(third.failed, 1);

    let stored = store.get(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ReminderStatus::Failed);
    assert_eq!(stored.attempts, 3);
    assert!(stored.last_error.as_deref().unwrap().contains("503"));

    // Parked for good: a later tick leaves the job untouched.
    let after = worker.tick(due + Duration::minutes(10)).await.unwrap();
    assert_eq!(after.leased, 0);
}

#[tokio::test]
async fn failed_attempt_backs_off_before_the_next_retry() {
    let store = Arc::new(InMemoryReminderJobStore::new());
    let worker = worker_with("w1", store.clone(), Arc::new(FailingDispatcher));

    let due = Utc.with_ymd_and_hms(2025, 6, 20, 9, 50, 0).unwrap();
    let job = store.enqueue(job_due_at(due)).await.unwrap();

    let first = worker.tick(due).await.unwrap();
    assert_eq!(first.retried, 1);

    // One attempt down, the job is rescheduled retry_delay into the future.
    let stored = store.get(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ReminderStatus::Scheduled);
    assert_eq!(stored.target_time, due + Duration::seconds(30));

    // A tick inside the backoff window leaves the job alone.
    let early = worker.tick(due + Duration::seconds(1)).await.unwrap();
    assert_eq!(early.leased, 0);

    // Once the backoff elapses, the retry goes through.
    let retry = worker.tick(due + Duration::seconds(30)).await.unwrap();
    assert_eq!(retry.leased, 1);
}

struct HangingDispatcher;

#[async_trait]
impl NotificationDispatcher for HangingDispatcher {
    async fn dispatch(&self, _message: &OutboundMessage) -> Result<(), DispatchError> {
        // Connection accepted, response never arrives.
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn hung_dispatch_times_out_instead_of_stalling_the_tick() {
    let store = Arc::new(InMemoryReminderJobStore::new());
    let worker = worker_with("w1", store.clone(), Arc::new(HangingDispatcher));

    let due = Utc.with_ymd_and_hms(2025, 6, 20, 9, 50, 0).unwrap();
    let job = store.enqueue(job_due_at(due)).await.unwrap();

    // The tick returns despite the dispatcher never answering, and the
    // attempt is accounted as a retryable failure.
    let summary = worker.tick(due).await.unwrap();
    assert_eq!(summary.leased, 1);
    assert_eq!(summary.retried, 1);
    assert_eq!(summary.sent, 0);

    let stored = store.get(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ReminderStatus::Scheduled);
    assert!(stored.last_error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn expired_lease_is_reclaimed_by_another_worker() {
    let store = Arc::new(InMemoryReminderJobStore::new());
    let dispatcher = Arc::new(RecordingDispatcher::new());

    let due = Utc.with_ymd_and_hms(2025, 6, 20, 9, 50, 0).unwrap();
    let job = store.enqueue(job_due_at(due)).await.unwrap();

    // Worker A claims the job and dies without acking.
    let claimed = store
        .lease_due("dead-worker", due, Duration::seconds(60), 16)
        .await
        .unwrap();
    assert_eq!(claimed.len(), 1);

    // While the lease holds, nobody else can touch it.
    let worker_b = worker_with("w2", store.clone(), dispatcher.clone());
    let held = worker_b.tick(due + Duration::seconds(30)).await.unwrap();
    assert_eq!(held.leased, 0);

    // Past expiry the job is fair game again.
    let reclaimed = worker_b.tick(due + Duration::seconds(61)).await.unwrap();
    assert_eq!(reclaimed.leased, 1);
    assert_eq!(reclaimed.sent, 1);
    assert_eq!(dispatcher.sent_count(), 1);

    let stored = store.get(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ReminderStatus::Sent);
    assert_eq!(stored.attempts, 2);
}

#[tokio::test]
async fn cancelled_job_is_never_dispatched() {
    let store = Arc::new(InMemoryReminderJobStore::new());
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let worker = worker_with("w1", store.clone(), dispatcher.clone());

    let due = Utc.with_ymd_and_hms(2025, 6, 20, 9, 50, 0).unwrap();
    let job = store.enqueue(job_due_at(due)).await.unwrap();

    let cancelled = store
        .cancel_scheduled_for_appointment(job.appointment_id)
        .await
        .unwrap();
    assert_eq!(cancelled, 1);

    let summary = worker.tick(due + Duration::minutes(5)).await.unwrap();
    assert_eq!(summary.leased, 0);
    assert_eq!(dispatcher.sent_count(), 0);
}

#[tokio::test]
async fn stale_ack_after_lost_lease_is_ignored() {
    let store = Arc::new(InMemoryReminderJobStore::new());

    let due = Utc.with_ymd_and_hms(2025, 6, 20, 9, 50, 0).unwrap();
    let job = store.enqueue(job_due_at(due)).await.unwrap();

    store
        .lease_due("w1", due, Duration::seconds(60), 16)
        .await
        .unwrap();
    // Lease expires and w2 takes over.
    store
        .lease_due("w2", due + Duration::seconds(61), Duration::seconds(60), 16)
        .await
        .unwrap();

    // w1 comes back from the dead; its ack must bounce off w2's lease.
    assert!(!store.complete(job.id, "w1").await.unwrap());
    assert!(store.complete(job.id, "w2").await.unwrap());
}
