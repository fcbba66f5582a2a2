// libs/reminder-cell/src/store.rs
//
// Durable store for reminder jobs. Leasing is the concurrency primitive: a
// worker never processes a job it has not first claimed with a conditional
// write, so two workers polling the same store cannot both deliver one job
// while its lease holds. Delivery is still at-least-once overall; a worker
// that dies after sending but before acking leaves a job that will be
// re-leased and re-sent once the lease expires.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::error::ReminderError;
use crate::models::{ReminderJob, ReminderStatus};

#[async_trait]
pub trait ReminderJobStore: Send + Sync {
    async fn enqueue(&self, job: ReminderJob) -> Result<ReminderJob, ReminderError>;

    /// Cancel every still-scheduled job for the appointment. Jobs already
    /// leased, sent, or failed are left alone. Returns how many were
    /// cancelled.
    async fn cancel_scheduled_for_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<usize, ReminderError>;

    /// Claim up to `limit` due jobs for `worker_id`. Due means scheduled with
    /// `target_time <= now`, or leased with an expired lease. Claimed jobs
    /// come back leased with the attempt counter already bumped.
    async fn lease_due(
        &self,
        worker_id: &str,
        now: DateTime<Utc>,
        lease_duration: Duration,
        limit: usize,
    ) -> Result<Vec<ReminderJob>, ReminderError>;

    /// Mark a leased job sent. Returns false when the lease is no longer
    /// ours, in which case the delivery outcome belongs to whoever holds it.
    async fn complete(&self, job_id: Uuid, worker_id: &str) -> Result<bool, ReminderError>;

    /// Put a leased job back to scheduled for another attempt, with its
    /// `target_time` pushed to `next_attempt_at` so retries are spaced out
    /// rather than re-leased on the very next poll.
    async fn release_for_retry(
        &self,
        job_id: Uuid,
        worker_id: &str,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<bool, ReminderError>;

    /// Mark a leased job failed for good.
    async fn fail(&self, job_id: Uuid, worker_id: &str, error: &str)
        -> Result<bool, ReminderError>;

    async fn get(&self, job_id: Uuid) -> Result<Option<ReminderJob>, ReminderError>;
}

// ==============================================================================
// POSTGREST-BACKED STORE
// ==============================================================================

/// Production job store over Supabase/PostgREST. Leasing goes through the
/// `lease_due_reminder_jobs` database function so claim-and-mark is one
/// statement; the ack paths are conditional PATCHes filtered on the lease
/// owner, the same compare-and-set shape the booking store uses.
pub struct SupabaseReminderJobStore {
    client: SupabaseClient,
}

impl SupabaseReminderJobStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    async fn ack(
        &self,
        job_id: Uuid,
        worker_id: &str,
        patch: Value,
    ) -> Result<bool, ReminderError> {
        let path = format!(
            "/rest/v1/reminder_jobs?id=eq.{}&status=eq.leased&lease_owner=eq.{}",
            job_id, worker_id
        );

        let rows: Vec<Value> = self
            .client
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(patch),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(|e| ReminderError::Storage(e.to_string()))?;

        Ok(!rows.is_empty())
    }
}

#[async_trait]
impl ReminderJobStore for SupabaseReminderJobStore {
    async fn enqueue(&self, job: ReminderJob) -> Result<ReminderJob, ReminderError> {
        debug!(
            "Enqueueing {} job {} for appointment {} at {}",
            job.kind, job.id, job.appointment_id, job.target_time
        );

        let rows: Vec<Value> = self
            .client
            .request_with_headers(
                Method::POST,
                "/rest/v1/reminder_jobs",
                Some(json!(job)),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(|e| ReminderError::Storage(e.to_string()))?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| ReminderError::Storage("insert returned no row".to_string()))?;

        serde_json::from_value(row).map_err(|e| ReminderError::Storage(e.to_string()))
    }

    async fn cancel_scheduled_for_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<usize, ReminderError> {
        let path = format!(
            "/rest/v1/reminder_jobs?appointment_id=eq.{}&status=eq.scheduled",
            appointment_id
        );
        let body = json!({
            "status": ReminderStatus::Cancelled.to_string(),
            "updated_at": Utc::now().to_rfc3339(),
        });

        let rows: Vec<Value> = self
            .client
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(|e| ReminderError::Storage(e.to_string()))?;

        Ok(rows.len())
    }

    async fn lease_due(
        &self,
        worker_id: &str,
        now: DateTime<Utc>,
        lease_duration: Duration,
        limit: usize,
    ) -> Result<Vec<ReminderJob>, ReminderError> {
        let body = json!({
            "p_worker_id": worker_id,
            "p_now": now.to_rfc3339(),
            "p_lease_seconds": lease_duration.num_seconds(),
            "p_limit": limit,
        });

        let rows: Vec<Value> = self
            .client
            .request(Method::POST, "/rest/v1/rpc/lease_due_reminder_jobs", Some(body))
            .await
            .map_err(|e| ReminderError::Storage(e.to_string()))?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| ReminderError::Storage(e.to_string())))
            .collect()
    }

    async fn complete(&self, job_id: Uuid, worker_id: &str) -> Result<bool, ReminderError> {
        self.ack(
            job_id,
            worker_id,
            json!({
                "status": ReminderStatus::Sent.to_string(),
                "lease_owner": Value::Null,
                "lease_expires_at": Value::Null,
                "updated_at": Utc::now().to_rfc3339(),
            }),
        )
        .await
    }

    async fn release_for_retry(
        &self,
        job_id: Uuid,
        worker_id: &str,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<bool, ReminderError> {
        self.ack(
            job_id,
            worker_id,
            json!({
                "status": ReminderStatus::Scheduled.to_string(),
                "lease_owner": Value::Null,
                "lease_expires_at": Value::Null,
                "last_error": error,
                "target_time": next_attempt_at.to_rfc3339(),
                "updated_at": Utc::now().to_rfc3339(),
            }),
        )
        .await
    }

    async fn fail(
        &self,
        job_id: Uuid,
        worker_id: &str,
        error: &str,
    ) -> Result<bool, ReminderError> {
        self.ack(
            job_id,
            worker_id,
            json!({
                "status": ReminderStatus::Failed.to_string(),
                "lease_owner": Value::Null,
                "lease_expires_at": Value::Null,
                "last_error": error,
                "updated_at": Utc::now().to_rfc3339(),
            }),
        )
        .await
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<ReminderJob>, ReminderError> {
        let path = format!("/rest/v1/reminder_jobs?id=eq.{}", job_id);
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| ReminderError::Storage(e.to_string()))?;

        match rows.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| ReminderError::Storage(e.to_string())),
            None => Ok(None),
        }
    }
}

// ==============================================================================
// IN-MEMORY STORE
// ==============================================================================

/// Single-process store for tests and local development. One mutex makes
/// every claim a single linearization point, matching the guarantee the
/// database function gives in production.
#[derive(Default)]
pub struct InMemoryReminderJobStore {
    jobs: Mutex<HashMap<Uuid, ReminderJob>>,
}

impl InMemoryReminderJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every job, for assertions.
    pub fn all_jobs(&self) -> Vec<ReminderJob> {
        let jobs = self.jobs.lock().expect("reminder store poisoned");
        jobs.values().cloned().collect()
    }
}

#[async_trait]
impl ReminderJobStore for InMemoryReminderJobStore {
    async fn enqueue(&self, job: ReminderJob) -> Result<ReminderJob, ReminderError> {
        let mut jobs = self.jobs.lock().expect("reminder store poisoned");
        jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn cancel_scheduled_for_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<usize, ReminderError> {
        let mut jobs = self.jobs.lock().expect("reminder store poisoned");
        let mut cancelled = 0;

        for job in jobs.values_mut() {
            if job.appointment_id == appointment_id && job.status == ReminderStatus::Scheduled {
                job.status = ReminderStatus::Cancelled;
                job.updated_at = Utc::now();
                cancelled += 1;
            }
        }

        Ok(cancelled)
    }

    async fn lease_due(
        &self,
        worker_id: &str,
        now: DateTime<Utc>,
        lease_duration: Duration,
        limit: usize,
    ) -> Result<Vec<ReminderJob>, ReminderError> {
        let mut jobs = self.jobs.lock().expect("reminder store poisoned");

        let mut due: Vec<(DateTime<Utc>, Uuid)> = jobs
            .values()
            .filter(|job| match job.status {
                ReminderStatus::Scheduled => job.target_time <= now,
                ReminderStatus::Leased => {
                    job.lease_expires_at.is_some_and(|expiry| expiry <= now)
                }
                _ => false,
            })
            .map(|job| (job.target_time, job.id))
            .collect();
        due.sort();
        due.truncate(limit);

        let mut claimed = Vec::with_capacity(due.len());
        for (_, id) in due {
            let job = jobs.get_mut(&id).expect("job vanished under the lock");
            job.status = ReminderStatus::Leased;
            job.lease_owner = Some(worker_id.to_string());
            job.lease_expires_at = Some(now + lease_duration);
            job.attempts += 1;
            job.updated_at = now;
            claimed.push(job.clone());
        }

        Ok(claimed)
    }

    async fn complete(&self, job_id: Uuid, worker_id: &str) -> Result<bool, ReminderError> {
        let mut jobs = self.jobs.lock().expect("reminder store poisoned");

        match jobs.get_mut(&job_id) {
            Some(job)
                if job.status == ReminderStatus::Leased
                    && job.lease_owner.as_deref() == Some(worker_id) =>
            {
                job.status = ReminderStatus::Sent;
                job.lease_owner = None;
                job.lease_expires_at = None;
                job.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_for_retry(
        &self,
        job_id: Uuid,
        worker_id: &str,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<bool, ReminderError> {
        let mut jobs = self.jobs.lock().expect("reminder store poisoned");

        match jobs.get_mut(&job_id) {
            Some(job)
                if job.status == ReminderStatus::Leased
                    && job.lease_owner.as_deref() == Some(worker_id) =>
            {
                job.status = ReminderStatus::Scheduled;
                job.lease_owner = None;
                job.lease_expires_at = None;
                job.last_error = Some(error.to_string());
                job.target_time = next_attempt_at;
                job.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fail(
        &self,
        job_id: Uuid,
        worker_id: &str,
        error: &str,
    ) -> Result<bool, ReminderError> {
        let mut jobs = self.jobs.lock().expect("reminder store poisoned");

        match jobs.get_mut(&job_id) {
            Some(job)
                if job.status == ReminderStatus::Leased
                    && job.lease_owner.as_deref() == Some(worker_id) =>
            {
                job.status = ReminderStatus::Failed;
                job.lease_owner = None;
                job.lease_expires_at = None;
                job.last_error = Some(error.to_string());
                job.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<ReminderJob>, ReminderError> {
        let jobs = self.jobs.lock().expect("reminder store poisoned");
        Ok(jobs.get(&job_id).cloned())
    }
}
