// libs/reminder-cell/src/services/worker.rs
//
// Polling delivery worker. Each tick leases a batch of due jobs, routes them
// to the handler registered for their kind, and acks the outcome back to the
// store. The loop and the tick are separate so tests can drive ticks with a
// pinned clock and no sleeping.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};

use crate::error::ReminderError;
use crate::models::{JobKind, ReminderJob, WorkerConfig};
use crate::services::dispatch::{NotificationDispatcher, OutboundMessage};
use crate::services::template::build_reminder_template;
use crate::store::ReminderJobStore;

/// Per-kind delivery logic. The worker only leases and acks; what a job
/// actually does lives behind this trait.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &ReminderJob) -> Result<(), ReminderError>;
}

/// Handler for appointment reminders: render the template for the job's
/// recipient and hand it to the dispatcher.
pub struct ReminderDeliveryHandler {
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl ReminderDeliveryHandler {
    pub fn new(dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl JobHandler for ReminderDeliveryHandler {
    async fn handle(&self, job: &ReminderJob) -> Result<(), ReminderError> {
        let template = build_reminder_template(&job.payload, job.recipient);
        let message = OutboundMessage {
            to_address: job.payload.to_address.clone(),
            subject: template.subject,
            html: template.html,
        };

        self.dispatcher
            .dispatch(&message)
            .await
            .map_err(|e| ReminderError::Delivery(e.to_string()))
    }
}

/// Outcome counts for one tick, for logging and assertions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub leased: usize,
    pub sent: usize,
    pub retried: usize,
    pub failed: usize,
}

pub struct ReminderWorkerService {
    config: WorkerConfig,
    store: Arc<dyn ReminderJobStore>,
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
    is_shutdown: tokio::sync::RwLock<bool>,
}

impl ReminderWorkerService {
    pub fn new(config: WorkerConfig, store: Arc<dyn ReminderJobStore>) -> Self {
        Self {
            config,
            store,
            handlers: HashMap::new(),
            is_shutdown: tokio::sync::RwLock::new(false),
        }
    }

    pub fn with_handler(mut self, kind: JobKind, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    /// Lease and process one batch of due jobs. Safe to call concurrently
    /// from several workers against the same store; the lease keeps them off
    /// each other's jobs.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickSummary, ReminderError> {
        let jobs = self
            .store
            .lease_due(
                &self.config.worker_id,
                now,
                Duration::seconds(self.config.lease_seconds),
                self.config.batch_size,
            )
            .await?;

        let mut summary = TickSummary {
            leased: jobs.len(),
            ..TickSummary::default()
        };

        for job in jobs {
            self.process_job(&job, now, &mut summary).await?;
        }

        if summary.leased > 0 {
            info!(
                "Worker {} tick: {} leased, {} sent, {} retried, {} failed",
                self.config.worker_id,
                summary.leased,
                summary.sent,
                summary.retried,
                summary.failed
            );
        }
        Ok(summary)
    }

    async fn process_job(
        &self,
        job: &ReminderJob,
        now: DateTime<Utc>,
        summary: &mut TickSummary,
    ) -> Result<(), ReminderError> {
        let Some(handler) = self.handlers.get(&job.kind) else {
            // A kind nothing registered for can never succeed; park it.
            error!("No handler registered for job kind {}", job.kind);
            self.store
                .fail(
                    job.id,
                    &self.config.worker_id,
                    &ReminderError::UnknownJobKind(job.kind.to_string()).to_string(),
                )
                .await?;
            summary.failed += 1;
            return Ok(());
        };

        // Bound every attempt: a dispatcher hanging on a dead endpoint must
        // surface as a failed attempt, not stall the poll loop.
        let outcome = match tokio::time::timeout(
            std::time::Duration::from_secs(self.config.job_timeout_seconds),
            handler.handle(job),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ReminderError::Delivery(format!(
                "timed out after {}s",
                self.config.job_timeout_seconds
            ))),
        };

        match outcome {
            Ok(()) => {
                if self.store.complete(job.id, &self.config.worker_id).await? {
                    debug!("Job {} delivered", job.id);
                    summary.sent += 1;
                } else {
                    // Lease moved on while we were delivering; whoever holds
                    // it now owns the outcome.
                    warn!("Lost lease on job {} after delivery", job.id);
                }
            }
            Err(e) if job.attempts >= self.config.max_attempts => {
                error!(
                    "Job {} failed after {} attempts: {}",
                    job.id, job.attempts, e
                );
                self.store
                    .fail(job.id, &self.config.worker_id, &e.to_string())
                    .await?;
                summary.failed += 1;
            }
            Err(e) => {
                // Spacing grows with the attempt count.
                let next_attempt_at = now
                    + Duration::seconds(self.config.retry_delay_seconds * i64::from(job.attempts));
                warn!(
                    "Job {} attempt {} failed, retrying at {}: {}",
                    job.id, job.attempts, next_attempt_at, e
                );
                self.store
                    .release_for_retry(job.id, &self.config.worker_id, &e.to_string(), next_attempt_at)
                    .await?;
                summary.retried += 1;
            }
        }

        Ok(())
    }

    /// Poll loop. Runs until `shutdown` is called.
    pub async fn run(&self) {
        info!(
            "Starting reminder worker {} (poll every {}s)",
            self.config.worker_id, self.config.poll_interval_seconds
        );

        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(self.config.poll_interval_seconds));

        loop {
            interval.tick().await;

            if *self.is_shutdown.read().await {
                info!("Reminder worker {} stopping", self.config.worker_id);
                break;
            }

            if let Err(e) = self.tick(Utc::now()).await {
                error!("Reminder worker {} tick failed: {}", self.config.worker_id, e);
            }
        }
    }

    pub async fn shutdown(&self) {
        let mut is_shutdown = self.is_shutdown.write().await;
        *is_shutdown = true;
    }
}
