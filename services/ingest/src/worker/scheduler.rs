use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, anyhow};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use inlet_core::clock::Clock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::repository::{EventHandler, EventStore};
use crate::domain::types::{LeaseClaim, Settlement};
use crate::error::IngestError;
use crate::worker::backoff::backoff;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Sleep between passes, whether or not the previous pass found work.
    pub poll_interval: Duration,
    /// Upper bound on rows leased per pass.
    pub batch_size: u64,
    /// Lease length. The handler gets whatever is left of it, less a tenth
    /// reserved for settling.
    pub lease_duration: Duration,
    /// Failure count at which an event is dead-lettered.
    pub max_attempts: i32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            batch_size: 20,
            lease_duration: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

/// Tally of one scheduler pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub claimed: usize,
    pub processed: usize,
    pub retried: usize,
    pub dead_lettered: usize,
    /// Rows whose lease passed to another holder before they could be settled.
    pub lost: usize,
    /// Rows abandoned after a store failure; they come back once the lease expires.
    pub faulted: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Processed,
    Retried,
    DeadLettered,
    Lost,
    Faulted,
}

impl PassReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Processed => self.processed += 1,
            Outcome::Retried => self.retried += 1,
            Outcome::DeadLettered => self.dead_lettered += 1,
            Outcome::Lost => self.lost += 1,
            Outcome::Faulted => self.faulted += 1,
        }
    }
}

/// Polls the store for claimable events and drives each through the handler.
///
/// Several schedulers may share one store; they coordinate only through the
/// lease columns.
pub struct Scheduler<S, H> {
    store: Arc<S>,
    handler: Arc<H>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    cancel: CancellationToken,
}

impl<S: EventStore, H: EventHandler> Scheduler<S, H> {
    pub fn new(
        store: Arc<S>,
        handler: Arc<H>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            handler,
            clock,
            config,
            cancel,
        }
    }

    /// Run passes until the cancellation token fires. A pass already in flight
    /// is finished before returning.
    pub async fn run(&self) {
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            batch_size = self.config.batch_size,
            max_attempts = self.config.max_attempts,
            "scheduler started"
        );

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            match self.run_pass().await {
                Ok(report) if report.claimed > 0 => debug!(?report, "scheduler pass finished"),
                Ok(_) => {}
                Err(e) => error!(error = ?e, "claim failed, retrying next interval"),
            }

            tokio::select! {
                () = tokio::time::sleep(self.config.poll_interval) => {}
                () = self.cancel.cancelled() => break,
            }
        }

        info!("scheduler stopped");
    }

    /// Claim one batch under a fresh lease token and process it. Only a claim
    /// failure is returned as an error; per-event failures are absorbed.
    pub async fn run_pass(&self) -> Result<PassReport, IngestError> {
        let lease = chrono::Duration::from_std(self.config.lease_duration)
            .context("lease duration out of range")?;
        let now = self.clock.now();
        let claim = LeaseClaim {
            now,
            lease_until: now + lease,
            lock_id: Uuid::new_v4().simple().to_string(),
            limit: self.config.batch_size,
        };

        let claimed = self.store.claim_batch(&claim).await?;
        let mut report = PassReport {
            claimed: claimed.len(),
            ..PassReport::default()
        };
        if claimed.is_empty() {
            return Ok(report);
        }

        let lock_id = claim.lock_id.as_str();
        let outcomes = join_all(
            claimed
                .iter()
                .map(|e| self.process_one(e.id, lock_id, claim.lease_until)),
        )
        .await;
        for outcome in outcomes {
            report.record(outcome);
        }
        Ok(report)
    }

    async fn process_one(&self, id: Uuid, lock_id: &str, lease_until: DateTime<Utc>) -> Outcome {
        match self.try_process(id, lock_id, lease_until).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(event_id = %id, lock_id, error = ?e, "store failure while processing event");
                Outcome::Faulted
            }
        }
    }

    /// Time the handler may run so that settling still happens inside the
    /// lease. `None` once the lease is effectively spent.
    fn handler_budget(&self, lease_until: DateTime<Utc>) -> Option<Duration> {
        let margin = self.config.lease_duration / 10;
        (lease_until - self.clock.now())
            .to_std()
            .ok()
            .and_then(|remaining| remaining.checked_sub(margin))
            .filter(|budget| !budget.is_zero())
    }

    async fn try_process(
        &self,
        id: Uuid,
        lock_id: &str,
        lease_until: DateTime<Utc>,
    ) -> Result<Outcome, IngestError> {
        // The claim and this step are separate round trips; re-check ownership.
        let Some(event) = self.store.find_by_id(id).await? else {
            debug!(event_id = %id, lock_id, "claimed event no longer exists");
            return Ok(Outcome::Lost);
        };
        if !event.is_leased_to(lock_id) {
            debug!(event_id = %id, lock_id, "lease lost before processing");
            return Ok(Outcome::Lost);
        }

        // Left as-is, the row is reclaimed once the lease runs out.
        let Some(budget) = self.handler_budget(lease_until) else {
            debug!(event_id = %id, lock_id, "lease spent before handler could run");
            return Ok(Outcome::Lost);
        };

        let attempted_at = self.clock.now();
        let result = tokio::time::timeout(budget, self.handler.handle(&event))
            .await
            .unwrap_or_else(|_| Err(anyhow!("handler timed out after {}s", budget.as_secs())));

        let settlement = match result {
            Ok(()) => Settlement::Processed {
                attempted_at,
                processed_at: self.clock.now(),
            },
            Err(err) => {
                let attempts = event.attempts.saturating_add(1);
                let error = format!("{err:#}");
                if attempts >= self.config.max_attempts {
                    Settlement::DeadLettered {
                        attempted_at,
                        attempts,
                        error,
                    }
                } else {
                    Settlement::Retry {
                        attempted_at,
                        attempts,
                        error,
                        next_attempt_at: self.clock.now() + backoff(attempts),
                    }
                }
            }
        };

        if !self.store.settle(id, lock_id, &settlement).await? {
            debug!(event_id = %id, lock_id, "lease lost before settling");
            return Ok(Outcome::Lost);
        }

        Ok(match settlement {
            Settlement::Processed { .. } => Outcome::Processed,
            Settlement::Retry {
                attempts,
                error,
                next_attempt_at,
                ..
            } => {
                warn!(
                    event_id = %id,
                    provider = %event.provider,
                    attempts,
                    error = %error,
                    next_attempt_at = %next_attempt_at,
                    "event processing failed, retry scheduled"
                );
                Outcome::Retried
            }
            Settlement::DeadLettered {
                attempts, error, ..
            } => {
                error!(
                    event_id = %id,
                    provider = %event.provider,
                    provider_event_id = %event.provider_event_id,
                    attempts,
                    error = %error,
                    "event dead-lettered"
                );
                Outcome::DeadLettered
            }
        })
    }
}
