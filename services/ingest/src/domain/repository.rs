use std::future::Future;

use uuid::Uuid;

use crate::domain::types::{IncomingEvent, InsertOutcome, LeaseClaim, Settlement};
use crate::error::IngestError;

// Methods return `impl Future + Send` so generic callers (axum handlers,
// spawned scheduler tasks) can rely on Send futures.

/// Durable store of ingested events and their lease state.
pub trait EventStore: Send + Sync {
    /// Insert `event` unless a row with the same `(provider, provider_event_id)`
    /// exists. A duplicate is not an error.
    fn insert_if_absent(
        &self,
        event: &IncomingEvent,
    ) -> impl Future<Output = Result<InsertOutcome, IngestError>> + Send;

    /// Lease up to `claim.limit` claimable rows, oldest `received_at` first,
    /// and return exactly the rows this claim won.
    fn claim_batch(
        &self,
        claim: &LeaseClaim,
    ) -> impl Future<Output = Result<Vec<IncomingEvent>, IngestError>> + Send;

    fn find_by_id(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<IncomingEvent>, IngestError>> + Send;

    /// Apply `settlement` if `lock_id` still holds the lease on row `id`.
    /// Returns `false` (and changes nothing) when the lease was lost.
    fn settle(
        &self,
        id: Uuid,
        lock_id: &str,
        settlement: &Settlement,
    ) -> impl Future<Output = Result<bool, IngestError>> + Send;

    /// Cheap connectivity check for readiness probes.
    fn ping(&self) -> impl Future<Output = Result<(), IngestError>> + Send;
}

/// Business processing of a verified event. Errors are retried by the scheduler.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &IncomingEvent) -> impl Future<Output = anyhow::Result<()>> + Send;
}
