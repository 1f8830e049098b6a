use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Placeholder stored when a provider event id or type cannot be extracted.
pub const UNKNOWN: &str = "unknown";

/// Longest accepted provider route segment.
pub const MAX_PROVIDER_LEN: usize = 50;

/// Processing state of an [`IncomingEvent`].
///
/// `Failed` is only ever assigned at ingestion (signature rejection); the
/// worker never reads or writes rows in that state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventStatus {
    Received,
    Processing,
    Processed,
    Failed,
    DeadLettered,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Processing => "processing",
            Self::Processed => "processed",
            Self::Failed => "failed",
            Self::DeadLettered => "dead_lettered",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Processed | Self::Failed | Self::DeadLettered)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown event status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for EventStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(Self::Received),
            "processing" => Ok(Self::Processing),
            "processed" => Ok(Self::Processed),
            "failed" => Ok(Self::Failed),
            "dead_lettered" => Ok(Self::DeadLettered),
            other => Err(UnknownStatus(other.to_owned())),
        }
    }
}

/// A webhook delivery and its processing state.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingEvent {
    pub id: Uuid,
    pub provider: String,
    pub provider_event_id: String,
    pub event_type: String,
    pub received_at: DateTime<Utc>,
    /// Exact request body as received.
    pub payload: Vec<u8>,
    pub status: EventStatus,
    /// Number of processing attempts that ended in failure.
    pub attempts: i32,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub locked_until: Option<DateTime<Utc>>,
    pub lock_id: Option<String>,
}

impl IncomingEvent {
    /// Build a freshly ingested event. `rejection` is the verification failure
    /// reason, if any; it decides between `Received` and `Failed`.
    pub fn ingested(
        provider: &str,
        provider_event_id: Option<&str>,
        event_type: Option<&str>,
        payload: Vec<u8>,
        received_at: DateTime<Utc>,
        rejection: Option<String>,
    ) -> Self {
        let status = if rejection.is_some() {
            EventStatus::Failed
        } else {
            EventStatus::Received
        };
        Self {
            id: Uuid::now_v7(),
            provider: provider.to_ascii_lowercase(),
            provider_event_id: or_unknown(provider_event_id),
            event_type: or_unknown(event_type),
            received_at,
            payload,
            status,
            attempts: 0,
            last_error: rejection,
            last_attempt_at: None,
            next_attempt_at: None,
            processed_at: None,
            locked_until: None,
            lock_id: None,
        }
    }

    /// Whether a worker may claim this row at `now`.
    ///
    /// Besides due `Received` rows, a `Processing` row whose lease has lapsed is
    /// claimable again: its previous holder is presumed dead.
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        let lease_free = self.locked_until.is_none_or(|until| until <= now);
        match self.status {
            EventStatus::Received => {
                lease_free && self.next_attempt_at.is_none_or(|at| at <= now)
            }
            EventStatus::Processing => self.locked_until.is_some_and(|until| until <= now),
            _ => false,
        }
    }

    /// Whether `lock_id` still owns the processing lease on this row.
    pub fn is_leased_to(&self, lock_id: &str) -> bool {
        self.status == EventStatus::Processing && self.lock_id.as_deref() == Some(lock_id)
    }

    /// Stamp the lease described by `claim` onto this row.
    pub fn apply_claim(&mut self, claim: &LeaseClaim) {
        self.status = EventStatus::Processing;
        self.locked_until = Some(claim.lease_until);
        self.lock_id = Some(claim.lock_id.clone());
    }

    /// Apply the outcome of a processing attempt and release the lease.
    pub fn apply_settlement(&mut self, settlement: &Settlement) {
        self.last_attempt_at = Some(settlement.attempted_at());
        self.locked_until = None;
        self.lock_id = None;
        match settlement {
            Settlement::Processed { processed_at, .. } => {
                self.status = EventStatus::Processed;
                self.processed_at = Some(*processed_at);
                self.last_error = None;
                self.next_attempt_at = None;
            }
            Settlement::Retry {
                attempts,
                error,
                next_attempt_at,
                ..
            } => {
                self.status = EventStatus::Received;
                self.attempts = *attempts;
                self.last_error = Some(error.clone());
                self.next_attempt_at = Some(*next_attempt_at);
            }
            Settlement::DeadLettered {
                attempts, error, ..
            } => {
                self.status = EventStatus::DeadLettered;
                self.attempts = *attempts;
                self.last_error = Some(error.clone());
                self.next_attempt_at = None;
            }
        }
    }
}

fn or_unknown(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.to_owned(),
        _ => UNKNOWN.to_owned(),
    }
}

/// Result of an idempotent insert. Both variants are a successful accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

/// One scheduler pass's request to lease a batch of claimable rows.
#[derive(Debug, Clone)]
pub struct LeaseClaim {
    pub now: DateTime<Utc>,
    pub lease_until: DateTime<Utc>,
    /// Token shared by every row claimed in this pass.
    pub lock_id: String,
    pub limit: u64,
}

/// Terminal update for one processing attempt, applied only while the lease is held.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Processed {
        attempted_at: DateTime<Utc>,
        processed_at: DateTime<Utc>,
    },
    Retry {
        attempted_at: DateTime<Utc>,
        attempts: i32,
        error: String,
        next_attempt_at: DateTime<Utc>,
    },
    DeadLettered {
        attempted_at: DateTime<Utc>,
        attempts: i32,
        error: String,
    },
}

impl Settlement {
    pub fn attempted_at(&self) -> DateTime<Utc> {
        match self {
            Self::Processed { attempted_at, .. }
            | Self::Retry { attempted_at, .. }
            | Self::DeadLettered { attempted_at, .. } => *attempted_at,
        }
    }

    /// Status the row ends up in.
    pub fn status(&self) -> EventStatus {
        match self {
            Self::Processed { .. } => EventStatus::Processed,
            Self::Retry { .. } => EventStatus::Received,
            Self::DeadLettered { .. } => EventStatus::DeadLettered,
        }
    }
}
