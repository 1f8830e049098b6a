use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use inlet_core::clock::Clock;
use inlet_core::config::Config;

use crate::verify::registry::VerifierRegistry;
use crate::verify::timestamped::{DEFAULT_TOLERANCE_SECS, TimestampedHmacVerifier};
use crate::worker::scheduler::SchedulerConfig;

/// Ingest service configuration loaded from environment variables.
#[derive(Clone, Deserialize)]
pub struct IngestConfig {
    /// PostgreSQL connection URL. Env var: `DATABASE_URL`.
    pub database_url: String,
    /// TCP port for the HTTP server (default 3120). Env var: `INGEST_PORT`.
    #[serde(default = "default_ingest_port")]
    pub ingest_port: u16,
    /// Stripe endpoint secret. Absent or empty rejects every Stripe delivery
    /// as misconfigured instead of failing startup.
    #[serde(default)]
    pub stripe_signing_secret: Option<String>,
    #[serde(default = "default_tolerance_secs")]
    pub stripe_tolerance_secs: u64,
    /// Run a scheduler inside the HTTP binary (default true).
    #[serde(default = "default_worker_enabled")]
    pub worker_enabled: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub worker_poll_interval_ms: u64,
    #[serde(default = "default_batch_size")]
    pub worker_batch_size: u64,
    #[serde(default = "default_lease_secs")]
    pub worker_lease_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub worker_max_attempts: i32,
}

impl Config for IngestConfig {}

fn default_ingest_port() -> u16 {
    3120
}

fn default_tolerance_secs() -> u64 {
    DEFAULT_TOLERANCE_SECS
}

fn default_worker_enabled() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_batch_size() -> u64 {
    20
}

fn default_lease_secs() -> u64 {
    30
}

fn default_max_attempts() -> i32 {
    5
}

/// A setting that parsed but cannot be run with.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("{var} must be greater than zero")]
pub struct InvalidConfig {
    pub var: &'static str,
}

impl IngestConfig {
    /// Worker settings must be positive; a zero poll interval busy-spins and a
    /// zero lease times out every handler.
    pub fn validate(self) -> Result<Self, InvalidConfig> {
        let checks = [
            ("WORKER_POLL_INTERVAL_MS", self.worker_poll_interval_ms > 0),
            ("WORKER_BATCH_SIZE", self.worker_batch_size > 0),
            ("WORKER_LEASE_SECS", self.worker_lease_secs > 0),
            ("WORKER_MAX_ATTEMPTS", self.worker_max_attempts > 0),
        ];
        match checks.into_iter().find(|(_, ok)| !ok) {
            Some((var, _)) => Err(InvalidConfig { var }),
            None => Ok(self),
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: Duration::from_millis(self.worker_poll_interval_ms),
            batch_size: self.worker_batch_size,
            lease_duration: Duration::from_secs(self.worker_lease_secs),
            max_attempts: self.worker_max_attempts,
        }
    }

    /// The closed set of providers this service accepts.
    pub fn verifier_registry(&self, clock: Arc<dyn Clock>) -> VerifierRegistry {
        VerifierRegistry::new(clock).with(TimestampedHmacVerifier::stripe(
            self.stripe_signing_secret.clone(),
            self.stripe_tolerance_secs,
        ))
    }
}

impl fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestConfig")
            .field("database_url", &"<redacted>")
            .field("ingest_port", &self.ingest_port)
            .field(
                "stripe_signing_secret",
                &self.stripe_signing_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("stripe_tolerance_secs", &self.stripe_tolerance_secs)
            .field("worker_enabled", &self.worker_enabled)
            .field("worker_poll_interval_ms", &self.worker_poll_interval_ms)
            .field("worker_batch_size", &self.worker_batch_size)
            .field("worker_lease_secs", &self.worker_lease_secs)
            .field("worker_max_attempts", &self.worker_max_attempts)
            .finish()
    }
}
