use chrono::{DateTime, Utc};

/// Source of the current time.
///
/// Components that compare against "now" (signature freshness, lease expiry,
/// retry backoff) take an `Arc<dyn Clock>` so tests can drive time explicitly.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock backed by `Utc::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
