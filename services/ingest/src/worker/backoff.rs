use chrono::Duration;

/// Delay before the next attempt, keyed by the failure count after increment.
///
/// A fixed step table clamped at five minutes: `1 -> 5s`, `2 -> 15s`,
/// `3 -> 60s`, `4+ -> 300s`.
pub fn backoff(attempts: i32) -> Duration {
    match attempts {
        ..=1 => Duration::seconds(5),
        2 => Duration::seconds(15),
        3 => Duration::seconds(60),
        _ => Duration::seconds(300),
    }
}
