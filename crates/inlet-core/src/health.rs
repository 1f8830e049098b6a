use std::fmt::Debug;

use axum::http::StatusCode;

/// Handler for `GET /healthz`. Liveness only; never touches dependencies.
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Map the outcome of a readiness probe (e.g. a database ping) to a status code.
///
/// Failures are logged at `warn` with their debug form, which keeps the full
/// error chain; the probe caller only sees 503.
pub fn readiness<E: Debug>(probe: Result<(), E>) -> StatusCode {
    match probe {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = ?e, "readiness probe failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
