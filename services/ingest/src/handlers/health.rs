use axum::{extract::State, http::StatusCode};

use inlet_core::health::readiness;

use crate::domain::repository::EventStore;
use crate::state::AppState;

// ── GET /readyz ──────────────────────────────────────────────────────────────

pub async fn readyz<S: EventStore>(State(state): State<AppState<S>>) -> StatusCode {
    readiness(state.store.ping().await)
}
