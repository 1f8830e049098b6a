use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use bytes::Bytes;

use crate::domain::repository::EventStore;
use crate::error::IngestError;
use crate::state::AppState;
use crate::usecase::ingest::{IngestWebhookInput, IngestWebhookUseCase};

// ── POST /webhooks/{provider} ────────────────────────────────────────────────

/// The body is taken as raw `Bytes`: signatures cover the exact bytes sent.
pub async fn ingest_webhook<S: EventStore>(
    State(state): State<AppState<S>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, IngestError> {
    IngestWebhookUseCase {
        store: &state.store,
        verifiers: &state.verifiers,
        clock: state.clock.clone(),
    }
    .execute(IngestWebhookInput {
        provider,
        headers,
        payload: body,
    })
    .await?;
    Ok(StatusCode::OK)
}
