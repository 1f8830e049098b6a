use std::sync::Arc;

use axum::http::HeaderMap;
use bytes::Bytes;
use inlet_core::clock::Clock;
use tracing::{debug, info, warn};

use crate::domain::repository::EventStore;
use crate::domain::types::{IncomingEvent, InsertOutcome, MAX_PROVIDER_LEN};
use crate::error::IngestError;
use crate::verify::VerificationError;
use crate::verify::registry::VerifierRegistry;

pub struct IngestWebhookInput {
    pub provider: String,
    pub headers: HeaderMap,
    pub payload: Bytes,
}

/// Successful acknowledgement. Duplicates are reported for logging only; the
/// caller answers both the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted {
    pub outcome: InsertOutcome,
}

pub struct IngestWebhookUseCase<'a, S: EventStore> {
    pub store: &'a S,
    pub verifiers: &'a VerifierRegistry,
    pub clock: Arc<dyn Clock>,
}

impl<S: EventStore> IngestWebhookUseCase<'_, S> {
    pub async fn execute(&self, input: IngestWebhookInput) -> Result<Accepted, IngestError> {
        // 1. Reject malformed requests before touching the store
        let provider = input.provider.trim();
        if provider.is_empty() || provider.len() > MAX_PROVIDER_LEN {
            return Err(IngestError::InvalidProvider);
        }
        if input.payload.iter().all(u8::is_ascii_whitespace) {
            return Err(IngestError::EmptyPayload);
        }

        // 2. Verify against the provider's signature scheme
        let verification = self
            .verifiers
            .verify(provider, &input.headers, &input.payload);

        // 3. Record the delivery whatever the verdict, deduped on the provider id
        let event = IncomingEvent::ingested(
            provider,
            verification.provider_event_id.as_deref(),
            verification.event_type.as_deref(),
            input.payload.to_vec(),
            self.clock.now(),
            verification.error.as_ref().map(ToString::to_string),
        );
        let outcome = self.store.insert_if_absent(&event).await?;
        if outcome == InsertOutcome::Duplicate {
            debug!(
                provider = %event.provider,
                provider_event_id = %event.provider_event_id,
                "duplicate delivery ignored"
            );
        }

        // 4. Map the verdict to the acknowledgement
        match verification.error {
            None => {
                debug!(
                    event_id = %event.id,
                    provider = %event.provider,
                    provider_event_id = %event.provider_event_id,
                    event_type = %event.event_type,
                    "webhook accepted"
                );
                Ok(Accepted { outcome })
            }
            Some(VerificationError::SecretNotConfigured) => {
                warn!(provider = %event.provider, "signing secret not configured");
                Err(IngestError::ProviderMisconfigured(event.provider))
            }
            Some(reason) => {
                info!(
                    provider = %event.provider,
                    provider_event_id = %event.provider_event_id,
                    reason = %reason,
                    "webhook rejected"
                );
                Err(IngestError::InvalidSignature(reason.to_string()))
            }
        }
    }
}
