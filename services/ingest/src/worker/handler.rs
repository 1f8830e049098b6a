use tracing::info;

use crate::domain::repository::EventHandler;
use crate::domain::types::IncomingEvent;

/// Default processing: record the event and succeed. Downstream business
/// effects are wired in by replacing this handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventHandler;

impl EventHandler for TracingEventHandler {
    async fn handle(&self, event: &IncomingEvent) -> anyhow::Result<()> {
        info!(
            event_id = %event.id,
            provider = %event.provider,
            provider_event_id = %event.provider_event_id,
            event_type = %event.event_type,
            attempts = event.attempts,
            payload_bytes = event.payload.len(),
            "event processed"
        );
        Ok(())
    }
}
