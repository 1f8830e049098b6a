use std::sync::Arc;

use inlet_core::clock::Clock;

use crate::verify::registry::VerifierRegistry;

/// Shared application state passed to every handler via axum `State`.
///
/// Generic over the event store so the router can be mounted on any
/// [`EventStore`](crate::domain::repository::EventStore) implementation.
#[derive(Clone)]
pub struct AppState<S> {
    pub store: S,
    pub verifiers: Arc<VerifierRegistry>,
    pub clock: Arc<dyn Clock>,
}
