use axum::{
    Router,
    body::Body,
    http::Request,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use inlet_core::health::healthz;
use inlet_core::middleware::{X_REQUEST_ID, propagate_request_id_layer, request_id_layer};

use crate::domain::repository::EventStore;
use crate::handlers::{health::readyz, webhook::ingest_webhook};
use crate::state::AppState;

pub fn build_router<S>(state: AppState<S>) -> Router
where
    S: EventStore + Clone + 'static,
{
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz::<S>))
        // Webhooks
        .route("/webhooks/{provider}", post(ingest_webhook::<S>))
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            let request_id = request
                .headers()
                .get(X_REQUEST_ID)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "http",
                method = %request.method(),
                uri = %request.uri(),
                request_id,
            )
        }))
        .layer(request_id_layer())
        .with_state(state)
}
