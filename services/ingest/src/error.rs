use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Ingest service error variants.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("empty body")]
    EmptyPayload,
    #[error("invalid provider")]
    InvalidProvider,
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    #[error("provider {0} is not configured")]
    ProviderMisconfigured(String),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl IngestError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyPayload => "EMPTY_PAYLOAD",
            Self::InvalidProvider => "INVALID_PROVIDER",
            Self::InvalidSignature(_) => "INVALID_SIGNATURE",
            Self::ProviderMisconfigured(_) => "PROVIDER_MISCONFIGURED",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::EmptyPayload | Self::InvalidProvider | Self::InvalidSignature(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::ProviderMisconfigured(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        // TraceLayer already records method/uri/status. Misconfiguration is logged
        // once at ingestion; internal errors need the anyhow chain here.
        if let Self::Internal(ref e) = self {
            tracing::error!(error = %format!("{e:#}"), kind = "INTERNAL", "internal error");
        }
        let body = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}
