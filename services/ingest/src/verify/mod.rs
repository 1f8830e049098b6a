//! Webhook signature verification.
//!
//! A [`ProviderVerifier`] authenticates a raw body against provider headers and
//! never fails: every rejection is a [`VerificationError`] inside the returned
//! [`VerificationResult`]. [`registry::VerifierRegistry`] routes by provider name.

pub mod registry;
pub mod timestamped;

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};

/// Why a delivery was rejected. The `Display` text is what gets stored in
/// `last_error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("unknown provider")]
    UnknownProvider,
    #[error("signing secret not configured")]
    SecretNotConfigured,
    #[error("missing signature header")]
    MissingSignatureHeader,
    #[error("invalid signature timestamp")]
    InvalidTimestamp,
    #[error("missing signature timestamp")]
    MissingTimestamp,
    #[error("missing v1 signature")]
    MissingV1Signature,
    #[error("timestamp outside tolerance")]
    TimestampOutsideTolerance,
    #[error("signature mismatch")]
    SignatureMismatch,
}

/// Provider-assigned identifiers pulled from the payload, when present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFields {
    pub id: Option<String>,
    pub event_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub valid: bool,
    pub provider_event_id: Option<String>,
    pub event_type: Option<String>,
    pub error: Option<VerificationError>,
}

impl VerificationResult {
    pub fn accepted(fields: EventFields) -> Self {
        Self {
            valid: true,
            provider_event_id: fields.id,
            event_type: fields.event_type,
            error: None,
        }
    }

    pub fn rejected(error: VerificationError, fields: EventFields) -> Self {
        Self {
            valid: false,
            provider_event_id: fields.id,
            event_type: fields.event_type,
            error: Some(error),
        }
    }
}

/// Authenticates deliveries for one provider.
pub trait ProviderVerifier: Send + Sync {
    /// Lower-case provider name used as the registry key.
    fn provider(&self) -> &str;

    fn verify(&self, headers: &HeaderMap, payload: &[u8], now: DateTime<Utc>)
    -> VerificationResult;
}

/// Best-effort extraction of top-level string `id` and `type` fields.
///
/// Anything that is not a JSON object, or fields that are not strings, yield
/// `None` for the affected field. Never fails.
pub fn extract_event_fields(payload: &[u8]) -> EventFields {
    let Ok(serde_json::Value::Object(root)) = serde_json::from_slice(payload) else {
        return EventFields::default();
    };
    let field = |name: &str| root.get(name).and_then(|v| v.as_str()).map(str::to_owned);
    EventFields {
        id: field("id"),
        event_type: field("type"),
    }
}
