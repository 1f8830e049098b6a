//! Timestamped HMAC-SHA256 signatures (`t=<unix>,v1=<hex>[,v1=<hex>...]`).
//!
//! The signed message is `"{t}.{raw body}"`. Several `v1` entries may be present
//! while a provider rotates secrets; any match is accepted. Stripe uses this
//! scheme under the `Stripe-Signature` header.

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::{ProviderVerifier, VerificationError, VerificationResult, extract_event_fields};

type HmacSha256 = Hmac<Sha256>;

pub const STRIPE_PROVIDER: &str = "stripe";
pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";
pub const DEFAULT_TOLERANCE_SECS: u64 = 300;

/// Parsed form of a `t=..,v1=..` signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub v1: Vec<String>,
}

/// Parse a signature header. Unknown keys and entries without a `key=value`
/// shape are skipped.
pub fn parse_signature_header(header: &str) -> Result<SignatureHeader, VerificationError> {
    let mut timestamp = None;
    let mut v1 = Vec::new();

    for part in header.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        if key.is_empty() || value.is_empty() {
            continue;
        }
        match key {
            "t" => {
                let parsed = value
                    .parse::<i64>()
                    .map_err(|_| VerificationError::InvalidTimestamp)?;
                timestamp = Some(parsed);
            }
            "v1" if !value.trim().is_empty() => v1.push(value.trim().to_owned()),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(VerificationError::MissingTimestamp)?;
    if v1.is_empty() {
        return Err(VerificationError::MissingV1Signature);
    }
    Ok(SignatureHeader { timestamp, v1 })
}

/// Verifier for one provider using the timestamped HMAC scheme.
#[derive(Clone)]
pub struct TimestampedHmacVerifier {
    provider: String,
    header: String,
    signing_secret: Option<String>,
    tolerance_secs: u64,
}

impl std::fmt::Debug for TimestampedHmacVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimestampedHmacVerifier")
            .field("provider", &self.provider)
            .field("header", &self.header)
            .field("secret_configured", &self.secret().is_some())
            .field("tolerance_secs", &self.tolerance_secs)
            .finish()
    }
}

impl TimestampedHmacVerifier {
    pub fn new(
        provider: &str,
        header: &str,
        signing_secret: Option<String>,
        tolerance_secs: u64,
    ) -> Self {
        Self {
            provider: provider.to_ascii_lowercase(),
            header: header.to_ascii_lowercase(),
            signing_secret,
            tolerance_secs,
        }
    }

    pub fn stripe(signing_secret: Option<String>, tolerance_secs: u64) -> Self {
        Self::new(
            STRIPE_PROVIDER,
            STRIPE_SIGNATURE_HEADER,
            signing_secret,
            tolerance_secs,
        )
    }

    /// The configured secret, treating an empty string as unset.
    fn secret(&self) -> Option<&str> {
        self.signing_secret.as_deref().filter(|s| !s.is_empty())
    }

    fn check(
        &self,
        headers: &HeaderMap,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), VerificationError> {
        // Checked first so a misconfiguration is visible regardless of the request.
        let secret = self.secret().ok_or(VerificationError::SecretNotConfigured)?;

        let header = headers
            .get(self.header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(VerificationError::MissingSignatureHeader)?;

        let parsed = parse_signature_header(header)?;

        if now.timestamp().abs_diff(parsed.timestamp) > self.tolerance_secs {
            return Err(VerificationError::TimestampOutsideTolerance);
        }

        let mac = signed_payload_mac(secret.as_bytes(), parsed.timestamp, payload)
            .ok_or(VerificationError::SignatureMismatch)?;

        let matched = parsed.v1.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
                .unwrap_or(false)
        });
        if matched {
            Ok(())
        } else {
            Err(VerificationError::SignatureMismatch)
        }
    }
}

impl ProviderVerifier for TimestampedHmacVerifier {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn verify(
        &self,
        headers: &HeaderMap,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> VerificationResult {
        let fields = extract_event_fields(payload);
        match self.check(headers, payload, now) {
            Ok(()) => VerificationResult::accepted(fields),
            Err(error) => VerificationResult::rejected(error, fields),
        }
    }
}

/// HMAC over `"{timestamp}.{payload}"`, ready to finalize or verify.
fn signed_payload_mac(secret: &[u8], timestamp: i64, payload: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Some(mac)
}

/// Lower-case hex signature for `payload` at `timestamp`.
pub fn compute_signature(secret: &[u8], timestamp: i64, payload: &[u8]) -> Option<String> {
    signed_payload_mac(secret, timestamp, payload)
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
}
