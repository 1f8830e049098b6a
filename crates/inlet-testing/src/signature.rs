//! Signs payloads the way a `t=..,v1=..` webhook provider would.
//!
//! Kept independent of the service's verifier so tests check it against a
//! second implementation rather than against itself.

use hmac::{Hmac, Mac};
use http::{HeaderMap, HeaderName, HeaderValue};
use sha2::Sha256;

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

pub struct StripeSigner {
    pub secret: String,
}

impl StripeSigner {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Lowercase hex HMAC-SHA256 of `"{timestamp}.{payload}"`.
    pub fn sign(&self, timestamp: i64, payload: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.as_bytes()).unwrap();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    pub fn header_value(&self, timestamp: i64, payload: &[u8]) -> String {
        format!("t={timestamp},v1={}", self.sign(timestamp, payload))
    }

    /// Headers carrying a valid signature, as sent by the provider.
    pub fn headers(&self, timestamp: i64, payload: &[u8]) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(
            HeaderName::from_static(STRIPE_SIGNATURE_HEADER),
            HeaderValue::from_str(&self.header_value(timestamp, payload)).unwrap(),
        );
        map
    }
}

/// Headers with an arbitrary, possibly malformed, signature header value.
pub fn raw_signature_headers(value: &str) -> HeaderMap {
    let mut map = HeaderMap::new();
    map.insert(
        HeaderName::from_static(STRIPE_SIGNATURE_HEADER),
        HeaderValue::from_str(value).unwrap(),
    );
    map
}
