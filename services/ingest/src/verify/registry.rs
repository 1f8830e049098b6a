use std::collections::HashMap;
use std::sync::Arc;

use axum::http::HeaderMap;
use inlet_core::clock::Clock;

use super::{EventFields, ProviderVerifier, VerificationError, VerificationResult};

/// Static mapping from provider name (case-insensitive) to its verifier.
pub struct VerifierRegistry {
    verifiers: HashMap<String, Box<dyn ProviderVerifier>>,
    clock: Arc<dyn Clock>,
}

impl VerifierRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            verifiers: HashMap::new(),
            clock,
        }
    }

    /// Register `verifier` under its provider name, replacing any previous one.
    pub fn with<V: ProviderVerifier + 'static>(mut self, verifier: V) -> Self {
        self.verifiers
            .insert(verifier.provider().to_ascii_lowercase(), Box::new(verifier));
        self
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.verifiers.keys().map(String::as_str)
    }

    /// Verify `payload` for `provider`. Unknown providers are rejected without
    /// any cryptographic work or field extraction.
    pub fn verify(&self, provider: &str, headers: &HeaderMap, payload: &[u8]) -> VerificationResult {
        match self.verifiers.get(&provider.to_ascii_lowercase()) {
            Some(verifier) => verifier.verify(headers, payload, self.clock.now()),
            None => VerificationResult::rejected(
                VerificationError::UnknownProvider,
                EventFields::default(),
            ),
        }
    }
}
