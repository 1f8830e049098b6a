//! Test utilities for Inlet services.
//!
//! Provides a controllable clock, a webhook signer and a raw payload fixture loader.
//! Import in tests only; never in production code.

pub mod clock;
pub mod fixture;
pub mod signature;
