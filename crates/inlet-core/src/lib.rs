//! Shared plumbing for Inlet services: configuration, tracing, health, request ids
//! and the wall-clock abstraction.

pub mod clock;
pub mod config;
pub mod health;
pub mod middleware;
pub mod tracing;
