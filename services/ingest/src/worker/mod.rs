//! Lease-based background processing of received events.

pub mod backoff;
pub mod handler;
pub mod scheduler;
