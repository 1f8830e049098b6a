//! sea-orm entities for the ingest service.

pub mod incoming_events;
