//! UserProfileService core - outbox, sagas and first-level projection.
//!
//! Domain events are staged in batches in a relational event log and
//! forwarded to the event store by the outbox processor. Submitted
//! commands run through a small state machine that modifies, validates
//! and publishes them. The first-level projection creates functions and
//! profiles under per-key creation locks so concurrent duplicates are
//! rejected.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
