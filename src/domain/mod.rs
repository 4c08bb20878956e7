//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, envelopes, errors)
//! - `event_log` - Batches and staged events of the transactional outbox
//! - `projection` - First-level projection entities and their creation events
//! - `command` - Command process state machine

pub mod command;
pub mod event_log;
pub mod foundation;
pub mod projection;
