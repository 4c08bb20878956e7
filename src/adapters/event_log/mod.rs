//! Event log adapters.
//!
//! - `InMemoryEventLog` - process-local log for tests and local runs
//! - `PostgresEventLog` - relational log backed by `event_batches` / `event_log`

mod in_memory;
mod postgres;

pub use in_memory::InMemoryEventLog;
pub use postgres::PostgresEventLog;
