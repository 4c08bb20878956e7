//! Event store adapters.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
