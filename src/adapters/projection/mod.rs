//! First-level projection adapters.

mod in_memory;

pub use in_memory::InMemoryProjectionRepository;
