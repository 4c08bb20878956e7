//! Command process adapters.

mod in_memory;

pub use in_memory::{InMemoryResponseCollector, RecordingValidationTrigger, ValidationRequest};
