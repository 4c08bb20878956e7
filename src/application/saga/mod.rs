//! Saga - batch lifecycle shared by every write path.

mod service;

pub use service::{SagaError, SagaService};
