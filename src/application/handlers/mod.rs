//! First-level projection handlers.
//!
//! Each handler turns a creation event into a projected entity plus the
//! events announcing it, staged in one saga batch. The steps run under the
//! creation lock of the entity's uniqueness key:
//!
//! 1. open a projection transaction and check for an existing entity
//! 2. stage the announcement events in a new batch
//! 3. persist the entity and its tags
//! 4. commit the transaction, then execute the batch
//!
//! Any failure before the commit aborts both the transaction and the batch.
//! After the commit the batch is only executed, with a few retries; if that
//! keeps failing the handler returns `Unpublished` carrying the batch id.

mod function_created;
mod profile_created;
mod support;

pub use function_created::FunctionCreatedHandler;
pub use profile_created::ProfileCreatedHandler;
pub use support::ProjectionError;
