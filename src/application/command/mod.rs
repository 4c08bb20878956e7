//! Command process runner.
//!
//! - `CommandProcessor` - owns process state and runs transition effects
//! - `CommandHandle` - cloneable sender for submissions and external verdicts
//! - `CompositeValidator` - domain validation merged with the event store check

mod processor;
mod validation;

pub use processor::{CommandHandle, CommandPorts, CommandProcessor};
pub use validation::CompositeValidator;
