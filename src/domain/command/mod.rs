//! Command process - the saga that turns a submitted command into published events.

mod messages;
mod process;

pub use messages::{
    CommandEffect, CommandProcessEvent, CommandProcessMessage, SubmitCommand, ValidationFailure,
    ValidationOutcome,
};
pub use process::{CommandProcessState, ProcessError, ProcessSettings, Transition};
