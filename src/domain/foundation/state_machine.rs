//! State machine trait for status enums.
//!
//! Gives batch and event statuses one way of validating transitions.

use super::ValidationError;

/// Trait for status enums that represent state machines.
///
/// Implementors define valid transitions and get validated
/// transition methods for free.
///
/// ```ignore
/// let next = BatchStatus::Initialized.transition_to(BatchStatus::Committed)?;
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "state_transition",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
        }
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }

    /// Applies a sequence of transitions, stopping at the first invalid step.
    fn walk(&self, path: &[Self]) -> Result<Self, ValidationError> {
        path.iter()
            .try_fold(*self, |current, next| current.transition_to(*next))
    }
}
