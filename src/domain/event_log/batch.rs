//! Event batches and their lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{BatchId, StateMachine, Timestamp, ValidationError};

/// Lifecycle status of an event batch.
///
/// ```text
/// Initialized -> Committed -> Processing -> Executed
///      \             \
///       +-> Aborted   +-> Aborted
///       +-> Error     +-> Error
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    #[default]
    Initialized,
    Committed,
    Processing,
    Executed,
    Aborted,
    Error,
}

impl BatchStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [BatchStatus; 6] = [
        BatchStatus::Initialized,
        BatchStatus::Committed,
        BatchStatus::Processing,
        BatchStatus::Executed,
        BatchStatus::Aborted,
        BatchStatus::Error,
    ];

    /// Returns true while events may still be appended.
    pub fn accepts_events(&self) -> bool {
        matches!(self, BatchStatus::Initialized)
    }

    /// Returns true if the batch may be handed to the outbox.
    pub fn is_executable(&self) -> bool {
        matches!(self, BatchStatus::Initialized | BatchStatus::Committed)
    }

    /// Returns true if the outbox should pick the batch up.
    pub fn is_pending_drain(&self) -> bool {
        matches!(self, BatchStatus::Committed | BatchStatus::Processing)
    }

    /// Position in the forward lifecycle. Used to assert monotonicity.
    pub fn rank(&self) -> u8 {
        match self {
            BatchStatus::Initialized => 0,
            BatchStatus::Committed => 1,
            BatchStatus::Processing => 2,
            BatchStatus::Executed | BatchStatus::Aborted | BatchStatus::Error => 3,
        }
    }

    /// Stable storage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Initialized => "initialized",
            BatchStatus::Committed => "committed",
            BatchStatus::Processing => "processing",
            BatchStatus::Executed => "executed",
            BatchStatus::Aborted => "aborted",
            BatchStatus::Error => "error",
        }
    }

    /// Parses a storage name.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        BatchStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ValidationError::invalid_format("batch_status", s))
    }
}

impl StateMachine for BatchStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use BatchStatus::*;
        matches!(
            (self, target),
            (Initialized, Committed)
                | (Initialized, Aborted)
                | (Initialized, Error)
                | (Committed, Processing)
                | (Committed, Aborted)
                | (Committed, Error)
                | (Processing, Executed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use BatchStatus::*;
        match self {
            Initialized => vec![Committed, Aborted, Error],
            Committed => vec![Processing, Aborted, Error],
            Processing => vec![Executed],
            Executed | Aborted | Error => vec![],
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BatchStatus::Initialized => "Initialized",
            BatchStatus::Committed => "Committed",
            BatchStatus::Processing => "Processing",
            BatchStatus::Executed => "Executed",
            BatchStatus::Aborted => "Aborted",
            BatchStatus::Error => "Error",
        };
        write!(f, "{}", s)
    }
}

/// A group of domain events staged together for the event store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBatch {
    pub id: BatchId,
    pub status: BatchStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl EventBatch {
    /// Creates a new, empty batch in `Initialized`.
    pub fn new() -> Self {
        let now = Timestamp::now();
        Self {
            id: BatchId::new(),
            status: BatchStatus::Initialized,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves the batch to `target`, refreshing `updated_at`.
    pub fn transition_to(&mut self, target: BatchStatus) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(target)?;
        self.updated_at = Timestamp::now();
        Ok(())
    }
}

impl Default for EventBatch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn new_batch_is_initialized() {
        let batch = EventBatch::new();
        assert_eq!(batch.status, BatchStatus::Initialized);
        assert!(!batch.id.is_nil());
    }

    #[test]
    fn happy_path_reaches_executed() {
        let mut batch = EventBatch::new();
        batch.transition_to(BatchStatus::Committed).unwrap();
        batch.transition_to(BatchStatus::Processing).unwrap();
        batch.transition_to(BatchStatus::Executed).unwrap();
        assert_eq!(batch.status, BatchStatus::Executed);
    }

    #[test]
    fn executed_batch_cannot_be_committed_again() {
        let mut batch = EventBatch::new();
        batch.status = BatchStatus::Executed;
        assert!(batch.transition_to(BatchStatus::Committed).is_err());
        assert_eq!(batch.status, BatchStatus::Executed);
    }

    #[test]
    fn processing_batch_cannot_be_aborted() {
        assert!(!BatchStatus::Processing.can_transition_to(&BatchStatus::Aborted));
    }

    #[test]
    fn only_initialized_and_committed_are_executable() {
        let executable: Vec<_> = BatchStatus::ALL
            .into_iter()
            .filter(BatchStatus::is_executable)
            .collect();
        assert_eq!(
            executable,
            vec![BatchStatus::Initialized, BatchStatus::Committed]
        );
    }

    #[test]
    fn storage_names_round_trip() {
        for status in BatchStatus::ALL {
            assert_eq!(BatchStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(BatchStatus::parse("pending").is_err());
    }

    #[test]
    fn serializes_to_snake_case_json() {
        assert_eq!(
            serde_json::to_string(&BatchStatus::Processing).unwrap(),
            "\"processing\""
        );
    }

    fn any_status() -> impl Strategy<Value = BatchStatus> {
        prop::sample::select(BatchStatus::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn accepted_transitions_never_move_backwards(
            path in prop::collection::vec(any_status(), 0..12)
        ) {
            let mut batch = EventBatch::new();
            for target in path {
                let before = batch.status;
                if batch.transition_to(target).is_ok() {
                    prop_assert!(batch.status.rank() > before.rank());
                } else {
                    prop_assert_eq!(batch.status, before);
                }
            }
        }

        #[test]
        fn terminal_states_accept_nothing(target in any_status()) {
            for terminal in [BatchStatus::Executed, BatchStatus::Aborted, BatchStatus::Error] {
                prop_assert!(!terminal.can_transition_to(&target));
            }
        }
    }
}
