//! The command process state machine.
//!
//! A pure function from `(state, event)` to `(state, effects)`. Nothing here
//! touches I/O; `application::command::CommandProcessor` executes the effects
//! and feeds their results back in as new events.
//!
//! ```text
//! Initial --submitted--> Submitted --modified--> Validating ----------------+
//!                                       |                                  |
//!                                       +--> AwaitingExternalValidation ---+--> Publishing --published--> Succeeded
//!                                                                          |
//!                                        (invalid outcome or fault) -------+--> Failed
//! ```

use std::collections::HashSet;
use thiserror::Error;

use super::messages::{
    CommandEffect, CommandProcessEvent, SubmitCommand, ValidationFailure, ValidationOutcome,
};
use crate::domain::event_log::EventTuple;
use crate::domain::foundation::{BatchId, CommandIdentifier, ErrorCode, ProcessId};

/// Errors raised by the command process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    #[error("Event '{event}' is not valid in state '{state}'")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },

    #[error("Process already finished in state '{state}'")]
    AlreadyCompleted { state: &'static str },

    #[error("Unknown command process: {0}")]
    UnknownProcess(ProcessId),

    #[error("Command channel closed")]
    ChannelClosed,
}

impl ProcessError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ProcessError::InvalidTransition { .. } | ProcessError::AlreadyCompleted { .. } => {
                ErrorCode::InvalidStateTransition
            }
            ProcessError::UnknownProcess(_) => ErrorCode::ProcessNotFound,
            ProcessError::ChannelClosed => ErrorCode::InternalError,
        }
    }
}

/// Routing knobs of the state machine.
#[derive(Debug, Clone, Default)]
pub struct ProcessSettings {
    external_validation: HashSet<String>,
}

impl ProcessSettings {
    pub fn new(external_validation: impl IntoIterator<Item = String>) -> Self {
        Self {
            external_validation: external_validation.into_iter().collect(),
        }
    }

    /// Commands listed here are validated by an external party.
    pub fn requires_external_validation(&self, command: &str) -> bool {
        self.external_validation.contains(command)
    }
}

/// State of one command process.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CommandProcessState {
    #[default]
    Initial,
    Submitted {
        command: SubmitCommand,
    },
    Validating {
        command: SubmitCommand,
        events: Vec<EventTuple>,
    },
    AwaitingExternalValidation {
        command: SubmitCommand,
        events: Vec<EventTuple>,
    },
    Publishing {
        command: SubmitCommand,
    },
    Succeeded {
        identifier: CommandIdentifier,
        batch_id: BatchId,
    },
    Failed {
        identifier: CommandIdentifier,
        failures: Vec<ValidationFailure>,
    },
}

/// The outcome of applying one event.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: CommandProcessState,
    pub effects: Vec<CommandEffect>,
}

impl Transition {
    fn to(state: CommandProcessState, effects: Vec<CommandEffect>) -> Self {
        Self { state, effects }
    }
}

impl CommandProcessState {
    pub fn name(&self) -> &'static str {
        match self {
            CommandProcessState::Initial => "initial",
            CommandProcessState::Submitted { .. } => "submitted",
            CommandProcessState::Validating { .. } => "validating",
            CommandProcessState::AwaitingExternalValidation { .. } => {
                "awaiting_external_validation"
            }
            CommandProcessState::Publishing { .. } => "publishing",
            CommandProcessState::Succeeded { .. } => "succeeded",
            CommandProcessState::Failed { .. } => "failed",
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(
            self,
            CommandProcessState::Succeeded { .. } | CommandProcessState::Failed { .. }
        )
    }

    /// The command being processed, once known.
    pub fn command(&self) -> Option<&SubmitCommand> {
        match self {
            CommandProcessState::Submitted { command }
            | CommandProcessState::Validating { command, .. }
            | CommandProcessState::AwaitingExternalValidation { command, .. }
            | CommandProcessState::Publishing { command } => Some(command),
            _ => None,
        }
    }

    /// Computes the next state and the effects to run.
    pub fn apply(
        &self,
        event: CommandProcessEvent,
        settings: &ProcessSettings,
    ) -> Result<Transition, ProcessError> {
        use CommandProcessEvent as E;
        use CommandProcessState as S;

        if self.is_final() {
            return Err(ProcessError::AlreadyCompleted { state: self.name() });
        }

        match (self, event) {
            (S::Initial, E::Submitted(command)) => Ok(Transition::to(
                S::Submitted {
                    command: command.clone(),
                },
                vec![CommandEffect::ModifyCommand(command)],
            )),

            (S::Submitted { command }, E::Modified { events }) => {
                if events.is_empty() {
                    return Ok(fail(
                        command,
                        vec![ValidationFailure::new(
                            "command",
                            "command did not produce any events",
                        )],
                    ));
                }
                if settings.requires_external_validation(&command.command) {
                    Ok(Transition::to(
                        S::AwaitingExternalValidation {
                            command: command.clone(),
                            events: events.clone(),
                        },
                        vec![CommandEffect::TriggerExternalValidation {
                            command: command.clone(),
                            events,
                        }],
                    ))
                } else {
                    Ok(Transition::to(
                        S::Validating {
                            command: command.clone(),
                            events: events.clone(),
                        },
                        vec![CommandEffect::ValidateInternally {
                            command: command.clone(),
                            events,
                        }],
                    ))
                }
            }

            (S::AwaitingExternalValidation { command, events }, E::ExternalValidationCompleted(outcome))
            | (S::Validating { command, events }, E::InternalValidationCompleted(outcome)) => {
                Ok(after_validation(command, events, outcome))
            }

            (S::Publishing { command }, E::Published { batch_id }) => Ok(Transition::to(
                S::Succeeded {
                    identifier: command.identifier.clone(),
                    batch_id,
                },
                vec![CommandEffect::RespondSuccess {
                    identifier: command.identifier.clone(),
                    batch_id,
                }],
            )),

            (state, E::Faulted { reason }) => match state.command() {
                Some(command) => Ok(fail(command, vec![ValidationFailure::new("process", reason)])),
                None => Err(ProcessError::InvalidTransition {
                    state: state.name(),
                    event: "faulted",
                }),
            },

            (state, event) => Err(ProcessError::InvalidTransition {
                state: state.name(),
                event: event.name(),
            }),
        }
    }
}

fn after_validation(
    command: &SubmitCommand,
    events: &[EventTuple],
    outcome: ValidationOutcome,
) -> Transition {
    if !outcome.is_valid() {
        return fail(command, outcome.failures);
    }
    Transition::to(
        CommandProcessState::Publishing {
            command: command.clone(),
        },
        vec![CommandEffect::PublishEvents {
            events: events.to_vec(),
        }],
    )
}

fn fail(command: &SubmitCommand, failures: Vec<ValidationFailure>) -> Transition {
    let identifier = command.identifier.clone();
    Transition::to(
        CommandProcessState::Failed {
            identifier: identifier.clone(),
            failures: failures.clone(),
        },
        vec![CommandEffect::RespondFailure {
            identifier,
            failures,
        }],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::EventEnvelope;
    use serde_json::json;

    fn command(name: &str) -> SubmitCommand {
        SubmitCommand::new(
            name,
            json!({"display_name": "Ada"}),
            CommandIdentifier::single("cmd-1").unwrap(),
        )
    }

    fn events() -> Vec<EventTuple> {
        vec![EventTuple::new("profile-1", EventEnvelope::test_fixture())]
    }

    fn settings() -> ProcessSettings {
        ProcessSettings::new(vec!["function.create".to_string()])
    }

    fn drive(
        mut state: CommandProcessState,
        inputs: Vec<CommandProcessEvent>,
    ) -> (CommandProcessState, Vec<CommandEffect>) {
        let mut effects = Vec::new();
        for input in inputs {
            let transition = state.apply(input, &settings()).unwrap();
            effects.extend(transition.effects);
            state = transition.state;
        }
        (state, effects)
    }

    #[test]
    fn submit_requests_modification() {
        let transition = CommandProcessState::Initial
            .apply(
                CommandProcessEvent::Submitted(command("profile.create")),
                &settings(),
            )
            .unwrap();

        assert_eq!(transition.state.name(), "submitted");
        assert!(matches!(
            transition.effects.as_slice(),
            [CommandEffect::ModifyCommand(_)]
        ));
    }

    #[test]
    fn unlisted_command_is_validated_internally() {
        let (state, effects) = drive(
            CommandProcessState::Initial,
            vec![
                CommandProcessEvent::Submitted(command("profile.create")),
                CommandProcessEvent::Modified { events: events() },
            ],
        );

        assert_eq!(state.name(), "validating");
        assert!(matches!(
            effects.last(),
            Some(CommandEffect::ValidateInternally { .. })
        ));
    }

    #[test]
    fn listed_command_triggers_external_validation() {
        let (state, effects) = drive(
            CommandProcessState::Initial,
            vec![
                CommandProcessEvent::Submitted(command("function.create")),
                CommandProcessEvent::Modified { events: events() },
            ],
        );

        assert_eq!(state.name(), "awaiting_external_validation");
        assert!(matches!(
            effects.last(),
            Some(CommandEffect::TriggerExternalValidation { .. })
        ));
    }

    #[test]
    fn full_happy_path_responds_success() {
        let batch_id = BatchId::new();
        let (state, effects) = drive(
            CommandProcessState::Initial,
            vec![
                CommandProcessEvent::Submitted(command("profile.create")),
                CommandProcessEvent::Modified { events: events() },
                CommandProcessEvent::InternalValidationCompleted(ValidationOutcome::valid()),
                CommandProcessEvent::Published { batch_id },
            ],
        );

        assert!(matches!(state, CommandProcessState::Succeeded { batch_id: b, .. } if b == batch_id));
        assert!(matches!(
            effects.last(),
            Some(CommandEffect::RespondSuccess { .. })
        ));
        assert!(effects
            .iter()
            .any(|e| matches!(e, CommandEffect::PublishEvents { events } if events.len() == 1)));
    }

    #[test]
    fn invalid_outcome_fails_with_failures() {
        let (state, effects) = drive(
            CommandProcessState::Initial,
            vec![
                CommandProcessEvent::Submitted(command("function.create")),
                CommandProcessEvent::Modified { events: events() },
                CommandProcessEvent::ExternalValidationCompleted(ValidationOutcome::invalid(
                    vec![ValidationFailure::new("role_id", "unknown role")],
                )),
            ],
        );

        match state {
            CommandProcessState::Failed { failures, .. } => {
                assert_eq!(failures[0].member, "role_id");
            }
            other => panic!("expected failed, got {:?}", other),
        }
        assert!(matches!(
            effects.last(),
            Some(CommandEffect::RespondFailure { .. })
        ));
    }

    #[test]
    fn command_without_events_fails() {
        let (state, _) = drive(
            CommandProcessState::Initial,
            vec![
                CommandProcessEvent::Submitted(command("profile.create")),
                CommandProcessEvent::Modified { events: vec![] },
            ],
        );
        assert_eq!(state.name(), "failed");
    }

    #[test]
    fn wrong_validation_kind_is_rejected() {
        let (state, _) = drive(
            CommandProcessState::Initial,
            vec![
                CommandProcessEvent::Submitted(command("profile.create")),
                CommandProcessEvent::Modified { events: events() },
            ],
        );

        let err = state
            .apply(
                CommandProcessEvent::ExternalValidationCompleted(ValidationOutcome::valid()),
                &settings(),
            )
            .unwrap_err();
        assert_eq!(
            err,
            ProcessError::InvalidTransition {
                state: "validating",
                event: "external_validation_completed"
            }
        );
    }

    #[test]
    fn fault_before_submission_is_invalid() {
        let err = CommandProcessState::Initial
            .apply(
                CommandProcessEvent::Faulted {
                    reason: "boom".to_string(),
                },
                &settings(),
            )
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidStateTransition);
    }

    #[test]
    fn fault_mid_process_fails_it() {
        let (state, effects) = drive(
            CommandProcessState::Initial,
            vec![
                CommandProcessEvent::Submitted(command("profile.create")),
                CommandProcessEvent::Faulted {
                    reason: "modifier crashed".to_string(),
                },
            ],
        );
        assert_eq!(state.name(), "failed");
        assert!(matches!(
            effects.last(),
            Some(CommandEffect::RespondFailure { failures, .. }) if failures[0].message == "modifier crashed"
        ));
    }

    #[test]
    fn finished_process_accepts_nothing() {
        let state = CommandProcessState::Succeeded {
            identifier: CommandIdentifier::single("x").unwrap(),
            batch_id: BatchId::new(),
        };
        let err = state
            .apply(
                CommandProcessEvent::Published {
                    batch_id: BatchId::new(),
                },
                &settings(),
            )
            .unwrap_err();
        assert_eq!(err, ProcessError::AlreadyCompleted { state: "succeeded" });
    }
}
