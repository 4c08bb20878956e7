//! CommandProcessor - Runs command processes.
//!
//! Messages arrive on a channel. For each one the processor looks up the
//! process state, applies the pure transition and starts the requested
//! effects as tasks. Effect results come back as new messages on the same
//! channel, so a process never blocks the others while it waits on a port.
//!
//! External validation answers arrive the same way, through
//! `CommandHandle::complete_external_validation`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::saga::SagaService;
use crate::domain::command::{
    CommandEffect, CommandProcessEvent, CommandProcessMessage, CommandProcessState, ProcessError,
    ProcessSettings, SubmitCommand, ValidationOutcome,
};
use crate::domain::event_log::EventTuple;
use crate::domain::foundation::{DomainError, ProcessId};
use crate::ports::{
    CommandModifier, CommandResponse, CommandResponseSink, CommandValidator,
    ExternalValidationTrigger,
};

/// Ports the command process talks to.
#[derive(Clone)]
pub struct CommandPorts {
    pub modifier: Arc<dyn CommandModifier>,
    /// Internal validation, usually a `CompositeValidator`.
    pub validator: Arc<dyn CommandValidator>,
    pub external_validation: Arc<dyn ExternalValidationTrigger>,
    pub responses: Arc<dyn CommandResponseSink>,
    pub saga: Arc<SagaService>,
}

/// Sends messages to a running `CommandProcessor`.
#[derive(Clone)]
pub struct CommandHandle {
    sender: mpsc::UnboundedSender<CommandProcessMessage>,
}

impl CommandHandle {
    /// Start a new process for `command`.
    pub fn submit(&self, command: SubmitCommand) -> Result<ProcessId, ProcessError> {
        let process_id = ProcessId::new();
        self.send(CommandProcessMessage::new(
            process_id,
            CommandProcessEvent::Submitted(command),
        ))?;
        Ok(process_id)
    }

    /// Deliver the verdict of an external validator.
    pub fn complete_external_validation(
        &self,
        process_id: ProcessId,
        outcome: ValidationOutcome,
    ) -> Result<(), ProcessError> {
        self.send(CommandProcessMessage::new(
            process_id,
            CommandProcessEvent::ExternalValidationCompleted(outcome),
        ))
    }

    pub fn send(&self, message: CommandProcessMessage) -> Result<(), ProcessError> {
        self.sender
            .send(message)
            .map_err(|_| ProcessError::ChannelClosed)
    }
}

/// Owns the state of every running command process.
pub struct CommandProcessor {
    ports: CommandPorts,
    settings: ProcessSettings,
    processes: HashMap<ProcessId, CommandProcessState>,
    sender: mpsc::UnboundedSender<CommandProcessMessage>,
    receiver: mpsc::UnboundedReceiver<CommandProcessMessage>,
}

impl CommandProcessor {
    pub fn new(ports: CommandPorts, settings: ProcessSettings) -> (Self, CommandHandle) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = CommandHandle {
            sender: sender.clone(),
        };
        let processor = Self {
            ports,
            settings,
            processes: HashMap::new(),
            sender,
            receiver,
        };
        (processor, handle)
    }

    /// Process messages until `shutdown` is cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Command processor started");
        loop {
            let message = tokio::select! {
                _ = shutdown.cancelled() => break,
                message = self.receiver.recv() => message,
            };
            // The processor holds a sender itself, so the channel never drains to None.
            let Some(message) = message else { break };

            if let Err(e) = self.dispatch(message) {
                warn!(error = %e, code = %e.code(), "Command message rejected");
            }
        }
        info!(in_flight = self.processes.len(), "Command processor stopped");
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    fn dispatch(&mut self, message: CommandProcessMessage) -> Result<(), ProcessError> {
        let CommandProcessMessage { process_id, event } = message;
        let event_name = event.name();

        let state = match self.processes.remove(&process_id) {
            Some(state) => state,
            None if matches!(event, CommandProcessEvent::Submitted(_)) => {
                CommandProcessState::Initial
            }
            None => return Err(ProcessError::UnknownProcess(process_id)),
        };

        let transition = match state.apply(event, &self.settings) {
            Ok(transition) => transition,
            Err(e) => {
                self.processes.insert(process_id, state);
                return Err(e);
            }
        };

        debug!(
            process_id = %process_id,
            event = event_name,
            from = state.name(),
            to = transition.state.name(),
            "Command process transition"
        );

        if !transition.state.is_final() {
            self.processes.insert(process_id, transition.state);
        }
        for effect in transition.effects {
            tokio::spawn(execute(
                process_id,
                effect,
                self.ports.clone(),
                self.sender.clone(),
            ));
        }
        Ok(())
    }
}

/// Run one effect and post its result back to the processor.
async fn execute(
    process_id: ProcessId,
    effect: CommandEffect,
    ports: CommandPorts,
    sender: mpsc::UnboundedSender<CommandProcessMessage>,
) {
    let follow_up = match effect {
        CommandEffect::ModifyCommand(command) => Some(fault_on_error(
            ports
                .modifier
                .modify(&command)
                .await
                .map(|events| CommandProcessEvent::Modified { events }),
        )),
        CommandEffect::TriggerExternalValidation { command, events } => ports
            .external_validation
            .trigger(process_id, &command, &events)
            .await
            .err()
            .map(|e| fault(e.to_string())),
        CommandEffect::ValidateInternally { command, events } => Some(fault_on_error(
            ports
                .validator
                .validate(&command, &events)
                .await
                .map(CommandProcessEvent::InternalValidationCompleted),
        )),
        CommandEffect::PublishEvents { events } => Some(publish(&ports.saga, events).await),
        CommandEffect::RespondSuccess {
            identifier,
            batch_id,
        } => {
            respond(
                &ports,
                CommandResponse::Success {
                    identifier,
                    batch_id,
                },
            )
            .await;
            None
        }
        CommandEffect::RespondFailure {
            identifier,
            failures,
        } => {
            respond(
                &ports,
                CommandResponse::Failure {
                    identifier,
                    failures,
                },
            )
            .await;
            None
        }
    };

    if let Some(event) = follow_up {
        if sender
            .send(CommandProcessMessage::new(process_id, event))
            .is_err()
        {
            debug!(process_id = %process_id, "Command processor gone, result dropped");
        }
    }
}

async fn publish(saga: &SagaService, events: Vec<EventTuple>) -> CommandProcessEvent {
    let batch_id = match saga.create_batch_with_events(events).await {
        Ok(batch_id) => batch_id,
        Err(e) => return fault(e.to_string()),
    };
    if let Err(e) = saga.execute_batch(batch_id).await {
        if let Err(abort) = saga.abort_batch(batch_id).await {
            warn!(batch_id = %batch_id, error = %abort, "Failed to abort unpublished batch");
        }
        return fault(e.to_string());
    }
    CommandProcessEvent::Published { batch_id }
}

async fn respond(ports: &CommandPorts, response: CommandResponse) {
    let identifier = response.identifier().clone();
    if let Err(e) = ports.responses.respond(response).await {
        error!(command = %identifier, error = %e, "Failed to deliver command response");
    }
}

fn fault_on_error(result: Result<CommandProcessEvent, DomainError>) -> CommandProcessEvent {
    result.unwrap_or_else(|e| fault(e.to_string()))
}

fn fault(reason: String) -> CommandProcessEvent {
    CommandProcessEvent::Faulted { reason }
}
