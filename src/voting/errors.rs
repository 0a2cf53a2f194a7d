use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::voting::state::MachineState;
use crate::voting::types::{DraftField, VotingId};

/// Errors raised while turning presentation input into draft events
#[derive(Debug, Error, PartialEq)]
pub enum DraftError {
    #[error("Unknown draft field: {id}")]
    UnknownField { id: String },
    #[error("Field {field} is read-only")]
    ReadOnlyField { field: DraftField },
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: DraftField, reason: String },
}

/// Errors returned by the transition table
#[derive(Debug, Error, PartialEq)]
pub enum TransitionError {
    #[error("Event {event} is not accepted in state {state}")]
    EventNotAccepted { event: String, state: MachineState },
    #[error("Voting option {id} does not exist")]
    UnknownOption { id: String },
    #[error("Event {event} is produced by the service and cannot be sent from outside")]
    InternalEvent { event: String },
    #[error("Voting {voting_id} is already deployed; the draft can no longer be edited")]
    DraftLocked { voting_id: VotingId },
}

/// Remote failures of the two-phase submission.
///
/// A `Start` failure means the voting is already deployed; it must not be
/// presented as a failure of the whole submission.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SubmissionError {
    #[error("{message}")]
    Deploy { message: String },
    #[error("{message}")]
    Start { voting_id: VotingId, message: String },
}

impl SubmissionError {
    /// Remote message, verbatim
    pub fn message(&self) -> &str {
        match self {
            SubmissionError::Deploy { message } | SubmissionError::Start { message, .. } => message,
        }
    }

    /// The voting left deployed but not started, if any
    pub fn deployed_voting(&self) -> Option<&VotingId> {
        match self {
            SubmissionError::Deploy { .. } => None,
            SubmissionError::Start { voting_id, .. } => Some(voting_id),
        }
    }

    pub fn is_partial_success(&self) -> bool {
        self.deployed_voting().is_some()
    }
}
