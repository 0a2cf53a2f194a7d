// Collaborator interfaces - the chain client and the notification surface

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

use crate::voting::chain::ChainError;
use crate::voting::errors::SubmissionError;
use crate::voting::types::{Confirmation, Draft, Receipt, VotingId};
use crate::voting::validation::FieldViolation;

/// Remote operations the draft machine depends on.
///
/// Calls may fail or take arbitrary time; errors carry a human readable
/// message that is forwarded verbatim to the user.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current fee per gas, read while the machine is in preload
    async fn fee_per_gas(&self) -> Result<f64, ChainError>;

    /// Register the voting contract
    async fn deploy_voting(
        &self,
        draft: &Draft,
        confirmation: &Confirmation,
    ) -> Result<VotingId, ChainError>;

    /// Open a deployed voting for participation
    async fn start_voting(
        &self,
        voting_id: &VotingId,
        confirmation: &Confirmation,
    ) -> Result<Receipt, ChainError>;
}

/// Payload of the completion signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoneSignal {
    pub did_start: bool,
    pub voting_id: VotingId,
}

/// Outbound signals of the machine. Reactions such as navigating away after
/// success belong here, not in the machine.
pub trait DraftObserver: Send {
    /// Fired exactly once, on terminal success
    fn on_done(&mut self, signal: &DoneSignal);

    /// Fired on deploy or start failure; the machine is back in editing
    fn on_error(&mut self, error: &SubmissionError);

    /// Field-level problems found on `PUBLISH` or `CONFIRM`. Never a toast.
    fn on_violations(&mut self, _violations: &[FieldViolation]) {}
}

/// Everything an observer can be told, as a value
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Done(DoneSignal),
    Error(SubmissionError),
    Violations(Vec<FieldViolation>),
}

/// Observer that forwards every signal into a channel, for presentation
/// layers that poll
#[derive(Debug)]
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<Signal>,
}

impl ChannelObserver {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Signal>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn forward(&self, signal: Signal) {
        if self.sender.send(signal).is_err() {
            tracing::debug!("Signal receiver dropped");
        }
    }
}

impl DraftObserver for ChannelObserver {
    fn on_done(&mut self, signal: &DoneSignal) {
        self.forward(Signal::Done(signal.clone()));
    }

    fn on_error(&mut self, error: &SubmissionError) {
        self.forward(Signal::Error(error.clone()));
    }

    fn on_violations(&mut self, violations: &[FieldViolation]) {
        self.forward(Signal::Violations(violations.to_vec()));
    }
}

/// Observer that only logs
#[derive(Debug, Default)]
pub struct TracingObserver;

impl DraftObserver for TracingObserver {
    fn on_done(&mut self, signal: &DoneSignal) {
        tracing::info!(
            voting_id = %signal.voting_id,
            did_start = signal.did_start,
            "Voting published"
        );
    }

    fn on_error(&mut self, error: &SubmissionError) {
        tracing::error!(
            partial = error.is_partial_success(),
            message = error.message(),
            "Voting submission failed"
        );
    }
}
