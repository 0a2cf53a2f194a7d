// Draft service - runs the machine, executes its effects and feeds the
// completions of asynchronous calls back as internal events

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn, Instrument};

use crate::config::VotingDraftConfig;
use crate::observability::{OperationTimer, SubmissionMetrics, SubmissionStats};
use crate::telemetry::{create_publish_span, generate_correlation_id};
use crate::voting::derived::{DerivedValues, NetworkParams};
use crate::voting::errors::{SubmissionError, TransitionError};
use crate::voting::events::{DraftEvent, Effect};
use crate::voting::machine::{DraftDefaults, VotingDraftMachine};
use crate::voting::state::MachineState;
use crate::voting::traits::{ChainClient, DoneSignal, DraftObserver};
use crate::voting::types::{Confirmation, Draft, Identity, VotingId};
use crate::voting::validation::FieldViolation;

/// Runtime settings of a draft service
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    pub params: NetworkParams,
    pub defaults: DraftDefaults,
    pub preload_late_after: Duration,
    pub fallback_fee_per_gas: f64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from(&VotingDraftConfig::default())
    }
}

impl From<&VotingDraftConfig> for ServiceSettings {
    fn from(config: &VotingDraftConfig) -> Self {
        Self {
            params: config.network,
            defaults: config.draft.clone(),
            preload_late_after: config.preload.late_after(),
            fallback_fee_per_gas: config.preload.fallback_fee_per_gas,
        }
    }
}

/// Immutable view handed to the presentation layer on every render
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSnapshot {
    pub state: String,
    pub machine_state: MachineState,
    pub draft: Draft,
    pub derived: DerivedValues,
    pub violations: Vec<FieldViolation>,
    pub address: String,
    pub available_balance: f64,
    pub deployed_voting: Option<VotingId>,
    pub metrics: SubmissionStats,
}

/// Cooperative, single-threaded interpreter for one draft machine.
///
/// Events are processed one at a time to completion. Network calls run as
/// spawned tasks whose results come back through an internal queue, so a
/// start call is never issued before its deploy result was processed.
pub struct DraftService {
    machine: VotingDraftMachine,
    identity: Identity,
    client: Arc<dyn ChainClient>,
    observer: Box<dyn DraftObserver>,
    settings: ServiceSettings,
    metrics: Arc<SubmissionMetrics>,
    sender: mpsc::UnboundedSender<DraftEvent>,
    receiver: mpsc::UnboundedReceiver<DraftEvent>,
    preload_timer: Option<JoinHandle<()>>,
    task: Option<JoinHandle<()>>,
    pending: usize,
    started: bool,
    done_fired: bool,
    correlation_id: Option<String>,
}

impl std::fmt::Debug for DraftService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftService")
            .field("state", self.machine.state())
            .field("identity", &self.identity)
            .field("pending", &self.pending)
            .field("task_running", &self.task.as_ref().map(|task| !task.is_finished()))
            .field("done_fired", &self.done_fired)
            .finish()
    }
}

impl DraftService {
    /// Create a service for `identity`. Epoch and address are seeded into
    /// the draft and never change afterwards.
    pub fn new(
        identity: Identity,
        client: Arc<dyn ChainClient>,
        observer: Box<dyn DraftObserver>,
        settings: ServiceSettings,
    ) -> Self {
        let machine = VotingDraftMachine::with_params(
            identity.epoch,
            &identity.address,
            settings.params,
            &settings.defaults,
        );
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            machine,
            identity,
            client,
            observer,
            settings,
            metrics: Arc::new(SubmissionMetrics::new()),
            sender,
            receiver,
            preload_timer: None,
            task: None,
            pending: 0,
            started: false,
            done_fired: false,
            correlation_id: None,
        }
    }

    pub fn state(&self) -> &MachineState {
        self.machine.state()
    }

    pub fn machine(&self) -> &VotingDraftMachine {
        &self.machine
    }

    pub fn metrics(&self) -> SubmissionStats {
        self.metrics.get_stats()
    }

    /// Number of dispatched calls whose result has not been processed yet
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Begin preload: arm the late timer and read the fee per gas.
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;

        let sender = self.sender.clone();
        let late_after = self.settings.preload_late_after;
        self.preload_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(late_after).await;
            let _ = sender.send(DraftEvent::PreloadTimeout);
        }));

        let sender = self.sender.clone();
        let client = Arc::clone(&self.client);
        let fallback = self.settings.fallback_fee_per_gas;
        self.pending += 1;
        self.task = Some(tokio::spawn(async move {
            let fee_per_gas = match client.fee_per_gas().await {
                Ok(fee) => fee,
                Err(e) => {
                    warn!(error = %e, fallback, "Fee lookup failed, using fallback fee per gas");
                    fallback
                }
            };
            let _ = sender.send(DraftEvent::PrerequisitesReady { fee_per_gas });
        }));
    }

    /// Deliver a presentation event and execute its effects. Completions
    /// and timeouts only ever come from the internal queue.
    pub fn send(&mut self, event: DraftEvent) -> Result<(), TransitionError> {
        if event.is_internal() {
            warn!(event = event.name(), "Rejected internal event from outside the service");
            return Err(TransitionError::InternalEvent {
                event: event.name().to_string(),
            });
        }
        self.dispatch(event)
    }

    /// Wait for the next internal event and process it. Returns false when
    /// nothing is outstanding.
    pub async fn next_internal(&mut self) -> bool {
        let event = match self.receiver.try_recv() {
            Ok(event) => event,
            Err(_) if !self.awaiting_events() => return false,
            Err(_) => match self.receiver.recv().await {
                Some(event) => event,
                None => return false,
            },
        };

        if !matches!(event, DraftEvent::PreloadTimeout) {
            self.pending = self.pending.saturating_sub(1);
        }
        if let Err(e) = self.dispatch(event) {
            warn!(error = %e, "Internal event rejected");
        }
        true
    }

    /// Process internal events until every dispatched call has resolved
    pub async fn settle(&mut self) {
        while self.pending > 0 {
            if !self.next_internal().await {
                break;
            }
        }
    }

    pub fn snapshot(&self) -> DraftSnapshot {
        let context = self.machine.context();
        DraftSnapshot {
            state: self.machine.state().path().to_string(),
            machine_state: self.machine.state().clone(),
            draft: context.draft.clone(),
            derived: context.derived(),
            violations: context.violations.clone(),
            address: self.identity.address.clone(),
            available_balance: self.identity.balance,
            deployed_voting: context.deployed_voting.clone(),
            metrics: self.metrics.get_stats(),
        }
    }

    fn awaiting_events(&self) -> bool {
        self.pending > 0 || self.preload_timer.is_some()
    }

    fn dispatch(&mut self, event: DraftEvent) -> Result<(), TransitionError> {
        let effects = self.machine.send(event)?;

        if !self.machine.matches("preload") {
            if let Some(timer) = self.preload_timer.take() {
                timer.abort();
            }
        }

        for effect in effects {
            self.execute(effect);
        }
        Ok(())
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::DeployVoting {
                draft,
                confirmation,
            } => self.spawn_deploy(draft, confirmation),
            Effect::StartVoting {
                voting_id,
                confirmation,
            } => self.spawn_start(voting_id, confirmation),
            Effect::ReportViolations { violations } | Effect::ConfirmRejected { violations } => {
                debug!(count = violations.len(), "Reporting field violations");
                self.observer.on_violations(&violations);
            }
            Effect::NotifyDone {
                did_start,
                voting_id,
            } => {
                if self.done_fired {
                    return;
                }
                self.done_fired = true;
                self.metrics.record_completion();
                self.metrics.log_stats();
                self.observer.on_done(&DoneSignal {
                    did_start,
                    voting_id,
                });
            }
            Effect::NotifyError { error } => {
                match &error {
                    SubmissionError::Deploy { .. } => self.metrics.record_deploy_failure(),
                    SubmissionError::Start { .. } => self.metrics.record_start_failure(),
                }
                self.observer.on_error(&error);
            }
        }
    }

    fn publish_span(&mut self, operation: &str, from: &str) -> tracing::Span {
        let correlation_id = self
            .correlation_id
            .get_or_insert_with(generate_correlation_id)
            .clone();
        create_publish_span(
            operation,
            self.machine.draft().epoch,
            from,
            &correlation_id,
        )
    }

    fn spawn_deploy(&mut self, draft: Draft, confirmation: Confirmation) {
        self.correlation_id = None;
        let span = self.publish_span("deploy", &confirmation.from);
        let sender = self.sender.clone();
        let client = Arc::clone(&self.client);

        self.metrics.record_deploy();
        self.pending += 1;
        self.task = Some(tokio::spawn(
            async move {
                let timer = OperationTimer::new("deploy_voting");
                let event = match client.deploy_voting(&draft, &confirmation).await {
                    Ok(voting_id) => DraftEvent::DeployResolved { voting_id },
                    Err(e) => DraftEvent::DeployRejected {
                        message: e.to_string(),
                    },
                };
                timer.finish(matches!(event, DraftEvent::DeployResolved { .. }));
                let _ = sender.send(event);
            }
            .instrument(span),
        ));
    }

    fn spawn_start(&mut self, voting_id: VotingId, confirmation: Confirmation) {
        let span = self.publish_span("start", &confirmation.from);
        let sender = self.sender.clone();
        let client = Arc::clone(&self.client);

        self.metrics.record_start();
        self.pending += 1;
        self.task = Some(tokio::spawn(
            async move {
                let timer = OperationTimer::new("start_voting");
                let event = match client.start_voting(&voting_id, &confirmation).await {
                    Ok(receipt) => DraftEvent::StartResolved { receipt },
                    Err(e) => DraftEvent::StartRejected {
                        message: e.to_string(),
                    },
                };
                timer.finish(matches!(event, DraftEvent::StartResolved { .. }));
                let _ = sender.send(event);
            }
            .instrument(span),
        ));
    }
}

impl Drop for DraftService {
    fn drop(&mut self) {
        // submission calls are left to run out; only the timer is ours to stop
        if let Some(timer) = self.preload_timer.take() {
            timer.abort();
        }
    }
}
