// Voting draft state machine: an explicit transition table over a single
// context record. `transition` is pure; `VotingDraftMachine` applies it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::voting::derived::{min_oracle_reward, DerivedValues, NetworkParams};
use crate::voting::errors::{SubmissionError, TransitionError};
use crate::voting::events::{DraftEvent, Effect, FieldChange};
use crate::voting::state::{MachineState, PreloadState, PublishingState};
use crate::voting::types::{Confirmation, Draft, OptionId, VotingId, VotingOption};
use crate::voting::validation::{validate, validate_confirmation, FieldViolation};

const MIN_OPTIONS: usize = 2;

/// Initial values for the editable part of a fresh draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftDefaults {
    pub committee_size: u32,
    pub quorum: u32,
    pub winner_threshold: u32,
    pub voting_duration: u64,
    pub public_voting_duration: u64,
    pub should_start_immediately: bool,
}

impl Default for DraftDefaults {
    fn default() -> Self {
        Self {
            committee_size: 100,
            quorum: 20,
            winner_threshold: 50,
            voting_duration: 24 * 60 * 60,
            public_voting_duration: 60 * 60,
            should_start_immediately: false,
        }
    }
}

/// The machine's context: the draft plus the bookkeeping the transitions
/// need. Replaced wholesale by every transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftContext {
    pub draft: Draft,
    pub params: NetworkParams,
    /// Committee size to restore when whole-network is switched off
    pub explicit_committee_size: u32,
    /// Set once the user touched the reward; keeps the fee-derived default
    /// from overwriting it
    pub reward_edited: bool,
    id_seed: String,
    next_option: u64,
    pub violations: Vec<FieldViolation>,
    pub confirmation: Option<Confirmation>,
    /// Deployed by an earlier attempt whose start call failed
    pub deployed_voting: Option<VotingId>,
}

impl DraftContext {
    /// Seed a fresh draft for `epoch` and `address`
    pub fn new(epoch: u64, address: &str, params: NetworkParams, defaults: &DraftDefaults) -> Self {
        let mut context = Self {
            draft: Draft {
                title: String::new(),
                description: String::new(),
                options: Vec::new(),
                start_date: None,
                should_start_immediately: defaults.should_start_immediately,
                voting_duration: defaults.voting_duration,
                public_voting_duration: defaults.public_voting_duration,
                committee_size: defaults.committee_size,
                is_whole_network: false,
                quorum: defaults.quorum,
                is_free_voting: false,
                voting_min_payment: None,
                oracle_reward: 0.0,
                fee_per_gas: 0.0,
                winner_threshold: defaults.winner_threshold,
                epoch,
                from_address: address.to_string(),
            },
            params,
            explicit_committee_size: defaults.committee_size,
            reward_edited: false,
            id_seed: Uuid::new_v4().simple().to_string(),
            next_option: 0,
            violations: Vec::new(),
            confirmation: None,
            deployed_voting: None,
        };
        for _ in 0..MIN_OPTIONS {
            let id = context.issue_option_id();
            context.draft.options.push(VotingOption {
                id,
                value: String::new(),
            });
        }
        context
    }

    /// A token never handed out before for this draft
    fn issue_option_id(&mut self) -> OptionId {
        let id = OptionId(format!("{}-{}", self.id_seed, self.next_option));
        self.next_option += 1;
        id
    }

    pub fn derived(&self) -> DerivedValues {
        DerivedValues::compute(&self.draft, &self.params)
    }
}

/// Result of one step of the transition table
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: MachineState,
    pub context: DraftContext,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn stay(state: &MachineState, context: DraftContext) -> Self {
        Self {
            state: state.clone(),
            context,
            effects: Vec::new(),
        }
    }

    fn to(state: MachineState, context: DraftContext) -> Self {
        Self {
            state,
            context,
            effects: Vec::new(),
        }
    }

    fn with(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

fn not_accepted(state: &MachineState, event: &DraftEvent) -> TransitionError {
    TransitionError::EventNotAccepted {
        event: event.name().to_string(),
        state: state.clone(),
    }
}

/// The transition table: `(state, context, event) -> (state, context, effects)`.
///
/// Inbound events the current state does not accept are rejected with
/// `EventNotAccepted`. Stale internal events are absorbed without effect.
pub fn transition(
    state: &MachineState,
    context: &DraftContext,
    event: &DraftEvent,
) -> Result<Transition, TransitionError> {
    // a deployed voting is fixed on chain; only resuming its start is left
    if let (MachineState::Editing, Some(voting_id)) = (state, &context.deployed_voting) {
        if event.is_mutation() {
            return Err(TransitionError::DraftLocked {
                voting_id: voting_id.clone(),
            });
        }
    }

    let mut next = context.clone();

    let step = match (state, event) {
        // preload
        (MachineState::Preload { .. }, DraftEvent::PrerequisitesReady { fee_per_gas }) => {
            next.draft.fee_per_gas = fee_per_gas.max(0.0);
            if !next.reward_edited {
                next.draft.oracle_reward = min_oracle_reward(next.draft.fee_per_gas, &next.params);
            }
            Transition::to(MachineState::Editing, next)
        }
        (
            MachineState::Preload {
                sub: PreloadState::Idle,
            },
            DraftEvent::PreloadTimeout,
        ) => Transition::to(
            MachineState::Preload {
                sub: PreloadState::Late,
            },
            next,
        ),

        // editing
        (MachineState::Editing, DraftEvent::Change { change }) => {
            apply_change(&mut next, change.clone());
            Transition::stay(state, next)
        }
        (MachineState::Editing, DraftEvent::SetOptions { id, value }) => {
            let option = next
                .draft
                .options
                .iter_mut()
                .find(|option| &option.id == id)
                .ok_or_else(|| TransitionError::UnknownOption { id: id.to_string() })?;
            option.value = value.clone();
            Transition::stay(state, next)
        }
        (MachineState::Editing, DraftEvent::AddOption) => {
            let id = next.issue_option_id();
            next.draft.options.push(VotingOption {
                id,
                value: String::new(),
            });
            Transition::stay(state, next)
        }
        (MachineState::Editing, DraftEvent::RemoveOption { id }) => {
            if next.draft.option(id).is_none() {
                return Err(TransitionError::UnknownOption { id: id.to_string() });
            }
            if next.draft.options.len() > MIN_OPTIONS {
                next.draft.options.retain(|option| &option.id != id);
            } else {
                debug!(option = %id, "Keeping option, a voting needs at least two");
            }
            Transition::stay(state, next)
        }
        (MachineState::Editing, DraftEvent::SetWholeNetwork { checked }) => {
            next.draft.is_whole_network = *checked;
            next.draft.committee_size = if *checked {
                next.params.network_size
            } else {
                next.explicit_committee_size
            };
            Transition::stay(state, next)
        }
        (MachineState::Editing, DraftEvent::Publish) => match validate(&next.draft, &next.params) {
            Ok(()) => {
                next.violations.clear();
                Transition::to(MachineState::review(), next)
            }
            Err(errors) => {
                next.violations = errors.violations.clone();
                Transition::stay(state, next).with(Effect::ReportViolations {
                    violations: errors.violations,
                })
            }
        },

        // publishing.review
        (
            MachineState::Publishing {
                sub: PublishingState::Review,
            },
            DraftEvent::Cancel,
        ) => Transition::to(MachineState::Editing, next),
        (
            MachineState::Publishing {
                sub: PublishingState::Review,
            },
            DraftEvent::Confirm(confirmation),
        ) => match validate_confirmation(&next.draft, confirmation, &next.params) {
            Ok(()) => {
                next.violations.clear();
                next.confirmation = Some(confirmation.clone());
                match next.deployed_voting.clone() {
                    Some(voting_id) => Transition::to(MachineState::starting(voting_id.clone()), next)
                        .with(Effect::StartVoting {
                            voting_id,
                            confirmation: confirmation.clone(),
                        }),
                    None => {
                        let draft = next.draft.clone();
                        Transition::to(MachineState::deploy(confirmation.clone()), next).with(
                            Effect::DeployVoting {
                                draft,
                                confirmation: confirmation.clone(),
                            },
                        )
                    }
                }
            }
            Err(errors) => {
                next.violations = errors.violations.clone();
                Transition::stay(state, next).with(Effect::ConfirmRejected {
                    violations: errors.violations,
                })
            }
        },

        // publishing.deploy
        (
            MachineState::Publishing {
                sub: PublishingState::Deploy { confirmation },
            },
            DraftEvent::DeployResolved { voting_id },
        ) => {
            if next.draft.should_start_immediately {
                Transition::to(MachineState::starting(voting_id.clone()), next).with(
                    Effect::StartVoting {
                        voting_id: voting_id.clone(),
                        confirmation: confirmation.clone(),
                    },
                )
            } else {
                Transition::to(MachineState::Done { did_start: false }, next).with(
                    Effect::NotifyDone {
                        did_start: false,
                        voting_id: voting_id.clone(),
                    },
                )
            }
        }
        (
            MachineState::Publishing {
                sub: PublishingState::Deploy { .. },
            },
            DraftEvent::DeployRejected { message },
        ) => Transition::to(MachineState::Editing, next).with(Effect::NotifyError {
            error: SubmissionError::Deploy {
                message: message.clone(),
            },
        }),

        // publishing.starting
        (
            MachineState::Publishing {
                sub: PublishingState::Starting { voting_id },
            },
            DraftEvent::StartResolved { .. },
        ) => {
            next.deployed_voting = None;
            Transition::to(MachineState::Done { did_start: true }, next).with(Effect::NotifyDone {
                did_start: true,
                voting_id: voting_id.clone(),
            })
        }
        (
            MachineState::Publishing {
                sub: PublishingState::Starting { voting_id },
            },
            DraftEvent::StartRejected { message },
        ) => {
            next.deployed_voting = Some(voting_id.clone());
            Transition::to(MachineState::Editing, next).with(Effect::NotifyError {
                error: SubmissionError::Start {
                    voting_id: voting_id.clone(),
                    message: message.clone(),
                },
            })
        }

        (_, event) if event.is_internal() => {
            debug!(state = %state, event = event.name(), "Ignoring stale internal event");
            Transition::stay(state, next)
        }
        (_, event) => return Err(not_accepted(state, event)),
    };

    Ok(step)
}

fn apply_change(context: &mut DraftContext, change: FieldChange) {
    match change {
        FieldChange::CommitteeSize(size) => {
            context.explicit_committee_size = size;
            if !context.draft.is_whole_network {
                context.draft.committee_size = size;
            }
        }
        FieldChange::OracleReward(_) => {
            context.reward_edited = true;
            change.apply(&mut context.draft);
        }
        other => other.apply(&mut context.draft),
    }
}

/// One entry of the machine's audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: MachineState,
    pub to: MachineState,
    pub event: String,
    pub timestamp: DateTime<Utc>,
}

/// A draft machine instance: current state, context and the history of
/// state changes
#[derive(Debug, Clone)]
pub struct VotingDraftMachine {
    state: MachineState,
    context: DraftContext,
    history: Vec<TransitionRecord>,
}

impl VotingDraftMachine {
    pub fn new(epoch: u64, address: &str) -> Self {
        Self::with_params(epoch, address, NetworkParams::default(), &DraftDefaults::default())
    }

    pub fn with_params(
        epoch: u64,
        address: &str,
        params: NetworkParams,
        defaults: &DraftDefaults,
    ) -> Self {
        Self {
            state: MachineState::INITIAL,
            context: DraftContext::new(epoch, address, params, defaults),
            history: Vec::new(),
        }
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }

    pub fn context(&self) -> &DraftContext {
        &self.context
    }

    pub fn draft(&self) -> &Draft {
        &self.context.draft
    }

    pub fn history(&self) -> &[TransitionRecord] {
        &self.history
    }

    pub fn matches(&self, path: &str) -> bool {
        self.state.matches(path)
    }

    /// Process one event to completion and return the effects to execute.
    /// On error neither state nor context changes.
    pub fn send(&mut self, event: DraftEvent) -> Result<Vec<Effect>, TransitionError> {
        let step = match transition(&self.state, &self.context, &event) {
            Ok(step) => step,
            Err(e) => {
                warn!(state = %self.state, event = event.name(), error = %e, "Event rejected");
                return Err(e);
            }
        };

        if step.state != self.state {
            info!(
                from = %self.state,
                to = %step.state,
                event = event.name(),
                epoch = self.context.draft.epoch,
                "Voting draft state transition"
            );
            self.history.push(TransitionRecord {
                from: self.state.clone(),
                to: step.state.clone(),
                event: event.name().to_string(),
                timestamp: Utc::now(),
            });
        } else {
            debug!(state = %self.state, event = event.name(), "Event handled");
        }

        self.state = step.state;
        self.context = step.context;
        Ok(step.effects)
    }
}
