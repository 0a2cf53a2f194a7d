// State topology of the voting draft machine

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::voting::types::{Confirmation, VotingId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PreloadState {
    /// Waiting for prerequisites, nothing to show yet
    Idle,
    /// Still waiting after the preload timeout; show a loading skeleton
    Late,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "camelCase")]
pub enum PublishingState {
    /// Confirmation surface with the computed minimum balance and stake
    Review,
    /// Deploy call in flight, funded by `confirmation`
    Deploy { confirmation: Confirmation },
    /// Start call in flight for an already deployed voting
    Starting { voting_id: VotingId },
}

/// Hierarchical machine state. The dotted [`MachineState::path`] is what the
/// presentation layer matches against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum MachineState {
    Preload { sub: PreloadState },
    Editing,
    Publishing { sub: PublishingState },
    Done { did_start: bool },
}

impl MachineState {
    pub const INITIAL: MachineState = MachineState::Preload {
        sub: PreloadState::Idle,
    };

    pub fn review() -> Self {
        MachineState::Publishing {
            sub: PublishingState::Review,
        }
    }

    pub fn deploy(confirmation: Confirmation) -> Self {
        MachineState::Publishing {
            sub: PublishingState::Deploy { confirmation },
        }
    }

    pub fn starting(voting_id: VotingId) -> Self {
        MachineState::Publishing {
            sub: PublishingState::Starting { voting_id },
        }
    }

    /// Dotted path of the active leaf, e.g. `publishing.deploy`
    pub fn path(&self) -> &'static str {
        match self {
            MachineState::Preload { sub: PreloadState::Idle } => "preload.idle",
            MachineState::Preload { sub: PreloadState::Late } => "preload.late",
            MachineState::Editing => "editing",
            MachineState::Publishing { sub: PublishingState::Review } => "publishing.review",
            MachineState::Publishing {
                sub: PublishingState::Deploy { .. },
            } => "publishing.deploy",
            MachineState::Publishing {
                sub: PublishingState::Starting { .. },
            } => "publishing.starting",
            MachineState::Done { .. } => "done",
        }
    }

    /// True when `path` names the active leaf or one of its ancestors.
    /// `matches("publishing")` holds in every publishing sub-state.
    pub fn matches(&self, path: &str) -> bool {
        let current = self.path();
        match current.strip_prefix(path) {
            Some(rest) => rest.is_empty() || rest.starts_with('.'),
            None => false,
        }
    }

    /// True when any of `paths` matches
    pub fn matches_any(&self, paths: &[&str]) -> bool {
        paths.iter().any(|path| self.matches(path))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MachineState::Done { .. })
    }

    /// Mutation events are only accepted here
    pub fn is_editing(&self) -> bool {
        matches!(self, MachineState::Editing)
    }

    /// A network call has been dispatched and not yet resolved
    pub fn is_submitting(&self) -> bool {
        self.matches_any(&["publishing.deploy", "publishing.starting"])
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deploying() -> MachineState {
        MachineState::deploy(Confirmation {
            from: "0x1".into(),
            balance: 10.0,
            stake: 0.0,
        })
    }

    #[test]
    fn test_paths() {
        assert_eq!(MachineState::INITIAL.path(), "preload.idle");
        assert_eq!(MachineState::review().path(), "publishing.review");
        assert_eq!(
            MachineState::starting(VotingId("0x1".into())).path(),
            "publishing.starting"
        );
        assert_eq!(MachineState::Done { did_start: true }.to_string(), "done");
    }

    #[test]
    fn test_matches_ancestors_and_leaves() {
        let state = deploying();
        assert!(state.matches("publishing"));
        assert!(state.matches("publishing.deploy"));
        assert!(!state.matches("publishing.review"));
        assert!(!state.matches("publish"));
        assert!(!state.matches("editing"));
    }

    #[test]
    fn test_matches_any_across_compound_state() {
        let loading = ["publishing.deploy", "publishing.starting"];
        assert!(deploying().matches_any(&loading));
        assert!(MachineState::starting(VotingId("0x1".into())).matches_any(&loading));
        assert!(!MachineState::review().matches_any(&loading));
        assert!(!MachineState::Editing.matches_any(&[]));
    }

    #[test]
    fn test_preload_late_is_still_preload() {
        let state = MachineState::Preload {
            sub: PreloadState::Late,
        };
        assert!(state.matches("preload"));
        assert!(state.matches("preload.late"));
        assert!(!state.is_editing());
    }
}
