// Oracle Voting Draft Library - the "new voting" workflow as a state machine
// This exposes the core components for testing and integration

pub mod config;
pub mod observability;
pub mod telemetry;
pub mod voting;

// Re-export key types for easy access
pub use config::{config, VotingDraftConfig};
pub use observability::{OperationTimer, SubmissionMetrics, SubmissionStats};
pub use telemetry::{create_publish_span, generate_correlation_id, init_telemetry};
pub use voting::{
    ChainClient, ChainError, Confirmation, DraftEvent, DraftObserver, DraftService, DraftSnapshot,
    FieldChange, Identity, MachineState, ServiceSettings, SimulatedChainClient, SubmissionError,
    TransitionError, VotingDraftMachine,
};
