// Voting draft module - the workflow engine behind the "new voting" form
//
// The machine owns the draft, validates it on publish and drives the
// two-phase deploy/start submission. The service runs the machine against
// a chain client and reports back through an observer.

pub mod chain;
pub mod derived;
pub mod errors;
pub mod events;
pub mod machine;
pub mod service;
pub mod state;
pub mod traits;
pub mod types;
pub mod validation;


pub use chain::{ChainError, SimulatedChainClient};
pub use derived::{DerivedValues, NetworkParams};
pub use errors::{DraftError, SubmissionError, TransitionError};
pub use events::{DraftEvent, Effect, FieldChange};
pub use machine::{transition, DraftContext, DraftDefaults, Transition, VotingDraftMachine};
pub use service::{DraftService, DraftSnapshot, ServiceSettings};
pub use state::{MachineState, PreloadState, PublishingState};
pub use traits::{ChainClient, ChannelObserver, DoneSignal, DraftObserver, Signal, TracingObserver};
pub use types::{Confirmation, Draft, DraftField, Identity, OptionId, Receipt, VotingId, VotingOption};
pub use validation::{FieldViolation, ValidationErrors};
