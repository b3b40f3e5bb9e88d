//! Update orchestration and concurrency coordination
//!
//! - `state` - process-wide rebase lock, active registry, failure registry
//! - `policy` - whitelist/blacklist eligibility
//! - `coordinator` - locked rebases, candidate selection, explicit updates
//! - `cycle` - background poll-and-rebase task

mod coordinator;
mod cycle;
mod policy;
mod state;

pub use coordinator::{TryRebase, UpdateCandidate, UpdateCoordinator};
pub use cycle::{
    CycleOutcome, DEFAULT_MAX_POLL_TICKS, DEFAULT_POLL_INTERVAL, PollSettings, SuccessCallback,
    UpdateCycleHandle,
};
pub use policy::{LabelPolicy, SignalSet, UpdateConfig, UpdatePolicy, should_update};
pub use state::{
    ActiveUpdates, DEFAULT_FAILURE_COOLDOWN_MINUTES, FailureRegistry, RebaseLock,
    RebaseLockGuard, UpdateState,
};
