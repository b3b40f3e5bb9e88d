//! Remote rebase engine
//!
//! Rewrites a pull request's commits onto the current tip of its base
//! branch using only remote object-creation primitives:
//! 1. Stage - create a temporary ref at the base tip
//! 2. Replay - cherry-pick each commit onto the temporary ref via remote merges
//! 3. Publish - verify the head is unchanged and force-update the real branch
//!
//! The real branch is only touched once the whole chain has been rewritten.

mod engine;
mod temp_ref;

pub use engine::{RebaseEngine, RebaseSummary};
pub use temp_ref::TemporaryRef;
