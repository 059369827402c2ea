//! The transition engine.
//!
//! [`StateManager`] answers two kinds of calls: explicit requests for a
//! target state, which may need a permit, and sweeps, which fire automatic
//! transitions whose guards hold. Deferred permit verdicts come back in
//! through [`StateManager::complete_permit`].

mod manager;
mod outcome;

pub use manager::StateManager;
pub use outcome::{EngineError, Skip, TransitionOutcome};
