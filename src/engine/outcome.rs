//! Results of transition attempts.

use crate::aspect::BuildError;
use crate::core::{AspectId, InstanceKind, State, TransitionRecord};
use crate::permit::PermitError;
use crate::registry::RegistryError;
use thiserror::Error;
use uuid::Uuid;

/// Why an attempt left the instance untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    /// The current state is not among the sweep's candidate states
    NotCandidate,
    /// No rule of the right kind leaves the current state
    NoTransition,
    /// A matching rule exists but its guard is false
    GuardRejected,
    /// Another permit is still pending for this instance
    PermitInFlight,
    /// A verdict arrived for a permit that is no longer pending, or after
    /// the instance left the transition's source state
    StaleResolution,
}

/// Result of one call into the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum TransitionOutcome<S: State> {
    /// The instance moved to a new state
    Committed(TransitionRecord<S>),

    /// Waiting for the authority; the state is unchanged
    Pending { permit: Uuid, from: S, to: S },

    /// The authority refused; the state is unchanged
    Denied { permit: Uuid, from: S, to: S },

    /// Nothing happened
    Skipped(Skip),
}

impl<S: State> TransitionOutcome<S> {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }

    pub fn record(&self) -> Option<&TransitionRecord<S>> {
        match self {
            Self::Committed(record) => Some(record),
            _ => None,
        }
    }

    pub fn pending_permit(&self) -> Option<Uuid> {
        match self {
            Self::Pending { permit, .. } => Some(*permit),
            _ => None,
        }
    }
}

/// Programming and configuration errors. These are never retried.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No aspect '{0}' is registered")]
    UnknownAspect(AspectId),

    #[error("Aspect '{0}' is already registered")]
    DuplicateAspect(AspectId),

    #[error("Aspect '{aspect}' does not serve instance kind '{kind}'")]
    UnknownInstanceKind { aspect: AspectId, kind: InstanceKind },

    #[error("State '{state}' is not declared by aspect '{aspect}'")]
    UndeclaredState { aspect: AspectId, state: String },

    #[error(transparent)]
    Permit(#[from] PermitError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
