//! Build errors for transition tables.

use crate::core::AspectId;
use thiserror::Error;

/// A single problem found while validating a transition table.
///
/// States are carried by name so violations from tables over different
/// state enums share one type.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuleViolation {
    #[error("Transition from '{from}' has no target state. Call .to(state)")]
    MissingTarget { from: String },

    #[error("Transition '{from}' -> '{to}' was never finalized. Call .manual() or .automatic()")]
    Unterminated { from: String, to: String },

    #[error("Transition '{from}' -> '{to}' is automatic but requests a permit; permits require .manual()")]
    PermitOnAutomatic { from: String, to: String },

    #[error("Transition '{from}' -> '{to}' is registered more than once")]
    Duplicate { from: String, to: String },

    #[error("'.{call}()' called with no open transition. Call .change(state) first")]
    NoOpenRule { call: &'static str },
}

/// Errors that can occur when building a transition table.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Aspect '{aspect}' has no permit manager. Call .permit_manager(manager) before .build()")]
    MissingPermitManager { aspect: AspectId },

    #[error("Aspect '{aspect}' serves no instance kind. Call .serves(kind) before .build()")]
    NoInstanceKind { aspect: AspectId },

    #[error("Aspect '{aspect}' defines no transitions")]
    NoTransitions { aspect: AspectId },

    #[error("Aspect '{aspect}' has {} invalid transition(s)", violations.len())]
    Invalid {
        aspect: AspectId,
        violations: Vec<RuleViolation>,
    },
}
