//! Permit values: authorization tokens for manual transitions.

use crate::core::{InstanceKind, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Tag naming a permit variant, e.g. `"magazine.load"`.
///
/// Kinds are declared as constants and registered with the
/// [`TypeRegistry`](crate::registry::TypeRegistry) so a transport can
/// identify them on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PermitKind(&'static str);

impl PermitKind {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for PermitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Resolution status of a permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermitStatus {
    /// Not yet decided by the authority
    Unknown,
    Granted,
    Denied,
}

impl PermitStatus {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Errors raised by permit bookkeeping.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PermitError {
    #[error("Permit {id} was already resolved as {status:?}")]
    AlreadyResolved { id: Uuid, status: PermitStatus },

    #[error("Permit {id} cannot be resolved to Unknown")]
    UnknownResolution { id: Uuid },

    #[error("Verdict for permit {id} does not match the pending permit")]
    MismatchedVerdict { id: Uuid },

    #[error("No evaluator registered for permit kind '{permit}' on instance kind '{instance}'")]
    UnregisteredEvaluator {
        permit: PermitKind,
        instance: InstanceKind,
    },
}

/// Authorization request for one manual transition attempt.
///
/// The target state is fixed at creation. The status moves from
/// `Unknown` to `Granted` or `Denied` exactly once and never reverts.
///
/// # Example
///
/// ```rust
/// use permitflow::permit::{Permit, PermitKind, PermitStatus};
/// use permitflow::core::State;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
/// enum Gate { Shut, Raised }
///
/// impl State for Gate {
///     fn name(&self) -> &str {
///         match self {
///             Self::Shut => "Shut",
///             Self::Raised => "Raised",
///         }
///     }
/// }
///
/// const RAISE: PermitKind = PermitKind::new("gate.raise");
///
/// let permit = Permit::new(RAISE, Gate::Raised);
/// assert_eq!(permit.status(), PermitStatus::Unknown);
/// assert_eq!(permit.target(), &Gate::Raised);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Permit<S: State> {
    id: Uuid,
    kind: PermitKind,
    target: S,
    status: PermitStatus,
    amount: Option<u64>,
    issued_at: DateTime<Utc>,
}

impl<S: State> Permit<S> {
    pub fn new(kind: PermitKind, target: S) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            target,
            status: PermitStatus::Unknown,
            amount: None,
            issued_at: Utc::now(),
        }
    }

    /// Reassemble a permit received from a transport.
    pub(crate) fn from_parts(
        id: Uuid,
        kind: PermitKind,
        target: S,
        status: PermitStatus,
        amount: Option<u64>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind,
            target,
            status,
            amount,
            issued_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> PermitKind {
        self.kind
    }

    pub fn target(&self) -> &S {
        &self.target
    }

    pub fn status(&self) -> PermitStatus {
        self.status
    }

    pub fn is_granted(&self) -> bool {
        self.status == PermitStatus::Granted
    }

    /// Quantity the evaluator authorized, for kinds that move a quantity.
    pub fn amount(&self) -> Option<u64> {
        self.amount
    }

    pub fn set_amount(&mut self, amount: u64) {
        self.amount = Some(amount);
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub(crate) fn set_issued_at(&mut self, at: DateTime<Utc>) {
        self.issued_at = at;
    }

    /// Move the status out of `Unknown`.
    ///
    /// Local evaluators report their verdict as a return value instead. A
    /// remote authority resolves the permit it received and sends it back
    /// through
    /// [`StateManager::complete_permit`](crate::engine::StateManager::complete_permit).
    pub fn resolve(&mut self, status: PermitStatus) -> Result<(), PermitError> {
        if self.status.is_resolved() {
            return Err(PermitError::AlreadyResolved {
                id: self.id,
                status: self.status,
            });
        }
        if !status.is_resolved() {
            return Err(PermitError::UnknownResolution { id: self.id });
        }
        self.status = status;
        Ok(())
    }
}
