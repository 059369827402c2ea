//! Aspects and their transition tables.
//!
//! An aspect bundles the transition rules for one entity variant: which
//! states exist, which transitions are manual or automatic, their guards,
//! permit factories and completion actions. Aspects are wired into a
//! [`StateManager`](crate::engine::StateManager) once at startup.

pub mod error;
pub mod macros;
pub mod rule;
pub mod table;

pub use error::{BuildError, RuleViolation};
pub use rule::{PermitFactory, Rule, TransitionAction, TransitionKind};
pub use table::{TableBuilder, TransitionTable};

use crate::core::{AspectId, InstanceKind, StatefulInstance};
use crate::permit::{PermitKind, PermitManager};

/// Definition of one entity variant's transitions.
///
/// Wiring happens in a fixed order: permit kinds are registered with the
/// type registry, evaluators are registered with the permit manager, and
/// only then is the table defined against a builder that already holds that
/// permit manager.
pub trait Aspect<I: StatefulInstance>: Send + Sync {
    fn id(&self) -> AspectId;

    /// Entity variants this aspect drives. Any other kind is refused.
    fn instance_kinds(&self) -> Vec<InstanceKind>;

    /// Permit kinds this aspect issues.
    fn permit_kinds(&self) -> Vec<PermitKind> {
        Vec::new()
    }

    fn register_evaluators(&self, permits: &PermitManager<I>);

    /// Add this aspect's rules to `table`.
    fn define(&self, table: TableBuilder<I>) -> TableBuilder<I>;
}
