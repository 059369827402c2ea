//! Transition rules.

use crate::core::{Guard, StatefulInstance};
use crate::permit::Permit;
use chrono::{DateTime, Utc};
use std::sync::Arc;

type StateOf<I> = <I as StatefulInstance>::State;

/// Builds the permit for a manual transition from the requested target
/// state and the instance.
pub type PermitFactory<I> = Arc<dyn Fn(&StateOf<I>, &I) -> Permit<StateOf<I>> + Send + Sync>;

/// Completion callback: `(instance, from, to, permit)`. The permit is
/// `None` for transitions that need no authorization and always granted
/// otherwise.
pub type TransitionAction<I> =
    Arc<dyn Fn(&mut I, &StateOf<I>, &StateOf<I>, Option<&Permit<StateOf<I>>>) + Send + Sync>;

/// How a transition is triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// Fires only on an explicit request naming the target state
    Manual,
    /// Fires during a sweep whenever the guard holds
    Automatic,
}

/// One row of a transition table.
pub struct Rule<I: StatefulInstance> {
    pub(crate) from: I::State,
    pub(crate) to: I::State,
    pub(crate) guard: Option<Guard<I>>,
    pub(crate) kind: TransitionKind,
    pub(crate) permit: Option<PermitFactory<I>>,
    pub(crate) action: Option<TransitionAction<I>>,
}

impl<I: StatefulInstance> Rule<I> {
    pub fn from(&self) -> &I::State {
        &self.from
    }

    pub fn to(&self) -> &I::State {
        &self.to
    }

    pub fn kind(&self) -> TransitionKind {
        self.kind
    }

    pub fn requires_permit(&self) -> bool {
        self.permit.is_some()
    }

    /// Check if this rule can fire for the instance at `now` (pure).
    pub fn can_fire(&self, instance: &I, now: DateTime<Utc>) -> bool {
        if *instance.state() != self.from {
            return false;
        }

        self.guard.as_ref().is_none_or(|g| g.check(instance, now))
    }

    pub(crate) fn issue_permit(&self, instance: &I) -> Option<Permit<I::State>> {
        self.permit.as_ref().map(|factory| factory(&self.to, instance))
    }

    pub(crate) fn run_action(&self, instance: &mut I, permit: Option<&Permit<I::State>>) {
        if let Some(action) = &self.action {
            action(instance, &self.from, &self.to, permit);
        }
    }
}

impl<I: StatefulInstance> Clone for Rule<I> {
    fn clone(&self) -> Self {
        Self {
            from: self.from.clone(),
            to: self.to.clone(),
            guard: self.guard.clone(),
            kind: self.kind,
            permit: self.permit.clone(),
            action: self.action.clone(),
        }
    }
}

impl<I: StatefulInstance> std::fmt::Debug for Rule<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("kind", &self.kind)
            .field("guarded", &self.guard.is_some())
            .field("permit", &self.permit.is_some())
            .finish()
    }
}
