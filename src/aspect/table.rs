//! Transition tables and their fluent builder.

use crate::aspect::error::{BuildError, RuleViolation};
use crate::aspect::rule::{PermitFactory, Rule, TransitionAction, TransitionKind};
use crate::core::{AspectId, Guard, InstanceKind, State, StatefulInstance};
use crate::permit::{Permit, PermitManager};
use std::sync::Arc;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use tracing::{debug, error};

/// The immutable transition table of one aspect.
///
/// Tables are built once while aspects are wired and only read afterwards,
/// so they can be shared freely between threads.
pub struct TransitionTable<I: StatefulInstance> {
    aspect: AspectId,
    kinds: Vec<InstanceKind>,
    rules: Vec<Rule<I>>,
    states: Vec<I::State>,
    permit_manager: Arc<PermitManager<I>>,
}

impl<I: StatefulInstance> TransitionTable<I> {
    /// Start building a table for `aspect`.
    pub fn builder(aspect: AspectId) -> TableBuilder<I> {
        TableBuilder::new(aspect)
    }

    pub fn aspect(&self) -> AspectId {
        self.aspect
    }

    pub fn instance_kinds(&self) -> &[InstanceKind] {
        &self.kinds
    }

    pub fn serves(&self, kind: InstanceKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Rules in registration order.
    pub fn rules(&self) -> &[Rule<I>] {
        &self.rules
    }

    /// Every state the aspect mentions, in first-seen order.
    pub fn states(&self) -> &[I::State] {
        &self.states
    }

    pub fn declares(&self, state: &I::State) -> bool {
        self.states.contains(state)
    }

    /// The manual rule from `from` to `to`, if one is registered.
    pub fn manual(&self, from: &I::State, to: &I::State) -> Option<&Rule<I>> {
        self.rules
            .iter()
            .find(|r| r.kind == TransitionKind::Manual && r.from == *from && r.to == *to)
    }

    /// Automatic rules leaving `from`, in registration order.
    pub fn automatic_from<'a>(&'a self, from: &'a I::State) -> impl Iterator<Item = &'a Rule<I>> + 'a {
        self.rules
            .iter()
            .filter(move |r| r.kind == TransitionKind::Automatic && r.from == *from)
    }

    pub fn permit_manager(&self) -> &Arc<PermitManager<I>> {
        &self.permit_manager
    }
}

/// A rule between `.change()` and its `.manual()`/`.automatic()`.
struct OpenRule<I: StatefulInstance> {
    from: I::State,
    to: Option<I::State>,
    guard: Option<Guard<I>>,
    permit: Option<PermitFactory<I>>,
    action: Option<TransitionAction<I>>,
}

impl<I: StatefulInstance> OpenRule<I> {
    fn unterminated(&self) -> RuleViolation {
        match &self.to {
            Some(to) => RuleViolation::Unterminated {
                from: self.from.name().to_string(),
                to: to.name().to_string(),
            },
            None => RuleViolation::MissingTarget {
                from: self.from.name().to_string(),
            },
        }
    }
}

/// Fluent builder for a [`TransitionTable`].
///
/// Each transition starts with `.change(from)` and ends with exactly one of
/// `.manual()` or `.automatic()`. Mistakes are collected while building and
/// reported together by `.build()`.
///
/// # Example
///
/// ```rust
/// use permitflow::aspect::TransitionTable;
/// use permitflow::core::{AspectId, InstanceId, InstanceKind, OwnerId, StateSlot, StatefulInstance};
/// use permitflow::permit::{Permit, PermitKind, PermitManager};
/// use permitflow::state_enum;
/// use chrono::{DateTime, Duration, Utc};
/// use std::sync::Arc;
///
/// state_enum! {
///     pub enum Drawbridge {
///         Down,
///         Raising,
///         Up,
///     }
/// }
///
/// struct Bridge { id: InstanceId, slot: StateSlot<Drawbridge> }
///
/// impl StatefulInstance for Bridge {
///     type State = Drawbridge;
///     fn id(&self) -> InstanceId { self.id }
///     fn kind(&self) -> InstanceKind { InstanceKind::new("bridge") }
///     fn owner(&self) -> OwnerId { OwnerId::default() }
///     fn state(&self) -> &Drawbridge { self.slot.state() }
///     fn state_updated_at(&self) -> DateTime<Utc> { self.slot.updated_at() }
///     fn set_state(&mut self, state: Drawbridge, at: DateTime<Utc>) { self.slot.set(state, at) }
/// }
///
/// const RAISE: PermitKind = PermitKind::new("bridge.raise");
///
/// let permits = Arc::new(PermitManager::<Bridge>::new());
/// let table = TransitionTable::builder(AspectId::new("bridge.lift"))
///     .permit_manager(permits)
///     .serves(InstanceKind::new("bridge"))
///     .change(Drawbridge::Down).to(Drawbridge::Raising)
///         .with_permit(|to, _| Permit::new(RAISE, to.clone()))
///         .manual()
///     .change(Drawbridge::Raising).to(Drawbridge::Up)
///         .guard(permitflow::core::Guard::elapsed(Duration::seconds(5)))
///         .automatic()
///     .build()
///     .unwrap();
///
/// assert_eq!(table.rules().len(), 2);
/// assert!(table.declares(&Drawbridge::Up));
/// ```
pub struct TableBuilder<I: StatefulInstance> {
    aspect: AspectId,
    kinds: Vec<InstanceKind>,
    permit_manager: Option<Arc<PermitManager<I>>>,
    rules: Vec<Rule<I>>,
    extra_states: Vec<I::State>,
    open: Option<OpenRule<I>>,
    violations: Vec<RuleViolation>,
}

impl<I: StatefulInstance> TableBuilder<I> {
    pub fn new(aspect: AspectId) -> Self {
        Self {
            aspect,
            kinds: Vec::new(),
            permit_manager: None,
            rules: Vec::new(),
            extra_states: Vec::new(),
            open: None,
            violations: Vec::new(),
        }
    }

    /// Set the permit manager (required).
    pub fn permit_manager(mut self, manager: Arc<PermitManager<I>>) -> Self {
        self.permit_manager = Some(manager);
        self
    }

    /// Accept instances of `kind` (at least one is required).
    pub fn serves(mut self, kind: InstanceKind) -> Self {
        if !self.kinds.contains(&kind) {
            self.kinds.push(kind);
        }
        self
    }

    /// Declare a state that no transition mentions.
    pub fn declare(mut self, state: I::State) -> Self {
        self.extra_states.push(state);
        self
    }

    /// Declare every state in `states`.
    pub fn declare_all(mut self, states: impl IntoIterator<Item = I::State>) -> Self {
        self.extra_states.extend(states);
        self
    }

    /// Start a transition from `state`.
    pub fn change(mut self, state: I::State) -> Self {
        if let Some(open) = self.open.take() {
            self.violations.push(open.unterminated());
        }
        self.open = Some(OpenRule {
            from: state,
            to: None,
            guard: None,
            permit: None,
            action: None,
        });
        self
    }

    /// Set the target state (required).
    pub fn to(mut self, state: I::State) -> Self {
        match self.open.as_mut() {
            Some(open) => open.to = Some(state),
            None => self.violations.push(RuleViolation::NoOpenRule { call: "to" }),
        }
        self
    }

    /// Add a guard (optional).
    pub fn guard(mut self, guard: Guard<I>) -> Self {
        match self.open.as_mut() {
            Some(open) => open.guard = Some(guard),
            None => self.violations.push(RuleViolation::NoOpenRule { call: "guard" }),
        }
        self
    }

    /// Add a guard using a closure over the instance (optional).
    pub fn when<F>(self, predicate: F) -> Self
    where
        F: Fn(&I) -> bool + Send + Sync + 'static,
    {
        self.guard(Guard::new(predicate))
    }

    /// Require a permit before the transition commits. Only valid on
    /// manual transitions.
    pub fn with_permit<F>(mut self, factory: F) -> Self
    where
        F: Fn(&I::State, &I) -> Permit<I::State> + Send + Sync + 'static,
    {
        match self.open.as_mut() {
            Some(open) => open.permit = Some(Arc::new(factory)),
            None => self
                .violations
                .push(RuleViolation::NoOpenRule { call: "with_permit" }),
        }
        self
    }

    /// Run `action` when the transition commits (optional).
    pub fn with_action<F>(mut self, action: F) -> Self
    where
        F: Fn(&mut I, &I::State, &I::State, Option<&Permit<I::State>>) + Send + Sync + 'static,
    {
        match self.open.as_mut() {
            Some(open) => open.action = Some(Arc::new(action)),
            None => self
                .violations
                .push(RuleViolation::NoOpenRule { call: "with_action" }),
        }
        self
    }

    /// Finalize the open transition as fired only on explicit request.
    pub fn manual(self) -> Self {
        self.finish(TransitionKind::Manual)
    }

    /// Finalize the open transition as fired by sweeps whenever its guard
    /// holds.
    pub fn automatic(self) -> Self {
        self.finish(TransitionKind::Automatic)
    }

    fn finish(mut self, kind: TransitionKind) -> Self {
        let call = match kind {
            TransitionKind::Manual => "manual",
            TransitionKind::Automatic => "automatic",
        };

        let Some(open) = self.open.take() else {
            self.violations.push(RuleViolation::NoOpenRule { call });
            return self;
        };

        let Some(to) = open.to else {
            self.violations.push(RuleViolation::MissingTarget {
                from: open.from.name().to_string(),
            });
            return self;
        };

        if kind == TransitionKind::Automatic && open.permit.is_some() {
            self.violations.push(RuleViolation::PermitOnAutomatic {
                from: open.from.name().to_string(),
                to: to.name().to_string(),
            });
            return self;
        }

        self.rules.push(Rule {
            from: open.from,
            to,
            guard: open.guard,
            kind,
            permit: open.permit,
            action: open.action,
        });
        self
    }

    /// Build the table, reporting every violation at once.
    pub fn build(self) -> Result<TransitionTable<I>, BuildError> {
        let aspect = self.aspect;
        let Some(permit_manager) = self.permit_manager else {
            error!(aspect = %aspect, "transition table built without a permit manager");
            return Err(BuildError::MissingPermitManager { aspect });
        };
        if self.kinds.is_empty() {
            error!(aspect = %aspect, "transition table serves no instance kind");
            return Err(BuildError::NoInstanceKind { aspect });
        }

        let mut checks: Vec<Validation<(), NonEmptyVec<RuleViolation>>> = self
            .violations
            .into_iter()
            .map(|violation| Validation::fail(violation))
            .collect();

        if let Some(open) = &self.open {
            checks.push(Validation::fail(open.unterminated()));
        }

        for (index, rule) in self.rules.iter().enumerate() {
            let duplicate = self.rules[..index]
                .iter()
                .any(|earlier| earlier.from == rule.from && earlier.to == rule.to);
            let check = if duplicate {
                Validation::fail(RuleViolation::Duplicate {
                    from: rule.from.name().to_string(),
                    to: rule.to.name().to_string(),
                })
            } else {
                Validation::success(())
            };
            checks.push(check);
        }

        if let Validation::Failure(errors) = Validation::all_vec(checks).map(|_| ()) {
            let violations: Vec<RuleViolation> = errors.iter().cloned().collect();
            for violation in &violations {
                error!(aspect = %aspect, %violation, "invalid transition");
            }
            return Err(BuildError::Invalid { aspect, violations });
        }

        if self.rules.is_empty() {
            return Err(BuildError::NoTransitions { aspect });
        }

        let mut states: Vec<I::State> = Vec::new();
        let mentioned = self
            .rules
            .iter()
            .flat_map(|rule| [&rule.from, &rule.to])
            .chain(self.extra_states.iter());
        for state in mentioned {
            if !states.contains(state) {
                states.push(state.clone());
            }
        }

        debug!(
            aspect = %aspect,
            rules = self.rules.len(),
            states = states.len(),
            "built transition table"
        );

        Ok(TransitionTable {
            aspect,
            kinds: self.kinds,
            rules: self.rules,
            states,
            permit_manager,
        })
    }
}
