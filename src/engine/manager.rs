//! The state manager: drives transitions for every registered aspect.

use crate::aspect::{Aspect, Rule, TableBuilder, TransitionTable};
use crate::config::EngineConfig;
use crate::core::{AspectId, Clock, InstanceId, State, StatefulInstance, SystemClock, TransitionRecord};
use crate::engine::outcome::{EngineError, Skip, TransitionOutcome};
use crate::permit::{PendingPermit, Permit, PermitManager, Resolution};
use crate::registry::TypeRegistry;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Generic transition engine.
///
/// Holds one transition table per aspect. Instances are owned by the caller
/// and passed in by mutable reference; the manager only reads and writes
/// their `(state, timestamp)` pair through [`StatefulInstance`].
///
/// Tables are registered before the manager is shared and are read-only
/// afterwards. Per-instance exclusion for permits is enforced by each
/// table's [`PermitManager`].
pub struct StateManager<I: StatefulInstance> {
    tables: HashMap<AspectId, TransitionTable<I>>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl<I: StatefulInstance> StateManager<I> {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: HashMap::new(),
            clock,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Register a built table.
    pub fn register(&mut self, table: TransitionTable<I>) -> Result<(), EngineError> {
        let aspect = table.aspect();
        if self.tables.contains_key(&aspect) {
            error!(aspect = %aspect, "aspect registered twice");
            return Err(EngineError::DuplicateAspect(aspect));
        }

        info!(aspect = %aspect, rules = table.rules().len(), "registered aspect");
        self.tables.insert(aspect, table);
        Ok(())
    }

    /// Wire an aspect: register its permit kinds, its evaluators, then build
    /// and register its table against `permits`.
    pub fn wire<A: Aspect<I>>(
        &mut self,
        aspect: &A,
        permits: &Arc<PermitManager<I>>,
        registry: &TypeRegistry,
    ) -> Result<(), EngineError> {
        for kind in aspect.permit_kinds() {
            registry.register(kind)?;
        }
        aspect.register_evaluators(permits);

        let builder = aspect
            .instance_kinds()
            .into_iter()
            .fold(TableBuilder::new(aspect.id()), TableBuilder::serves)
            .permit_manager(Arc::clone(permits));
        let table = aspect.define(builder).build()?;
        self.register(table)
    }

    pub fn table(&self, aspect: AspectId) -> Result<&TransitionTable<I>, EngineError> {
        self.tables.get(&aspect).ok_or_else(|| {
            error!(aspect = %aspect, "no such aspect");
            EngineError::UnknownAspect(aspect)
        })
    }

    /// Explicitly request `target` for `instance`.
    ///
    /// A permit-gated transition commits only once its permit is granted.
    /// If the evaluator defers, the instance keeps its state and the result
    /// is [`TransitionOutcome::Pending`]; the verdict is delivered later
    /// through [`StateManager::complete_permit`].
    pub fn request_transition(
        &self,
        aspect: AspectId,
        instance: &mut I,
        target: I::State,
    ) -> Result<TransitionOutcome<I::State>, EngineError> {
        let table = self.table(aspect)?;
        require_kind(table, instance)?;
        require_declared(table, &target)?;
        let from = instance.state().clone();
        require_declared(table, &from)?;

        let now = self.clock.now();
        let permits = table.permit_manager();
        self.expire(permits, instance.id(), now);

        if permits.is_pending(instance.id()) {
            warn!(
                aspect = %aspect,
                instance = %instance.id(),
                owner = %instance.owner(),
                to = target.name(),
                "manual transition refused while a permit is pending"
            );
            return Ok(TransitionOutcome::Skipped(Skip::PermitInFlight));
        }

        let Some(rule) = table.manual(&from, &target) else {
            debug!(
                aspect = %aspect,
                from = from.name(),
                to = target.name(),
                "no manual transition"
            );
            return Ok(TransitionOutcome::Skipped(Skip::NoTransition));
        };

        if !rule.can_fire(instance, now) {
            debug!(
                aspect = %aspect,
                instance = %instance.id(),
                from = from.name(),
                to = target.name(),
                "guard rejected manual transition"
            );
            return Ok(TransitionOutcome::Skipped(Skip::GuardRejected));
        }

        let Some(mut permit) = rule.issue_permit(instance) else {
            let record = commit(rule, instance, now, None);
            return Ok(TransitionOutcome::Committed(record));
        };
        permit.set_issued_at(now);

        let outcome = match permits.resolve(permit, aspect, from.clone(), now, instance)? {
            Resolution::Busy { .. } => TransitionOutcome::Skipped(Skip::PermitInFlight),
            Resolution::Pending(permit) => {
                info!(
                    aspect = %aspect,
                    instance = %instance.id(),
                    permit = %permit.id(),
                    to = target.name(),
                    "transition awaiting permit"
                );
                TransitionOutcome::Pending {
                    permit: permit.id(),
                    from,
                    to: target,
                }
            }
            Resolution::Resolved(permit) if permit.is_granted() => {
                let record = commit(rule, instance, self.clock.now(), Some(&permit));
                TransitionOutcome::Committed(record)
            }
            Resolution::Resolved(permit) => {
                info!(
                    aspect = %aspect,
                    instance = %instance.id(),
                    permit = %permit.id(),
                    to = target.name(),
                    "permit denied"
                );
                TransitionOutcome::Denied {
                    permit: permit.id(),
                    from,
                    to: target,
                }
            }
        };
        Ok(outcome)
    }

    /// Fire the first automatic transition, in registration order, whose
    /// guard holds, provided the instance's current state is one of
    /// `candidates`. Never involves a permit.
    pub fn sweep_from_any_of(
        &self,
        aspect: AspectId,
        instance: &mut I,
        candidates: &[I::State],
    ) -> Result<TransitionOutcome<I::State>, EngineError> {
        let table = self.table(aspect)?;
        require_kind(table, instance)?;
        let from = instance.state().clone();
        require_declared(table, &from)?;

        let now = self.clock.now();
        self.expire(table.permit_manager(), instance.id(), now);

        if !candidates.contains(&from) {
            return Ok(TransitionOutcome::Skipped(Skip::NotCandidate));
        }

        let Some(rule) = table
            .automatic_from(&from)
            .find(|rule| rule.can_fire(instance, now))
        else {
            return Ok(TransitionOutcome::Skipped(Skip::NoTransition));
        };

        let record = commit(rule, instance, now, None);
        Ok(TransitionOutcome::Committed(record))
    }

    /// Deliver an authority's verdict for a deferred permit.
    ///
    /// `verdict` is the pending permit as resolved by its authority, for
    /// example decoded from a [`PermitEnvelope`](crate::registry::PermitEnvelope).
    /// Its amount reaches the transition's action. A grant commits the
    /// transition only if the instance is still in the state the request was
    /// made from; otherwise it is discarded as stale.
    pub fn complete_permit(
        &self,
        aspect: AspectId,
        instance: &mut I,
        verdict: Permit<I::State>,
    ) -> Result<TransitionOutcome<I::State>, EngineError> {
        let table = self.table(aspect)?;
        require_kind(table, instance)?;
        let permits = table.permit_manager();
        self.expire(permits, instance.id(), self.clock.now());

        let permit_id = verdict.id();
        let Some(pending) = permits.complete(instance.id(), verdict)? else {
            debug!(
                aspect = %aspect,
                instance = %instance.id(),
                permit = %permit_id,
                "verdict for a permit that is not pending"
            );
            return Ok(TransitionOutcome::Skipped(Skip::StaleResolution));
        };

        let PendingPermit {
            permit,
            aspect: origin,
            from,
            ..
        } = pending;
        let to = permit.target().clone();

        if !permit.is_granted() {
            info!(
                aspect = %origin,
                instance = %instance.id(),
                permit = %permit.id(),
                to = to.name(),
                "permit denied"
            );
            return Ok(TransitionOutcome::Denied {
                permit: permit.id(),
                from,
                to,
            });
        }

        if *instance.state() != from {
            warn!(
                aspect = %origin,
                instance = %instance.id(),
                permit = %permit.id(),
                expected = from.name(),
                actual = instance.state().name(),
                "discarding grant; state changed while permit was pending"
            );
            return Ok(TransitionOutcome::Skipped(Skip::StaleResolution));
        }

        let Some(rule) = self.table(origin)?.manual(&from, &to) else {
            warn!(aspect = %origin, from = from.name(), to = to.name(), "granted transition no longer exists");
            return Ok(TransitionOutcome::Skipped(Skip::StaleResolution));
        };

        let record = commit(rule, instance, self.clock.now(), Some(&permit));
        Ok(TransitionOutcome::Committed(record))
    }

    /// Drop any pending permit for an instance that left tracked existence.
    pub fn untrack(&self, aspect: AspectId, instance: InstanceId) -> Result<(), EngineError> {
        if let Some(pending) = self.table(aspect)?.permit_manager().forget(instance) {
            debug!(
                aspect = %aspect,
                instance = %instance,
                permit = %pending.permit.id(),
                "dropped pending permit of untracked instance"
            );
        }
        Ok(())
    }

    fn expire(&self, permits: &PermitManager<I>, instance: InstanceId, now: DateTime<Utc>) {
        if let Some(timeout) = self.config.permit_timeout() {
            permits.expire(instance, now, timeout);
        }
    }
}

fn require_kind<I: StatefulInstance>(
    table: &TransitionTable<I>,
    instance: &I,
) -> Result<(), EngineError> {
    let kind = instance.kind();
    if table.serves(kind) {
        return Ok(());
    }

    error!(aspect = %table.aspect(), kind = %kind, instance = %instance.id(), "instance kind not served by aspect");
    Err(EngineError::UnknownInstanceKind {
        aspect: table.aspect(),
        kind,
    })
}

fn require_declared<I: StatefulInstance>(
    table: &TransitionTable<I>,
    state: &I::State,
) -> Result<(), EngineError> {
    if table.declares(state) {
        return Ok(());
    }

    error!(aspect = %table.aspect(), state = state.name(), "state not declared by aspect");
    Err(EngineError::UndeclaredState {
        aspect: table.aspect(),
        state: state.name().to_string(),
    })
}

/// Permit-gated rules run their action before the state changes; the
/// action of an unguarded rule runs after.
fn commit<I: StatefulInstance>(
    rule: &Rule<I>,
    instance: &mut I,
    at: DateTime<Utc>,
    permit: Option<&Permit<I::State>>,
) -> TransitionRecord<I::State> {
    if permit.is_some() {
        rule.run_action(instance, permit);
        instance.set_state(rule.to().clone(), at);
    } else {
        instance.set_state(rule.to().clone(), at);
        rule.run_action(instance, None);
    }

    info!(
        instance = %instance.id(),
        owner = %instance.owner(),
        from = rule.from().name(),
        to = rule.to().name(),
        "transition committed"
    );

    TransitionRecord {
        from: rule.from().clone(),
        to: rule.to().clone(),
        timestamp: at,
        permit: permit.map(|p| p.id()),
    }
}
