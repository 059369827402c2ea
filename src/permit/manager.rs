//! The authorization broker.
//!
//! The permit manager owns two tables: evaluators keyed by
//! (permit kind, instance kind), filled in while aspects are wired, and the
//! book of permits still waiting on an authority, keyed by instance. An
//! instance can have at most one entry in the book.

use crate::core::{AspectId, InstanceId, InstanceKind, State, StatefulInstance};
use crate::permit::token::{Permit, PermitError, PermitKind, PermitStatus};
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Authority-side decision function for one (permit kind, instance kind)
/// pairing.
///
/// Returns the verdict. `Unknown` means the decision was handed off (for
/// example to a remote authority) and will arrive later through
/// [`StateManager::complete_permit`](crate::engine::StateManager::complete_permit).
pub type Evaluator<I> = Arc<
    dyn Fn(&mut Permit<<I as StatefulInstance>::State>, &mut I) -> PermitStatus + Send + Sync,
>;

/// A permit waiting on its authority, with what is needed to finish the
/// transition once it resolves.
#[derive(Clone, Debug)]
pub struct PendingPermit<S: State> {
    pub permit: Permit<S>,
    pub aspect: AspectId,
    /// Source state of the requested transition
    pub from: S,
    pub requested_at: DateTime<Utc>,
}

/// Outcome of [`PermitManager::resolve`].
#[derive(Clone, Debug)]
pub enum Resolution<S: State> {
    /// The evaluator decided on the spot; status is `Granted` or `Denied`.
    Resolved(Permit<S>),

    /// The decision was deferred; the permit is now in the pending book.
    Pending(Permit<S>),

    /// Another permit is already pending for this instance.
    Busy { pending: Uuid },
}

pub struct PermitManager<I: StatefulInstance> {
    evaluators: RwLock<HashMap<(PermitKind, InstanceKind), Evaluator<I>>>,
    pending: DashMap<InstanceId, PendingPermit<I::State>>,
}

impl<I: StatefulInstance> PermitManager<I> {
    pub fn new() -> Self {
        Self {
            evaluators: RwLock::new(HashMap::new()),
            pending: DashMap::new(),
        }
    }

    /// Register the evaluator for a pairing. Registering the same pairing
    /// again replaces the previous evaluator.
    pub fn register_evaluator<F>(&self, permit: PermitKind, instance: InstanceKind, evaluator: F)
    where
        F: Fn(&mut Permit<I::State>, &mut I) -> PermitStatus + Send + Sync + 'static,
    {
        let replaced = self
            .evaluators
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((permit, instance), Arc::new(evaluator))
            .is_some();

        if replaced {
            debug!(permit = %permit, instance = %instance, "replaced permit evaluator");
        } else {
            debug!(permit = %permit, instance = %instance, "registered permit evaluator");
        }
    }

    pub fn has_evaluator(&self, permit: PermitKind, instance: InstanceKind) -> bool {
        self.evaluators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&(permit, instance))
    }

    fn evaluator(&self, permit: PermitKind, instance: InstanceKind) -> Option<Evaluator<I>> {
        self.evaluators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(permit, instance))
            .cloned()
    }

    /// Ask the registered evaluator to decide `permit` for `instance`.
    ///
    /// The instance is reserved in the pending book before the evaluator
    /// runs, so a second attempt on the same instance gets
    /// [`Resolution::Busy`] until this one resolves.
    pub fn resolve(
        &self,
        mut permit: Permit<I::State>,
        aspect: AspectId,
        from: I::State,
        requested_at: DateTime<Utc>,
        instance: &mut I,
    ) -> Result<Resolution<I::State>, PermitError> {
        let evaluator = self
            .evaluator(permit.kind(), instance.kind())
            .ok_or_else(|| {
                error!(
                    permit = %permit.kind(),
                    instance = %instance.kind(),
                    "no evaluator registered for permit pairing"
                );
                PermitError::UnregisteredEvaluator {
                    permit: permit.kind(),
                    instance: instance.kind(),
                }
            })?;

        let instance_id = instance.id();
        match self.pending.entry(instance_id) {
            Entry::Occupied(entry) => {
                let pending = entry.get().permit.id();
                warn!(
                    instance = %instance_id,
                    pending = %pending,
                    rejected = %permit.id(),
                    "permit already pending for instance"
                );
                return Ok(Resolution::Busy { pending });
            }
            Entry::Vacant(entry) => {
                entry.insert(PendingPermit {
                    permit: permit.clone(),
                    aspect,
                    from,
                    requested_at,
                });
            }
        }

        let reservation = Reservation {
            pending: &self.pending,
            instance: instance_id,
            permit: permit.id(),
            release: true,
        };
        let verdict = evaluator(&mut permit, instance);

        if !verdict.is_resolved() {
            if let Some(mut entry) = self.pending.get_mut(&instance_id) {
                entry.permit = permit.clone();
            }
            reservation.keep();
            debug!(instance = %instance_id, permit = %permit.id(), "permit deferred to authority");
            return Ok(Resolution::Pending(permit));
        }

        drop(reservation);
        permit.resolve(verdict)?;
        debug!(
            instance = %instance_id,
            permit = %permit.id(),
            status = ?verdict,
            "permit resolved"
        );
        Ok(Resolution::Resolved(permit))
    }

    /// Deliver a deferred verdict: the permit as resolved by its authority.
    ///
    /// The verdict must carry the pending permit's id, kind and target. Its
    /// status and amount are copied onto the pending permit. Returns `None`
    /// when no pending permit for the instance has this id (already
    /// resolved, expired or forgotten).
    pub fn complete(
        &self,
        instance: InstanceId,
        verdict: Permit<I::State>,
    ) -> Result<Option<PendingPermit<I::State>>, PermitError> {
        let id = verdict.id();
        if !verdict.status().is_resolved() {
            return Err(PermitError::UnknownResolution { id });
        }

        let Some((_, mut pending)) = self.pending.remove_if(&instance, |_, pending| {
            pending.permit.id() == id
                && pending.permit.kind() == verdict.kind()
                && pending.permit.target() == verdict.target()
        }) else {
            if self
                .pending
                .get(&instance)
                .is_some_and(|pending| pending.permit.id() == id)
            {
                error!(
                    instance = %instance,
                    permit = %id,
                    kind = %verdict.kind(),
                    "verdict does not match pending permit"
                );
                return Err(PermitError::MismatchedVerdict { id });
            }
            debug!(instance = %instance, permit = %id, "no pending permit matches verdict");
            return Ok(None);
        };

        pending.permit.resolve(verdict.status())?;
        if let Some(amount) = verdict.amount() {
            pending.permit.set_amount(amount);
        }
        Ok(Some(pending))
    }

    /// Deny the instance's pending permit if it has waited at least
    /// `timeout`.
    pub fn expire(
        &self,
        instance: InstanceId,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> Option<PendingPermit<I::State>> {
        let (_, mut pending) = self
            .pending
            .remove_if(&instance, |_, pending| now - pending.requested_at >= timeout)?;

        if let Err(err) = pending.permit.resolve(PermitStatus::Denied) {
            warn!(instance = %instance, error = %err, "expired permit was already resolved");
        }
        info!(instance = %instance, permit = %pending.permit.id(), "pending permit timed out");
        Some(pending)
    }

    pub fn is_pending(&self, instance: InstanceId) -> bool {
        self.pending.contains_key(&instance)
    }

    pub fn pending_permit(&self, instance: InstanceId) -> Option<Permit<I::State>> {
        self.pending.get(&instance).map(|entry| entry.permit.clone())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drop whatever is pending for an instance that is no longer tracked.
    pub fn forget(&self, instance: InstanceId) -> Option<PendingPermit<I::State>> {
        self.pending.remove(&instance).map(|(_, pending)| pending)
    }
}

/// An instance's slot in the pending book, held while its evaluator runs.
/// Dropped without [`Reservation::keep`] (including on unwind), it frees
/// the slot.
struct Reservation<'a, S: State> {
    pending: &'a DashMap<InstanceId, PendingPermit<S>>,
    instance: InstanceId,
    permit: Uuid,
    release: bool,
}

impl<S: State> Reservation<'_, S> {
    fn keep(mut self) {
        self.release = false;
    }
}

impl<S: State> Drop for Reservation<'_, S> {
    fn drop(&mut self) {
        if self.release {
            let permit = self.permit;
            self.pending
                .remove_if(&self.instance, |_, pending| pending.permit.id() == permit);
        }
    }
}

impl<I: StatefulInstance> Default for PermitManager<I> {
    fn default() -> Self {
        Self::new()
    }
}
