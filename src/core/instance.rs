//! The capability the engine requires of any tracked entity.

use super::ids::{InstanceId, InstanceKind, OwnerId};
use super::state::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tracked entity whose state the engine may advance.
///
/// The engine only reads the current state and last-transition timestamp and
/// writes both back through [`StatefulInstance::set_state`]. Everything else
/// about the entity (capacity, contents, owner inventory) is only visible to
/// guards, evaluators and actions written for the concrete type.
pub trait StatefulInstance: Send + Sync + 'static {
    type State: State;

    fn id(&self) -> InstanceId;

    /// Entity variant tag used to select permit evaluators.
    fn kind(&self) -> InstanceKind;

    fn owner(&self) -> OwnerId;

    fn state(&self) -> &Self::State;

    /// When the current state was committed.
    fn state_updated_at(&self) -> DateTime<Utc>;

    /// Commit a new state. Only the engine calls this.
    fn set_state(&mut self, state: Self::State, at: DateTime<Utc>);
}

/// The `(state, timestamp)` pair an instance owns.
///
/// Concrete instances can embed a slot and forward the state accessors of
/// [`StatefulInstance`] to it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateSlot<S: State> {
    state: S,
    updated_at: DateTime<Utc>,
}

impl<S: State> StateSlot<S> {
    pub fn new(state: S, at: DateTime<Utc>) -> Self {
        Self {
            state,
            updated_at: at,
        }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn set(&mut self, state: S, at: DateTime<Utc>) {
        self.state = state;
        self.updated_at = at;
    }
}
