//! Guard predicates for controlling transitions.
//!
//! Guards are pure boolean functions over an instance and the current time.
//! They gate both manual and automatic transitions; a guard that returns
//! `false` is never an error, the transition simply does not occur.

use super::instance::StatefulInstance;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

type Predicate<I> = Arc<dyn Fn(&I, DateTime<Utc>) -> bool + Send + Sync>;

/// Pure predicate that determines if a transition can fire.
///
/// # Example
///
/// ```rust
/// use permitflow::core::{Guard, InstanceId, InstanceKind, OwnerId, State, StateSlot, StatefulInstance};
/// use chrono::{DateTime, Duration, Utc};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
/// enum Kettle { Cold, Boiling }
///
/// impl State for Kettle {
///     fn name(&self) -> &str {
///         match self {
///             Self::Cold => "Cold",
///             Self::Boiling => "Boiling",
///         }
///     }
/// }
///
/// struct KettleInstance { id: InstanceId, owner: OwnerId, slot: StateSlot<Kettle>, water: u32 }
///
/// impl StatefulInstance for KettleInstance {
///     type State = Kettle;
///     fn id(&self) -> InstanceId { self.id }
///     fn kind(&self) -> InstanceKind { InstanceKind::new("kettle") }
///     fn owner(&self) -> OwnerId { self.owner }
///     fn state(&self) -> &Kettle { self.slot.state() }
///     fn state_updated_at(&self) -> DateTime<Utc> { self.slot.updated_at() }
///     fn set_state(&mut self, state: Kettle, at: DateTime<Utc>) { self.slot.set(state, at) }
/// }
///
/// let start = Utc::now();
/// let kettle = KettleInstance {
///     id: InstanceId::new(),
///     owner: OwnerId::new(),
///     slot: StateSlot::new(Kettle::Cold, start),
///     water: 3,
/// };
///
/// let has_water = Guard::new(|k: &KettleInstance| k.water > 0);
/// let warmed_up = Guard::elapsed(Duration::seconds(60));
///
/// assert!(has_water.check(&kettle, start));
/// assert!(!warmed_up.check(&kettle, start));
/// assert!(warmed_up.check(&kettle, start + Duration::seconds(60)));
/// ```
pub struct Guard<I> {
    predicate: Predicate<I>,
}

impl<I: StatefulInstance> Guard<I> {
    /// Create a guard over the instance alone.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&I) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(move |instance: &I, _: DateTime<Utc>| predicate(instance)),
        }
    }

    /// Create a guard that also sees the engine's current time.
    pub fn timed<F>(predicate: F) -> Self
    where
        F: Fn(&I, DateTime<Utc>) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
        }
    }

    /// Guard that passes once `duration` has elapsed since the instance's
    /// last committed transition.
    pub fn elapsed(duration: Duration) -> Self {
        Self::timed(move |instance: &I, now| {
            instance
                .state_updated_at()
                .checked_add_signed(duration)
                .is_some_and(|deadline| now >= deadline)
        })
    }

    /// Guard that always passes.
    pub fn always() -> Self {
        Self::timed(|_: &I, _| true)
    }

    /// Both guards must pass.
    pub fn and(self, other: Guard<I>) -> Self {
        let (left, right) = (self.predicate, other.predicate);
        Self {
            predicate: Arc::new(move |instance: &I, now: DateTime<Utc>| {
                left(instance, now) && right(instance, now)
            }),
        }
    }

    /// Check if the guard allows the transition at `now`.
    pub fn check(&self, instance: &I, now: DateTime<Utc>) -> bool {
        (self.predicate)(instance, now)
    }
}

impl<I> Clone for Guard<I> {
    fn clone(&self) -> Self {
        Self {
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<I> std::fmt::Debug for Guard<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guard").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{InstanceId, InstanceKind, OwnerId, State, StateSlot};
    use serde::{Deserialize, Serialize};

    #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
    enum TestState {
        Idle,
        Busy,
    }

    impl State for TestState {
        fn name(&self) -> &str {
            match self {
                Self::Idle => "Idle",
                Self::Busy => "Busy",
            }
        }
    }

    struct Counter {
        id: InstanceId,
        slot: StateSlot<TestState>,
        value: u32,
    }

    impl StatefulInstance for Counter {
        type State = TestState;

        fn id(&self) -> InstanceId {
            self.id
        }

        fn kind(&self) -> InstanceKind {
            InstanceKind::new("counter")
        }

        fn owner(&self) -> OwnerId {
            OwnerId::default()
        }

        fn state(&self) -> &TestState {
            self.slot.state()
        }

        fn state_updated_at(&self) -> DateTime<Utc> {
            self.slot.updated_at()
        }

        fn set_state(&mut self, state: TestState, at: DateTime<Utc>) {
            self.slot.set(state, at);
        }
    }

    fn counter(value: u32, at: DateTime<Utc>) -> Counter {
        Counter {
            id: InstanceId::new(),
            slot: StateSlot::new(TestState::Idle, at),
            value,
        }
    }

    #[test]
    fn guard_reads_instance_fields() {
        let now = Utc::now();
        let guard = Guard::new(|c: &Counter| c.value < 10);

        assert!(guard.check(&counter(3, now), now));
        assert!(!guard.check(&counter(10, now), now));
    }

    #[test]
    fn elapsed_guard_uses_last_transition_timestamp() {
        let start = Utc::now();
        let c = counter(0, start);
        let guard = Guard::<Counter>::elapsed(Duration::milliseconds(1000));

        assert!(!guard.check(&c, start));
        assert!(!guard.check(&c, start + Duration::milliseconds(999)));
        assert!(guard.check(&c, start + Duration::milliseconds(1000)));
    }

    #[test]
    fn and_requires_both() {
        let now = Utc::now();
        let guard = Guard::new(|c: &Counter| c.value > 0).and(Guard::new(|c: &Counter| c.value < 5));

        assert!(guard.check(&counter(2, now), now));
        assert!(!guard.check(&counter(0, now), now));
        assert!(!guard.check(&counter(7, now), now));
    }

    #[test]
    fn guard_is_deterministic() {
        let now = Utc::now();
        let c = counter(4, now);
        let guard = Guard::new(|c: &Counter| c.value % 2 == 0);

        assert_eq!(guard.check(&c, now), guard.check(&c, now));
    }

    #[test]
    fn always_passes() {
        let now = Utc::now();
        assert!(Guard::<Counter>::always().check(&counter(0, now), now));
    }
}
