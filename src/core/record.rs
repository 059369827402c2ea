//! Records of committed transitions.

use super::state::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Record of a single committed transition.
///
/// Records are immutable values returned by the engine whenever an
/// instance's state actually changes.
///
/// # Example
///
/// ```rust
/// use permitflow::core::{State, TransitionRecord};
/// use serde::{Deserialize, Serialize};
/// use chrono::Utc;
///
/// #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
/// enum Valve { Shut, Flowing }
///
/// impl State for Valve {
///     fn name(&self) -> &str {
///         match self {
///             Self::Shut => "Shut",
///             Self::Flowing => "Flowing",
///         }
///     }
/// }
///
/// let record = TransitionRecord {
///     from: Valve::Shut,
///     to: Valve::Flowing,
///     timestamp: Utc::now(),
///     permit: None,
/// };
/// assert!(!record.was_permitted());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct TransitionRecord<S: State> {
    /// Source state
    pub from: S,
    /// Target state
    pub to: S,
    /// Commit time, also written to the instance
    pub timestamp: DateTime<Utc>,
    /// Id of the granted permit, for permit-gated transitions
    pub permit: Option<Uuid>,
}

impl<S: State> TransitionRecord<S> {
    pub fn was_permitted(&self) -> bool {
        self.permit.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
    enum TestState {
        Ready,
        Load,
    }

    impl State for TestState {
        fn name(&self) -> &str {
            match self {
                Self::Ready => "Ready",
                Self::Load => "Load",
            }
        }
    }

    #[test]
    fn record_serializes_correctly() {
        let record = TransitionRecord {
            from: TestState::Ready,
            to: TestState::Load,
            timestamp: Utc::now(),
            permit: Some(Uuid::new_v4()),
        };

        let json = serde_json::to_string(&record).unwrap();
        let back: TransitionRecord<TestState> = serde_json::from_str(&json).unwrap();

        assert_eq!(record, back);
        assert!(back.was_permitted());
    }
}
