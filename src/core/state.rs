//! Core State trait for entity states.
//!
//! Every entity variant tracked by the engine declares its states as a
//! finite enumeration implementing this trait.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Trait for entity states.
///
/// States are small immutable values. An instance holds exactly one of them
/// at any time; the engine compares them, clones them into transition
/// records and permits, and serializes them when permits travel to an
/// authority.
///
/// # Required Traits
///
/// - `Clone`: States are copied into permits and transition records
/// - `PartialEq`: States are compared against transition sources and targets
/// - `Debug`: States appear in diagnostics
/// - `Serialize` + `Deserialize`: States travel inside permit envelopes
///
/// # Example
///
/// ```rust
/// use permitflow::core::State;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
/// enum DoorState {
///     Closed,
///     Opening,
///     Open,
/// }
///
/// impl State for DoorState {
///     fn name(&self) -> &str {
///         match self {
///             Self::Closed => "Closed",
///             Self::Opening => "Opening",
///             Self::Open => "Open",
///         }
///     }
/// }
///
/// assert_eq!(DoorState::Opening.name(), "Opening");
/// ```
pub trait State:
    Clone + PartialEq + Debug + Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static
{
    /// Variant name used in logs and diagnostics.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
    enum Breech {
        Closed,
        Cycling { rounds: u32 },
    }

    impl State for Breech {
        fn name(&self) -> &str {
            match self {
                Self::Closed => "Closed",
                Self::Cycling { .. } => "Cycling",
            }
        }
    }

    fn assert_thread_safe<T: Send + Sync + 'static>() {}

    #[test]
    fn data_carrying_variants_share_a_name() {
        assert_eq!(Breech::Cycling { rounds: 1 }.name(), "Cycling");
        assert_eq!(Breech::Cycling { rounds: 9 }.name(), "Cycling");
        assert_ne!(Breech::Cycling { rounds: 1 }, Breech::Cycling { rounds: 9 });
    }

    #[test]
    fn payload_survives_the_wire() {
        let wire = serde_json::to_vec(&Breech::Cycling { rounds: 4 }).unwrap();
        let back: Breech = serde_json::from_slice(&wire).unwrap();
        assert_eq!(back, Breech::Cycling { rounds: 4 });
        assert_ne!(back, Breech::Closed);
    }

    #[test]
    fn states_cross_threads() {
        assert_thread_safe::<Breech>();
    }
}
