//! Core types shared by every other module.
//!
//! This module contains the vocabulary of the engine:
//! - State definitions via the `State` trait
//! - The `StatefulInstance` capability and its `StateSlot` helper
//! - Guard predicates for transition control
//! - Clocks and transition records

mod clock;
mod guard;
mod ids;
mod instance;
mod record;
mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use guard::Guard;
pub use ids::{AspectId, InstanceId, InstanceKind, OwnerId};
pub use instance::{StateSlot, StatefulInstance};
pub use record::TransitionRecord;
pub use state::State;
