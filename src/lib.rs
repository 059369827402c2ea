//! Permitflow: a permit-gated state transition engine
//!
//! Permitflow drives independently owned entities through a finite set of
//! states. Some transitions fire on their own once a guard holds; others are
//! requested explicitly and commit only after an authority grants a permit.
//! State never changes before authorization, so an entity never shows a
//! state that would later have to be rolled back.
//!
//! # Core Concepts
//!
//! - **Stateful instance**: anything with a current state, the time it was
//!   entered, an identity and an owner (see [`core::StatefulInstance`])
//! - **Aspect**: the transition table for one kind of entity, built with a
//!   fluent [`aspect::TableBuilder`] and validated as a whole
//! - **Permit**: authorization for one manual transition, decided by an
//!   evaluator registered per (permit kind, instance kind)
//! - **Sweep**: a re-check of automatic transitions, driven by the caller
//!
//! # Example
//!
//! ```rust
//! use permitflow::config::EngineConfig;
//! use permitflow::core::{OwnerId, StatefulInstance};
//! use permitflow::engine::StateManager;
//! use permitflow::magazine::{
//!     Inventory, MagazineInstance, MagazineReloadAspect, MagazineSpec, MagazineState, RoundKind,
//!     SharedInventory,
//! };
//! use permitflow::permit::PermitManager;
//! use permitflow::registry::TypeRegistry;
//! use std::sync::Arc;
//!
//! const NATO: RoundKind = RoundKind::new("5.56x45");
//!
//! let aspect = MagazineReloadAspect::default();
//! let permits = Arc::new(PermitManager::new());
//! let mut engine = StateManager::new(EngineConfig::default());
//! engine.wire(&aspect, &permits, &TypeRegistry::new()).unwrap();
//!
//! let spec = Arc::new(MagazineSpec::new("stanag", 30, vec![NATO]));
//! let inventory = SharedInventory::new(Inventory::new(4).with_rounds(NATO, 90));
//! let mut magazine = MagazineInstance::new(OwnerId::new(), spec, inventory, chrono::Utc::now());
//!
//! let outcome = aspect.load_held(&engine, &mut magazine).unwrap();
//! assert!(outcome.is_committed());
//! assert_eq!(magazine.state(), &MagazineState::Load);
//! assert_eq!(magazine.rounds(), 30);
//! ```

pub mod aspect;
pub mod config;
pub mod core;
pub mod engine;
pub mod magazine;
pub mod permit;
pub mod registry;

// Re-export commonly used types
pub use aspect::{Aspect, TableBuilder, TransitionTable};
pub use core::{Guard, State, StatefulInstance, TransitionRecord};
pub use engine::{StateManager, TransitionOutcome};
pub use permit::{Permit, PermitKind, PermitManager, PermitStatus};
