//! Permits and the permit manager.
//!
//! A permit is requested whenever a manual transition that needs
//! authorization is attempted. The permit manager finds the evaluator
//! registered for the permit's kind and the instance's kind, records the
//! verdict, and keeps deferred permits in a per-instance pending book.

mod manager;
mod token;

pub use manager::{Evaluator, PendingPermit, PermitManager, Resolution};
pub use token::{Permit, PermitError, PermitKind, PermitStatus};
