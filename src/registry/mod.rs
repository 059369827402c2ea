//! Permit type registry.
//!
//! Maps every permit kind to a stable numeric identifier so that a transport
//! can put permits on the wire and turn them back into [`Permit`] values on
//! the other side. The registry is the only thing the engine exposes to a
//! transport; how envelopes are encoded into bytes is the transport's
//! business.
//!
//! # Example
//!
//! ```rust
//! use permitflow::permit::{Permit, PermitKind};
//! use permitflow::registry::TypeRegistry;
//! # use permitflow::core::State;
//! # use serde::{Deserialize, Serialize};
//! # #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
//! # enum Hatch { Closed, Open }
//! # impl State for Hatch {
//! #     fn name(&self) -> &str { "Hatch" }
//! # }
//!
//! const OPEN: PermitKind = PermitKind::new("hatch.open");
//!
//! let registry = TypeRegistry::new();
//! let id = registry.register(OPEN).unwrap();
//! assert_eq!(registry.register(OPEN).unwrap(), id);
//!
//! let permit = Permit::new(OPEN, Hatch::Open);
//! let envelope = registry.encode(&permit).unwrap();
//! assert_eq!(envelope.type_id, id);
//!
//! let back = registry.decode(envelope).unwrap();
//! assert_eq!(back, permit);
//! ```

use crate::core::State;
use crate::permit::{Permit, PermitKind, PermitStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{OnceLock, PoisonError, RwLock};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Stable wire identifier of a permit kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermitTypeId(u16);

impl PermitTypeId {
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for PermitTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Errors raised by the type registry.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RegistryError {
    #[error("Permit kind '{0}' is not registered")]
    Unregistered(PermitKind),

    #[error("No permit kind is registered under {0}")]
    UnknownTypeId(PermitTypeId),

    #[error("Identifier {id} is already assigned to permit kind '{existing}'")]
    IdConflict { id: PermitTypeId, existing: PermitKind },

    #[error("Permit kind '{kind}' is already registered as {existing}, not {requested}")]
    KindConflict {
        kind: PermitKind,
        existing: PermitTypeId,
        requested: PermitTypeId,
    },

    #[error("Permit type identifiers exhausted")]
    Exhausted,
}

/// Transport-facing form of a permit: the kind is replaced by its
/// registered identifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PermitEnvelope<S: State> {
    pub type_id: PermitTypeId,
    pub permit_id: Uuid,
    pub target: S,
    pub status: PermitStatus,
    pub amount: Option<u64>,
    pub issued_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    ids: HashMap<PermitKind, PermitTypeId>,
    kinds: BTreeMap<PermitTypeId, PermitKind>,
}

impl Inner {
    fn insert(&mut self, kind: PermitKind, id: PermitTypeId) {
        self.ids.insert(kind, id);
        self.kinds.insert(id, kind);
        debug!(permit = %kind, id = %id, "registered permit kind");
    }

    fn next_free(&self) -> Option<PermitTypeId> {
        (0..=u16::MAX)
            .map(PermitTypeId)
            .find(|id| !self.kinds.contains_key(id))
    }
}

pub struct TypeRegistry {
    inner: RwLock<Inner>,
}

static GLOBAL: OnceLock<TypeRegistry> = OnceLock::new();

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Process-wide registry, created on first access.
    pub fn global() -> &'static TypeRegistry {
        GLOBAL.get_or_init(TypeRegistry::new)
    }

    /// Register a kind, assigning the lowest free identifier. Registering an
    /// already known kind returns its existing identifier.
    pub fn register(&self, kind: PermitKind) -> Result<PermitTypeId, RegistryError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = inner.ids.get(&kind) {
            return Ok(*id);
        }

        let id = inner.next_free().ok_or(RegistryError::Exhausted)?;
        inner.insert(kind, id);
        Ok(id)
    }

    /// Register a kind under an explicit identifier, for transports that
    /// pin identifiers across processes.
    pub fn register_as(&self, kind: PermitKind, id: PermitTypeId) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = inner.ids.get(&kind) {
            return if *existing == id {
                Ok(())
            } else {
                Err(RegistryError::KindConflict {
                    kind,
                    existing: *existing,
                    requested: id,
                })
            };
        }

        if let Some(existing) = inner.kinds.get(&id) {
            return Err(RegistryError::IdConflict {
                id,
                existing: *existing,
            });
        }

        inner.insert(kind, id);
        Ok(())
    }

    pub fn id_of(&self, kind: PermitKind) -> Option<PermitTypeId> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ids
            .get(&kind)
            .copied()
    }

    pub fn kind_of(&self, id: PermitTypeId) -> Option<PermitKind> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .kinds
            .get(&id)
            .copied()
    }

    /// All registered kinds, ordered by identifier.
    pub fn kinds(&self) -> Vec<(PermitTypeId, PermitKind)> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .kinds
            .iter()
            .map(|(id, kind)| (*id, *kind))
            .collect()
    }

    pub fn encode<S: State>(&self, permit: &Permit<S>) -> Result<PermitEnvelope<S>, RegistryError> {
        let type_id = self
            .id_of(permit.kind())
            .ok_or(RegistryError::Unregistered(permit.kind()))?;

        Ok(PermitEnvelope {
            type_id,
            permit_id: permit.id(),
            target: permit.target().clone(),
            status: permit.status(),
            amount: permit.amount(),
            issued_at: permit.issued_at(),
        })
    }

    pub fn decode<S: State>(&self, envelope: PermitEnvelope<S>) -> Result<Permit<S>, RegistryError> {
        let kind = self
            .kind_of(envelope.type_id)
            .ok_or(RegistryError::UnknownTypeId(envelope.type_id))?;

        Ok(Permit::from_parts(
            envelope.permit_id,
            kind,
            envelope.target,
            envelope.status,
            envelope.amount,
            envelope.issued_at,
        ))
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
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

    const LOAD: PermitKind = PermitKind::new("test.load");
    const UNLOAD: PermitKind = PermitKind::new("test.unload");

    #[test]
    fn register_assigns_sequential_ids() {
        let registry = TypeRegistry::new();
        let load = registry.register(LOAD).unwrap();
        let unload = registry.register(UNLOAD).unwrap();

        assert_eq!(load, PermitTypeId::new(0));
        assert_eq!(unload, PermitTypeId::new(1));
        assert_eq!(registry.kinds(), vec![(load, LOAD), (unload, UNLOAD)]);
    }

    #[test]
    fn re_registration_is_a_no_op() {
        let registry = TypeRegistry::new();
        let first = registry.register(LOAD).unwrap();
        let second = registry.register(LOAD).unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.kinds().len(), 1);
    }

    #[test]
    fn register_as_guards_duplicate_ids() {
        let registry = TypeRegistry::new();
        registry.register_as(LOAD, PermitTypeId::new(7)).unwrap();
        registry.register_as(LOAD, PermitTypeId::new(7)).unwrap();

        assert_eq!(
            registry.register_as(UNLOAD, PermitTypeId::new(7)),
            Err(RegistryError::IdConflict {
                id: PermitTypeId::new(7),
                existing: LOAD,
            })
        );
        assert!(matches!(
            registry.register_as(LOAD, PermitTypeId::new(8)),
            Err(RegistryError::KindConflict { .. })
        ));
    }

    #[test]
    fn register_skips_pinned_ids() {
        let registry = TypeRegistry::new();
        registry.register_as(LOAD, PermitTypeId::new(0)).unwrap();

        assert_eq!(registry.register(UNLOAD).unwrap(), PermitTypeId::new(1));
    }

    #[test]
    fn encode_requires_registration() {
        let registry = TypeRegistry::new();
        let permit = Permit::new(LOAD, TestState::Load);

        assert_eq!(
            registry.encode(&permit),
            Err(RegistryError::Unregistered(LOAD))
        );
    }

    #[test]
    fn decode_rejects_unknown_ids() {
        let sender = TypeRegistry::new();
        sender.register(LOAD).unwrap();
        let envelope = sender.encode(&Permit::new(LOAD, TestState::Ready)).unwrap();

        let receiver = TypeRegistry::new();
        assert!(matches!(
            receiver.decode(envelope),
            Err(RegistryError::UnknownTypeId(_))
        ));
    }

    #[test]
    fn envelope_serializes_correctly() {
        let registry = TypeRegistry::new();
        registry.register(LOAD).unwrap();
        let mut permit = Permit::new(LOAD, TestState::Load);
        permit.set_amount(12);

        let envelope = registry.encode(&permit).unwrap();
        let json = serde_json::to_string(&envelope).unwrap();
        let back: PermitEnvelope<TestState> = serde_json::from_str(&json).unwrap();

        assert_eq!(registry.decode(back).unwrap(), permit);
    }

    #[test]
    fn global_registry_is_shared() {
        const GLOBAL_KIND: PermitKind = PermitKind::new("test.global");
        let id = TypeRegistry::global().register(GLOBAL_KIND).unwrap();
        assert_eq!(TypeRegistry::global().id_of(GLOBAL_KIND), Some(id));
    }
}
