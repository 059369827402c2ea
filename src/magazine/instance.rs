use super::MagazineState;
use crate::core::{InstanceId, InstanceKind, OwnerId, StateSlot, StatefulInstance};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A type of round a magazine can hold.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct RoundKind(&'static str);

impl RoundKind {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for RoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Static description of a magazine item.
#[derive(Clone, Debug, PartialEq)]
pub struct MagazineSpec {
    pub name: &'static str,
    pub capacity: u64,
    /// Round kinds this magazine accepts, in preference order.
    pub compatible: Vec<RoundKind>,
}

impl MagazineSpec {
    pub fn new(name: &'static str, capacity: u64, compatible: Vec<RoundKind>) -> Self {
        Self {
            name,
            capacity,
            compatible,
        }
    }
}

/// Magazines put back into an owner's inventory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StowedMagazine {
    pub magazine: String,
    pub count: u32,
    pub rounds: u64,
}

/// What an owner carries besides the held magazine.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Inventory {
    rounds: Vec<(RoundKind, u64)>,
    free_slots: usize,
    stowed: Vec<StowedMagazine>,
}

impl Inventory {
    pub fn new(free_slots: usize) -> Self {
        Self {
            free_slots,
            ..Self::default()
        }
    }

    pub fn with_rounds(mut self, kind: RoundKind, count: u64) -> Self {
        self.add_rounds(kind, count);
        self
    }

    pub fn rounds(&self, kind: RoundKind) -> u64 {
        self.rounds
            .iter()
            .find(|(k, _)| *k == kind)
            .map_or(0, |(_, count)| *count)
    }

    pub fn add_rounds(&mut self, kind: RoundKind, count: u64) {
        if count == 0 {
            return;
        }
        match self.rounds.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, held)) => *held = held.saturating_add(count),
            None => self.rounds.push((kind, count)),
        }
    }

    /// Take up to `wanted` rounds of the `compatible` kinds, in order.
    /// Returns how many were taken.
    pub fn consume(&mut self, compatible: &[RoundKind], wanted: u64) -> u64 {
        let mut taken = 0;
        for kind in compatible {
            if taken == wanted {
                break;
            }
            if let Some((_, held)) = self.rounds.iter_mut().find(|(k, _)| k == kind) {
                let portion = (*held).min(wanted - taken);
                *held -= portion;
                taken += portion;
            }
        }
        self.rounds.retain(|(_, held)| *held > 0);
        taken
    }

    pub fn free_slots(&self) -> usize {
        self.free_slots
    }

    pub fn has_free_slot(&self) -> bool {
        self.free_slots > 0
    }

    /// Put a magazine stack into a free slot.
    pub fn stow(&mut self, magazine: StowedMagazine) {
        self.free_slots = self.free_slots.saturating_sub(1);
        self.stowed.push(magazine);
    }

    pub fn stowed(&self) -> &[StowedMagazine] {
        &self.stowed
    }
}

/// An owner's inventory, shared between the owner and the magazines it
/// holds.
#[derive(Clone, Debug, Default)]
pub struct SharedInventory(Arc<Mutex<Inventory>>);

impl SharedInventory {
    pub fn new(inventory: Inventory) -> Self {
        Self(Arc::new(Mutex::new(inventory)))
    }

    pub fn lock(&self) -> MutexGuard<'_, Inventory> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A stack of identical magazines held by an owner.
#[derive(Debug)]
pub struct MagazineInstance {
    id: InstanceId,
    owner: OwnerId,
    spec: Arc<MagazineSpec>,
    inventory: SharedInventory,
    slot: StateSlot<MagazineState>,
    rounds: u64,
    stack: u32,
}

impl MagazineInstance {
    pub fn new(
        owner: OwnerId,
        spec: Arc<MagazineSpec>,
        inventory: SharedInventory,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: InstanceId::new(),
            owner,
            spec,
            inventory,
            slot: StateSlot::new(MagazineState::Ready, at),
            rounds: 0,
            stack: 1,
        }
    }

    /// Rounds in each magazine of the stack, capped at capacity.
    pub fn with_rounds(mut self, rounds: u64) -> Self {
        self.rounds = rounds.min(self.spec.capacity);
        self
    }

    pub fn with_stack(mut self, stack: u32) -> Self {
        self.stack = stack.max(1);
        self
    }

    pub fn spec(&self) -> &MagazineSpec {
        &self.spec
    }

    pub fn inventory(&self) -> &SharedInventory {
        &self.inventory
    }

    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    pub fn stack(&self) -> u32 {
        self.stack
    }

    pub fn is_full(&self) -> bool {
        self.rounds >= self.spec.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.rounds == 0
    }

    pub fn deficit(&self) -> u64 {
        self.spec.capacity.saturating_sub(self.rounds)
    }

    pub(crate) fn fill(&mut self, amount: u64) {
        self.rounds = self.rounds.saturating_add(amount).min(self.spec.capacity);
    }

    pub(crate) fn drain(&mut self, amount: u64) {
        self.rounds = self.rounds.saturating_sub(amount);
    }

    /// Keep a single magazine and return the rest of the stack.
    pub(crate) fn split_off(&mut self) -> Option<StowedMagazine> {
        if self.stack <= 1 {
            return None;
        }

        let rest = StowedMagazine {
            magazine: self.spec.name.to_string(),
            count: self.stack - 1,
            rounds: self.rounds,
        };
        self.stack = 1;
        Some(rest)
    }
}

impl StatefulInstance for MagazineInstance {
    type State = MagazineState;

    fn id(&self) -> InstanceId {
        self.id
    }

    fn kind(&self) -> InstanceKind {
        super::MAGAZINE
    }

    fn owner(&self) -> OwnerId {
        self.owner
    }

    fn state(&self) -> &MagazineState {
        self.slot.state()
    }

    fn state_updated_at(&self) -> DateTime<Utc> {
        self.slot.updated_at()
    }

    fn set_state(&mut self, state: MagazineState, at: DateTime<Utc>) {
        self.slot.set(state, at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NATO: RoundKind = RoundKind::new("5.56x45");
    const TRACER: RoundKind = RoundKind::new("5.56x45 tracer");

    fn stanag() -> Arc<MagazineSpec> {
        Arc::new(MagazineSpec::new("stanag", 30, vec![NATO, TRACER]))
    }

    #[test]
    fn consume_takes_compatible_kinds_in_order() {
        let mut inventory = Inventory::new(0)
            .with_rounds(TRACER, 40)
            .with_rounds(NATO, 10);

        let taken = inventory.consume(&[NATO, TRACER], 25);

        assert_eq!(taken, 25);
        assert_eq!(inventory.rounds(NATO), 0);
        assert_eq!(inventory.rounds(TRACER), 25);
    }

    #[test]
    fn consume_is_limited_by_supply() {
        let mut inventory = Inventory::new(0).with_rounds(NATO, 7);

        assert_eq!(inventory.consume(&[NATO], 30), 7);
        assert_eq!(inventory.consume(&[NATO], 30), 0);
    }

    #[test]
    fn consume_ignores_incompatible_rounds() {
        let mut inventory = Inventory::new(0).with_rounds(RoundKind::new("9mm"), 50);
        assert_eq!(inventory.consume(&[NATO], 30), 0);
    }

    #[test]
    fn stow_uses_a_slot() {
        let mut inventory = Inventory::new(1);
        inventory.stow(StowedMagazine {
            magazine: "stanag".to_string(),
            count: 2,
            rounds: 0,
        });

        assert!(!inventory.has_free_slot());
        assert_eq!(inventory.stowed().len(), 1);
    }

    #[test]
    fn split_off_keeps_one_magazine() {
        let mut magazine = MagazineInstance::new(
            OwnerId::new(),
            stanag(),
            SharedInventory::default(),
            Utc::now(),
        )
        .with_rounds(12)
        .with_stack(3);

        let rest = magazine.split_off().unwrap();

        assert_eq!(rest.count, 2);
        assert_eq!(rest.rounds, 12);
        assert_eq!(magazine.stack(), 1);
        assert!(magazine.split_off().is_none());
    }

    #[test]
    fn fill_is_capped_at_capacity() {
        let mut magazine = MagazineInstance::new(
            OwnerId::new(),
            stanag(),
            SharedInventory::default(),
            Utc::now(),
        )
        .with_rounds(25);

        assert_eq!(magazine.deficit(), 5);
        magazine.fill(10);
        assert!(magazine.is_full());
        magazine.drain(30);
        assert!(magazine.is_empty());
    }

    #[test]
    fn new_magazine_is_ready() {
        let magazine = MagazineInstance::new(
            OwnerId::new(),
            stanag(),
            SharedInventory::default(),
            Utc::now(),
        );
        assert_eq!(magazine.state(), &MagazineState::Ready);
        assert_eq!(magazine.kind(), super::super::MAGAZINE);
    }
}
