use super::{MagazineConfig, MagazineInstance, MagazineState};
use crate::aspect::{Aspect, TableBuilder};
use crate::core::{AspectId, Guard, InstanceKind, StatefulInstance};
use crate::engine::{EngineError, StateManager, TransitionOutcome};
use crate::permit::{Permit, PermitKind, PermitManager, PermitStatus};
use tracing::debug;

pub const RELOAD: AspectId = AspectId::new("magazine.reload");
pub const MAGAZINE: InstanceKind = InstanceKind::new("magazine");
pub const LOAD: PermitKind = PermitKind::new("magazine.load");
pub const UNLOAD: PermitKind = PermitKind::new("magazine.unload");

/// States from which an update may fire an automatic transition.
const UPDATE_FROM: [MagazineState; 4] = [
    MagazineState::LoadRequested,
    MagazineState::Load,
    MagazineState::UnloadRequested,
    MagazineState::Unload,
];

/// Load and unload for magazines held by an owner.
///
/// The evaluators act as the authority: a load takes compatible rounds
/// from the owner's inventory, an unload hands the magazine's rounds back.
/// The permit carries how many rounds moved; the transition action applies
/// that to the held magazine.
#[derive(Debug, Clone, Default)]
pub struct MagazineReloadAspect {
    config: MagazineConfig,
}

impl MagazineReloadAspect {
    pub fn new(config: MagazineConfig) -> Self {
        Self { config }
    }

    /// Request a load of the held magazine.
    pub fn load_held(
        &self,
        engine: &StateManager<MagazineInstance>,
        magazine: &mut MagazineInstance,
    ) -> Result<TransitionOutcome<MagazineState>, EngineError> {
        engine.request_transition(RELOAD, magazine, MagazineState::Load)
    }

    /// Request an unload of the held magazine.
    pub fn unload_held(
        &self,
        engine: &StateManager<MagazineInstance>,
        magazine: &mut MagazineInstance,
    ) -> Result<TransitionOutcome<MagazineState>, EngineError> {
        engine.request_transition(RELOAD, magazine, MagazineState::Unload)
    }

    /// Let a loading or unloading magazine finish once its time is up.
    pub fn update_held(
        &self,
        engine: &StateManager<MagazineInstance>,
        magazine: &mut MagazineInstance,
    ) -> Result<TransitionOutcome<MagazineState>, EngineError> {
        engine.sweep_from_any_of(RELOAD, magazine, &UPDATE_FROM)
    }
}

impl Aspect<MagazineInstance> for MagazineReloadAspect {
    fn id(&self) -> AspectId {
        RELOAD
    }

    fn instance_kinds(&self) -> Vec<InstanceKind> {
        vec![MAGAZINE]
    }

    fn permit_kinds(&self) -> Vec<PermitKind> {
        vec![LOAD, UNLOAD]
    }

    fn register_evaluators(&self, permits: &PermitManager<MagazineInstance>) {
        permits.register_evaluator(LOAD, MAGAZINE, evaluate_load);
        permits.register_evaluator(UNLOAD, MAGAZINE, evaluate_unload);
    }

    fn define(&self, table: TableBuilder<MagazineInstance>) -> TableBuilder<MagazineInstance> {
        let reloaded = self.config.reload_duration();

        table
            .declare_all(MagazineState::ALL.iter().copied())
            .change(MagazineState::Ready)
            .to(MagazineState::Load)
            .when(|magazine: &MagazineInstance| !magazine.is_full())
            .with_permit(|to, _| Permit::new(LOAD, to.clone()))
            .with_action(|magazine, _, _, permit| {
                magazine.fill(permit.and_then(Permit::amount).unwrap_or(0))
            })
            .manual()
            .change(MagazineState::Load)
            .to(MagazineState::Ready)
            .guard(Guard::elapsed(reloaded))
            .automatic()
            .change(MagazineState::Ready)
            .to(MagazineState::Unload)
            .when(|magazine: &MagazineInstance| !magazine.is_empty())
            .with_permit(|to, _| Permit::new(UNLOAD, to.clone()))
            .with_action(|magazine, _, _, permit| {
                magazine.drain(permit.and_then(Permit::amount).unwrap_or(0))
            })
            .manual()
            .change(MagazineState::Unload)
            .to(MagazineState::Ready)
            .guard(Guard::elapsed(reloaded))
            .automatic()
    }
}

fn evaluate_load(
    permit: &mut Permit<MagazineState>,
    magazine: &mut MagazineInstance,
) -> PermitStatus {
    let shared = magazine.inventory().clone();
    let mut inventory = shared.lock();

    // A stack is split before loading; the rest needs somewhere to go.
    if magazine.stack() > 1 && !inventory.has_free_slot() {
        debug!(
            instance = %magazine.id(),
            owner = %magazine.owner(),
            stack = magazine.stack(),
            "no free slot to split magazine stack"
        );
        return PermitStatus::Denied;
    }

    let taken = inventory.consume(&magazine.spec().compatible, magazine.deficit());
    if taken == 0 {
        debug!(
            instance = %magazine.id(),
            owner = %magazine.owner(),
            "owner has no compatible rounds"
        );
        return PermitStatus::Denied;
    }

    if let Some(rest) = magazine.split_off() {
        inventory.stow(rest);
    }

    permit.set_amount(taken);
    PermitStatus::Granted
}

fn evaluate_unload(
    permit: &mut Permit<MagazineState>,
    magazine: &mut MagazineInstance,
) -> PermitStatus {
    let Some(&kind) = magazine.spec().compatible.first() else {
        debug!(
            instance = %magazine.id(),
            magazine = magazine.spec().name,
            "magazine accepts no rounds"
        );
        return PermitStatus::Denied;
    };

    let shared = magazine.inventory().clone();
    let mut inventory = shared.lock();

    if magazine.stack() > 1 && !inventory.has_free_slot() {
        debug!(
            instance = %magazine.id(),
            owner = %magazine.owner(),
            stack = magazine.stack(),
            "no free slot to split magazine stack"
        );
        return PermitStatus::Denied;
    }

    if let Some(rest) = magazine.split_off() {
        inventory.stow(rest);
    }

    let rounds = magazine.rounds();
    inventory.add_rounds(kind, rounds);
    permit.set_amount(rounds);
    PermitStatus::Granted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::core::{Clock, ManualClock, OwnerId};
    use crate::engine::Skip;
    use crate::magazine::{Inventory, MagazineSpec, RoundKind, SharedInventory};
    use crate::registry::TypeRegistry;
    use chrono::Duration;
    use std::sync::Arc;

    const NATO: RoundKind = RoundKind::new("5.56x45");

    struct Rig {
        clock: Arc<ManualClock>,
        engine: StateManager<MagazineInstance>,
        aspect: MagazineReloadAspect,
        inventory: SharedInventory,
    }

    fn rig(inventory: Inventory) -> Rig {
        let clock = Arc::new(ManualClock::default());
        let permits = Arc::new(PermitManager::<MagazineInstance>::new());
        let registry = TypeRegistry::new();
        let aspect = MagazineReloadAspect::default();
        let mut engine = StateManager::with_clock(EngineConfig::default(), clock.clone());
        engine.wire(&aspect, &permits, &registry).unwrap();

        Rig {
            clock,
            engine,
            aspect,
            inventory: SharedInventory::new(inventory),
        }
    }

    fn magazine(rig: &Rig, rounds: u64) -> MagazineInstance {
        let spec = Arc::new(MagazineSpec::new("stanag", 30, vec![NATO]));
        MagazineInstance::new(OwnerId::new(), spec, rig.inventory.clone(), rig.clock.now())
            .with_rounds(rounds)
    }

    #[test]
    fn load_takes_the_deficit_from_the_owner() {
        let rig = rig(Inventory::new(0).with_rounds(NATO, 100));
        let mut mag = magazine(&rig, 10);

        let outcome = rig.aspect.load_held(&rig.engine, &mut mag).unwrap();

        assert!(outcome.is_committed());
        assert_eq!(mag.state(), &MagazineState::Load);
        assert_eq!(mag.rounds(), 30);
        assert_eq!(rig.inventory.lock().rounds(NATO), 80);
    }

    #[test]
    fn load_with_partial_supply_fills_what_it_can() {
        let rig = rig(Inventory::new(0).with_rounds(NATO, 4));
        let mut mag = magazine(&rig, 0);

        rig.aspect.load_held(&rig.engine, &mut mag).unwrap();

        assert_eq!(mag.rounds(), 4);
        assert_eq!(rig.inventory.lock().rounds(NATO), 0);
    }

    #[test]
    fn load_without_rounds_is_denied() {
        let rig = rig(Inventory::new(0));
        let mut mag = magazine(&rig, 0);

        let outcome = rig.aspect.load_held(&rig.engine, &mut mag).unwrap();

        assert!(matches!(outcome, TransitionOutcome::Denied { .. }));
        assert_eq!(mag.state(), &MagazineState::Ready);
    }

    #[test]
    fn stacked_load_needs_a_free_slot() {
        let rig = rig(Inventory::new(0).with_rounds(NATO, 100));
        let mut mag = magazine(&rig, 0).with_stack(3);

        let outcome = rig.aspect.load_held(&rig.engine, &mut mag).unwrap();

        assert!(matches!(outcome, TransitionOutcome::Denied { .. }));
        assert_eq!(mag.stack(), 3);
        assert_eq!(rig.inventory.lock().rounds(NATO), 100);
    }

    #[test]
    fn stacked_load_splits_off_the_rest() {
        let rig = rig(Inventory::new(1).with_rounds(NATO, 100));
        let mut mag = magazine(&rig, 0).with_stack(3);

        rig.aspect.load_held(&rig.engine, &mut mag).unwrap();

        assert_eq!(mag.stack(), 1);
        assert_eq!(mag.rounds(), 30);
        let inventory = rig.inventory.lock();
        assert_eq!(inventory.stowed().len(), 1);
        assert_eq!(inventory.stowed()[0].count, 2);
        assert_eq!(inventory.stowed()[0].rounds, 0);
    }

    #[test]
    fn unload_returns_rounds_to_the_owner() {
        let rig = rig(Inventory::new(0));
        let mut mag = magazine(&rig, 17);

        let outcome = rig.aspect.unload_held(&rig.engine, &mut mag).unwrap();

        assert!(outcome.record().unwrap().was_permitted());
        assert_eq!(mag.state(), &MagazineState::Unload);
        assert!(mag.is_empty());
        assert_eq!(rig.inventory.lock().rounds(NATO), 17);
    }

    #[test]
    fn update_returns_to_ready_after_reload() {
        let rig = rig(Inventory::new(0).with_rounds(NATO, 30));
        let mut mag = magazine(&rig, 0);
        rig.aspect.load_held(&rig.engine, &mut mag).unwrap();

        rig.clock.advance(Duration::milliseconds(500));
        let early = rig.aspect.update_held(&rig.engine, &mut mag).unwrap();
        assert_eq!(early, TransitionOutcome::Skipped(Skip::NoTransition));

        rig.clock.advance(Duration::milliseconds(500));
        rig.aspect.update_held(&rig.engine, &mut mag).unwrap();
        assert_eq!(mag.state(), &MagazineState::Ready);
    }

    #[test]
    fn update_ignores_ready_magazines() {
        let rig = rig(Inventory::new(0));
        let mut mag = magazine(&rig, 0);

        let outcome = rig.aspect.update_held(&rig.engine, &mut mag).unwrap();

        assert_eq!(outcome, TransitionOutcome::Skipped(Skip::NotCandidate));
    }
}
