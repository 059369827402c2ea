//! Magazine Reload
//!
//! This example walks one magazine through a load and an unload.
//!
//! Key concepts:
//! - Manual transitions gated by a permit
//! - Automatic transitions fired by a sweep once a timer elapses
//! - Guards that silently refuse impossible requests
//! - An evaluator that moves rounds between owner and magazine
//!
//! Run with: cargo run --example magazine_reload

use chrono::Duration;
use permitflow::config::Settings;
use permitflow::core::{Clock, ManualClock, OwnerId, StatefulInstance};
use permitflow::engine::StateManager;
use permitflow::magazine::{
    Inventory, MagazineInstance, MagazineReloadAspect, MagazineSpec, RoundKind, SharedInventory,
};
use permitflow::permit::PermitManager;
use permitflow::registry::TypeRegistry;
use std::sync::Arc;

const NATO: RoundKind = RoundKind::new("5.56x45");

fn report(label: &str, magazine: &MagazineInstance) {
    println!(
        "  {label:<22} state={:<7} rounds={:>2}/{} owner has {}",
        format!("{:?}", magazine.state()),
        magazine.rounds(),
        magazine.spec().capacity,
        magazine.inventory().lock().rounds(NATO),
    );
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Magazine Reload Example ===\n");

    let settings = Settings::from_toml_str("[magazine]\nreload_duration_ms = 1500")?;
    let clock = Arc::new(ManualClock::default());
    let permits = Arc::new(PermitManager::new());
    let aspect = MagazineReloadAspect::new(settings.magazine);

    let mut engine = StateManager::with_clock(settings.engine, clock.clone());
    engine.wire(&aspect, &permits, TypeRegistry::global())?;

    println!("Registered permit kinds:");
    for (id, kind) in TypeRegistry::global().kinds() {
        println!("  {id} {kind}");
    }
    println!();

    let spec = Arc::new(MagazineSpec::new("stanag", 30, vec![NATO]));
    let inventory = SharedInventory::new(Inventory::new(2).with_rounds(NATO, 45));
    let mut magazine = MagazineInstance::new(OwnerId::new(), spec, inventory, clock.now())
        .with_rounds(8);

    report("start", &magazine);

    let outcome = aspect.load_held(&engine, &mut magazine)?;
    println!("\nLoad requested: {outcome:?}");
    report("after load", &magazine);

    clock.advance(Duration::milliseconds(700));
    aspect.update_held(&engine, &mut magazine)?;
    report("700ms later", &magazine);

    clock.advance(Duration::milliseconds(800));
    aspect.update_held(&engine, &mut magazine)?;
    report("1500ms later", &magazine);

    let outcome = aspect.load_held(&engine, &mut magazine)?;
    println!("\nLoading a full magazine: {outcome:?}");

    let outcome = aspect.unload_held(&engine, &mut magazine)?;
    println!("\nUnload requested: {outcome:?}");
    report("after unload", &magazine);

    clock.advance(Duration::milliseconds(1500));
    aspect.update_held(&engine, &mut magazine)?;
    report("unload finished", &magazine);

    println!("\nKey Characteristics:");
    println!("- State never changes before the permit is granted");
    println!("- Refused requests leave state and timestamp untouched");
    println!("- Automatic transitions need no permit");

    println!("\n=== Example Complete ===");
    Ok(())
}
