//! Magazine reload: a worked aspect.
//!
//! A magazine held by an owner can be loaded from the owner's compatible
//! rounds or unloaded back into them. Both are manual transitions gated by a
//! permit; the magazine then returns to `Ready` on its own once the reload
//! duration has passed.
//!
//! ```text
//!          load (permit)              unload (permit)
//!   Ready ───────────────▶ Load   Ready ───────────────▶ Unload
//!     ▲                     │       ▲                      │
//!     └──── elapsed ────────┘       └──── elapsed ─────────┘
//! ```

mod aspect;
mod instance;

pub use aspect::{MagazineReloadAspect, LOAD, MAGAZINE, RELOAD, UNLOAD};
pub use instance::{
    Inventory, MagazineInstance, MagazineSpec, RoundKind, SharedInventory, StowedMagazine,
};

use chrono::Duration;
use serde::Deserialize;

crate::state_enum! {
    pub enum MagazineState {
        Ready,
        LoadRequested,
        Load,
        UnloadRequested,
        Unload,
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MagazineConfig {
    /// Time spent in `Load` or `Unload` before returning to `Ready`.
    #[serde(default = "default_reload_duration_ms")]
    pub reload_duration_ms: u64,
}

fn default_reload_duration_ms() -> u64 {
    1000
}

impl Default for MagazineConfig {
    fn default() -> Self {
        Self {
            reload_duration_ms: default_reload_duration_ms(),
        }
    }
}

impl MagazineConfig {
    pub fn reload_duration(&self) -> Duration {
        i64::try_from(self.reload_duration_ms)
            .ok()
            .and_then(Duration::try_milliseconds)
            .unwrap_or(Duration::MAX)
    }
}
