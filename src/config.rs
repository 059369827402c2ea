//! Configuration.
//!
//! Configuration is plain serde data with per-field defaults, so an empty
//! document is a valid configuration.
//!
//! ```rust
//! use permitflow::config::Settings;
//!
//! let settings = Settings::from_toml_str(
//!     r#"
//!     [engine]
//!     permit_timeout_ms = 2500
//!
//!     [magazine]
//!     reload_duration_ms = 800
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(settings.engine.permit_timeout_ms, 2500);
//! assert_eq!(settings.magazine.reload_duration_ms, 800);
//! ```

use crate::magazine::MagazineConfig;
use chrono::Duration;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level settings document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub magazine: MagazineConfig,
}

impl Settings {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }
}

/// Settings for a [`StateManager`](crate::engine::StateManager).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EngineConfig {
    /// How long a permit may stay pending before it is treated as denied.
    /// `0` waits for the authority indefinitely.
    #[serde(default = "default_permit_timeout_ms")]
    pub permit_timeout_ms: u64,
}

fn default_permit_timeout_ms() -> u64 {
    10_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            permit_timeout_ms: default_permit_timeout_ms(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// The permit timeout, or `None` when permits wait indefinitely.
    pub fn permit_timeout(&self) -> Option<Duration> {
        if self.permit_timeout_ms == 0 {
            return None;
        }
        // Out-of-range values behave like no timeout.
        i64::try_from(self.permit_timeout_ms)
            .ok()
            .and_then(Duration::try_milliseconds)
    }
}
