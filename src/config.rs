//! Replay configuration
//!
//! Settings a deployment may want to vary without recompiling: where the
//! canonical login template lives, how often the scheduler ticks, and which
//! login instance a load selects by default. Stored as TOML next to the
//! server's working directory.

use crate::error::{ReplayError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the canonical login template expected in the working directory
pub const DEFAULT_TEMPLATE_FILE: &str = "basic-login.pcap";

/// Configuration for capture loading and replay pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Path to the canonical login template capture used on the zero-login path
    pub login_template_path: PathBuf,

    /// Scheduler tick interval in milliseconds
    pub tick_interval_ms: u64,

    /// Login instance selected immediately after a load (1-based)
    pub initial_login_instance: u32,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            login_template_path: PathBuf::from(DEFAULT_TEMPLATE_FILE),
            tick_interval_ms: 1000,
            initial_login_instance: 1,
        }
    }
}

impl ReplayConfig {
    /// Scheduler tick interval as a [`Duration`]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&text).map_err(|e| ReplayError::Config(e.to_string()))
    }

    /// Load configuration, falling back to defaults if the file is absent
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("using default replay config: {}", e);
                Self::default()
            }
        }
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let text = toml::to_string_pretty(self).map_err(|e| ReplayError::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), text)?;
        Ok(())
    }
}
