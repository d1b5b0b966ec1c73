//! Runtime settings.
//!
//! Every field has a default, so an empty JSON object is a valid
//! configuration. Install a configuration once at startup with
//! [`Config::install`]; later calls are ignored.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pool: PoolConfig,
    pub timing: TimingConfig,
}

/// Defaults for [`TaskPool::from_config`](crate::task::TaskPool::from_config).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_concurrency: usize,
    /// Per-task time limit; `None` waits forever.
    pub max_time_ms: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            max_time_ms: None,
        }
    }
}

/// Default windows of the `$debounce` and `$throttle` wrappers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub debounce_ms: u64,
    pub throttle_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            throttle_ms: 100,
        }
    }
}

static GLOBAL: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Make `self` the process-wide configuration. Returns `false` if one was
    /// already installed (or read).
    pub fn install(self) -> bool {
        GLOBAL.set(self).is_ok()
    }

    /// The installed configuration, or the defaults.
    pub fn global() -> &'static Config {
        GLOBAL.get_or_init(Config::default)
    }
}
