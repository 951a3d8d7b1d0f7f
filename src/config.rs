//! Plain configuration values consumed by the store and the simulators.
//!
//! Nothing here knows where the values came from; the server crate fills them
//! from files and environment variables, tests construct them directly.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{StoreError, StoreResult};

/// Longest accepted item name, in characters.
pub const MAX_NAME_LEN: usize = 100;

/// Longest accepted item description, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Limits applied by [`ItemStore`](crate::ItemStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Page size used by `list` when the caller gives no limit
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Upper bound for any requested page size
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    /// Largest batch accepted by the bulk operations
    #[serde(default = "default_max_bulk_items")]
    pub max_bulk_items: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            max_bulk_items: default_max_bulk_items(),
        }
    }
}

impl StoreConfig {
    /// Reject combinations that would make the store misbehave.
    pub fn validate(&self) -> StoreResult<()> {
        if self.max_page_size == 0 {
            return Err(StoreError::invalid_argument("max_page_size must be positive"));
        }
        if self.default_page_size > self.max_page_size {
            return Err(StoreError::invalid_argument(format!(
                "default_page_size {} exceeds max_page_size {}",
                self.default_page_size, self.max_page_size
            )));
        }
        if self.max_bulk_items == 0 {
            return Err(StoreError::invalid_argument("max_bulk_items must be positive"));
        }
        Ok(())
    }
}

/// Bounds for the blocking and timeout simulations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Longest accepted `simulate_timeout` duration, in seconds
    #[serde(default = "default_max_timeout_secs")]
    pub max_timeout_secs: u64,

    /// Block duration used when the caller gives none, in seconds
    #[serde(default = "default_block_secs")]
    pub default_block_secs: u64,

    /// Longest accepted block duration, in seconds
    #[serde(default = "default_max_block_secs")]
    pub max_block_secs: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_timeout_secs: default_max_timeout_secs(),
            default_block_secs: default_block_secs(),
            max_block_secs: default_max_block_secs(),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> StoreResult<()> {
        if self.max_timeout_secs == 0 || self.max_block_secs == 0 {
            return Err(StoreError::invalid_argument(
                "simulation maxima must be positive",
            ));
        }
        if self.default_block_secs == 0 || self.default_block_secs > self.max_block_secs {
            return Err(StoreError::invalid_argument(format!(
                "default_block_secs must be within 1..={}",
                self.max_block_secs
            )));
        }
        Ok(())
    }

    pub fn max_timeout(&self) -> Duration {
        Duration::from_secs(self.max_timeout_secs)
    }

    pub fn max_block(&self) -> Duration {
        Duration::from_secs(self.max_block_secs)
    }
}

fn default_page_size() -> usize {
    100
}

fn default_max_page_size() -> usize {
    1000
}

fn default_max_bulk_items() -> usize {
    100
}

fn default_max_timeout_secs() -> u64 {
    300
}

fn default_block_secs() -> u64 {
    30
}

fn default_max_block_secs() -> u64 {
    300
}
