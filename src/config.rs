//! Topology configuration
//!
//! Settings for one search session: how many evaluator units to spawn, the
//! channel and memory sizing, and the board the codecs are derived from.
//! Stored as TOML so deployments can pin a configuration next to the engine.

use crate::board::{BoardConfig, MAX_BOARD_SIZE};
use crate::error::{HexmindError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default evaluator count, matching the original four-worker deployment
pub const DEFAULT_NUM_EVALUATORS: u32 = 4;
/// Default per-channel buffer capacity
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;
/// Default shared memory size in bytes
pub const DEFAULT_MEMORY_LEN: usize = 1024;

/// Configuration for one topology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Number of evaluator units (may be zero)
    pub num_evaluators: u32,
    /// Bounded capacity of every channel in the topology
    pub channel_capacity: usize,
    /// Size of the shared memory buffer handed to every unit
    pub memory_len: usize,
    /// Board/session configuration used for the memory handoff
    pub board: BoardConfig,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            num_evaluators: DEFAULT_NUM_EVALUATORS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            memory_len: DEFAULT_MEMORY_LEN,
            board: BoardConfig::default(),
        }
    }
}

impl TopologyConfig {
    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| HexmindError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = toml::to_string_pretty(self)
            .map_err(|e| HexmindError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path.as_ref(), text)?;
        Ok(())
    }

    /// Check invariants the rest of the crate relies on
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(HexmindError::Config("channel_capacity must be > 0".into()));
        }
        if self.memory_len == 0 {
            return Err(HexmindError::Config("memory_len must be > 0".into()));
        }
        if self.board.size == 0 || self.board.size > MAX_BOARD_SIZE {
            return Err(HexmindError::Config(format!(
                "board size {} out of range 1..={MAX_BOARD_SIZE}",
                self.board.size
            )));
        }
        Ok(())
    }
}
