use serde::{Deserialize, Serialize};

/// Node-level constants consumed by the wallet state and the miner.
///
/// The host process is expected to fill this in from its own configuration
/// loader; only the fields the core actually reads live here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Number of most recent blocks retained locally. Blocks older than
    /// `last_block_num - redacted_window_size` are pruned and never mined.
    pub redacted_window_size: u64,
    /// Disables the proof-of-work mining loop entirely.
    pub disable_miner: bool,
    /// Seconds between miner status reports (minimum 1).
    pub status_interval_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            redacted_window_size: 43_200,
            disable_miner: false,
            status_interval_secs: 5,
        }
    }
}

impl NodeConfig {
    /// Small window and fast reporting, for tests and local runs.
    pub fn development() -> Self {
        Self {
            redacted_window_size: 50,
            status_interval_secs: 1,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.redacted_window_size == 0 {
            return Err("redacted_window_size must be positive".to_string());
        }
        if self.status_interval_secs == 0 {
            return Err("status_interval_secs must be at least 1".to_string());
        }
        Ok(())
    }
}
