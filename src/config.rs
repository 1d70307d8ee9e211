//! Engine configuration

use serde::{Deserialize, Serialize};

/// Tunables for the sync engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Retry ceiling for transient remote failures per item
    pub max_retry_attempts: u32,
    /// Base delay for exponential backoff, doubled per attempt
    pub retry_base_delay_ms: u64,
    /// Permit cap for concurrent remote calls
    pub max_concurrent_remote_calls: usize,
    /// Resolve auto-mergeable conflicts during deployment instead of halting
    pub auto_resolve_conflicts: bool,
    /// Broadcast channel capacity for the event bus
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retry_attempts: 3,
            retry_base_delay_ms: 250,
            max_concurrent_remote_calls: 4,
            auto_resolve_conflicts: false,
            event_channel_capacity: 1024,
        }
    }
}
