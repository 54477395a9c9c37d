//! Bridge runtime configuration.

use crate::{CoreError, Result};
use plugbridge_state::{StateManager, DEFAULT_CHUNK_SIZE, DEFAULT_STATE_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the bridge runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Upper bound on threads taking part in a fallback thread-pool run,
    /// including the calling audio thread.
    pub max_workers: usize,
    /// Bound on background state saves and loads.
    pub state_timeout: Duration,
    /// Bytes between cancellation checks during state I/O.
    pub io_chunk_size: usize,
    /// Panic on calls from the wrong thread context.
    pub thread_checks: bool,
    /// Input channels that can be copied aside when the host processes in place.
    pub max_in_place_channels: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            state_timeout: DEFAULT_STATE_TIMEOUT,
            io_chunk_size: DEFAULT_CHUNK_SIZE,
            thread_checks: cfg!(debug_assertions),
            max_in_place_channels: 64,
        }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(CoreError::InvalidConfig(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if self.io_chunk_size == 0 {
            return Err(CoreError::InvalidConfig(
                "io_chunk_size must be at least 1 byte".to_string(),
            ));
        }
        if self.state_timeout.is_zero() {
            return Err(CoreError::InvalidConfig(
                "state_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn thread_checks(mut self, enabled: bool) -> Self {
        self.thread_checks = enabled;
        self
    }

    pub fn state_timeout(mut self, timeout: Duration) -> Self {
        self.state_timeout = timeout;
        self
    }

    /// Apply the I/O settings to a plugin's state manager.
    pub fn configure_state(&self, manager: StateManager) -> StateManager {
        manager
            .with_chunk_size(self.io_chunk_size)
            .with_timeout(self.state_timeout)
    }
}
