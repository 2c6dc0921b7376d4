//! Sync configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-instance sync settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Debounce interval between the last edit and the autosave, in milliseconds
    #[serde(default = "default_autosave_delay_ms")]
    pub autosave_delay_ms: u64,

    /// Send patches when a base/version pair is known. Off forces full saves.
    #[serde(default = "default_true")]
    pub patch_mode: bool,
}

impl SyncConfig {
    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_delay_ms)
    }

    pub fn with_autosave_delay(mut self, delay: Duration) -> Self {
        self.autosave_delay_ms = delay.as_millis() as u64;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            autosave_delay_ms: default_autosave_delay_ms(),
            patch_mode: true,
        }
    }
}

fn default_autosave_delay_ms() -> u64 {
    1500
}

fn default_true() -> bool {
    true
}
