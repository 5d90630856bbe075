//! Engine configuration.

use crate::throttle::Throttle;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delay between successive job listing cycles.
pub const JOB_LIST_THROTTLE_MS: u64 = 5_000;

/// Delay between successive job details cycles.
pub const JOB_DETAILS_THROTTLE_MS: u64 = 1_000;

/// Page size used when no preference is stored.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Configuration for the watch engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Delay between listing cycles (ms).
    pub id_throttle_ms: u64,
    /// Delay between details cycles (ms).
    pub detail_throttle_ms: u64,
    /// Page size used when the preference store has none.
    pub default_page_size: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            id_throttle_ms: JOB_LIST_THROTTLE_MS,
            detail_throttle_ms: JOB_DETAILS_THROTTLE_MS,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl WatchConfig {
    /// Configuration for tests and headless runs: no delay between cycles.
    pub fn headless() -> Self {
        Self {
            id_throttle_ms: 0,
            detail_throttle_ms: 0,
            ..Default::default()
        }
    }

    /// Throttle applied between listing cycles.
    pub fn id_throttle(&self) -> Throttle {
        Throttle::new(Duration::from_millis(self.id_throttle_ms))
    }

    /// Throttle applied between details cycles.
    pub fn detail_throttle(&self) -> Throttle {
        Throttle::new(Duration::from_millis(self.detail_throttle_ms))
    }
}
