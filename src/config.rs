// SPDX-License-Identifier: GPL-3.0-only

use crate::constants::RETRY_START_DELAY;
use crate::stream::Mode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Controller configuration
///
/// Loaded by the app shell and handed to `StreamController::new`. The retry
/// delay is a small fixed interval, not a backoff: the conditions a pass
/// fails on (device busy, suspension) are expected to resolve quickly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Capture mode used when a request does not name one
    pub default_mode: Mode,
    /// Delay before re-running a failed configuration pass, in milliseconds
    pub retry_delay_ms: u64,
}

impl ControllerConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            default_mode: Mode::Photo,
            retry_delay_ms: RETRY_START_DELAY.as_millis() as u64,
        }
    }
}
