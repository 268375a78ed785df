//! Player configuration.
//!
//! Settings are read from an optional JSON file. Every field has a default,
//! so an empty object (or no file at all) gives the standard behaviour.
//!
//! ```json
//! {
//!   "speed": 1.0,
//!   "pollIntervalMs": 10,
//!   "pauseAfterJump": true,
//!   "transform": { "teleportDistanceLimit": 128.0, "hurrySkipThresholdMs": 1000 }
//! }
//! ```

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use reprise_core::TransformConfig;

use crate::error::ReplayError;

pub const DEFAULT_SPEED: f64 = 1.0;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplayConfig {
    /// Initial speed multiplier
    pub speed: f64,
    /// How often waiting loops re-check pause, seek and stop requests
    pub poll_interval_ms: u64,
    /// Pause once a jump has caught up with its target
    pub pause_after_jump: bool,
    pub transform: TransformConfig,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            speed: DEFAULT_SPEED,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            pause_after_jump: true,
            transform: TransformConfig::default(),
        }
    }
}

impl ReplayConfig {
    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        let file = File::open(path)?;
        let config: ReplayConfig = serde_json::from_reader(BufReader::new(file))?;
        debug!("Loaded config from {}", path.display());
        Ok(config.sanitized())
    }

    /// Replace values the player cannot run with by their defaults
    pub fn sanitized(mut self) -> Self {
        if !(self.speed.is_finite() && self.speed > 0.0) {
            warn!("Invalid speed {}, using {}", self.speed, DEFAULT_SPEED);
            self.speed = DEFAULT_SPEED;
        }
        if self.poll_interval_ms == 0 {
            warn!("Poll interval must be positive, using 1ms");
            self.poll_interval_ms = 1;
        }
        let limit = self.transform.teleport_distance_limit;
        if !(limit.is_finite() && limit >= 0.0) {
            warn!("Invalid teleport distance limit {}", limit);
            self.transform.teleport_distance_limit = TransformConfig::default().teleport_distance_limit;
        }
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
