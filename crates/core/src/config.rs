// Engine tuning loaded from TOML

use crate::error::{AudioError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Tunables for the decode pipeline.
///
/// Every field has a default, so a config file only needs the keys it overrides:
///
/// ```toml
/// dequeue_timeout_ms = 100
/// max_speed = 2.0
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Bounded wait for decoder input slots and outputs.
    pub dequeue_timeout_ms: u64,
    /// Head-position poll interval while the sink drains at end of playback.
    pub drain_poll_interval_ms: u64,
    /// Largest multiple of the sink's minimum buffer size to try first.
    pub sink_buffer_multiples: u32,
    pub min_speed: f32,
    pub max_speed: f32,
    /// Minimum gap between buffering updates below 100%.
    pub buffering_update_interval_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            dequeue_timeout_ms: 200,
            drain_poll_interval_ms: 100,
            sink_buffer_multiples: 4,
            min_speed: 0.5,
            max_speed: 4.0,
            buffering_update_interval_ms: 500,
        }
    }
}

impl PlayerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: PlayerConfig = toml::from_str(text)
            .map_err(|e| AudioError::InitializationError(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            AudioError::InitializationError(format!("cannot read {}: {}", path.display(), e))
        })?;
        log::info!("[config] Loading player config from {}", path.display());
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dequeue_timeout_ms == 0 {
            return Err(invalid("dequeue_timeout_ms must be > 0"));
        }
        if self.drain_poll_interval_ms == 0 {
            return Err(invalid("drain_poll_interval_ms must be > 0"));
        }
        if self.sink_buffer_multiples == 0 {
            return Err(invalid("sink_buffer_multiples must be > 0"));
        }
        if !(self.min_speed > 0.0 && self.min_speed.is_finite() && self.max_speed.is_finite()) {
            return Err(invalid("speed bounds must be finite and positive"));
        }
        if self.min_speed > self.max_speed {
            return Err(invalid("min_speed must not exceed max_speed"));
        }
        Ok(())
    }

    pub fn dequeue_timeout(&self) -> Duration {
        Duration::from_millis(self.dequeue_timeout_ms)
    }

    pub fn drain_poll_interval(&self) -> Duration {
        Duration::from_millis(self.drain_poll_interval_ms)
    }

    pub fn buffering_update_interval(&self) -> Duration {
        Duration::from_millis(self.buffering_update_interval_ms)
    }

    pub fn clamp_speed(&self, speed: f32) -> f32 {
        if speed.is_nan() {
            return 1.0f32.clamp(self.min_speed, self.max_speed);
        }
        speed.clamp(self.min_speed, self.max_speed)
    }
}

fn invalid(msg: &str) -> AudioError {
    AudioError::InitializationError(format!("invalid config: {}", msg))
}
