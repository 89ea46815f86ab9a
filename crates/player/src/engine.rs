// Engine interface shared by the decode pipeline and the platform passthrough

use tempo_core::{MediaSource, PlaybackState, Result};

/// What an engine can do beyond plain playback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capabilities {
    pub can_set_speed: bool,
    pub can_set_pitch: bool,
    pub can_downmix: bool,
    pub min_speed: f32,
    pub max_speed: f32,
}

/// Playback backend driven by [`crate::MediaPlayer`].
///
/// Operations rejected by the lifecycle go through the engine's error path
/// (state `Error`, error listener) and are also returned as `Err`.
pub trait PlaybackEngine: Send + Sync {
    fn set_data_source(&self, source: MediaSource) -> Result<()>;
    fn prepare(&self) -> Result<()>;
    fn prepare_async(&self) -> Result<()>;
    fn start(&self) -> Result<()>;
    fn pause(&self) -> Result<()>;
    fn stop(&self) -> Result<()>;
    fn seek_to(&self, msec: u64) -> Result<()>;
    fn reset(&self);
    fn release(&self);

    /// Milliseconds; 0 before preparation.
    fn current_position(&self) -> u64;
    /// Milliseconds; 0 when unknown.
    fn duration(&self) -> u64;
    fn is_playing(&self) -> bool;
    fn state(&self) -> PlaybackState;

    fn set_playback_speed(&self, speed: f32);
    fn set_playback_pitch(&self, pitch: f32);
    fn adjust_pitch_steps(&self, steps: f32);
    fn current_speed(&self) -> f32;
    fn current_pitch(&self) -> f32;
    fn set_downmix(&self, enable: bool);
    fn set_volume(&self, left: f32, right: f32);
    fn audio_session_id(&self) -> i32;
    fn capabilities(&self) -> Capabilities;
}
