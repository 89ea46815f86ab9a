// Public player facade

use std::sync::Arc;

use tempo_core::{Listeners, MediaSource, PlaybackState, PlayerConfig, Result};

use crate::engine::{Capabilities, PlaybackEngine};
use crate::passthrough::{PassthroughEngine, PlatformPlayer};
use crate::pipeline::{Collaborators, DecodePipelineEngine};

/// Media player with a fixed engine chosen at construction.
///
/// Listeners are shared with the engine and may be replaced at any time.
/// They run on engine threads, so they must not block for long.
///
/// ```no_run
/// use tempo_player::{MediaPlayer, MediaSource};
///
/// let player = MediaPlayer::new()?;
/// player.set_on_completion(|| println!("done"));
/// player.set_data_source(MediaSource::path("episode.mp3"))?;
/// player.prepare()?;
/// player.set_playback_speed(1.5);
/// player.start()?;
/// # Ok::<(), tempo_player::AudioError>(())
/// ```
pub struct MediaPlayer {
    engine: Box<dyn PlaybackEngine>,
    listeners: Arc<Listeners>,
}

impl MediaPlayer {
    /// Decode-pipeline player on the default output device.
    #[cfg(not(target_os = "android"))]
    pub fn new() -> Result<Self> {
        Self::with_config(PlayerConfig::default())
    }

    #[cfg(not(target_os = "android"))]
    pub fn with_config(config: PlayerConfig) -> Result<Self> {
        Self::with_collaborators(config, Collaborators::system_default())
    }

    pub fn with_collaborators(config: PlayerConfig, collaborators: Collaborators) -> Result<Self> {
        let listeners = Arc::new(Listeners::with_buffering_interval(
            config.buffering_update_interval(),
        ));
        let engine = DecodePipelineEngine::new(config, collaborators, Arc::clone(&listeners))?;
        Ok(Self {
            engine: Box::new(engine),
            listeners,
        })
    }

    /// Player that forwards everything to a platform implementation.
    pub fn with_platform_player(player: Box<dyn PlatformPlayer>) -> Self {
        let listeners = Arc::new(Listeners::new());
        let engine = PassthroughEngine::new(player, Arc::clone(&listeners));
        Self {
            engine: Box::new(engine),
            listeners,
        }
    }

    pub fn set_on_prepared(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.listeners.set_on_prepared(Some(Arc::new(listener)));
    }

    pub fn set_on_completion(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.listeners.set_on_completion(Some(Arc::new(listener)));
    }

    pub fn set_on_seek_complete(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.listeners.set_on_seek_complete(Some(Arc::new(listener)));
    }

    /// `listener(what, extra)` returns whether it handled the error. Unhandled
    /// errors are followed by a completion callback.
    pub fn set_on_error(&self, listener: impl Fn(i32, i32) -> bool + Send + Sync + 'static) {
        self.listeners.set_on_error(Some(Arc::new(listener)));
    }

    pub fn set_on_buffering_update(&self, listener: impl Fn(u8) + Send + Sync + 'static) {
        self.listeners.set_on_buffering_update(Some(Arc::new(listener)));
    }

    pub fn clear_listeners(&self) {
        self.listeners.clear();
    }

    pub fn set_data_source(&self, source: MediaSource) -> Result<()> {
        self.engine.set_data_source(source)
    }

    pub fn prepare(&self) -> Result<()> {
        self.engine.prepare()
    }

    pub fn prepare_async(&self) -> Result<()> {
        self.engine.prepare_async()
    }

    pub fn start(&self) -> Result<()> {
        self.engine.start()
    }

    pub fn pause(&self) -> Result<()> {
        self.engine.pause()
    }

    pub fn stop(&self) -> Result<()> {
        self.engine.stop()
    }

    pub fn seek_to(&self, msec: u64) -> Result<()> {
        self.engine.seek_to(msec)
    }

    pub fn reset(&self) {
        self.engine.reset();
    }

    pub fn release(&self) {
        self.engine.release();
    }

    pub fn current_position(&self) -> u64 {
        self.engine.current_position()
    }

    pub fn duration(&self) -> u64 {
        self.engine.duration()
    }

    pub fn is_playing(&self) -> bool {
        self.engine.is_playing()
    }

    pub fn state(&self) -> PlaybackState {
        self.engine.state()
    }

    pub fn set_playback_speed(&self, speed: f32) {
        self.engine.set_playback_speed(speed);
    }

    pub fn set_playback_pitch(&self, pitch: f32) {
        self.engine.set_playback_pitch(pitch);
    }

    /// Add `steps` to the current pitch.
    pub fn adjust_pitch_steps(&self, steps: f32) {
        self.engine.adjust_pitch_steps(steps);
    }

    pub fn current_speed(&self) -> f32 {
        self.engine.current_speed()
    }

    pub fn current_pitch(&self) -> f32 {
        self.engine.current_pitch()
    }

    pub fn set_downmix(&self, enable: bool) {
        self.engine.set_downmix(enable);
    }

    pub fn set_volume(&self, left: f32, right: f32) {
        self.engine.set_volume(left, right);
    }

    pub fn audio_session_id(&self) -> i32 {
        self.engine.audio_session_id()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.engine.capabilities()
    }

    pub fn can_set_speed(&self) -> bool {
        self.capabilities().can_set_speed
    }

    pub fn can_set_pitch(&self) -> bool {
        self.capabilities().can_set_pitch
    }

    pub fn can_downmix(&self) -> bool {
        self.capabilities().can_downmix
    }

    pub fn min_speed(&self) -> f32 {
        self.capabilities().min_speed
    }

    pub fn max_speed(&self) -> f32 {
        self.capabilities().max_speed
    }
}
