// Engine that hands playback to a platform media player

use parking_lot::Mutex;
use std::sync::Arc;

use tempo_core::{
    AudioError, Listeners, MediaSource, PlaybackState, PlayerStateContainer, Result, Transition,
    Trigger, WHAT_UNKNOWN,
};

use crate::engine::{Capabilities, PlaybackEngine};

/// A native player that decodes and renders on its own.
///
/// Asynchronous outcomes (async prepare, seek completion, end of stream,
/// errors) are reported through the [`PlatformEvents`] handed over by
/// [`PlatformPlayer::set_events`], never from inside one of these calls.
pub trait PlatformPlayer: Send {
    fn set_events(&mut self, events: PlatformEvents);
    fn set_data_source(&mut self, source: &MediaSource) -> Result<()>;
    fn prepare(&mut self) -> Result<()>;
    fn prepare_async(&mut self) -> Result<()>;
    fn start(&mut self) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
    fn seek_to(&mut self, msec: u64) -> Result<()>;
    fn reset(&mut self);
    fn release(&mut self);
    fn current_position(&self) -> Result<u64>;
    fn duration(&self) -> Result<u64>;
    fn is_playing(&self) -> bool;
    fn set_volume(&mut self, left: f32, right: f32) -> Result<()>;
    fn audio_session_id(&self) -> i32;
}

/// Event handle a platform player reports through. Keeps the engine state in step
/// with what the platform did and forwards to the facade listeners.
#[derive(Clone)]
pub struct PlatformEvents {
    state: PlayerStateContainer,
    listeners: Arc<Listeners>,
}

impl PlatformEvents {
    pub fn prepared(&self) {
        let (_, transition) = self.state.apply(Trigger::PrepareCompleted);
        if transition == Transition::To(PlaybackState::Prepared) {
            self.listeners.notify_prepared();
        }
    }

    pub fn completed(&self) {
        let (_, transition) = self.state.apply(Trigger::EndOfStream);
        if transition == Transition::To(PlaybackState::PlaybackCompleted) {
            self.listeners.notify_completion();
        }
    }

    pub fn seek_complete(&self) {
        self.listeners.notify_seek_complete();
    }

    /// Returns whether the error listener handled it. Repeated errors are dropped.
    pub fn error(&self, what: i32, extra: i32) -> bool {
        let (from, transition) = self.state.apply(Trigger::Fail);
        if transition != Transition::To(PlaybackState::Error) {
            return false;
        }
        log::error!("[passthrough] Error in state {} (what {}, extra {})", from, what, extra);
        let handled = self.listeners.notify_error(what, extra);
        if !handled {
            self.listeners.notify_completion();
        }
        handled
    }

    pub fn buffering_update(&self, percent: u8) {
        self.listeners.notify_buffering(percent);
    }
}

/// Delegates every operation to a [`PlatformPlayer`]. Speed, pitch and downmix
/// are not supported.
pub struct PassthroughEngine {
    player: Mutex<Box<dyn PlatformPlayer>>,
    events: PlatformEvents,
}

impl PassthroughEngine {
    pub fn new(mut player: Box<dyn PlatformPlayer>, listeners: Arc<Listeners>) -> Self {
        let events = PlatformEvents {
            state: PlayerStateContainer::new(),
            listeners,
        };
        player.set_events(events.clone());
        Self {
            player: Mutex::new(player),
            events,
        }
    }

    fn fail(&self, err: &AudioError) {
        log::error!("[passthrough] {}", err);
        self.events.error(WHAT_UNKNOWN, err.extra_code());
    }

    /// Validate `trigger`, then run `call` on the platform player.
    fn delegate(
        &self,
        operation: &str,
        trigger: Trigger,
        call: impl FnOnce(&mut dyn PlatformPlayer) -> Result<()>,
    ) -> Result<()> {
        let (from, transition) = self.events.state.apply(trigger);
        if transition == Transition::Reject {
            let err = AudioError::InvalidState(format!("{} called in state {}", operation, from));
            self.fail(&err);
            return Err(err);
        }
        let result = call(self.player.lock().as_mut());
        if let Err(e) = &result {
            self.fail(e);
        }
        result
    }

    fn neutral(&self) -> bool {
        self.events.state.get_state().is_neutral_for_queries()
    }
}

impl PlaybackEngine for PassthroughEngine {
    fn set_data_source(&self, source: MediaSource) -> Result<()> {
        self.delegate("set_data_source", Trigger::SetDataSource, |player| {
            player.set_data_source(&source)
        })
    }

    fn prepare(&self) -> Result<()> {
        self.delegate("prepare", Trigger::Prepare, |player| player.prepare())?;
        self.events.prepared();
        Ok(())
    }

    fn prepare_async(&self) -> Result<()> {
        self.delegate("prepare_async", Trigger::Prepare, |player| player.prepare_async())
    }

    fn start(&self) -> Result<()> {
        self.delegate("start", Trigger::Start, |player| player.start())
    }

    fn pause(&self) -> Result<()> {
        self.delegate("pause", Trigger::Pause, |player| player.pause())
    }

    fn stop(&self) -> Result<()> {
        self.delegate("stop", Trigger::Stop, |player| player.stop())
    }

    fn seek_to(&self, msec: u64) -> Result<()> {
        self.delegate("seek_to", Trigger::SeekTo, |player| player.seek_to(msec))
    }

    fn reset(&self) {
        if self.events.state.is(PlaybackState::End) {
            return;
        }
        self.player.lock().reset();
        self.events.state.apply(Trigger::Reset);
    }

    fn release(&self) {
        if self.events.state.is(PlaybackState::End) {
            return;
        }
        self.player.lock().release();
        self.events.state.apply(Trigger::Release);
    }

    fn current_position(&self) -> u64 {
        if self.neutral() {
            return 0;
        }
        self.player.lock().current_position().unwrap_or_else(|e| {
            log::warn!("[passthrough] Position unavailable: {}", e);
            0
        })
    }

    fn duration(&self) -> u64 {
        if self.neutral() {
            return 0;
        }
        self.player.lock().duration().unwrap_or_else(|e| {
            log::warn!("[passthrough] Duration unavailable: {}", e);
            0
        })
    }

    fn is_playing(&self) -> bool {
        !self.neutral() && self.player.lock().is_playing()
    }

    fn state(&self) -> PlaybackState {
        self.events.state.get_state()
    }

    fn set_playback_speed(&self, speed: f32) {
        log::debug!("[passthrough] Ignoring speed {}", speed);
    }

    fn set_playback_pitch(&self, pitch: f32) {
        log::debug!("[passthrough] Ignoring pitch {}", pitch);
    }

    fn adjust_pitch_steps(&self, steps: f32) {
        log::debug!("[passthrough] Ignoring pitch steps {}", steps);
    }

    fn current_speed(&self) -> f32 {
        1.0
    }

    fn current_pitch(&self) -> f32 {
        1.0
    }

    fn set_downmix(&self, enable: bool) {
        log::debug!("[passthrough] Ignoring downmix {}", enable);
    }

    fn set_volume(&self, left: f32, right: f32) {
        if let Err(e) = self.player.lock().set_volume(left, right) {
            log::warn!("[passthrough] Failed to set volume: {}", e);
        }
    }

    fn audio_session_id(&self) -> i32 {
        self.player.lock().audio_session_id()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            can_set_speed: false,
            can_set_pitch: false,
            can_downmix: false,
            min_speed: 1.0,
            max_speed: 1.0,
        }
    }
}

impl Drop for PassthroughEngine {
    fn drop(&mut self) {
        self.release();
    }
}
