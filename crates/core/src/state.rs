// Playback lifecycle state machine

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Player lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    /// No source set
    Idle,
    /// Source set, not prepared yet
    Initialized,
    /// Preparation in progress
    Preparing,
    /// Ready to start
    Prepared,
    /// Decoding and playing
    Started,
    /// Playback suspended
    Paused,
    /// Playback stopped; needs prepare before start
    Stopped,
    /// End of stream reached and fully played out
    PlaybackCompleted,
    /// Released; terminal
    End,
    /// Failed; needs reset or release
    Error,
}

impl PlaybackState {
    pub const ALL: [PlaybackState; 10] = [
        PlaybackState::Idle,
        PlaybackState::Initialized,
        PlaybackState::Preparing,
        PlaybackState::Prepared,
        PlaybackState::Started,
        PlaybackState::Paused,
        PlaybackState::Stopped,
        PlaybackState::PlaybackCompleted,
        PlaybackState::End,
        PlaybackState::Error,
    ];

    pub fn seeking_allowed(self) -> bool {
        matches!(
            self,
            PlaybackState::Started
                | PlaybackState::Prepared
                | PlaybackState::Paused
                | PlaybackState::PlaybackCompleted
        )
    }

    pub fn stopping_allowed(self) -> bool {
        matches!(
            self,
            PlaybackState::Prepared
                | PlaybackState::Started
                | PlaybackState::Stopped
                | PlaybackState::Paused
                | PlaybackState::PlaybackCompleted
        )
    }

    pub fn setting_data_source_allowed(self) -> bool {
        self == PlaybackState::Idle
    }

    /// Queries (position, duration, playing) answer with a neutral value here.
    pub fn is_neutral_for_queries(self) -> bool {
        matches!(
            self,
            PlaybackState::Idle | PlaybackState::Initialized | PlaybackState::Error
        )
    }

    /// Resolve what `trigger` does from this state.
    pub fn on(self, trigger: Trigger) -> Transition {
        use PlaybackState::*;
        use Transition::{Reject, Stay, To};

        if self == End {
            return match trigger {
                Trigger::Release | Trigger::Fail => Stay,
                _ => Reject,
            };
        }

        match trigger {
            Trigger::SetDataSource => {
                if self.setting_data_source_allowed() {
                    To(Initialized)
                } else {
                    Reject
                }
            }
            Trigger::Prepare => match self {
                Initialized | Stopped => To(Preparing),
                _ => Reject,
            },
            // A failed or cancelled preparation leaves whatever state won the race.
            Trigger::PrepareCompleted => match self {
                Preparing => To(Prepared),
                _ => Stay,
            },
            Trigger::Start => match self {
                Prepared | PlaybackCompleted | Paused => To(Started),
                Started => Stay,
                _ => Reject,
            },
            Trigger::Pause => match self {
                Started | Paused => To(Paused),
                Prepared => Stay,
                _ => Reject,
            },
            Trigger::Stop => {
                if self.stopping_allowed() {
                    To(Stopped)
                } else {
                    Reject
                }
            }
            Trigger::SeekTo => {
                if self.seeking_allowed() {
                    Stay
                } else {
                    Reject
                }
            }
            Trigger::EndOfStream => match self {
                Started | Paused => To(PlaybackCompleted),
                _ => Stay,
            },
            Trigger::Reset => To(Idle),
            Trigger::Release => To(End),
            Trigger::Fail => match self {
                Error => Stay,
                _ => To(Error),
            },
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackState::Idle => "IDLE",
            PlaybackState::Initialized => "INITIALIZED",
            PlaybackState::Preparing => "PREPARING",
            PlaybackState::Prepared => "PREPARED",
            PlaybackState::Started => "STARTED",
            PlaybackState::Paused => "PAUSED",
            PlaybackState::Stopped => "STOPPED",
            PlaybackState::PlaybackCompleted => "PLAYBACK_COMPLETED",
            PlaybackState::End => "END",
            PlaybackState::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Everything that can drive the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    SetDataSource,
    Prepare,
    PrepareCompleted,
    Start,
    Pause,
    Stop,
    SeekTo,
    EndOfStream,
    Reset,
    Release,
    Fail,
}

impl Trigger {
    pub const ALL: [Trigger; 11] = [
        Trigger::SetDataSource,
        Trigger::Prepare,
        Trigger::PrepareCompleted,
        Trigger::Start,
        Trigger::Pause,
        Trigger::Stop,
        Trigger::SeekTo,
        Trigger::EndOfStream,
        Trigger::Reset,
        Trigger::Release,
        Trigger::Fail,
    ];
}

/// Outcome of applying a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Allowed; move to the given state
    To(PlaybackState),
    /// Allowed; state unchanged
    Stay,
    /// Not allowed from the current state; caller routes to the error path
    Reject,
}

/// Thread-safe player state container
#[derive(Clone)]
pub struct PlayerStateContainer {
    state: Arc<Mutex<PlaybackState>>,
}

impl PlayerStateContainer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(PlaybackState::Idle)),
        }
    }

    pub fn get_state(&self) -> PlaybackState {
        *self.state.lock()
    }

    pub fn is(&self, state: PlaybackState) -> bool {
        self.get_state() == state
    }

    /// Unconditionally set the state. Only for paths that already validated.
    pub fn set_state(&self, new_state: PlaybackState) {
        let mut state = self.state.lock();
        if *state != new_state {
            log::debug!("State changed: {:?} -> {:?}", *state, new_state);
        }
        *state = new_state;
    }

    /// Atomically validate and apply `trigger`.
    ///
    /// Returns the state observed before the trigger together with the outcome,
    /// so callers can branch on where they came from.
    pub fn apply(&self, trigger: Trigger) -> (PlaybackState, Transition) {
        let mut state = self.state.lock();
        let from = *state;
        let transition = from.on(trigger);
        match transition {
            Transition::To(to) => {
                if from != to {
                    log::debug!("State changed: {:?} -> {:?} ({:?})", from, to, trigger);
                }
                *state = to;
            }
            Transition::Stay => {}
            Transition::Reject => {
                log::debug!("Trigger {:?} rejected in state {:?}", trigger, from);
            }
        }
        (from, transition)
    }
}

impl Default for PlayerStateContainer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PlaybackState::*;

    #[test]
    fn test_table_is_total_and_fail_reaches_error() {
        for state in PlaybackState::ALL {
            for trigger in Trigger::ALL {
                let transition = state.on(trigger);
                if let Transition::To(next) = transition {
                    assert!(PlaybackState::ALL.contains(&next));
                }
            }
            let expected = match state {
                Error | End => Transition::Stay,
                _ => Transition::To(Error),
            };
            assert_eq!(state.on(Trigger::Fail), expected, "fail from {:?}", state);
        }
    }

    #[test]
    fn test_documented_transitions() {
        assert_eq!(Idle.on(Trigger::SetDataSource), Transition::To(Initialized));
        assert_eq!(Initialized.on(Trigger::Prepare), Transition::To(Preparing));
        assert_eq!(Stopped.on(Trigger::Prepare), Transition::To(Preparing));
        assert_eq!(Preparing.on(Trigger::PrepareCompleted), Transition::To(Prepared));
        assert_eq!(Prepared.on(Trigger::Start), Transition::To(Started));
        assert_eq!(PlaybackCompleted.on(Trigger::Start), Transition::To(Started));
        assert_eq!(Started.on(Trigger::Pause), Transition::To(Paused));
        assert_eq!(Paused.on(Trigger::Start), Transition::To(Started));
        for s in [Started, Paused, Prepared, Stopped, PlaybackCompleted] {
            assert_eq!(s.on(Trigger::Stop), Transition::To(Stopped));
        }
        assert_eq!(Started.on(Trigger::EndOfStream), Transition::To(PlaybackCompleted));
    }

    #[test]
    fn test_no_op_triggers() {
        assert_eq!(Started.on(Trigger::Start), Transition::Stay);
        assert_eq!(Prepared.on(Trigger::Pause), Transition::Stay);
        for s in [Started, Prepared, Paused, PlaybackCompleted] {
            assert_eq!(s.on(Trigger::SeekTo), Transition::Stay);
        }
    }

    #[test]
    fn test_rejections() {
        assert_eq!(Initialized.on(Trigger::SetDataSource), Transition::Reject);
        assert_eq!(Idle.on(Trigger::Start), Transition::Reject);
        assert_eq!(Stopped.on(Trigger::Start), Transition::Reject);
        assert_eq!(Idle.on(Trigger::Pause), Transition::Reject);
        assert_eq!(Idle.on(Trigger::Stop), Transition::Reject);
        assert_eq!(Initialized.on(Trigger::SeekTo), Transition::Reject);
        assert_eq!(Prepared.on(Trigger::Prepare), Transition::Reject);
        assert_eq!(Error.on(Trigger::Start), Transition::Reject);
    }

    #[test]
    fn test_reset_and_release() {
        for state in PlaybackState::ALL {
            let expected_reset = if state == End {
                Transition::Reject
            } else {
                Transition::To(Idle)
            };
            assert_eq!(state.on(Trigger::Reset), expected_reset);
            let expected_release = if state == End {
                Transition::Stay
            } else {
                Transition::To(End)
            };
            assert_eq!(state.on(Trigger::Release), expected_release);
        }
    }

    #[test]
    fn test_end_is_terminal() {
        for trigger in Trigger::ALL {
            assert!(!matches!(End.on(trigger), Transition::To(_)));
        }
    }

    #[test]
    fn test_container_apply_reports_origin() {
        let container = PlayerStateContainer::new();
        let (from, transition) = container.apply(Trigger::SetDataSource);
        assert_eq!(from, Idle);
        assert_eq!(transition, Transition::To(Initialized));
        assert!(container.is(Initialized));

        let (from, transition) = container.apply(Trigger::Start);
        assert_eq!(from, Initialized);
        assert_eq!(transition, Transition::Reject);
        assert!(container.is(Initialized));
    }

    #[test]
    fn test_neutral_query_states() {
        assert!(Idle.is_neutral_for_queries());
        assert!(Initialized.is_neutral_for_queries());
        assert!(Error.is_neutral_for_queries());
        assert!(!Prepared.is_neutral_for_queries());
    }
}
