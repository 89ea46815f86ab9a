// Listener slots for player events
// Each slot holds at most one caller-supplied function; dispatch never runs under the slot lock.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// `what` value passed to the error listener for engine-originated errors.
pub const WHAT_UNKNOWN: i32 = 1;

pub type PreparedListener = Arc<dyn Fn() + Send + Sync>;
pub type CompletionListener = Arc<dyn Fn() + Send + Sync>;
pub type SeekCompleteListener = Arc<dyn Fn() + Send + Sync>;
/// Returns `true` when the error was handled.
pub type ErrorListener = Arc<dyn Fn(i32, i32) -> bool + Send + Sync>;
pub type BufferingListener = Arc<dyn Fn(u8) + Send + Sync>;

#[derive(Default)]
struct Slots {
    prepared: Option<PreparedListener>,
    completion: Option<CompletionListener>,
    seek_complete: Option<SeekCompleteListener>,
    error: Option<ErrorListener>,
    buffering: Option<BufferingListener>,
}

/// Listener slots shared between the facade and the active engine.
pub struct Listeners {
    slots: Mutex<Slots>,
    last_buffering_update: Mutex<Option<Instant>>,
    buffering_update_interval: Duration,
}

impl Listeners {
    pub fn new() -> Self {
        Self::with_buffering_interval(Duration::from_millis(500))
    }

    /// Buffering updates closer together than `interval` are dropped (100% always passes).
    pub fn with_buffering_interval(interval: Duration) -> Self {
        Self {
            slots: Mutex::new(Slots::default()),
            last_buffering_update: Mutex::new(None),
            buffering_update_interval: interval,
        }
    }

    pub fn set_on_prepared(&self, listener: Option<PreparedListener>) {
        self.slots.lock().prepared = listener;
    }

    pub fn set_on_completion(&self, listener: Option<CompletionListener>) {
        self.slots.lock().completion = listener;
    }

    pub fn set_on_seek_complete(&self, listener: Option<SeekCompleteListener>) {
        self.slots.lock().seek_complete = listener;
    }

    pub fn set_on_error(&self, listener: Option<ErrorListener>) {
        self.slots.lock().error = listener;
    }

    pub fn set_on_buffering_update(&self, listener: Option<BufferingListener>) {
        self.slots.lock().buffering = listener;
    }

    pub fn clear(&self) {
        *self.slots.lock() = Slots::default();
    }

    pub fn notify_prepared(&self) {
        let listener = self.slots.lock().prepared.clone();
        if let Some(listener) = listener {
            listener();
        }
    }

    pub fn notify_completion(&self) {
        let listener = self.slots.lock().completion.clone();
        if let Some(listener) = listener {
            listener();
        }
    }

    pub fn notify_seek_complete(&self) {
        let listener = self.slots.lock().seek_complete.clone();
        if let Some(listener) = listener {
            listener();
        }
    }

    /// Returns whether the error listener reported the error as handled.
    /// A missing listener counts as unhandled.
    pub fn notify_error(&self, what: i32, extra: i32) -> bool {
        let listener = self.slots.lock().error.clone();
        match listener {
            Some(listener) => listener(what, extra),
            None => false,
        }
    }

    pub fn notify_buffering(&self, percent: u8) {
        let percent = percent.min(100);
        {
            let mut last = self.last_buffering_update.lock();
            if percent < 100 {
                if let Some(at) = *last {
                    if at.elapsed() < self.buffering_update_interval {
                        return;
                    }
                }
            }
            *last = Some(Instant::now());
        }
        let listener = self.slots.lock().buffering.clone();
        if let Some(listener) = listener {
            listener(percent);
        }
    }
}

impl Default for Listeners {
    fn default() -> Self {
        Self::new()
    }
}
