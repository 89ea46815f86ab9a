// Core types shared by every tempo crate

pub mod callback;
pub mod config;
pub mod error;
pub mod source;
pub mod state;

// Re-export commonly used types
pub use callback::{
    BufferingListener, CompletionListener, ErrorListener, Listeners, PreparedListener,
    SeekCompleteListener, WHAT_UNKNOWN,
};
pub use config::PlayerConfig;
pub use error::{AudioError, ErrorCategory, Result};
pub use source::MediaSource;
pub use state::{PlaybackState, PlayerStateContainer, Transition, Trigger};
