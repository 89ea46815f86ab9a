// Playback engines and the player facade

mod engine;
mod passthrough;
mod pipeline;
mod player;

pub use engine::{Capabilities, PlaybackEngine};
pub use passthrough::{PassthroughEngine, PlatformEvents, PlatformPlayer};
pub use pipeline::{Collaborators, DecodePipelineEngine};
pub use player::MediaPlayer;

pub use tempo_core::{
    AudioError, ErrorCategory, Listeners, MediaSource, PlaybackState, PlayerConfig, Result,
    WHAT_UNKNOWN,
};
pub use tempo_decode as decode;
pub use tempo_demux as demux;
pub use tempo_dsp as dsp;
pub use tempo_sink as sink;

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Install `env_logger` once, defaulting to `info` unless `RUST_LOG` says otherwise.
pub fn init_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("info"),
        )
        .try_init();
    });
}
