// Audio output sinks

mod layout;
pub mod ring;

#[cfg(not(target_os = "android"))]
mod cpal_sink;

#[cfg(not(target_os = "android"))]
pub use cpal_sink::{CpalSink, CpalSinkFactory};
pub use layout::{ChannelLayout, PcmEncoding};
pub use ring::PcmRing;

use std::sync::Arc;
use tempo_core::Result;

/// Parameters a sink is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkSpec {
    pub sample_rate: u32,
    pub layout: ChannelLayout,
    pub encoding: PcmEncoding,
    /// Buffer size in bytes
    pub buffer_size: usize,
}

impl SinkSpec {
    pub fn channels(&self) -> u16 {
        self.layout.channel_count()
    }

    pub fn frame_bytes(&self) -> usize {
        self.channels() as usize * self.encoding.bytes_per_sample()
    }
}

/// PCM output device.
///
/// Methods take `&self` so a writer blocked in [`AudioSink::write`] can be
/// interrupted from another thread by `flush`, `stop` or `release`.
pub trait AudioSink: Send + Sync {
    fn play(&self) -> Result<()>;

    fn pause(&self) -> Result<()>;

    /// Discard queued audio. A blocked write returns early.
    fn flush(&self);

    /// Stop output. A blocked write returns early.
    fn stop(&self) -> Result<()>;

    /// Queue PCM, blocking while the buffer is full. Returns bytes accepted.
    fn write(&self, pcm: &[u8]) -> Result<usize>;

    /// Frames played since creation.
    fn playback_head_position(&self) -> u64;

    fn set_volume(&self, left: f32, right: f32) -> Result<()>;

    fn session_id(&self) -> i32;

    fn release(&self);
}

pub trait SinkFactory: Send + Sync {
    /// Smallest buffer in bytes the device accepts for this configuration.
    fn min_buffer_size(
        &self,
        sample_rate: u32,
        layout: ChannelLayout,
        encoding: PcmEncoding,
    ) -> Result<usize>;

    fn create(&self, spec: SinkSpec) -> Result<Arc<dyn AudioSink>>;
}
