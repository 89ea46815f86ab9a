// Slot-queue audio decoding into 16-bit PCM

mod symphonia_decoder;

pub use symphonia_decoder::{SymphoniaDecoder, SymphoniaDecoderFactory};

use std::time::Duration;
use tempo_core::Result;
use tempo_demux::TrackFormat;

/// Metadata for one decoded output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    pub size: usize,
    pub presentation_time_us: i64,
    pub end_of_stream: bool,
}

/// Result of polling the decoder for output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEvent {
    /// A decoded buffer is ready at `index` until released.
    Buffer { index: usize, info: BufferInfo },
    /// Sample rate or channel count changed; re-read [`Decoder::output_format`].
    FormatChanged,
    /// Output buffer set was reallocated.
    BuffersChanged,
    /// Nothing ready yet.
    TryAgainLater,
}

/// Interleaved 16-bit little-endian PCM layout of decoder output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Codec driven through input and output slots.
///
/// Callers take an input slot, fill it with one encoded sample, then drain
/// outputs until [`OutputEvent::TryAgainLater`]. Output buffers must be
/// released before they are reused.
pub trait Decoder: Send {
    fn configure(&mut self, format: &TrackFormat) -> Result<()>;

    fn start(&mut self) -> Result<()>;

    fn dequeue_input_slot(&mut self, timeout: Duration) -> Result<Option<usize>>;

    fn queue_input(
        &mut self,
        slot: usize,
        data: &[u8],
        timestamp_us: i64,
        end_of_stream: bool,
    ) -> Result<()>;

    fn dequeue_output(&mut self, timeout: Duration) -> Result<OutputEvent>;

    fn output_buffer(&self, index: usize) -> Result<&[u8]>;

    fn output_format(&self) -> Result<OutputFormat>;

    fn release_output_buffer(&mut self, index: usize) -> Result<()>;

    /// Drop queued input and pending output, e.g. after a seek.
    fn flush(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    fn release(&mut self);
}

pub trait DecoderFactory: Send + Sync {
    /// Create an unconfigured decoder able to handle `format`.
    fn create(&self, format: &TrackFormat) -> Result<Box<dyn Decoder>>;
}
