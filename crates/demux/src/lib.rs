// Container demuxing: track discovery and timestamped encoded samples

mod format;
mod reader;

pub use format::{codec_mime, TrackFormat, MIME_RAW};
pub use reader::{SymphoniaDemuxer, SymphoniaDemuxerFactory};

use tempo_core::{MediaSource, Result};

/// Where a seek lands relative to the requested time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    /// The last sync point at or before the target.
    PrecedingSync,
}

/// Pull-style demuxer over one opened source.
///
/// The current sample is read with [`Demuxer::read_sample`] and moved past with
/// [`Demuxer::advance`]; reading twice without advancing yields the same sample.
pub trait Demuxer: Send {
    fn track_count(&self) -> usize;

    fn track_format(&self, index: usize) -> Result<TrackFormat>;

    fn select_track(&mut self, index: usize) -> Result<()>;

    fn unselect_track(&mut self, index: usize) -> Result<()>;

    /// Copy the current sample into `buf`. `None` means end of input.
    fn read_sample(&mut self, buf: &mut Vec<u8>) -> Result<Option<usize>>;

    /// Presentation time of the current sample, `None` at end of input.
    fn sample_time_us(&self) -> Option<i64>;

    /// Move to the next sample. Returns `false` once input is exhausted.
    fn advance(&mut self) -> Result<bool>;

    fn seek_to(&mut self, time_us: i64, mode: SeekMode) -> Result<()>;

    /// Download progress for network sources.
    fn buffered_percent(&self) -> Option<u8> {
        None
    }

    fn release(&mut self);
}

pub trait DemuxerFactory: Send + Sync {
    fn open(&self, source: &MediaSource) -> Result<Box<dyn Demuxer>>;
}

/// Index of the first track whose MIME type is audio.
pub fn find_audio_track(demuxer: &dyn Demuxer) -> Result<Option<(usize, TrackFormat)>> {
    for index in 0..demuxer.track_count() {
        let format = demuxer.track_format(index)?;
        if format.is_audio() {
            return Ok(Some((index, format)));
        }
    }
    Ok(None)
}
