// Demuxing with Symphonia format readers

use crate::format::{codec_mime, TrackFormat};
use crate::{Demuxer, DemuxerFactory, SeekMode};
use std::fs::File;
use std::path::Path;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet, SeekMode as ReaderSeekMode, SeekTo};
use symphonia::core::io::{MediaSource as ByteSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};
use tempo_core::{AudioError, MediaSource, Result};
use tempo_transport_http::{is_http_uri, DownloadProgress, HttpRangeSource};

pub struct SymphoniaDemuxer {
    reader: Option<Box<dyn FormatReader>>,
    selected: Option<u32>,
    current: Option<Packet>,
    end_of_input: bool,
    progress: Option<DownloadProgress>,
}

impl SymphoniaDemuxer {
    pub fn open(source: &MediaSource) -> Result<Self> {
        let mut hint = Hint::new();
        if let Some(ext) = source.extension() {
            hint.with_extension(&ext);
        }

        let (bytes, progress): (Box<dyn ByteSource>, Option<DownloadProgress>) =
            match (source.local_path(), source) {
                (Some(path), _) => (Box::new(open_file(path)?), None),
                (None, MediaSource::Uri(uri)) if is_http_uri(uri) => {
                    let http = HttpRangeSource::open(uri)?;
                    let progress = http.progress();
                    (Box::new(http), Some(progress))
                }
                (None, other) => {
                    return Err(AudioError::LoadError(format!("unsupported source {}", other)))
                }
            };

        let stream = MediaSourceStream::new(bytes, Default::default());
        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                stream,
                &FormatOptions {
                    enable_gapless: true,
                    ..Default::default()
                },
                &MetadataOptions::default(),
            )
            .map_err(|e| AudioError::LoadError(format!("failed to probe {}: {}", source, e)))?;

        log::info!(
            "[demux] Opened {} with {} track(s)",
            source,
            probed.format.tracks().len()
        );

        Ok(Self {
            reader: Some(probed.format),
            selected: None,
            current: None,
            end_of_input: false,
            progress,
        })
    }

    fn reader(&self) -> Result<&dyn FormatReader> {
        self.reader
            .as_deref()
            .ok_or_else(|| AudioError::InvalidState("demuxer released".to_string()))
    }

    fn reader_mut(&mut self) -> Result<&mut Box<dyn FormatReader>> {
        self.reader
            .as_mut()
            .ok_or_else(|| AudioError::InvalidState("demuxer released".to_string()))
    }

    fn track_id(&self, index: usize) -> Result<u32> {
        self.reader()?
            .tracks()
            .get(index)
            .map(|t| t.id)
            .ok_or_else(|| AudioError::LoadError(format!("no track at index {}", index)))
    }

    fn time_base(&self) -> Option<TimeBase> {
        let id = self.selected?;
        self.reader
            .as_ref()?
            .tracks()
            .iter()
            .find(|t| t.id == id)
            .and_then(|t| t.codec_params.time_base)
    }

    /// Load the next packet of the selected track into `current`.
    fn fill_current(&mut self) -> Result<()> {
        if self.current.is_some() || self.end_of_input {
            return Ok(());
        }
        let Some(track_id) = self.selected else {
            return Err(AudioError::InvalidState("no track selected".to_string()));
        };
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| AudioError::InvalidState("demuxer released".to_string()))?;
        loop {
            match reader.next_packet() {
                Ok(packet) if packet.track_id() == track_id => {
                    self.current = Some(packet);
                    return Ok(());
                }
                Ok(_) => continue,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    log::debug!("[demux] End of input");
                    self.end_of_input = true;
                    return Ok(());
                }
                Err(SymphoniaError::ResetRequired) => {
                    log::warn!("[demux] Stream reset required, treating as end of input");
                    self.end_of_input = true;
                    return Ok(());
                }
                Err(e) => {
                    return Err(AudioError::DecodingError(format!("failed to read packet: {}", e)))
                }
            }
        }
    }
}

fn open_file(path: &Path) -> Result<File> {
    File::open(path)
        .map_err(|e| AudioError::LoadError(format!("cannot open {}: {}", path.display(), e)))
}

fn time_to_us(time: Time) -> u64 {
    time.seconds * 1_000_000 + (time.frac * 1_000_000.0) as u64
}

impl Demuxer for SymphoniaDemuxer {
    fn track_count(&self) -> usize {
        self.reader.as_ref().map(|r| r.tracks().len()).unwrap_or(0)
    }

    fn track_format(&self, index: usize) -> Result<TrackFormat> {
        let reader = self.reader()?;
        let track = reader
            .tracks()
            .get(index)
            .ok_or_else(|| AudioError::LoadError(format!("no track at index {}", index)))?;
        let params = &track.codec_params;

        let mime = match (params.sample_rate, codec_mime(params.codec)) {
            (Some(_), Some(mime)) => mime,
            _ => "application/octet-stream".to_string(),
        };
        let duration_us = params
            .time_base
            .zip(params.n_frames)
            .map(|(tb, frames)| time_to_us(tb.calc_time(frames)));

        Ok(TrackFormat {
            mime,
            sample_rate: params.sample_rate.unwrap_or(0),
            channel_count: params.channels.map(|c| c.count() as u16).unwrap_or(0),
            duration_us,
            codec_params: Some(params.clone()),
        })
    }

    fn select_track(&mut self, index: usize) -> Result<()> {
        let id = self.track_id(index)?;
        if self.selected != Some(id) {
            self.selected = Some(id);
            self.current = None;
        }
        Ok(())
    }

    fn unselect_track(&mut self, index: usize) -> Result<()> {
        let id = self.track_id(index)?;
        if self.selected == Some(id) {
            self.selected = None;
            self.current = None;
        }
        Ok(())
    }

    fn read_sample(&mut self, buf: &mut Vec<u8>) -> Result<Option<usize>> {
        self.fill_current()?;
        buf.clear();
        match &self.current {
            Some(packet) => {
                buf.extend_from_slice(&packet.data);
                Ok(Some(packet.data.len()))
            }
            None => Ok(None),
        }
    }

    fn sample_time_us(&self) -> Option<i64> {
        let packet = self.current.as_ref()?;
        let tb = self.time_base()?;
        Some(time_to_us(tb.calc_time(packet.ts())) as i64)
    }

    fn advance(&mut self) -> Result<bool> {
        self.current = None;
        self.fill_current()?;
        Ok(self.current.is_some())
    }

    fn seek_to(&mut self, time_us: i64, mode: SeekMode) -> Result<()> {
        let reader_mode = match mode {
            SeekMode::PrecedingSync => ReaderSeekMode::Accurate,
        };
        let track_id = self
            .selected
            .ok_or_else(|| AudioError::InvalidState("seek without a selected track".to_string()))?;
        let time_us = time_us.max(0) as u64;
        let time = Time::new(time_us / 1_000_000, (time_us % 1_000_000) as f64 / 1_000_000.0);

        let seeked = self
            .reader_mut()?
            .seek(
                reader_mode,
                SeekTo::Time {
                    time,
                    track_id: Some(track_id),
                },
            )
            .map_err(|e| AudioError::DecodingError(format!("seek failed: {}", e)))?;

        log::debug!(
            "[demux] Seeked to ts {} (requested {})",
            seeked.actual_ts,
            seeked.required_ts
        );
        self.current = None;
        self.end_of_input = false;
        self.fill_current()
    }

    fn buffered_percent(&self) -> Option<u8> {
        self.progress.as_ref().and_then(|p| p.percent())
    }

    fn release(&mut self) {
        if self.reader.take().is_some() {
            log::debug!("[demux] Released");
        }
        self.current = None;
        self.selected = None;
    }
}

/// Opens sources with [`SymphoniaDemuxer`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDemuxerFactory;

impl DemuxerFactory for SymphoniaDemuxerFactory {
    fn open(&self, source: &MediaSource) -> Result<Box<dyn Demuxer>> {
        Ok(Box::new(SymphoniaDemuxer::open(source)?))
    }
}
