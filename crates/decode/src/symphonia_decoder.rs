// Symphonia codecs behind the slot-queue interface

use crate::{BufferInfo, Decoder, DecoderFactory, OutputEvent, OutputFormat};
use std::collections::VecDeque;
use std::time::Duration;
use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{Decoder as CodecDecoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::Packet;
use tempo_core::{AudioError, Result};
use tempo_demux::TrackFormat;

/// Encoded samples that may be queued before output must be drained.
const INPUT_SLOTS: usize = 4;

struct QueuedInput {
    data: Vec<u8>,
    timestamp_us: i64,
    end_of_stream: bool,
}

struct DecodedBuffer {
    pcm: Vec<u8>,
    info: BufferInfo,
}

pub struct SymphoniaDecoder {
    codec: Option<Box<dyn CodecDecoder>>,
    format: Option<OutputFormat>,
    started: bool,
    next_slot: usize,
    input: VecDeque<QueuedInput>,
    input_eos: bool,
    /// Buffer decoded right before a format change, handed out on the next poll.
    staged: Option<DecodedBuffer>,
    outputs: Vec<Option<Vec<u8>>>,
    recycled: Vec<Vec<u8>>,
    sample_buf: Option<SampleBuffer<i16>>,
}

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self {
            codec: None,
            format: None,
            started: false,
            next_slot: 0,
            input: VecDeque::with_capacity(INPUT_SLOTS),
            input_eos: false,
            staged: None,
            outputs: Vec::new(),
            recycled: Vec::new(),
            sample_buf: None,
        }
    }

    fn ensure_started(&self) -> Result<()> {
        if self.started && self.codec.is_some() {
            Ok(())
        } else {
            Err(AudioError::InvalidState("decoder not started".to_string()))
        }
    }

    /// Park `pcm` in a free output slot and return its index.
    fn publish(&mut self, pcm: Vec<u8>) -> usize {
        if let Some(index) = self.outputs.iter().position(Option::is_none) {
            self.outputs[index] = Some(pcm);
            index
        } else {
            self.outputs.push(Some(pcm));
            self.outputs.len() - 1
        }
    }

    fn buffer_event(&mut self, decoded: DecodedBuffer) -> OutputEvent {
        let info = decoded.info;
        let index = self.publish(decoded.pcm);
        OutputEvent::Buffer { index, info }
    }

    /// Decode one queued packet. `Ok(None)` means the packet was dropped.
    fn decode_one(&mut self, input: QueuedInput) -> Result<Option<(DecodedBuffer, SignalSpec)>> {
        let codec = self
            .codec
            .as_mut()
            .ok_or_else(|| AudioError::InvalidState("decoder released".to_string()))?;
        let packet = Packet::new_from_slice(0, 0, 0, &input.data);

        let decoded = match codec.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("[decode] Skipping corrupt packet at {}us: {}", input.timestamp_us, e);
                return Ok(None);
            }
            Err(SymphoniaError::ResetRequired) => {
                log::warn!("[decode] Codec reset required");
                codec.reset();
                return Ok(None);
            }
            Err(e) => return Err(AudioError::DecodingError(e.to_string())),
        };

        let spec = *decoded.spec();
        let capacity = decoded.capacity() as u64;
        let reuse = matches!(
            &self.sample_buf,
            Some(buf) if buf.capacity() as u64 >= capacity * spec.channels.count() as u64
        );
        if !reuse {
            self.sample_buf = Some(SampleBuffer::<i16>::new(capacity, spec));
        }
        let Some(sample_buf) = self.sample_buf.as_mut() else {
            return Ok(None);
        };
        sample_buf.copy_interleaved_ref(decoded);

        let mut pcm = self.recycled.pop().unwrap_or_default();
        pcm.clear();
        pcm.reserve(sample_buf.samples().len() * 2);
        for sample in sample_buf.samples() {
            pcm.extend_from_slice(&sample.to_le_bytes());
        }

        let info = BufferInfo {
            size: pcm.len(),
            presentation_time_us: input.timestamp_us,
            end_of_stream: false,
        };
        Ok(Some((DecodedBuffer { pcm, info }, spec)))
    }
}

impl Default for SymphoniaDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for SymphoniaDecoder {
    fn configure(&mut self, format: &TrackFormat) -> Result<()> {
        let params = format.codec_params.clone().ok_or_else(|| {
            AudioError::UnsupportedFormat(format!("{} carries no codec parameters", format.mime))
        })?;
        let codec = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| AudioError::UnsupportedFormat(format!("{}: {}", format.mime, e)))?;

        log::info!(
            "[decode] Configured {} ({} Hz, {} ch)",
            format.mime,
            format.sample_rate,
            format.channel_count
        );
        self.codec = Some(codec);
        self.format = Some(OutputFormat {
            sample_rate: format.sample_rate,
            channels: format.channel_count,
        });
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        if self.codec.is_none() {
            return Err(AudioError::InvalidState("decoder not configured".to_string()));
        }
        self.started = true;
        Ok(())
    }

    fn dequeue_input_slot(&mut self, _timeout: Duration) -> Result<Option<usize>> {
        self.ensure_started()?;
        if self.input_eos || self.input.len() >= INPUT_SLOTS {
            return Ok(None);
        }
        let slot = self.next_slot;
        self.next_slot = (self.next_slot + 1) % INPUT_SLOTS;
        Ok(Some(slot))
    }

    fn queue_input(
        &mut self,
        _slot: usize,
        data: &[u8],
        timestamp_us: i64,
        end_of_stream: bool,
    ) -> Result<()> {
        self.ensure_started()?;
        if self.input_eos {
            return Err(AudioError::InvalidState("input after end of stream".to_string()));
        }
        self.input.push_back(QueuedInput {
            data: data.to_vec(),
            timestamp_us,
            end_of_stream,
        });
        self.input_eos = end_of_stream;
        Ok(())
    }

    fn dequeue_output(&mut self, _timeout: Duration) -> Result<OutputEvent> {
        self.ensure_started()?;
        if let Some(decoded) = self.staged.take() {
            return Ok(self.buffer_event(decoded));
        }

        while let Some(input) = self.input.pop_front() {
            let end_of_stream = input.end_of_stream;
            let timestamp_us = input.timestamp_us;
            let decoded = if input.data.is_empty() {
                None
            } else {
                self.decode_one(input)?
            };

            if let Some((mut decoded, spec)) = decoded {
                decoded.info.end_of_stream = end_of_stream;
                let format = OutputFormat {
                    sample_rate: spec.rate,
                    channels: spec.channels.count() as u16,
                };
                if self.format != Some(format) {
                    log::info!(
                        "[decode] Output format changed to {} Hz, {} ch",
                        format.sample_rate,
                        format.channels
                    );
                    self.format = Some(format);
                    self.staged = Some(decoded);
                    return Ok(OutputEvent::FormatChanged);
                }
                return Ok(self.buffer_event(decoded));
            }

            if end_of_stream {
                let eos = DecodedBuffer {
                    pcm: Vec::new(),
                    info: BufferInfo {
                        size: 0,
                        presentation_time_us: timestamp_us,
                        end_of_stream: true,
                    },
                };
                return Ok(self.buffer_event(eos));
            }
        }
        Ok(OutputEvent::TryAgainLater)
    }

    fn output_buffer(&self, index: usize) -> Result<&[u8]> {
        self.outputs
            .get(index)
            .and_then(|slot| slot.as_deref())
            .ok_or_else(|| AudioError::InvalidState(format!("no output buffer at {}", index)))
    }

    fn output_format(&self) -> Result<OutputFormat> {
        self.format
            .ok_or_else(|| AudioError::InvalidState("decoder not configured".to_string()))
    }

    fn release_output_buffer(&mut self, index: usize) -> Result<()> {
        let pcm = self
            .outputs
            .get_mut(index)
            .and_then(Option::take)
            .ok_or_else(|| AudioError::InvalidState(format!("no output buffer at {}", index)))?;
        self.recycled.push(pcm);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.input.clear();
        self.input_eos = false;
        self.staged = None;
        for slot in self.outputs.iter_mut() {
            if let Some(pcm) = slot.take() {
                self.recycled.push(pcm);
            }
        }
        if let Some(codec) = self.codec.as_mut() {
            codec.reset();
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.flush()?;
        self.started = false;
        Ok(())
    }

    fn release(&mut self) {
        self.started = false;
        self.codec = None;
        self.input.clear();
        self.outputs.clear();
        self.recycled.clear();
        self.staged = None;
        self.sample_buf = None;
    }
}

/// Creates [`SymphoniaDecoder`]s for any codec symphonia was built with.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoderFactory;

impl DecoderFactory for SymphoniaDecoderFactory {
    fn create(&self, format: &TrackFormat) -> Result<Box<dyn Decoder>> {
        if format.codec_params.is_none() {
            return Err(AudioError::UnsupportedFormat(format!(
                "no codec parameters for {}",
                format.mime
            )));
        }
        Ok(Box::new(SymphoniaDecoder::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use tempo_core::MediaSource;
    use tempo_demux::{Demuxer, DemuxerFactory, SymphoniaDemuxerFactory};

    const TIMEOUT: Duration = Duration::from_millis(10);

    fn write_wav(dir: &Path, frames: u32) -> (PathBuf, Vec<i16>) {
        let path = dir.join("ramp.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut samples = Vec::new();
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..frames {
            let left = (i % 2000) as i16 - 1000;
            let right = -left;
            writer.write_sample(left).unwrap();
            writer.write_sample(right).unwrap();
            samples.push(left);
            samples.push(right);
        }
        writer.finalize().unwrap();
        (path, samples)
    }

    fn open(path: &Path) -> (Box<dyn Demuxer>, TrackFormat) {
        let mut demuxer = SymphoniaDemuxerFactory
            .open(&MediaSource::path(path))
            .unwrap();
        let format = demuxer.track_format(0).unwrap();
        demuxer.select_track(0).unwrap();
        (demuxer, format)
    }

    /// Run the demux/decode loop to completion, collecting PCM.
    fn decode_all(demuxer: &mut dyn Demuxer, decoder: &mut dyn Decoder) -> (Vec<u8>, usize) {
        let mut pcm = Vec::new();
        let mut format_changes = 0;
        let mut sample = Vec::new();
        let mut input_eos = false;
        loop {
            if !input_eos {
                if let Some(slot) = decoder.dequeue_input_slot(TIMEOUT).unwrap() {
                    match demuxer.read_sample(&mut sample).unwrap() {
                        Some(_) => {
                            let ts = demuxer.sample_time_us().unwrap();
                            decoder.queue_input(slot, &sample, ts, false).unwrap();
                            demuxer.advance().unwrap();
                        }
                        None => {
                            decoder.queue_input(slot, &[], 0, true).unwrap();
                            input_eos = true;
                        }
                    }
                }
            }
            loop {
                match decoder.dequeue_output(TIMEOUT).unwrap() {
                    OutputEvent::Buffer { index, info } => {
                        pcm.extend_from_slice(decoder.output_buffer(index).unwrap());
                        decoder.release_output_buffer(index).unwrap();
                        if info.end_of_stream {
                            return (pcm, format_changes);
                        }
                    }
                    OutputEvent::FormatChanged => format_changes += 1,
                    OutputEvent::BuffersChanged => {}
                    OutputEvent::TryAgainLater => break,
                }
            }
        }
    }

    #[test]
    fn test_pcm_decodes_bit_exact() {
        let dir = tempfile::tempdir().unwrap();
        let (path, samples) = write_wav(dir.path(), 10_000);
        let (mut demuxer, format) = open(&path);

        let mut decoder = SymphoniaDecoderFactory.create(&format).unwrap();
        decoder.configure(&format).unwrap();
        decoder.start().unwrap();

        let (pcm, changes) = decode_all(demuxer.as_mut(), decoder.as_mut());
        assert_eq!(changes, 0);
        let expected: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        assert_eq!(pcm, expected);
        assert_eq!(
            decoder.output_format().unwrap(),
            OutputFormat {
                sample_rate: 44100,
                channels: 2
            }
        );
    }

    #[test]
    fn test_format_change_is_announced_before_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let (path, _) = write_wav(dir.path(), 4096);
        let (mut demuxer, mut format) = open(&path);
        // Announce a rate the stream does not have
        format.sample_rate = 22050;

        let mut decoder = SymphoniaDecoder::new();
        decoder.configure(&format).unwrap();
        decoder.start().unwrap();
        assert_eq!(decoder.output_format().unwrap().sample_rate, 22050);

        let mut sample = Vec::new();
        let slot = decoder.dequeue_input_slot(TIMEOUT).unwrap().unwrap();
        demuxer.read_sample(&mut sample).unwrap().unwrap();
        decoder.queue_input(slot, &sample, 0, false).unwrap();

        assert_eq!(decoder.dequeue_output(TIMEOUT).unwrap(), OutputEvent::FormatChanged);
        assert_eq!(decoder.output_format().unwrap().sample_rate, 44100);
        assert!(matches!(
            decoder.dequeue_output(TIMEOUT).unwrap(),
            OutputEvent::Buffer { .. }
        ));
        assert_eq!(decoder.dequeue_output(TIMEOUT).unwrap(), OutputEvent::TryAgainLater);
    }

    #[test]
    fn test_input_slots_are_bounded_and_flush_clears() {
        let dir = tempfile::tempdir().unwrap();
        let (path, _) = write_wav(dir.path(), 44100);
        let (mut demuxer, format) = open(&path);
        let mut decoder = SymphoniaDecoder::new();
        decoder.configure(&format).unwrap();
        decoder.start().unwrap();

        let mut sample = Vec::new();
        let mut queued = 0;
        while let Some(slot) = decoder.dequeue_input_slot(TIMEOUT).unwrap() {
            demuxer.read_sample(&mut sample).unwrap().unwrap();
            decoder.queue_input(slot, &sample, 0, false).unwrap();
            demuxer.advance().unwrap();
            queued += 1;
        }
        assert_eq!(queued, INPUT_SLOTS);

        decoder.flush().unwrap();
        assert_eq!(decoder.dequeue_output(TIMEOUT).unwrap(), OutputEvent::TryAgainLater);
        assert!(decoder.dequeue_input_slot(TIMEOUT).unwrap().is_some());
    }

    #[test]
    fn test_use_before_start_and_after_release() {
        let mut decoder = SymphoniaDecoder::new();
        assert!(decoder.start().is_err());
        assert!(decoder.dequeue_input_slot(TIMEOUT).is_err());

        let synthetic = TrackFormat::audio("audio/raw", 8000, 1, None);
        assert!(SymphoniaDecoderFactory.create(&synthetic).is_err());
        assert!(decoder.configure(&synthetic).is_err());

        decoder.release();
        assert!(decoder.dequeue_output(TIMEOUT).is_err());
    }
}
