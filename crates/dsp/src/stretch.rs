// Speed and pitch control over interleaved 16-bit PCM

use std::collections::VecDeque;
use tempo_core::{AudioError, Result};

/// Stateful PCM transform between decoder output and the sink.
///
/// Input is appended with [`TimeStretch::write_bytes`]; transformed output is
/// buffered until read. Parameters can change between writes.
pub trait TimeStretch: Send {
    fn set_speed(&mut self, speed: f32);
    fn set_pitch(&mut self, pitch: f32);
    fn sample_rate(&self) -> u32;
    fn channels(&self) -> u16;
    fn write_bytes(&mut self, pcm: &[u8]);
    /// Process everything still buffered, padding the final frame.
    fn flush(&mut self);
    /// Drop buffered input and output.
    fn clear(&mut self);
    fn bytes_available(&self) -> usize;
    fn read_bytes(&mut self, out: &mut [u8]) -> usize;
}

pub trait StretchFactory: Send + Sync {
    fn create(&self, sample_rate: u32, channels: u16) -> Result<Box<dyn TimeStretch>>;
}

/// Linear-interpolation resampler: speed and pitch both scale the playback rate.
pub struct Varispeed {
    sample_rate: u32,
    channels: usize,
    speed: f32,
    pitch: f32,
    /// Input bytes that do not yet form a whole frame.
    partial: Vec<u8>,
    /// Unconsumed input frames, interleaved.
    input: Vec<i16>,
    /// Read position in frames relative to the start of `input`.
    position: f64,
    output: VecDeque<u8>,
}

impl Varispeed {
    pub fn new(sample_rate: u32, channels: u16) -> Result<Self> {
        if sample_rate == 0 || channels == 0 {
            return Err(AudioError::InitializationError(format!(
                "invalid stretch config: {} Hz, {} ch",
                sample_rate, channels
            )));
        }
        Ok(Self {
            sample_rate,
            channels: channels as usize,
            speed: 1.0,
            pitch: 1.0,
            partial: Vec::new(),
            input: Vec::new(),
            position: 0.0,
            output: VecDeque::new(),
        })
    }

    fn ratio(&self) -> f64 {
        (self.speed as f64 * self.pitch as f64).max(f64::MIN_POSITIVE)
    }

    fn frame_bytes(&self) -> usize {
        self.channels * 2
    }

    fn frames_buffered(&self) -> usize {
        self.input.len() / self.channels
    }

    fn is_passthrough(&self) -> bool {
        self.ratio() == 1.0 && self.input.is_empty() && self.position == 0.0
    }

    fn push_sample(&mut self, sample: i16) {
        self.output.extend(sample.to_le_bytes());
    }

    /// Emit output frames while two input frames bracket the read position.
    /// With `pad`, the last frame is held for the final interpolation.
    fn render(&mut self, pad: bool) {
        let step = self.ratio();
        let frames = self.frames_buffered();
        let limit = if pad { frames } else { frames.saturating_sub(1) };

        while (self.position as usize) < limit {
            let index = self.position as usize;
            let next = (index + 1).min(frames - 1);
            let frac = self.position - index as f64;
            for ch in 0..self.channels {
                let a = self.input[index * self.channels + ch] as f64;
                let b = self.input[next * self.channels + ch] as f64;
                let value = (a + (b - a) * frac).round();
                self.push_sample(value.clamp(i16::MIN as f64, i16::MAX as f64) as i16);
            }
            self.position += step;
        }

        let consumed = (self.position as usize).min(frames);
        self.input.drain(..consumed * self.channels);
        self.position -= consumed as f64;
    }
}

impl TimeStretch for Varispeed {
    fn set_speed(&mut self, speed: f32) {
        if speed > 0.0 && speed.is_finite() {
            self.speed = speed;
        }
    }

    fn set_pitch(&mut self, pitch: f32) {
        if pitch > 0.0 && pitch.is_finite() {
            self.pitch = pitch;
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels as u16
    }

    fn write_bytes(&mut self, pcm: &[u8]) {
        let frame_bytes = self.frame_bytes();
        if self.is_passthrough() && self.partial.is_empty() {
            let whole = pcm.len() - pcm.len() % frame_bytes;
            self.output.extend(&pcm[..whole]);
            self.partial.extend_from_slice(&pcm[whole..]);
            return;
        }

        self.partial.extend_from_slice(pcm);
        let whole = self.partial.len() - self.partial.len() % frame_bytes;
        if self.is_passthrough() {
            self.output.extend(self.partial.drain(..whole));
            return;
        }
        self.input.extend(
            self.partial[..whole]
                .chunks_exact(2)
                .map(|b| i16::from_le_bytes([b[0], b[1]])),
        );
        self.partial.drain(..whole);
        self.render(false);
    }

    fn flush(&mut self) {
        if !self.partial.is_empty() {
            log::trace!("[stretch] Dropping {} trailing bytes", self.partial.len());
            self.partial.clear();
        }
        if !self.input.is_empty() {
            self.render(true);
        }
        self.input.clear();
        self.position = 0.0;
    }

    fn clear(&mut self) {
        self.partial.clear();
        self.input.clear();
        self.output.clear();
        self.position = 0.0;
    }

    fn bytes_available(&self) -> usize {
        self.output.len()
    }

    fn read_bytes(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.output.len());
        for (dst, src) in out.iter_mut().zip(self.output.drain(..n)) {
            *dst = src;
        }
        n
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct VarispeedFactory;

impl StretchFactory for VarispeedFactory {
    fn create(&self, sample_rate: u32, channels: u16) -> Result<Box<dyn TimeStretch>> {
        Ok(Box::new(Varispeed::new(sample_rate, channels)?))
    }
}
