// cpal output stream behind the sink interface

use crate::ring::PcmRing;
use crate::{AudioSink, ChannelLayout, PcmEncoding, SinkFactory, SinkSpec};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tempo_core::{AudioError, Result};

/// Largest ring we agree to allocate, in samples (about 20 s of 8ch 48kHz)
const MAX_RING_SAMPLES: usize = 8 * 1024 * 1024;

/// Samples converted per ring write.
const WRITE_CHUNK: usize = 4096;

static NEXT_SESSION_ID: AtomicI32 = AtomicI32::new(1);

enum Command {
    Play,
    Pause,
    Shutdown,
}

/// State shared with the device callback.
struct Shared {
    playing: AtomicBool,
    frames_played: AtomicU64,
    left_volume: AtomicU32,
    right_volume: AtomicU32,
}

impl Shared {
    fn volume(&self) -> (f32, f32) {
        (
            f32::from_bits(self.left_volume.load(Ordering::Relaxed)),
            f32::from_bits(self.right_volume.load(Ordering::Relaxed)),
        )
    }
}

pub struct CpalSink {
    spec: SinkSpec,
    ring: Arc<PcmRing>,
    shared: Arc<Shared>,
    commands: Mutex<Option<mpsc::Sender<Command>>>,
    stream_thread: Mutex<Option<JoinHandle<()>>>,
    session_id: i32,
}

impl CpalSink {
    pub fn new(spec: SinkSpec) -> Result<Self> {
        let channels = spec.channels() as usize;
        let ring_samples = spec.buffer_size / spec.encoding.bytes_per_sample();
        if ring_samples < channels {
            return Err(AudioError::InitializationError(format!(
                "buffer of {} bytes holds no frame",
                spec.buffer_size
            )));
        }
        if ring_samples > MAX_RING_SAMPLES {
            return Err(AudioError::ResourceExhausted(format!(
                "sink buffer of {} bytes is too large",
                spec.buffer_size
            )));
        }

        let ring = Arc::new(PcmRing::new(ring_samples - ring_samples % channels));
        let shared = Arc::new(Shared {
            playing: AtomicBool::new(false),
            frames_played: AtomicU64::new(0),
            left_volume: AtomicU32::new(1.0f32.to_bits()),
            right_volume: AtomicU32::new(1.0f32.to_bits()),
        });

        // The stream is not Send on every platform, so it lives on its own thread
        let (command_tx, command_rx) = mpsc::channel::<Command>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);
        let stream_ring = ring.clone();
        let stream_shared = shared.clone();
        let stream_thread = thread::Builder::new()
            .name("tempo-cpal-sink".to_string())
            .spawn(move || run_stream(spec, stream_ring, stream_shared, command_rx, ready_tx))
            .map_err(|e| AudioError::DeviceError(format!("failed to spawn stream thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = stream_thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = stream_thread.join();
                return Err(AudioError::DeviceError("stream thread exited".to_string()));
            }
        }

        let session_id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        log::info!(
            "[sink] Created cpal sink #{}: {} Hz, {} ch, {} bytes",
            session_id,
            spec.sample_rate,
            channels,
            spec.buffer_size
        );

        Ok(Self {
            spec,
            ring,
            shared,
            commands: Mutex::new(Some(command_tx)),
            stream_thread: Mutex::new(Some(stream_thread)),
            session_id,
        })
    }

    fn send(&self, command: Command) -> Result<()> {
        let commands = self.commands.lock();
        let sender = commands
            .as_ref()
            .ok_or_else(|| AudioError::InvalidState("sink released".to_string()))?;
        sender
            .send(command)
            .map_err(|_| AudioError::DeviceError("stream thread is gone".to_string()))
    }
}

fn run_stream(
    spec: SinkSpec,
    ring: Arc<PcmRing>,
    shared: Arc<Shared>,
    commands: mpsc::Receiver<Command>,
    ready: mpsc::SyncSender<Result<()>>,
) {
    let stream = match build_stream(spec, ring, shared) {
        Ok(stream) => {
            let _ = ready.send(Ok(()));
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    for command in commands {
        let result = match command {
            Command::Play => stream.play().map_err(|e| e.to_string()),
            Command::Pause => stream.pause().map_err(|e| e.to_string()),
            Command::Shutdown => break,
        };
        if let Err(e) = result {
            log::error!("[sink] Stream control failed: {}", e);
        }
    }
    log::debug!("[sink] Stream thread exiting");
}

fn build_stream(spec: SinkSpec, ring: Arc<PcmRing>, shared: Arc<Shared>) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| AudioError::DeviceError("no output device available".to_string()))?;

    let config = StreamConfig {
        channels: spec.channels(),
        sample_rate: cpal::SampleRate(spec.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    let channels = spec.channels() as usize;

    device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if !shared.playing.load(Ordering::Relaxed) {
                    data.fill(0.0);
                    return;
                }
                let n = ring.read(data);
                data[n..].fill(0.0);
                let (left, right) = shared.volume();
                apply_volume(&mut data[..n], channels, left, right);
                shared
                    .frames_played
                    .fetch_add((n / channels) as u64, Ordering::Relaxed);
            },
            |err| log::error!("[sink] Stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::DeviceError(format!("failed to build output stream: {}", e)))
}

/// Scale interleaved frames: left gain on channel 0, right on channel 1,
/// their mean on any further channel.
pub(crate) fn apply_volume(samples: &mut [f32], channels: usize, left: f32, right: f32) {
    if left == 1.0 && right == 1.0 {
        return;
    }
    if channels == 1 {
        let gain = (left + right) * 0.5;
        samples.iter_mut().for_each(|s| *s *= gain);
        return;
    }
    let center = (left + right) * 0.5;
    for frame in samples.chunks_mut(channels) {
        for (ch, sample) in frame.iter_mut().enumerate() {
            *sample *= match ch {
                0 => left,
                1 => right,
                _ => center,
            };
        }
    }
}

/// Convert signed 16-bit little-endian PCM to f32 in [-1, 1).
pub(crate) fn pcm16_to_f32(pcm: &[u8], out: &mut Vec<f32>) {
    out.clear();
    out.extend(
        pcm.chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0),
    );
}

impl AudioSink for CpalSink {
    fn play(&self) -> Result<()> {
        self.ring.reopen();
        self.shared.playing.store(true, Ordering::Relaxed);
        self.send(Command::Play)
    }

    fn pause(&self) -> Result<()> {
        self.shared.playing.store(false, Ordering::Relaxed);
        self.send(Command::Pause)
    }

    fn flush(&self) {
        self.ring.flush();
    }

    fn stop(&self) -> Result<()> {
        self.shared.playing.store(false, Ordering::Relaxed);
        self.ring.close();
        self.ring.flush();
        self.send(Command::Pause)
    }

    fn write(&self, pcm: &[u8]) -> Result<usize> {
        if self.commands.lock().is_none() {
            return Err(AudioError::InvalidState("write to released sink".to_string()));
        }
        let frame_bytes = self.spec.frame_bytes();
        let usable = pcm.len() - pcm.len() % frame_bytes;

        let mut samples = Vec::with_capacity(WRITE_CHUNK);
        let mut written = 0;
        for chunk in pcm[..usable].chunks(WRITE_CHUNK * 2) {
            pcm16_to_f32(chunk, &mut samples);
            let accepted = self.ring.write_blocking(&samples);
            written += accepted * 2;
            if accepted < samples.len() {
                break;
            }
        }
        Ok(written)
    }

    fn playback_head_position(&self) -> u64 {
        self.shared.frames_played.load(Ordering::Relaxed)
    }

    fn set_volume(&self, left: f32, right: f32) -> Result<()> {
        let clamp = |v: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { 1.0 };
        self.shared
            .left_volume
            .store(clamp(left).to_bits(), Ordering::Relaxed);
        self.shared
            .right_volume
            .store(clamp(right).to_bits(), Ordering::Relaxed);
        Ok(())
    }

    fn session_id(&self) -> i32 {
        self.session_id
    }

    fn release(&self) {
        self.shared.playing.store(false, Ordering::Relaxed);
        self.ring.close();
        self.ring.flush();
        if let Some(sender) = self.commands.lock().take() {
            let _ = sender.send(Command::Shutdown);
        }
        if let Some(handle) = self.stream_thread.lock().take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
            log::debug!("[sink] Released sink #{}", self.session_id);
        }
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.release();
    }
}

/// Creates cpal sinks sized from a latency target.
#[derive(Debug, Clone, Copy)]
pub struct CpalSinkFactory {
    latency: Duration,
}

impl CpalSinkFactory {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

impl Default for CpalSinkFactory {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl SinkFactory for CpalSinkFactory {
    fn min_buffer_size(
        &self,
        sample_rate: u32,
        layout: ChannelLayout,
        encoding: PcmEncoding,
    ) -> Result<usize> {
        if sample_rate == 0 {
            return Err(AudioError::UnsupportedFormat("sample rate 0".to_string()));
        }
        let frames = (sample_rate as u128 * self.latency.as_micros() / 1_000_000).max(1) as usize;
        Ok(frames * layout.channel_count() as usize * encoding.bytes_per_sample())
    }

    fn create(&self, spec: SinkSpec) -> Result<Arc<dyn AudioSink>> {
        Ok(Arc::new(CpalSink::new(spec)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_buffer_size_from_latency() {
        let factory = CpalSinkFactory::default();
        let size = factory
            .min_buffer_size(48000, ChannelLayout::STEREO, PcmEncoding::Pcm16)
            .unwrap();
        assert_eq!(size, 4800 * 4);
        assert!(factory
            .min_buffer_size(0, ChannelLayout::MONO, PcmEncoding::Pcm16)
            .is_err());
    }

    #[test]
    fn test_oversized_buffer_is_resource_exhaustion() {
        let spec = SinkSpec {
            sample_rate: 48000,
            layout: ChannelLayout::STEREO,
            encoding: PcmEncoding::Pcm16,
            buffer_size: (MAX_RING_SAMPLES + 2) * 2,
        };
        assert!(matches!(
            CpalSink::new(spec),
            Err(AudioError::ResourceExhausted(_))
        ));
    }

    #[test]
    fn test_pcm16_conversion() {
        let pcm: Vec<u8> = [0i16, 16384, -32768, 32767]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let mut out = Vec::new();
        pcm16_to_f32(&pcm, &mut out);
        assert_eq!(out[0], 0.0);
        assert_eq!(out[1], 0.5);
        assert_eq!(out[2], -1.0);
        assert!(out[3] < 1.0 && out[3] > 0.999);
    }

    #[test]
    fn test_per_channel_volume() {
        let mut stereo = [1.0, 1.0, 0.5, 0.5];
        apply_volume(&mut stereo, 2, 0.5, 0.0);
        assert_eq!(stereo, [0.5, 0.0, 0.25, 0.0]);

        let mut surround = [1.0; 3];
        apply_volume(&mut surround, 3, 1.0, 0.0);
        assert_eq!(surround, [1.0, 0.0, 0.5]);

        let mut mono = [1.0, -1.0];
        apply_volume(&mut mono, 1, 1.0, 0.5);
        assert_eq!(mono, [0.75, -0.75]);
    }
}
