// Scripted collaborators that count every handle they hand out
#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tempo_player::decode::{BufferInfo, Decoder, DecoderFactory, OutputEvent, OutputFormat};
use tempo_player::demux::{Demuxer, DemuxerFactory, SeekMode, TrackFormat, MIME_RAW};
use tempo_player::dsp::VarispeedFactory;
use tempo_player::sink::{AudioSink, ChannelLayout, PcmEncoding, SinkFactory, SinkSpec};
use tempo_player::{AudioError, Collaborators, MediaPlayer, MediaSource, PlayerConfig, Result};

pub const SAMPLE_RATE: u32 = 44100;
pub const CHANNELS: u16 = 2;
/// One demuxer sample is 10 ms of stereo audio.
pub const SAMPLE_SPACING_US: i64 = 10_000;
pub const FRAMES_PER_SAMPLE: usize = 441;
pub const SAMPLE_BYTES: usize = FRAMES_PER_SAMPLE * 4;
pub const MIN_SINK_BUFFER: usize = 4096;

/// PCM carried by sample `index`. Right is always left + 2.
pub fn payload(index: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(SAMPLE_BYTES);
    for frame in 0..FRAMES_PER_SAMPLE {
        let left = ((index * FRAMES_PER_SAMPLE + frame) % 2000) as i16;
        out.extend_from_slice(&left.to_le_bytes());
        out.extend_from_slice(&(left + 2).to_le_bytes());
    }
    out
}

pub fn expected_pcm(samples: Range<usize>) -> Vec<u8> {
    samples.flat_map(payload).collect()
}

pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

pub fn test_config() -> PlayerConfig {
    PlayerConfig {
        dequeue_timeout_ms: 5,
        drain_poll_interval_ms: 5,
        ..PlayerConfig::default()
    }
}

pub fn local_source() -> MediaSource {
    MediaSource::path("/media/episode.mp3")
}

#[derive(Clone)]
pub struct Script {
    pub samples: usize,
    pub format_change: Option<(usize, u32)>,
    pub open_error: Option<AudioError>,
    pub without_audio: bool,
    pub open_delay: Duration,
    pub panic_on_decode: bool,
    pub buffering: Option<u8>,
}

impl Script {
    pub fn new(samples: usize) -> Self {
        Self {
            samples,
            format_change: None,
            open_error: None,
            without_audio: false,
            open_delay: Duration::ZERO,
            panic_on_decode: false,
            buffering: None,
        }
    }

    /// Switch decoder output to `sample_rate` when sample `at` comes out.
    pub fn with_format_change(mut self, at: usize, sample_rate: u32) -> Self {
        self.format_change = Some((at, sample_rate));
        self
    }

    pub fn with_open_error(mut self, err: AudioError) -> Self {
        self.open_error = Some(err);
        self
    }

    pub fn without_audio(mut self) -> Self {
        self.without_audio = true;
        self
    }

    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panic_on_decode = true;
        self
    }

    pub fn with_buffering(mut self, percent: u8) -> Self {
        self.buffering = Some(percent);
        self
    }

    pub fn duration_us(&self) -> u64 {
        self.samples as u64 * SAMPLE_SPACING_US as u64
    }
}

#[derive(Default)]
pub struct Log {
    pub demuxers_opened: AtomicUsize,
    pub demuxers_released: AtomicUsize,
    pub decoders_created: AtomicUsize,
    pub decoders_released: AtomicUsize,
    pub decoder_flushes: AtomicUsize,
    pub seeks: Mutex<Vec<(i64, SeekMode)>>,
    pub selected: Mutex<Vec<usize>>,
    pub unselected: Mutex<Vec<usize>>,
}

impl Log {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn seeks(&self) -> Vec<(i64, SeekMode)> {
        self.seeks.lock().clone()
    }
}

// ---- demuxer ----

pub struct MockDemuxer {
    script: Arc<Script>,
    log: Arc<Log>,
    index: usize,
}

impl Demuxer for MockDemuxer {
    fn track_count(&self) -> usize {
        2
    }

    fn track_format(&self, index: usize) -> Result<TrackFormat> {
        match index {
            0 => Ok(TrackFormat::audio("video/avc", 0, 0, None)),
            1 if self.script.without_audio => Ok(TrackFormat::audio("text/vtt", 0, 0, None)),
            1 => Ok(TrackFormat::audio(
                MIME_RAW,
                SAMPLE_RATE,
                CHANNELS,
                Some(self.script.duration_us()),
            )),
            _ => Err(AudioError::Other(format!("no track {}", index))),
        }
    }

    fn select_track(&mut self, index: usize) -> Result<()> {
        self.log.selected.lock().push(index);
        Ok(())
    }

    fn unselect_track(&mut self, index: usize) -> Result<()> {
        self.log.unselected.lock().push(index);
        Ok(())
    }

    fn read_sample(&mut self, buf: &mut Vec<u8>) -> Result<Option<usize>> {
        if self.index >= self.script.samples {
            return Ok(None);
        }
        buf.clear();
        buf.extend_from_slice(&payload(self.index));
        Ok(Some(buf.len()))
    }

    fn sample_time_us(&self) -> Option<i64> {
        (self.index < self.script.samples).then(|| self.index as i64 * SAMPLE_SPACING_US)
    }

    fn advance(&mut self) -> Result<bool> {
        self.index = (self.index + 1).min(self.script.samples);
        Ok(self.index < self.script.samples)
    }

    fn seek_to(&mut self, time_us: i64, mode: SeekMode) -> Result<()> {
        self.log.seeks.lock().push((time_us, mode));
        self.index = ((time_us.max(0) / SAMPLE_SPACING_US) as usize).min(self.script.samples);
        Ok(())
    }

    fn buffered_percent(&self) -> Option<u8> {
        self.script.buffering
    }

    fn release(&mut self) {
        self.log.demuxers_released.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct MockDemuxerFactory {
    script: Arc<Script>,
    log: Arc<Log>,
}

impl DemuxerFactory for MockDemuxerFactory {
    fn open(&self, _source: &MediaSource) -> Result<Box<dyn Demuxer>> {
        thread::sleep(self.script.open_delay);
        if let Some(err) = &self.script.open_error {
            return Err(err.clone());
        }
        self.log.demuxers_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockDemuxer {
            script: Arc::clone(&self.script),
            log: Arc::clone(&self.log),
            index: 0,
        }))
    }
}

// ---- decoder ----

struct Pending {
    index: usize,
    data: Vec<u8>,
    timestamp_us: i64,
    end_of_stream: bool,
}

/// Hands encoded bytes straight back as PCM.
pub struct MockDecoder {
    script: Arc<Script>,
    log: Arc<Log>,
    format: OutputFormat,
    started: bool,
    queued: usize,
    pending: VecDeque<Pending>,
    output: Option<Vec<u8>>,
}

impl Decoder for MockDecoder {
    fn configure(&mut self, format: &TrackFormat) -> Result<()> {
        self.format = OutputFormat {
            sample_rate: format.sample_rate,
            channels: format.channel_count,
        };
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.started = true;
        Ok(())
    }

    fn dequeue_input_slot(&mut self, _timeout: Duration) -> Result<Option<usize>> {
        if !self.started {
            return Err(AudioError::InvalidState("decoder not started".to_string()));
        }
        Ok((self.pending.len() < 4).then_some(0))
    }

    fn queue_input(
        &mut self,
        _slot: usize,
        data: &[u8],
        timestamp_us: i64,
        end_of_stream: bool,
    ) -> Result<()> {
        self.pending.push_back(Pending {
            index: self.queued,
            data: data.to_vec(),
            timestamp_us,
            end_of_stream,
        });
        self.queued += 1;
        Ok(())
    }

    fn dequeue_output(&mut self, _timeout: Duration) -> Result<OutputEvent> {
        if self.script.panic_on_decode {
            panic!("decoder exploded");
        }
        if self.output.is_some() {
            return Ok(OutputEvent::TryAgainLater);
        }
        let Some(next) = self.pending.pop_front() else {
            return Ok(OutputEvent::TryAgainLater);
        };
        if let Some((at, rate)) = self.script.format_change {
            if next.index == at && self.format.sample_rate != rate {
                self.format.sample_rate = rate;
                self.pending.push_front(next);
                return Ok(OutputEvent::FormatChanged);
            }
        }
        let info = BufferInfo {
            size: next.data.len(),
            presentation_time_us: next.timestamp_us,
            end_of_stream: next.end_of_stream,
        };
        self.output = Some(next.data);
        Ok(OutputEvent::Buffer { index: 0, info })
    }

    fn output_buffer(&self, _index: usize) -> Result<&[u8]> {
        self.output
            .as_deref()
            .ok_or_else(|| AudioError::InvalidState("no output buffer".to_string()))
    }

    fn output_format(&self) -> Result<OutputFormat> {
        Ok(self.format)
    }

    fn release_output_buffer(&mut self, _index: usize) -> Result<()> {
        self.output = None;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.pending.clear();
        self.output = None;
        self.log.decoder_flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.started = false;
        Ok(())
    }

    fn release(&mut self) {
        self.log.decoders_released.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct MockDecoderFactory {
    script: Arc<Script>,
    log: Arc<Log>,
}

impl DecoderFactory for MockDecoderFactory {
    fn create(&self, format: &TrackFormat) -> Result<Box<dyn Decoder>> {
        self.log.decoders_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockDecoder {
            script: Arc::clone(&self.script),
            log: Arc::clone(&self.log),
            format: OutputFormat {
                sample_rate: format.sample_rate,
                channels: format.channel_count,
            },
            started: false,
            queued: 0,
            pending: VecDeque::new(),
            output: None,
        }))
    }
}

// ---- sink ----

/// Accepts everything immediately; the head advances with every write.
pub struct MockSink {
    pub spec: SinkSpec,
    id: i32,
    write_delay: Duration,
    /// Head keeps moving on every poll until `stop`, like a device with a deep queue.
    lingering: bool,
    stopped: AtomicBool,
    stopped_at_release: AtomicBool,
    written: Mutex<Vec<u8>>,
    since_play: Mutex<Vec<u8>>,
    frames: AtomicU64,
    volume: Mutex<(f32, f32)>,
    plays: AtomicUsize,
    pauses: AtomicUsize,
    flushes: AtomicUsize,
    stops: AtomicUsize,
    releases: AtomicUsize,
}

impl MockSink {
    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }

    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn bytes_written(&self) -> usize {
        self.written.lock().len()
    }

    pub fn written(&self) -> Vec<u8> {
        self.written.lock().clone()
    }

    /// Everything written since the most recent `play`.
    pub fn written_since_play(&self) -> Vec<u8> {
        self.since_play.lock().clone()
    }

    /// Whether `stop` preceded the most recent `release`.
    pub fn stopped_before_release(&self) -> bool {
        self.stopped_at_release.load(Ordering::SeqCst)
    }

    pub fn session(&self) -> i32 {
        self.id
    }

    pub fn volume(&self) -> (f32, f32) {
        *self.volume.lock()
    }
}

impl AudioSink for MockSink {
    fn play(&self) -> Result<()> {
        self.stopped.store(false, Ordering::SeqCst);
        self.since_play.lock().clear();
        self.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn flush(&self) {
        self.flushes.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&self) -> Result<()> {
        self.stopped.store(true, Ordering::SeqCst);
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn write(&self, pcm: &[u8]) -> Result<usize> {
        if !self.write_delay.is_zero() {
            thread::sleep(self.write_delay);
        }
        self.written.lock().extend_from_slice(pcm);
        self.since_play.lock().extend_from_slice(pcm);
        self.frames
            .fetch_add((pcm.len() / self.spec.frame_bytes()) as u64, Ordering::SeqCst);
        Ok(pcm.len())
    }

    fn playback_head_position(&self) -> u64 {
        if self.lingering && !self.stopped.load(Ordering::SeqCst) {
            return self.frames.fetch_add(1, Ordering::SeqCst) + 1;
        }
        self.frames.load(Ordering::SeqCst)
    }

    fn set_volume(&self, left: f32, right: f32) -> Result<()> {
        *self.volume.lock() = (left, right);
        Ok(())
    }

    fn session_id(&self) -> i32 {
        self.id
    }

    fn release(&self) {
        self.stopped_at_release
            .store(self.stopped.load(Ordering::SeqCst), Ordering::SeqCst);
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct MockSinkFactory {
    pub write_delay: Mutex<Duration>,
    pub lingering: AtomicBool,
    pub fail_with: Mutex<Option<AudioError>>,
    pub create_attempts: AtomicUsize,
    sinks: Mutex<Vec<Arc<MockSink>>>,
}

impl MockSinkFactory {
    pub fn sinks(&self) -> Vec<Arc<MockSink>> {
        self.sinks.lock().clone()
    }

    pub fn only_sink(&self) -> Arc<MockSink> {
        let sinks = self.sinks();
        assert_eq!(sinks.len(), 1, "expected exactly one sink");
        Arc::clone(&sinks[0])
    }

    pub fn last_sink(&self) -> Arc<MockSink> {
        let sinks = self.sinks();
        Arc::clone(sinks.last().expect("no sink created"))
    }
}

impl SinkFactory for MockSinkFactory {
    fn min_buffer_size(
        &self,
        _sample_rate: u32,
        _layout: ChannelLayout,
        _encoding: PcmEncoding,
    ) -> Result<usize> {
        Ok(MIN_SINK_BUFFER)
    }

    fn create(&self, spec: SinkSpec) -> Result<Arc<dyn AudioSink>> {
        self.create_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fail_with.lock().clone() {
            return Err(err);
        }
        let mut sinks = self.sinks.lock();
        let sink = Arc::new(MockSink {
            spec,
            id: 100 + sinks.len() as i32,
            write_delay: *self.write_delay.lock(),
            lingering: self.lingering.load(Ordering::SeqCst),
            stopped: AtomicBool::new(false),
            stopped_at_release: AtomicBool::new(false),
            written: Mutex::new(Vec::new()),
            since_play: Mutex::new(Vec::new()),
            frames: AtomicU64::new(0),
            volume: Mutex::new((1.0, 1.0)),
            plays: AtomicUsize::new(0),
            pauses: AtomicUsize::new(0),
            flushes: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        });
        sinks.push(Arc::clone(&sink));
        Ok(sink)
    }
}

// ---- wiring ----

pub struct Fixture {
    pub script: Arc<Script>,
    pub log: Arc<Log>,
    pub sinks: Arc<MockSinkFactory>,
}

impl Fixture {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(script),
            log: Arc::new(Log::default()),
            sinks: Arc::new(MockSinkFactory::default()),
        }
    }

    pub fn with_write_delay(self, delay: Duration) -> Self {
        *self.sinks.write_delay.lock() = delay;
        self
    }

    pub fn with_lingering_sink(self) -> Self {
        self.sinks.lingering.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_sink_failure(self, err: AudioError) -> Self {
        *self.sinks.fail_with.lock() = Some(err);
        self
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            demuxers: Arc::new(MockDemuxerFactory {
                script: Arc::clone(&self.script),
                log: Arc::clone(&self.log),
            }),
            decoders: Arc::new(MockDecoderFactory {
                script: Arc::clone(&self.script),
                log: Arc::clone(&self.log),
            }),
            sinks: Arc::clone(&self.sinks) as Arc<dyn SinkFactory>,
            stretchers: Arc::new(VarispeedFactory),
        }
    }

    pub fn player(&self) -> MediaPlayer {
        MediaPlayer::with_collaborators(test_config(), self.collaborators()).unwrap()
    }

    /// Every demuxer and decoder handed out has been released exactly once.
    pub fn assert_codecs_released(&self) {
        assert_eq!(
            Log::count(&self.log.demuxers_opened),
            Log::count(&self.log.demuxers_released),
            "demuxer handles leaked or double-released"
        );
        assert_eq!(
            Log::count(&self.log.decoders_created),
            Log::count(&self.log.decoders_released),
            "decoder handles leaked or double-released"
        );
    }

    pub fn assert_sinks_released(&self) {
        for sink in self.sinks.sinks() {
            assert_eq!(sink.releases(), 1, "sink {} released {} times", sink.id, sink.releases());
        }
    }
}

// ---- listener recording ----

#[derive(Default)]
pub struct Recorder {
    pub prepared: AtomicUsize,
    pub completed: AtomicUsize,
    pub seek_completed: AtomicUsize,
    pub errors: Mutex<Vec<(i32, i32)>>,
    pub buffering: Mutex<Vec<u8>>,
}

impl Recorder {
    /// Install all listeners on `player`; the error listener answers `handled`.
    pub fn attach(player: &MediaPlayer, handled: bool) -> Arc<Self> {
        let recorder = Arc::new(Recorder::default());
        let r = Arc::clone(&recorder);
        player.set_on_prepared(move || {
            r.prepared.fetch_add(1, Ordering::SeqCst);
        });
        let r = Arc::clone(&recorder);
        player.set_on_completion(move || {
            r.completed.fetch_add(1, Ordering::SeqCst);
        });
        let r = Arc::clone(&recorder);
        player.set_on_seek_complete(move || {
            r.seek_completed.fetch_add(1, Ordering::SeqCst);
        });
        let r = Arc::clone(&recorder);
        player.set_on_error(move |what, extra| {
            r.errors.lock().push((what, extra));
            handled
        });
        let r = Arc::clone(&recorder);
        player.set_on_buffering_update(move |percent| r.buffering.lock().push(percent));
        recorder
    }

    pub fn prepared(&self) -> usize {
        self.prepared.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn seek_completed(&self) -> usize {
        self.seek_completed.load(Ordering::SeqCst)
    }

    pub fn errors(&self) -> Vec<(i32, i32)> {
        self.errors.lock().clone()
    }
}
