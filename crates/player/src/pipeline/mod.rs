// Decode-pipeline engine: demuxer -> decoder -> time stretch -> sink

mod worker;

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tempo_core::{
    AudioError, Listeners, MediaSource, PlaybackState, PlayerConfig, PlayerStateContainer,
    Result, Transition, Trigger, WHAT_UNKNOWN,
};
use tempo_decode::{Decoder, DecoderFactory};
use tempo_demux::{find_audio_track, Demuxer, DemuxerFactory, SeekMode, TrackFormat};
use tempo_dsp::{StretchFactory, TimeStretch};
use tempo_sink::{AudioSink, ChannelLayout, PcmEncoding, SinkFactory, SinkSpec};

use crate::engine::{Capabilities, PlaybackEngine};

/// Upper bound on one wait slice while `reset` waits for the worker.
const WORKER_WAIT_SLICE: Duration = Duration::from_millis(100);

/// Factories the pipeline builds its components from.
#[derive(Clone)]
pub struct Collaborators {
    pub demuxers: Arc<dyn DemuxerFactory>,
    pub decoders: Arc<dyn DecoderFactory>,
    pub sinks: Arc<dyn SinkFactory>,
    pub stretchers: Arc<dyn StretchFactory>,
}

impl Collaborators {
    /// Symphonia for demuxing and decoding, varispeed transform, cpal output.
    #[cfg(not(target_os = "android"))]
    pub fn system_default() -> Self {
        Self {
            demuxers: Arc::new(tempo_demux::SymphoniaDemuxerFactory),
            decoders: Arc::new(tempo_decode::SymphoniaDecoderFactory),
            sinks: Arc::new(tempo_sink::CpalSinkFactory::default()),
            stretchers: Arc::new(tempo_dsp::VarispeedFactory),
        }
    }
}

/// Components guarded by the pipeline lock.
#[derive(Default)]
struct Pipeline {
    demuxer: Option<Box<dyn Demuxer>>,
    decoder: Option<Box<dyn Decoder>>,
    decoder_started: bool,
    sink: Option<Arc<dyn AudioSink>>,
    sink_spec: Option<SinkSpec>,
    stretch: Option<Box<dyn TimeStretch>>,
}

impl Pipeline {
    fn release_codec(&mut self) {
        if let Some(mut decoder) = self.decoder.take() {
            decoder.release();
        }
        self.decoder_started = false;
        if let Some(mut demuxer) = self.demuxer.take() {
            demuxer.release();
        }
    }

    fn release_all(&mut self) {
        self.release_codec();
        if let Some(sink) = self.sink.take() {
            sink.release();
        }
        self.sink_spec = None;
        self.stretch = None;
    }

    /// Reposition the demuxer and drop everything decoded from the old position.
    /// Returns where the demuxer landed.
    fn seek(&mut self, time_us: i64) -> Result<Option<i64>> {
        let demuxer = self
            .demuxer
            .as_mut()
            .ok_or_else(|| AudioError::InvalidState("seek without an open source".to_string()))?;
        demuxer.seek_to(time_us, SeekMode::PrecedingSync)?;
        if self.decoder_started {
            if let Some(decoder) = self.decoder.as_mut() {
                decoder.flush()?;
            }
        }
        if let Some(stretch) = self.stretch.as_mut() {
            stretch.clear();
        }
        Ok(demuxer.sample_time_us())
    }
}

#[derive(Debug, Clone, Copy)]
struct TransformParams {
    speed: f32,
    pitch: f32,
}

struct WorkerSignal {
    decoding: bool,
}

/// Keeps a counter raised for the lifetime of the guard.
struct Busy<'a>(&'a AtomicUsize);

impl<'a> Busy<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Busy(counter)
    }
}

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Inner {
    config: PlayerConfig,
    collaborators: Collaborators,
    listeners: Arc<Listeners>,
    state: PlayerStateContainer,
    source: Mutex<Option<MediaSource>>,
    pipeline: Mutex<Pipeline>,
    params: Mutex<TransformParams>,
    downmix: AtomicBool,
    volume: Mutex<(f32, f32)>,
    /// Cleared to make the worker leave its loop.
    running: AtomicBool,
    signal: Mutex<WorkerSignal>,
    wake: Condvar,
    worker: Mutex<Option<JoinHandle<()>>>,
    initiating: AtomicUsize,
    seeking: AtomicUsize,
    duration_us: AtomicU64,
    position_ms: AtomicU64,
    /// Seek issued after completion, applied when the stream is reopened.
    pending_seek_us: Mutex<Option<i64>>,
}

impl Inner {
    fn source_identity(&self) -> Option<String> {
        self.source.lock().as_ref().map(MediaSource::identity)
    }

    fn is_stale(&self, identity: &str) -> bool {
        self.source_identity().as_deref() != Some(identity) || self.state.is(PlaybackState::Error)
    }

    fn current_sink(&self) -> Option<Arc<dyn AudioSink>> {
        self.pipeline.lock().sink.clone()
    }

    /// Single entry point for every failure. Idempotent.
    fn error(&self, extra: i32) {
        let (from, transition) = self.state.apply(Trigger::Fail);
        if transition != Transition::To(PlaybackState::Error) {
            return;
        }
        log::error!("[pipeline] Entering error state from {} (extra {})", from, extra);
        self.running.store(false, Ordering::SeqCst);
        self.wake_worker();
        if !self.listeners.notify_error(WHAT_UNKNOWN, extra) {
            self.listeners.notify_completion();
        }
    }

    fn fail(&self, err: &AudioError) {
        log::error!("[pipeline] {}", err);
        self.error(err.extra_code());
    }

    fn reject(&self, operation: &str, state: PlaybackState) -> AudioError {
        let err = AudioError::InvalidState(format!("{} called in state {}", operation, state));
        self.fail(&err);
        err
    }

    fn wake_worker(&self) {
        let _signal = self.signal.lock();
        self.wake.notify_all();
    }

    /// Block while paused. Returns whether the worker should keep going.
    fn wait_while_paused(&self) -> bool {
        let mut signal = self.signal.lock();
        while self.running.load(Ordering::SeqCst) && self.state.is(PlaybackState::Paused) {
            self.wake.wait(&mut signal);
        }
        self.running.load(Ordering::SeqCst)
    }

    fn on_worker_thread(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .map_or(false, |handle| handle.thread().id() == thread::current().id())
    }

    /// Signal the worker and wait until it clears its decoding flag.
    fn wait_for_worker(&self) {
        if self.on_worker_thread() {
            return;
        }
        let mut signal = self.signal.lock();
        while signal.decoding {
            self.wake.notify_all();
            self.wake.wait_for(&mut signal, WORKER_WAIT_SLICE);
        }
    }

    fn join_worker(&self) {
        let Some(handle) = self.worker.lock().take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            log::warn!("[pipeline] Decode worker terminated abnormally");
        }
    }

    fn spawn_worker(self: &Arc<Self>) -> Result<()> {
        let mut slot = self.worker.lock();
        self.signal.lock().decoding = true;
        let inner = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("tempo-decoder".to_string())
            .spawn(move || worker::run(inner));
        match spawned {
            Ok(handle) => {
                *slot = Some(handle);
                Ok(())
            }
            Err(e) => {
                drop(slot);
                self.signal.lock().decoding = false;
                let err = AudioError::InitializationError(format!("failed to spawn decode worker: {}", e));
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Try every buffer multiple from the largest down to the minimum size.
    fn create_sink(
        &self,
        sample_rate: u32,
        layout: ChannelLayout,
        encoding: PcmEncoding,
        min_size: usize,
    ) -> Result<(Arc<dyn AudioSink>, SinkSpec)> {
        let mut last_error = None;
        let mut exhausted = true;
        for multiple in (1..=self.config.sink_buffer_multiples).rev() {
            let spec = SinkSpec {
                sample_rate,
                layout,
                encoding,
                buffer_size: min_size * multiple as usize,
            };
            match self.collaborators.sinks.create(spec) {
                Ok(sink) => {
                    log::debug!(
                        "[pipeline] Sink created: {} Hz, {} ch, {} bytes",
                        sample_rate,
                        spec.channels(),
                        spec.buffer_size
                    );
                    return Ok((sink, spec));
                }
                Err(e) => {
                    log::warn!("[pipeline] Sink creation at {}x minimum failed: {}", multiple, e);
                    if !matches!(e, AudioError::ResourceExhausted(_)) {
                        exhausted = false;
                    }
                    last_error = Some(e);
                }
            }
        }
        Err(match last_error {
            Some(e) if !exhausted => e,
            _ => AudioError::ResourceExhausted(format!(
                "no sink buffer for {} Hz, {} ch",
                sample_rate,
                layout.channel_count()
            )),
        })
    }

    /// Make sure a sink matches the format and start a fresh transform for it.
    fn init_device(&self, pipeline: &mut Pipeline, sample_rate: u32, channels: u16) -> Result<()> {
        let layout = ChannelLayout::for_channel_count(channels)?;
        let encoding = PcmEncoding::Pcm16;
        let reusable = pipeline.sink.is_some()
            && matches!(pipeline.sink_spec, Some(spec) if spec.sample_rate == sample_rate && spec.layout == layout);

        if !reusable {
            if let Some(old) = pipeline.sink.take() {
                old.release();
            }
            pipeline.sink_spec = None;
            let min_size = self
                .collaborators
                .sinks
                .min_buffer_size(sample_rate, layout, encoding)?;
            let (sink, spec) = self.create_sink(sample_rate, layout, encoding, min_size)?;
            let (left, right) = *self.volume.lock();
            if let Err(e) = sink.set_volume(left, right) {
                log::warn!("[pipeline] Failed to apply volume to new sink: {}", e);
            }
            pipeline.sink = Some(sink);
            pipeline.sink_spec = Some(spec);
        }

        let mut stretch = self.collaborators.stretchers.create(sample_rate, channels)?;
        let params = *self.params.lock();
        stretch.set_speed(params.speed);
        stretch.set_pitch(params.pitch);
        pipeline.stretch = Some(stretch);
        Ok(())
    }

    fn build_stream(
        &self,
        pipeline: &mut Pipeline,
        demuxer: &mut dyn Demuxer,
    ) -> Result<(Box<dyn Decoder>, TrackFormat)> {
        let (track, format) = find_audio_track(&*demuxer)?.ok_or(AudioError::NoAudioTrack)?;
        for index in 0..demuxer.track_count() {
            if index != track {
                demuxer.unselect_track(index)?;
            }
        }
        self.init_device(pipeline, format.sample_rate, format.channel_count)?;
        demuxer.select_track(track)?;

        let mut decoder = self.collaborators.decoders.create(&format)?;
        if let Err(e) = decoder.configure(&format) {
            decoder.release();
            return Err(e);
        }
        log::debug!(
            "[pipeline] Track {} selected: {}, {} Hz, {} ch",
            track,
            format.mime,
            format.sample_rate,
            format.channel_count
        );
        Ok((decoder, format))
    }

    /// Open the current source and configure the whole pipeline for it.
    ///
    /// Returns `Ok(false)` when the source changed meanwhile and the work was discarded.
    fn init_stream(&self) -> Result<bool> {
        let source = self
            .source
            .lock()
            .clone()
            .ok_or_else(|| AudioError::LoadError("no data source set".to_string()))?;
        let identity = source.identity();

        let mut demuxer = {
            let _initiating = Busy::enter(&self.initiating);
            self.collaborators.demuxers.open(&source)?
        };

        let mut pipeline = self.pipeline.lock();
        if self.is_stale(&identity) {
            log::debug!("[pipeline] Source changed while opening {}, discarding", source);
            demuxer.release();
            return Ok(false);
        }
        match self.build_stream(&mut pipeline, demuxer.as_mut()) {
            Ok((decoder, format)) => {
                pipeline.release_codec();
                pipeline.demuxer = Some(demuxer);
                pipeline.decoder = Some(decoder);
                self.duration_us
                    .store(format.duration_us.unwrap_or(0), Ordering::SeqCst);
                self.position_ms.store(0, Ordering::SeqCst);
                Ok(true)
            }
            Err(e) => {
                demuxer.release();
                Err(e)
            }
        }
    }

    fn do_prepare(&self, from: PlaybackState) -> Result<()> {
        let identity = self.source_identity();
        if from == PlaybackState::Stopped {
            self.join_worker();
        }
        *self.pending_seek_us.lock() = None;

        match self.init_stream() {
            Ok(true) => {
                let (_, transition) = self.state.apply(Trigger::PrepareCompleted);
                if transition == Transition::To(PlaybackState::Prepared) {
                    log::info!("[pipeline] Prepared");
                    self.listeners.notify_prepared();
                }
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) => {
                if identity.is_some() && self.source_identity() == identity {
                    self.fail(&e);
                    Err(e)
                } else {
                    log::debug!("[pipeline] Ignoring failure for replaced source: {}", e);
                    Ok(())
                }
            }
        }
    }

    fn begin_prepare(&self) -> Result<PlaybackState> {
        let (from, transition) = self.state.apply(Trigger::Prepare);
        if transition == Transition::Reject {
            return Err(self.reject("prepare", from));
        }
        Ok(from)
    }

    fn play_sink(&self) -> Result<()> {
        if let Some(sink) = self.current_sink() {
            if let Err(e) = sink.play() {
                self.fail(&e);
                return Err(e);
            }
        }
        Ok(())
    }

    fn apply_pending_seek(&self) -> Result<()> {
        let Some(target_us) = self.pending_seek_us.lock().take() else {
            return Ok(());
        };
        log::debug!("[pipeline] Applying seek to {} us after reopen", target_us);
        let _seeking = Busy::enter(&self.seeking);
        self.pipeline.lock().seek(target_us).map(|_| ())
    }

    fn start(self: &Arc<Self>) -> Result<()> {
        let (from, transition) = self.state.apply(Trigger::Start);
        match transition {
            Transition::Reject => return Err(self.reject("start", from)),
            Transition::Stay => return Ok(()),
            Transition::To(_) => {}
        }

        if from == PlaybackState::Paused {
            self.wake_worker();
            return self.play_sink();
        }

        if from == PlaybackState::PlaybackCompleted {
            self.join_worker();
            let reopened = self.init_stream().and_then(|fresh| {
                if fresh {
                    self.apply_pending_seek()?;
                }
                Ok(fresh)
            });
            match reopened {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(e) => {
                    self.fail(&e);
                    return Err(e);
                }
            }
        }

        self.running.store(true, Ordering::SeqCst);
        self.play_sink()?;
        log::info!("[pipeline] Started");
        self.spawn_worker()
    }

    fn pause(&self) -> Result<()> {
        let (from, transition) = self.state.apply(Trigger::Pause);
        match transition {
            Transition::Reject => Err(self.reject("pause", from)),
            Transition::Stay => Ok(()),
            Transition::To(_) => {
                if let Some(sink) = self.current_sink() {
                    if let Err(e) = sink.pause() {
                        self.fail(&e);
                        return Err(e);
                    }
                }
                log::debug!("[pipeline] Paused");
                Ok(())
            }
        }
    }

    fn stop(&self) -> Result<()> {
        let (from, transition) = self.state.apply(Trigger::Stop);
        if transition == Transition::Reject {
            return Err(self.reject("stop", from));
        }
        self.running.store(false, Ordering::SeqCst);
        self.wake_worker();
        if let Some(sink) = self.current_sink() {
            if let Err(e) = sink.pause() {
                log::warn!("[pipeline] Sink pause on stop failed: {}", e);
            }
            sink.flush();
        }
        log::info!("[pipeline] Stopped");
        Ok(())
    }

    fn seek_to(self: &Arc<Self>, msec: u64) -> Result<()> {
        let (from, transition) = self.state.apply(Trigger::SeekTo);
        if transition == Transition::Reject {
            return Err(self.reject("seek_to", from));
        }
        let was_playing = from == PlaybackState::Started;
        if was_playing {
            self.pause()?;
        }
        match self.current_sink() {
            Some(sink) => sink.flush(),
            None => log::debug!("[pipeline] Seeking without an output sink"),
        }

        let target_us = (msec as i64).saturating_mul(1000);
        if from == PlaybackState::PlaybackCompleted {
            *self.pending_seek_us.lock() = Some(target_us);
        }
        let identity = self.source_identity();
        let remote = self.source.lock().as_ref().map_or(false, MediaSource::is_uri);

        if remote {
            let inner = Arc::clone(self);
            thread::Builder::new()
                .name("tempo-seek".to_string())
                .spawn(move || {
                    let _ = inner.run_seek(target_us, identity, was_playing);
                })
                .map_err(|e| {
                    let err = AudioError::Other(format!("failed to spawn seek thread: {}", e));
                    self.fail(&err);
                    err
                })?;
            Ok(())
        } else {
            self.run_seek(target_us, identity, was_playing)
        }
    }

    fn run_seek(self: &Arc<Self>, target_us: i64, identity: Option<String>, was_playing: bool) -> Result<()> {
        let landed = {
            let _seeking = Busy::enter(&self.seeking);
            self.pipeline.lock().seek(target_us)
        };
        let landed = match landed {
            Ok(landed) => landed,
            Err(e) => {
                self.fail(&e);
                return Err(e);
            }
        };
        if let Some(us) = landed {
            self.position_ms.store(us.max(0) as u64 / 1000, Ordering::SeqCst);
        }

        if identity.is_none() || self.source_identity() != identity || self.state.is(PlaybackState::Error) {
            log::debug!("[pipeline] Seek result discarded, source changed");
            return Ok(());
        }
        log::debug!("[pipeline] Seek to {} us complete (landed at {:?})", target_us, landed);
        self.listeners.notify_seek_complete();
        if was_playing {
            self.start()?;
        }
        Ok(())
    }

    fn reset(&self) {
        if self.state.is(PlaybackState::End) {
            return;
        }
        self.running.store(false, Ordering::SeqCst);
        if let Some(sink) = self.current_sink() {
            if let Err(e) = sink.stop() {
                log::warn!("[pipeline] Sink stop on reset failed: {}", e);
            }
        }
        self.wait_for_worker();
        self.join_worker();

        *self.source.lock() = None;
        *self.pending_seek_us.lock() = None;
        self.pipeline.lock().release_all();
        self.duration_us.store(0, Ordering::SeqCst);
        self.position_ms.store(0, Ordering::SeqCst);
        self.state.apply(Trigger::Reset);
        log::debug!("[pipeline] Reset");
    }

    fn current_position(&self) -> u64 {
        if self.state.get_state().is_neutral_for_queries() {
            return 0;
        }
        let cached = self.position_ms.load(Ordering::SeqCst);
        if self.initiating.load(Ordering::SeqCst) > 0 || self.seeking.load(Ordering::SeqCst) > 0 {
            return cached;
        }
        let Some(pipeline) = self.pipeline.try_lock() else {
            return cached;
        };
        match pipeline.demuxer.as_ref().and_then(|d| d.sample_time_us()) {
            Some(us) => {
                let ms = us.max(0) as u64 / 1000;
                self.position_ms.store(ms, Ordering::SeqCst);
                ms
            }
            None => cached,
        }
    }
}

/// Engine that decodes and renders audio itself.
///
/// Every lifecycle call returns promptly except `reset`/`release`, which wait
/// for the decode worker, and synchronous `prepare`.
pub struct DecodePipelineEngine {
    inner: Arc<Inner>,
}

impl DecodePipelineEngine {
    pub fn new(
        config: PlayerConfig,
        collaborators: Collaborators,
        listeners: Arc<Listeners>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                collaborators,
                listeners,
                state: PlayerStateContainer::new(),
                source: Mutex::new(None),
                pipeline: Mutex::new(Pipeline::default()),
                params: Mutex::new(TransformParams {
                    speed: 1.0,
                    pitch: 1.0,
                }),
                downmix: AtomicBool::new(false),
                volume: Mutex::new((1.0, 1.0)),
                running: AtomicBool::new(false),
                signal: Mutex::new(WorkerSignal { decoding: false }),
                wake: Condvar::new(),
                worker: Mutex::new(None),
                initiating: AtomicUsize::new(0),
                seeking: AtomicUsize::new(0),
                duration_us: AtomicU64::new(0),
                position_ms: AtomicU64::new(0),
                pending_seek_us: Mutex::new(None),
            }),
        })
    }

    fn set_pitch_checked(&self, pitch: f32) {
        if pitch > 0.0 && pitch.is_finite() {
            self.inner.params.lock().pitch = pitch;
        } else {
            log::warn!("[pipeline] Ignoring invalid pitch {}", pitch);
        }
    }
}

impl PlaybackEngine for DecodePipelineEngine {
    fn set_data_source(&self, source: MediaSource) -> Result<()> {
        let mut slot = self.inner.source.lock();
        let (from, transition) = self.inner.state.apply(Trigger::SetDataSource);
        if transition == Transition::Reject {
            drop(slot);
            return Err(self.inner.reject("set_data_source", from));
        }
        log::info!("[pipeline] Data source: {}", source);
        *slot = Some(source);
        Ok(())
    }

    fn prepare(&self) -> Result<()> {
        let from = self.inner.begin_prepare()?;
        self.inner.do_prepare(from)
    }

    fn prepare_async(&self) -> Result<()> {
        let from = self.inner.begin_prepare()?;
        let inner = Arc::clone(&self.inner);
        thread::Builder::new()
            .name("tempo-prepare".to_string())
            .spawn(move || {
                let _ = inner.do_prepare(from);
            })
            .map(|_| ())
            .map_err(|e| {
                let err = AudioError::InitializationError(format!("failed to spawn prepare thread: {}", e));
                self.inner.fail(&err);
                err
            })
    }

    fn start(&self) -> Result<()> {
        self.inner.start()
    }

    fn pause(&self) -> Result<()> {
        self.inner.pause()
    }

    fn stop(&self) -> Result<()> {
        self.inner.stop()
    }

    fn seek_to(&self, msec: u64) -> Result<()> {
        self.inner.seek_to(msec)
    }

    fn reset(&self) {
        self.inner.reset();
    }

    fn release(&self) {
        self.inner.reset();
        self.inner.state.apply(Trigger::Release);
    }

    fn current_position(&self) -> u64 {
        self.inner.current_position()
    }

    fn duration(&self) -> u64 {
        if self.inner.state.get_state().is_neutral_for_queries() {
            return 0;
        }
        self.inner.duration_us.load(Ordering::SeqCst) / 1000
    }

    fn is_playing(&self) -> bool {
        self.inner.state.is(PlaybackState::Started)
    }

    fn state(&self) -> PlaybackState {
        self.inner.state.get_state()
    }

    fn set_playback_speed(&self, speed: f32) {
        let clamped = self.inner.config.clamp_speed(speed);
        if clamped != speed {
            log::debug!("[pipeline] Speed {} clamped to {}", speed, clamped);
        }
        self.inner.params.lock().speed = clamped;
    }

    fn set_playback_pitch(&self, pitch: f32) {
        self.set_pitch_checked(pitch);
    }

    fn adjust_pitch_steps(&self, steps: f32) {
        let pitch = self.inner.params.lock().pitch;
        self.set_pitch_checked(pitch + steps);
    }

    fn current_speed(&self) -> f32 {
        self.inner.params.lock().speed
    }

    fn current_pitch(&self) -> f32 {
        self.inner.params.lock().pitch
    }

    fn set_downmix(&self, enable: bool) {
        self.inner.downmix.store(enable, Ordering::SeqCst);
    }

    fn set_volume(&self, left: f32, right: f32) {
        *self.inner.volume.lock() = (left, right);
        if let Some(sink) = self.inner.current_sink() {
            if let Err(e) = sink.set_volume(left, right) {
                log::warn!("[pipeline] Failed to set volume: {}", e);
            }
        }
    }

    fn audio_session_id(&self) -> i32 {
        self.inner.current_sink().map_or(0, |sink| sink.session_id())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            can_set_speed: true,
            can_set_pitch: true,
            can_downmix: true,
            min_speed: self.inner.config.min_speed,
            max_speed: self.inner.config.max_speed,
        }
    }
}

impl Drop for DecodePipelineEngine {
    fn drop(&mut self) {
        self.inner.reset();
        self.inner.state.apply(Trigger::Release);
    }
}
