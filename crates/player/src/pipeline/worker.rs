// Decode loop run on the worker thread

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tempo_core::{AudioError, PlaybackState, Result, Transition, Trigger};
use tempo_decode::OutputEvent;
use tempo_dsp::downmix_stereo_in_place;
use tempo_sink::AudioSink;

use super::{Inner, Pipeline};

enum Exit {
    EndOfStream,
    Stopped,
}

/// Clears the decoding flag however the loop ends.
struct DecodingGuard<'a>(&'a Inner);

impl Drop for DecodingGuard<'_> {
    fn drop(&mut self) {
        let mut signal = self.0.signal.lock();
        signal.decoding = false;
        self.0.wake.notify_all();
    }
}

/// Output of one drain pass, written to the sink after the pipeline lock is dropped.
#[derive(Default)]
struct Drained {
    chunks: Vec<Vec<u8>>,
    sink: Option<Arc<dyn AudioSink>>,
    format_changed: bool,
    end_of_stream: bool,
}

pub(super) fn run(inner: Arc<Inner>) {
    log::debug!("[worker] Decode worker started");
    let outcome = {
        let _decoding = DecodingGuard(&inner);
        panic::catch_unwind(AssertUnwindSafe(|| decode(&inner)))
    };

    match outcome {
        Ok(Ok(Exit::EndOfStream)) => complete(&inner),
        Ok(Ok(Exit::Stopped)) => log::debug!("[worker] Decode worker stopped"),
        Ok(Err(e)) => {
            log::error!("[worker] Decoding failed: {}", e);
            inner.error(e.extra_code());
        }
        Err(payload) => {
            let err = AudioError::WorkerPanic(panic_message(payload.as_ref()));
            log::error!("[worker] {}", err);
            inner.error(err.extra_code());
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn complete(inner: &Inner) {
    let (_, transition) = inner.state.apply(Trigger::EndOfStream);
    if transition != Transition::To(PlaybackState::PlaybackCompleted) {
        return;
    }
    log::info!("[worker] Playback completed");
    let listeners = Arc::clone(&inner.listeners);
    let spawned = thread::Builder::new()
        .name("tempo-completion".to_string())
        .spawn(move || listeners.notify_completion());
    if let Err(e) = spawned {
        log::warn!("[worker] Completion thread unavailable ({}), notifying inline", e);
        inner.listeners.notify_completion();
    }
}

fn decode(inner: &Inner) -> Result<Exit> {
    let result = decode_loop(inner);
    finish(inner, matches!(result, Ok(Exit::EndOfStream)));
    // A stop or reset that lands during the drain still wins over completion
    match result {
        Ok(Exit::EndOfStream) if !inner.running.load(Ordering::SeqCst) => Ok(Exit::Stopped),
        other => other,
    }
}

fn decode_loop(inner: &Inner) -> Result<Exit> {
    let timeout = inner.config.dequeue_timeout();
    {
        let mut pipeline = inner.pipeline.lock();
        let Some(decoder) = pipeline.decoder.as_mut() else {
            return Ok(Exit::Stopped);
        };
        decoder.start()?;
        pipeline.decoder_started = true;
    }

    let mut sample = Vec::new();
    let mut input_eos = false;
    let mut output_eos = false;

    while inner.running.load(Ordering::SeqCst) && !input_eos && !output_eos {
        if !inner.wait_while_paused() {
            break;
        }
        let params = *inner.params.lock();
        let downmix = inner.downmix.load(Ordering::SeqCst);

        let buffering = {
            let mut guard = inner.pipeline.lock();
            let pipeline = &mut *guard;
            let (Some(demuxer), Some(decoder), Some(stretch)) = (
                pipeline.demuxer.as_mut(),
                pipeline.decoder.as_mut(),
                pipeline.stretch.as_mut(),
            ) else {
                return Ok(Exit::Stopped);
            };
            stretch.set_speed(params.speed);
            stretch.set_pitch(params.pitch);

            if let Some(slot) = decoder.dequeue_input_slot(timeout)? {
                match demuxer.read_sample(&mut sample)? {
                    Some(len) => {
                        let timestamp = demuxer.sample_time_us().unwrap_or(0);
                        decoder.queue_input(slot, &sample[..len], timestamp, false)?;
                        demuxer.advance()?;
                    }
                    None => {
                        log::debug!("[worker] End of input");
                        decoder.queue_input(slot, &[], 0, true)?;
                        input_eos = true;
                    }
                }
            }
            demuxer.buffered_percent()
        };
        if let Some(percent) = buffering {
            inner.listeners.notify_buffering(percent);
        }

        loop {
            let drained = drain_outputs(&mut inner.pipeline.lock(), timeout, downmix)?;
            if let Some(sink) = &drained.sink {
                for chunk in &drained.chunks {
                    if !inner.running.load(Ordering::SeqCst) {
                        break;
                    }
                    let written = sink.write(chunk)?;
                    if written < chunk.len() {
                        log::trace!("[worker] Sink accepted {} of {} bytes", written, chunk.len());
                    }
                }
            }
            if drained.end_of_stream {
                log::debug!("[worker] End of output");
                output_eos = true;
            }
            if !drained.format_changed || output_eos {
                break;
            }
            reconfigure_output(inner)?;
        }
    }

    if inner.running.load(Ordering::SeqCst) && (input_eos || output_eos) {
        Ok(Exit::EndOfStream)
    } else {
        Ok(Exit::Stopped)
    }
}

/// Pull decoded buffers through the transform until the decoder has nothing ready.
fn drain_outputs(pipeline: &mut Pipeline, timeout: Duration, downmix: bool) -> Result<Drained> {
    let mut drained = Drained {
        sink: pipeline.sink.clone(),
        ..Drained::default()
    };
    let (Some(decoder), Some(stretch)) = (pipeline.decoder.as_mut(), pipeline.stretch.as_mut()) else {
        return Ok(drained);
    };

    loop {
        match decoder.dequeue_output(timeout)? {
            OutputEvent::Buffer { index, info } => {
                if info.size > 0 {
                    let data = decoder.output_buffer(index)?;
                    stretch.write_bytes(&data[..info.size.min(data.len())]);
                } else {
                    stretch.flush();
                }

                let available = stretch.bytes_available();
                if available > 0 {
                    let mut out = vec![0u8; available];
                    let read = stretch.read_bytes(&mut out);
                    out.truncate(read);
                    if downmix && stretch.channels() == 2 {
                        let aligned = downmix_stereo_in_place(&mut out);
                        out.truncate(aligned);
                    }
                    drained.chunks.push(out);
                }

                decoder.release_output_buffer(index)?;
                if info.end_of_stream {
                    drained.end_of_stream = true;
                    break;
                }
            }
            OutputEvent::FormatChanged => {
                drained.format_changed = true;
                break;
            }
            OutputEvent::BuffersChanged => log::trace!("[worker] Output buffers changed"),
            OutputEvent::TryAgainLater => break,
        }
    }
    Ok(drained)
}

/// Rebuild sink and transform when the decoder reports a new rate or channel count.
/// Teardown and recreation happen under one pipeline lock.
fn reconfigure_output(inner: &Inner) -> Result<()> {
    let mut pipeline = inner.pipeline.lock();
    let Some(decoder) = pipeline.decoder.as_ref() else {
        return Ok(());
    };
    let format = decoder.output_format()?;
    let current = pipeline
        .stretch
        .as_ref()
        .map(|stretch| (stretch.sample_rate(), stretch.channels()));
    if current == Some((format.sample_rate, format.channels)) {
        return Ok(());
    }
    log::info!(
        "[worker] Output format changed to {} Hz, {} ch",
        format.sample_rate,
        format.channels
    );

    if let Some(old) = pipeline.sink.take() {
        if let Err(e) = old.stop() {
            log::warn!("[worker] Sink stop before reconfigure failed: {}", e);
        }
        old.release();
    }
    pipeline.sink_spec = None;
    inner.init_device(&mut pipeline, format.sample_rate, format.channels)?;
    if inner.state.is(PlaybackState::Started) {
        if let Some(sink) = pipeline.sink.as_ref() {
            sink.play()?;
        }
    }
    Ok(())
}

/// Stop the decoder, let the sink play out what it holds, then stop it.
fn finish(inner: &Inner, drain: bool) {
    let sink = {
        let mut pipeline = inner.pipeline.lock();
        let started = pipeline.decoder_started;
        if let Some(decoder) = pipeline.decoder.as_mut().filter(|_| started) {
            if let Err(e) = decoder.stop() {
                log::warn!("[worker] Decoder stop failed: {}", e);
            }
        }
        pipeline.decoder_started = false;
        pipeline.sink.clone()
    };
    let Some(sink) = sink else {
        return;
    };

    if drain {
        let interval = inner.config.drain_poll_interval();
        let mut last = sink.playback_head_position();
        loop {
            thread::sleep(interval);
            let head = sink.playback_head_position();
            if head == last {
                break;
            }
            last = head;
        }
    }
    if let Err(e) = sink.stop() {
        log::warn!("[worker] Sink stop failed: {}", e);
    }
}
