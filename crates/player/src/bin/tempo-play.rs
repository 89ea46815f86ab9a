// Command line player

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use std::time::Duration;

use tempo_player::{init_logging, AudioError, MediaSource, PlayerConfig, Result};

/// Play one audio file or URL to the default output device.
#[derive(Parser, Debug)]
#[command(name = "tempo-play", version, about)]
struct Args {
    /// File path, file:// URI or http(s) URL
    source: String,

    /// Playback speed
    #[arg(long, default_value_t = 1.0)]
    speed: f32,

    /// Pitch factor
    #[arg(long, default_value_t = 1.0)]
    pitch: f32,

    /// Mix stereo down to centered mono
    #[arg(long)]
    downmix: bool,

    /// Start position in milliseconds
    #[arg(long)]
    seek_ms: Option<u64>,

    /// Volume applied to both channels
    #[arg(long, default_value_t = 1.0)]
    volume: f32,

    /// TOML file with engine tuning
    #[arg(long)]
    config: Option<PathBuf>,
}

enum Event {
    Completed,
    Failed(i32, i32),
}

fn parse_source(source: &str) -> MediaSource {
    if source.contains("://") {
        MediaSource::uri(source)
    } else {
        MediaSource::path(source)
    }
}

#[cfg(not(target_os = "android"))]
fn run(args: Args) -> Result<()> {
    use tempo_player::MediaPlayer;

    let config = match &args.config {
        Some(path) => PlayerConfig::load(path)?,
        None => PlayerConfig::default(),
    };
    let player = MediaPlayer::with_config(config)?;

    let (tx, rx) = mpsc::channel();
    {
        let tx = tx.clone();
        player.set_on_completion(move || {
            let _ = tx.send(Event::Completed);
        });
    }
    player.set_on_error(move |what, extra| {
        let _ = tx.send(Event::Failed(what, extra));
        true
    });
    player.set_on_buffering_update(|percent| log::info!("Buffered {}%", percent));

    player.set_data_source(parse_source(&args.source))?;
    player.set_playback_speed(args.speed);
    player.set_playback_pitch(args.pitch);
    player.set_downmix(args.downmix);
    player.set_volume(args.volume, args.volume);
    player.prepare()?;
    log::info!("Duration: {} ms", player.duration());

    if let Some(ms) = args.seek_ms {
        player.seek_to(ms)?;
    }
    player.start()?;

    let outcome = loop {
        match rx.recv_timeout(Duration::from_secs(1)) {
            Ok(Event::Completed) => break Ok(()),
            Ok(Event::Failed(what, extra)) => {
                break Err(AudioError::Other(format!(
                    "playback failed (what {}, extra {})",
                    what, extra
                )))
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                log::info!("Position: {} ms", player.current_position());
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break Ok(()),
        }
    };
    player.release();
    outcome
}

#[cfg(target_os = "android")]
fn run(_args: Args) -> Result<()> {
    Err(AudioError::InitializationError(
        "no default output on this platform".to_string(),
    ))
}

fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
