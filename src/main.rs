//! skewtone - command-line host for the asynchronous test tone
//!
//! # Usage
//!
//! ```bash
//! skewtone                                 # 442 Hz at 48 kHz for 10 seconds
//! skewtone --skew 100 --seconds 60         # clock running 100 ppm slow
//! skewtone --freq-left 440 --freq-right 660 --rate 44100
//! skewtone --settings tone.json --output null
//! skewtone --properties                    # print parameter metadata as JSON
//! ```
//!
//! Set `RUST_LOG=info` to see the per-cycle drift report.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use skewtone::audio::{AudioSink, NullSink, PlaybackEngine};
use skewtone::config::DEFAULT_RATE;
use skewtone::settings::{self, Untranslated, KEY_FREQ_LEFT, KEY_FREQ_RIGHT, KEY_RATE, KEY_SKEW};
use skewtone::source::SOURCE_ID;
use skewtone::{AsyncAudioSource, Error, Settings};

/// Ring buffer length between the generator and the device
const PLAYBACK_BUFFER_MS: u32 = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Output {
    /// Default audio output device
    Device,
    /// Discard audio (useful for watching the drift log)
    Null,
}

#[derive(Parser)]
#[command(name = "skewtone")]
#[command(author, version, about = "Stereo test tone with an intentionally skewed clock")]
struct Args {
    /// JSON settings file (keys: freq-0, freq-1, skew, rate)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Left channel frequency in Hz
    #[arg(long)]
    freq_left: Option<i64>,

    /// Right channel frequency in Hz
    #[arg(long)]
    freq_right: Option<i64>,

    /// Clock skew in parts per million (positive = slow clock)
    #[arg(long, allow_hyphen_values = true)]
    skew: Option<f64>,

    /// Sample rate in Hz
    #[arg(long)]
    rate: Option<i64>,

    /// How long to run, in seconds
    #[arg(long, default_value = "10", value_parser = parse_seconds)]
    seconds: Duration,

    /// Where the generated audio goes
    #[arg(long, value_enum, default_value = "device")]
    output: Output,

    /// Print the configurable properties as JSON and exit
    #[arg(long)]
    properties: bool,
}

impl Args {
    /// Defaults, overlaid with the settings file, overlaid with flags
    fn to_settings(&self) -> Result<Settings, Error> {
        let mut settings = match &self.settings {
            Some(path) => Settings::load(path)?,
            None => Settings::new(),
        };
        settings.apply_defaults();

        if let Some(freq) = self.freq_left {
            settings.set_int(KEY_FREQ_LEFT, freq);
        }
        if let Some(freq) = self.freq_right {
            settings.set_int(KEY_FREQ_RIGHT, freq);
        }
        if let Some(skew) = self.skew {
            settings.set_double(KEY_SKEW, skew);
        }
        if let Some(rate) = self.rate {
            settings.set_int(KEY_RATE, rate);
        }
        Ok(settings)
    }
}

/// Parse a run length, rejecting negative, non-finite and oversized values
fn parse_seconds(arg: &str) -> Result<Duration, String> {
    let secs: f64 = arg.parse().map_err(|e| format!("{}", e))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid duration {}: {}", arg, e))
}

fn run_for<S: AudioSink>(settings: &Settings, sink: S, duration: Duration) -> Result<(), Error> {
    let source = AsyncAudioSource::create(settings, sink)?;
    thread::sleep(duration);
    source.destroy();
    Ok(())
}

fn main() -> Result<(), Error> {
    env_logger::init();
    let args = Args::parse();

    if args.properties {
        let props = settings::properties(&Untranslated);
        match serde_json::to_string_pretty(&props) {
            Ok(json) => println!("{}", json),
            Err(e) => log::error!("Failed to serialize properties: {}", e),
        }
        return Ok(());
    }

    let settings = args.to_settings()?;
    let cfg = settings.to_config();
    log::info!(
        "Starting {} [{}] ({} Hz / {} Hz at {} Hz, skew {} ppm)",
        AsyncAudioSource::name(&Untranslated),
        SOURCE_ID,
        cfg.freq[0],
        cfg.freq[1],
        cfg.rate,
        cfg.skew_ppm()
    );

    match args.output {
        Output::Device => {
            // the generator falls back to its default rate until configured
            let rate = if cfg.is_usable() { cfg.rate } else { DEFAULT_RATE };
            let rate = rate.unsigned_abs();
            let (engine, sink) = PlaybackEngine::open(rate, PLAYBACK_BUFFER_MS)?;
            log::info!("Playing on {} at {} Hz", engine.device_name(), engine.sample_rate());
            run_for(&settings, sink, args.seconds)?;
        }
        Output::Null => {
            let counter = NullSink::new();
            run_for(&settings, counter.clone(), args.seconds)?;
            log::info!("Generated {} samples per channel", counter.frames_received());
        }
    }

    log::info!("Done");
    Ok(())
}
