//! audio-recorder - command line front end
//!
//! Drives the capture and conversion pipeline from a terminal and prints
//! whatever the pipeline reports back.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI16, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};

use audio_recorder::audio::{self, CaptureEngine, DecodeEngine};
use audio_recorder::delegate::{
    PipelineDelegate, AWAITING_AUDIO_FILE_STATUS, AWAITING_SAMPLE_LOG_STATUS, CAPTURE_IDLE_STATUS,
};
use audio_recorder::samples::reader;
use audio_recorder::{PipelineError, Settings};

/// How often the level meter is redrawn while recording.
const METER_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "audio-recorder")]
#[command(about = "record the microphone or convert audio files into time-stamped sample logs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// list input devices (-1 is the system default)
    Devices,

    /// record the microphone into <output> (sample log) and a .wav next to it
    Record {
        output: PathBuf,

        /// input device index (see `devices`)
        #[arg(short, long, allow_hyphen_values = true)]
        device: Option<i32>,

        /// stop automatically after this many seconds
        #[arg(short, long)]
        seconds: Option<u64>,
    },

    /// decode an audio file into per-channel sample logs
    Convert {
        input: PathBuf,
        output: PathBuf,

        /// also write the right channel of stereo sources
        #[arg(long)]
        right: bool,

        /// do not write a .wav copy of the decoded source
        #[arg(long)]
        no_container: bool,
    },

    /// print the records of a sample log in timestamp order
    Show {
        log: PathBuf,

        /// number of records to print
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// print an audio file's parameters
    Info { input: PathBuf },
}

/// Prints pipeline notifications to the terminal
#[derive(Default)]
struct ConsoleDelegate {
    level: AtomicI16,
    /// Set once an error has been printed.
    failed: AtomicBool,
}

impl PipelineDelegate for ConsoleDelegate {
    fn on_status(&self, text: &str) {
        println!("{}", text);
    }

    fn on_signal_level(&self, amplitude: i16) {
        self.level.store(amplitude, Ordering::Relaxed);
    }

    fn on_recording_state_changed(&self, recording: bool) {
        log::info!("Recording: {}", recording);
    }

    fn on_file_ready(&self, paths: &[PathBuf]) {
        for path in paths {
            println!("  {}", path.display());
        }
    }

    fn on_error(&self, error: &PipelineError) {
        self.failed.store(true, Ordering::Relaxed);
        eprintln!("Error: {}", error);
    }
}

fn main() {
    env_logger::init();
    log::info!("Starting audio-recorder");

    let cli = Cli::parse();
    let settings = Settings::load();
    let delegate = Arc::new(ConsoleDelegate::default());

    let result = run(cli.command, &settings, &delegate);
    let reported = delegate.failed.load(Ordering::Relaxed);
    if let Err(e) = &result {
        if !reported {
            eprintln!("Error: {}", e);
        }
    }
    if result.is_err() || reported {
        std::process::exit(1);
    }
}

fn run(
    command: Command,
    settings: &Settings,
    delegate: &Arc<ConsoleDelegate>,
) -> Result<(), PipelineError> {
    match command {
        Command::Devices => {
            for device in audio::list_input_devices() {
                println!("{:>3}  {}", device.id, device.name);
            }
            Ok(())
        }
        Command::Record {
            output,
            device,
            seconds,
        } => record(
            settings,
            delegate,
            &resolve_output(settings, output),
            device.unwrap_or(settings.device_id),
            seconds.map(Duration::from_secs),
        ),
        Command::Convert {
            input,
            output,
            right,
            no_container,
        } => {
            let mut engine = DecodeEngine::new(
                settings.time_base(),
                settings.write_container && !no_container,
                Arc::clone(delegate) as Arc<dyn PipelineDelegate>,
            );
            let logs = engine.process(&input, right, &resolve_output(settings, output))?;
            if let Some(primary) = logs.first() {
                summarize(settings, primary)?;
            }
            Ok(())
        }
        Command::Show { log, limit } => {
            if !log.is_file() {
                println!("{}", AWAITING_SAMPLE_LOG_STATUS);
            }
            let series = reader::read(&log)?;
            for record in series.records.iter().take(limit) {
                println!("{}", record);
            }
            if series.len() > limit {
                println!("... {} more", series.len() - limit);
            }
            summarize_series(settings, &log, &series);
            Ok(())
        }
        Command::Info { input } => {
            if !input.is_file() {
                println!("{}", AWAITING_AUDIO_FILE_STATUS);
            }
            let info = audio::probe(&input, &settings.time_base())?;
            println!("{} ({})", info.filename, info.describe());
            println!("Sample period: {} ticks", info.sample_period);
            Ok(())
        }
    }
}

fn record(
    settings: &Settings,
    delegate: &Arc<ConsoleDelegate>,
    output: &Path,
    device_id: i32,
    limit: Option<Duration>,
) -> Result<(), PipelineError> {
    println!("{}", CAPTURE_IDLE_STATUS);

    let mut engine = CaptureEngine::new(
        settings.time_base(),
        settings.capture_format(),
        settings.display_capacity,
        Arc::clone(delegate) as Arc<dyn PipelineDelegate>,
    );
    let mut monitor = engine.take_monitor();

    engine.start(output, device_id)?;
    println!("Press Enter to stop");

    let (enter_tx, enter_rx) = crossbeam_channel::bounded::<()>(1);
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        let _ = enter_tx.send(());
    });

    let started = Instant::now();
    while engine.is_recording() {
        if enter_rx.recv_timeout(METER_INTERVAL).is_ok() {
            break;
        }
        if limit.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }

        let seconds = match monitor.as_mut() {
            Some(monitor) => {
                monitor.update();
                monitor
                    .latest_timestamp()
                    .map(|t| settings.time_base().ticks_to_seconds(t))
                    .unwrap_or(0.0)
            }
            None => started.elapsed().as_secs_f64(),
        };
        print_meter(seconds, delegate.level.load(Ordering::Relaxed));
    }
    println!();

    if let Some(summary) = engine.stop()? {
        summarize(settings, &summary.paths.log)?;
    }
    Ok(())
}

fn print_meter(seconds: f64, level: i16) {
    let width = (i32::from(level) * 40 / i32::from(i16::MAX)) as usize;
    print!("\r{:>7.2}s [{:<40}]", seconds, "#".repeat(width));
    let _ = std::io::stdout().flush();
}

/// Output paths without a directory land in the configured output directory.
fn resolve_output(settings: &Settings, output: PathBuf) -> PathBuf {
    match &settings.output_directory {
        Some(dir) if output.parent().is_some_and(|p| p.as_os_str().is_empty()) => dir.join(output),
        _ => output,
    }
}

fn summarize(settings: &Settings, log: &Path) -> Result<(), PipelineError> {
    let series = reader::read(log)?;
    summarize_series(settings, log, &series);
    Ok(())
}

fn summarize_series(settings: &Settings, log: &Path, series: &audio_recorder::SampleSeries) {
    let time_base = settings.time_base();
    println!(
        "{}: {} records, {:.3}s ({})",
        log.display(),
        series.len(),
        time_base.ticks_to_seconds(series.max_timestamp),
        series.describe(&time_base)
    );
}
