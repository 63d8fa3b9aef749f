//! CLI Entry Point for shm-daq
//!
//! Offline tools for record logs written by the recorder:
//! - `cat`: list every frame (topic and payload length)
//! - `play`: replay a log at its recorded pace
//! - `analyze`: peak frequencies and seismic intensity of one device's acceleration
//! - `prune`: delete logs older than the configured retention
//!
//! # Usage
//!
//! ```bash
//! shm-daq cat data/recorder/b8_27_eb_01_02_03/*.dat
//! shm-daq play log.dat --speed 10
//! shm-daq analyze log.dat --device b8:27:eb:01:02:03 --smooth
//! shm-daq prune --dir data/recorder
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use shm_daq::codec::packet::decode_with_envelope;
use shm_daq::config::{Settings, DEFAULT_CONFIG_PATH};
use shm_daq::core::{unix_millis_to_datetime, SensorKind};
use shm_daq::data::fft::{peak, SpectralAnalyzer};
use shm_daq::data::intensity::SeismicIntensityEngine;
use shm_daq::data::maintenance::prune;
use shm_daq::data::replay::{read_stream, replay_paced, RecordFrame, RecordReader};
use shm_daq::data::window::AccelWindow;
use shm_daq::error::DaqError;
use shm_daq::logging;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "shm-daq")]
#[command(about = "Structural-health sensor record tools", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print topic and payload length of every frame
    Cat {
        /// Record files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Replay a record file at its recorded pace
    Play {
        file: PathBuf,

        /// Playback speed multiplier
        #[arg(long, default_value_t = 1.0)]
        speed: f64,
    },

    /// Spectral peaks and seismic intensity for one device
    Analyze {
        file: PathBuf,

        /// Device id (first topic segment)
        #[arg(long)]
        device: String,

        /// Emit one JSON object per window
        #[arg(long)]
        json: bool,

        /// Report peaks of the cepstrally smoothed envelope
        #[arg(long)]
        smooth: bool,
    },

    /// Delete record logs older than `storage.retention_hours`
    Prune {
        /// Record directory (defaults to `storage.record_dir`)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    logging::init_from_config(&settings).map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::Cat { files } => cat(&files),
        Commands::Play { file, speed } => play(file, speed).await,
        Commands::Analyze {
            file,
            device,
            json,
            smooth,
        } => analyze(&settings, file, &device, json, smooth),
        Commands::Prune { dir } => {
            let dir = dir.unwrap_or_else(|| settings.storage.record_dir.clone());
            prune_records(&settings, &dir);
            Ok(())
        }
    }
}

fn cat(files: &[PathBuf]) -> Result<()> {
    for path in files {
        let mut reader = RecordReader::open(path)
            .with_context(|| format!("opening {}", path.display()))?;
        let (frames, error) = reader.read_until_error();
        for frame in &frames {
            println!("{} {}", frame.topic, frame.payload.len());
        }
        if let Some(e) = error {
            warn!(file = %path.display(), frames = frames.len(), error = %e, "stopped at corrupt frame");
        }
    }
    Ok(())
}

async fn play(file: PathBuf, speed: f64) -> Result<()> {
    let frames = read_stream(&file).with_context(|| format!("opening {}", file.display()))?;
    let count = replay_paced(frames, speed, print_frame).await?;
    info!(frames = count, "replay finished");
    Ok(())
}

fn print_frame(frame: &RecordFrame) {
    let time = unix_millis_to_datetime(frame.timestamp_millis)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| frame.timestamp_millis.to_string());
    if !frame.topic.ends_with(SensorKind::Acceleration.suffix()) {
        println!("{time} {} {}", frame.topic, frame.payload.len());
        return;
    }
    match decode_with_envelope(&frame.payload) {
        Ok(timed) => match timed.packet.triplets().next() {
            Some([x, y, z]) => println!("{time} {} {x:.3} {y:.3} {z:.3}", frame.topic),
            None => println!("{time} {} (no complete triplet)", frame.topic),
        },
        Err(failure) => warn!(topic = %frame.topic, error = %failure.error, "discarding message"),
    }
}

#[derive(Serialize)]
struct WindowReport {
    end_millis: i64,
    peak_hz: [Option<f64>; 3],
    intensity: Option<f64>,
    class: Option<&'static str>,
    rgb: Option<[u8; 3]>,
}

fn prune_records(settings: &Settings, dir: &Path) {
    let Some(max_age) = settings.storage.retention() else {
        info!("retention disabled, nothing to prune");
        return;
    };
    for path in prune(dir, max_age) {
        println!("{}", path.display());
    }
}

/// Which spectrum a window report takes its peaks from.
#[derive(Clone, Copy)]
enum PeakSource {
    Raw,
    Envelope { cep_coeff: usize },
}

fn analyze(
    settings: &Settings,
    file: PathBuf,
    device: &str,
    json: bool,
    smooth: bool,
) -> Result<()> {
    let acc = &settings.acceleration;
    let analyzer = SpectralAnalyzer::new(acc.window_len, acc.sample_rate_hz)?;
    let engine = SeismicIntensityEngine::new(acc.window_len, acc.sample_rate_hz)?;
    let mut window = AccelWindow::new(acc.window_len, acc.orientation());
    let source = if smooth {
        PeakSource::Envelope {
            cep_coeff: acc.cepstrum_coeff,
        }
    } else {
        PeakSource::Raw
    };
    let mut windows = 0usize;

    for frame in read_stream(&file).with_context(|| format!("opening {}", file.display()))? {
        let frame = frame?;
        let message = frame.into_message();
        match message.parsed_topic() {
            Ok(topic) if topic.device == device && topic.kind == SensorKind::Acceleration => {}
            _ => continue,
        }
        let timed = match decode_with_envelope(&message.payload) {
            Ok(timed) => timed,
            Err(failure) => {
                warn!(topic = %message.topic, error = %failure.error, "discarding message");
                continue;
            }
        };

        let mut samples = timed.packet.aligned();
        while !samples.is_empty() {
            let taken = window.push(samples);
            samples = &samples[taken..];
            if window.is_full() {
                let report = report_window(&window, &analyzer, &engine, source, timed.sent_millis)?;
                print_report(&report, json)?;
                window.reset();
                windows += 1;
            }
        }
    }

    info!(windows, "analysis finished");
    Ok(())
}

fn report_window(
    window: &AccelWindow,
    analyzer: &SpectralAnalyzer,
    engine: &SeismicIntensityEngine,
    source: PeakSource,
    end_millis: i64,
) -> Result<WindowReport> {
    let spectrum = match source {
        PeakSource::Raw => window.spectrum(analyzer)?,
        PeakSource::Envelope { cep_coeff } => {
            window.smoothed_spectrum(analyzer, cep_coeff)?.envelope
        }
    };
    let peak_hz = [0, 1, 2].map(|axis| peak(&spectrum, axis).map(|b| b.frequency_hz));
    let (intensity, class, rgb) = match window.intensity(engine) {
        Ok(v) => (Some(v.value), Some(v.class), Some(v.rgb)),
        Err(e @ DaqError::NonPositiveAmplitude { .. }) => {
            warn!(error = %e, "no intensity for window");
            (None, None, None)
        }
        Err(e) => return Err(e.into()),
    };
    Ok(WindowReport {
        end_millis,
        peak_hz,
        intensity,
        class,
        rgb,
    })
}

fn print_report(report: &WindowReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
        return Ok(());
    }
    let hz = report
        .peak_hz
        .map(|p| p.map_or_else(|| "-".to_string(), |f| format!("{f:.3}")));
    print!("{} peak NS {} EW {} UD {} Hz", report.end_millis, hz[0], hz[1], hz[2]);
    match (report.intensity, report.class, report.rgb) {
        (Some(i), Some(class), Some([r, g, b])) => {
            println!(" intensity {i:.2} ({class}) #{r:02x}{g:02x}{b:02x}")
        }
        _ => println!(" intensity -"),
    }
    Ok(())
}
