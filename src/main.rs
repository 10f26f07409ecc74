//! datalog - Serial Data Logger entry point
//!
//! `record` samples the configured instruments into a CSV log with a live
//! view, `playback` replays a log, `init-config` writes a starting config.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use datalog_rs::{
    backend::{AcquisitionBackend, DefaultTransportFactory},
    config::{default_config_path, AppConfig},
    frontend::{self, LiveApp, PlaybackApp},
    session::{load_series, PlaybackTimeline},
};
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "datalog")]
#[command(about = "Multi-instrument serial data logger", long_about = None)]
struct Args {
    /// Also write logs to daily files in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sample the configured channels into a CSV log
    Record {
        /// Config file (defaults to the platform config dir)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Log file (defaults to sensor_data_<timestamp>.csv in log_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stop after this many seconds
        #[arg(short, long)]
        duration: Option<f64>,

        /// No window; stop after --duration or on Enter
        #[arg(long)]
        headless: bool,
    },
    /// Replay a CSV log
    Playback {
        /// Log file to replay
        log: PathBuf,

        /// Config file for playback settings
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Target frame rate
        #[arg(long)]
        fps: Option<f64>,

        /// Trailing window in seconds
        #[arg(long)]
        window: Option<f64>,
    },
    /// Write the sample configuration to a file
    InitConfig {
        /// Destination path
        file: PathBuf,
    },
}

fn init_tracing(log_dir: Option<&PathBuf>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,datalog_rs=debug"));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer());

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "datalog.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

fn resolve_config(path: Option<PathBuf>) -> anyhow::Result<AppConfig> {
    let path = match path {
        Some(path) => path,
        None => default_config_path().context("No config path given and no config dir found")?,
    };
    tracing::info!("Loading config from {}", path.display());
    Ok(AppConfig::load(&path)?)
}

fn record(
    config: AppConfig,
    output: Option<PathBuf>,
    duration: Option<f64>,
    headless: bool,
) -> anyhow::Result<()> {
    let log_path =
        output.unwrap_or_else(|| config.acquisition.session_log_path(chrono::Local::now()));
    let backend = AcquisitionBackend::new(config.clone());
    let (mut handle, display) = backend
        .spawn(&DefaultTransportFactory, &log_path)
        .context("Failed to start acquisition")?;

    if headless {
        // No live view; the worker treats the closed queue as no display
        drop(display);
        match duration {
            Some(secs) if secs.is_finite() && secs >= 0.0 => {
                std::thread::sleep(Duration::from_secs_f64(secs));
            }
            Some(secs) => bail!("Invalid duration {}", secs),
            None => {
                println!("Recording to {}. Press Enter to stop.", log_path.display());
                let mut line = String::new();
                std::io::stdin().lock().read_line(&mut line)?;
            }
        }
        let stats = handle.stop()?;
        println!(
            "{} rounds, {} rows written to {}",
            stats.rounds,
            stats.rows_persisted,
            log_path.display()
        );
        return Ok(());
    }

    if let Some(secs) = duration {
        tracing::warn!("--duration {} is ignored with the live window", secs);
    }
    let app = LiveApp::new(&config, handle, display, log_path);
    frontend::run_live(app).map_err(|e| anyhow::anyhow!("Live view failed: {}", e))
}

fn playback(
    log: PathBuf,
    config: Option<PathBuf>,
    fps: Option<f64>,
    window: Option<f64>,
) -> anyhow::Result<()> {
    let mut settings = match config {
        Some(path) => AppConfig::load_playback(&path)?,
        None => {
            let mut defaults = AppConfig::default().playback;
            defaults.reference_lines = AppConfig::sample().playback.reference_lines;
            defaults
        }
    };
    if let Some(fps) = fps {
        settings.target_fps = fps;
    }
    if let Some(window) = window {
        settings.window_s = window;
    }
    settings.validate()?;

    let series = load_series(&log, &settings.column_suffix)?;
    let timeline = PlaybackTimeline::new(series, settings.target_fps)?;
    frontend::run_playback(PlaybackApp::new(timeline, settings))
        .map_err(|e| anyhow::anyhow!("Playback view failed: {}", e))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _guard = init_tracing(args.log_dir.as_ref());

    tracing::info!("Starting datalog");

    let result = match args.command {
        Command::Record {
            config,
            output,
            duration,
            headless,
        } => resolve_config(config).and_then(|config| record(config, output, duration, headless)),
        Command::Playback {
            log,
            config,
            fps,
            window,
        } => playback(log, config, fps, window),
        Command::InitConfig { file } => {
            AppConfig::sample().save(&file)?;
            println!("Wrote sample config to {}", file.display());
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!("{:#}", e);
    }
    result
}
