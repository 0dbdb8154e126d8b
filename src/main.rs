//! Pendulum EEG capture tool
//!
//! Runs one acquisition session from the command line and exports what it
//! recorded:
//!
//! ```text
//! pendulum-eeg capture --simulate --seconds 5 --edf
//! pendulum-eeg capture --port /dev/ttyACM0 --log-dir ./logs
//! pendulum-eeg ports
//! ```

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use pendulum_eeg::backend::available_ports;
use pendulum_eeg::{AcquisitionEngine, EngineConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "pendulum-eeg.log";

#[derive(Parser)]
#[command(name = "pendulum-eeg", version)]
#[command(about = "Capture and export Pendulum EEG sessions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record one session and export it
    Capture(CaptureArgs),
    /// Print the snapshot of a freshly configured engine as JSON
    Snapshot(SnapshotArgs),
    /// List serial ports
    Ports,
}

#[derive(Args, Debug)]
struct CaptureArgs {
    /// Serial port of the board (required unless --simulate)
    #[arg(long, required_unless_present = "simulate")]
    port: Option<String>,

    /// Baud rate override
    #[arg(long)]
    baud: Option<u32>,

    /// Capture duration in seconds
    #[arg(long, default_value_t = 10)]
    seconds: u64,

    /// Use the synthetic source instead of a serial port
    #[arg(long)]
    simulate: bool,

    /// Engine config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also write a daily rolling log file here
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Also export EDF
    #[arg(long)]
    edf: bool,
}

#[derive(Args, Debug)]
struct SnapshotArgs {
    /// Engine config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also write a daily rolling log file here
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

/// Install the subscriber; the returned guard flushes the log file on drop
fn init_logging(log_dir: Option<&PathBuf>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pendulum_eeg=debug"));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn capture(args: CaptureArgs) -> anyhow::Result<()> {
    let engine = AcquisitionEngine::new(load_config(args.config.as_ref())?)?;
    let seconds = args.seconds;
    tracing::info!("Capturing for {} s", seconds);

    if !engine.start(args.port.as_deref(), args.baud, args.simulate, true, true) {
        bail!("Failed to start acquisition: {}", engine.status_message());
    }
    std::thread::sleep(Duration::from_secs(seconds));

    let snapshot = engine.get_snapshot(0, 0);
    println!(
        "{} | samples={} packets={} parse_errors={} focus={:.1} relax={:.1}",
        snapshot.status_message,
        snapshot.counters.samples_total,
        snapshot.counters.packets_total,
        snapshot.parse_error_count,
        snapshot.latest_metrics.focus_score,
        snapshot.latest_metrics.relax_score,
    );
    engine.stop();

    let mut written = vec![
        engine.export_csv(None).context("CSV export failed")?,
        engine.export_npz(None).context("NPZ export failed")?,
        engine.export_json_snapshot(None).context("JSON export failed")?,
    ];
    if args.edf {
        written.push(engine.export_edf(None).context("EDF export failed")?);
    }
    for path in written {
        println!("wrote {}", path.display());
    }
    Ok(())
}

fn snapshot(args: SnapshotArgs) -> anyhow::Result<()> {
    let engine = AcquisitionEngine::new(load_config(args.config.as_ref())?)?;
    let snapshot = engine.get_snapshot(0, 10);
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let log_dir = match &cli.command {
        Command::Capture(args) => args.log_dir.clone(),
        Command::Snapshot(args) => args.log_dir.clone(),
        Command::Ports => None,
    };
    let _log_guard = init_logging(log_dir.as_ref());

    match cli.command {
        Command::Capture(args) => capture(args),
        Command::Snapshot(args) => snapshot(args),
        Command::Ports => {
            for port in available_ports() {
                println!("{}", port);
            }
            Ok(())
        }
    }
}
