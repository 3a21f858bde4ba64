//! loopcal: loopback calibration of IQ imbalance and Tx DC offset.

use anyhow::Context;
use clap::Parser;
use service_cli::calibrate;
use service_cli::config::{build_config, CliArgs};
use service_cli::report;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Calibrate a dual-channel transceiver over its internal loopback
#[derive(Parser, Debug)]
#[command(name = "loopcal")]
#[command(version, about, long_about = None)]
struct Args {
    /// Device construction arguments (e.g. `driver=lime` or `driver=sim,seed=7`)
    #[arg(long, value_name = "ARGS")]
    args: Option<String>,

    /// RF frequency to calibrate at (Hz)
    #[arg(long, value_name = "HZ")]
    freq_start: f64,

    /// Configuration file path (TOML format)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Enable debug output
    #[arg(short, long)]
    verbose: bool,

    /// Directory for spectrum.csv and summary.json
    #[arg(long, value_name = "DIR")]
    report_dir: Option<PathBuf>,

    /// Skip the diagnostic report
    #[arg(long)]
    no_report: bool,
}

impl From<&Args> for CliArgs {
    fn from(args: &Args) -> Self {
        CliArgs {
            config_file: args.config.clone(),
            args: args.args.clone(),
            log_level: args.log_level.clone(),
            verbose: args.verbose,
            report_dir: args.report_dir.clone(),
        }
    }
}

fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = build_config(&CliArgs::from(&args))?;

    init_tracing(config.log_level.as_filter_str());
    info!(
        version = service_cli::VERSION,
        args = %config.args,
        report_dir = %config.report_dir.display(),
        "loopcal configuration loaded"
    );

    let cancel = adapter_device::CancelToken::new();
    let outcome = calibrate::run(&config, args.freq_start, &cancel)
        .with_context(|| format!("calibration at {} Hz failed", args.freq_start))?;

    if !args.no_report {
        report::write_report(&config.report_dir, &config.calibration_config(), &outcome)
            .context("writing the diagnostic report failed")?;
    }

    println!("Cal took {:.3} seconds", outcome.elapsed.as_secs_f64());
    Ok(())
}
