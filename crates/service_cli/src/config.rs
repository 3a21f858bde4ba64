//! Application configuration management
//!
//! Handles loading configuration from TOML files, `LOOPCAL_` environment
//! variables, and CLI arguments.

use crate::error::{CliError, Result};
use cal_core::types::PerChannel;
use cal_optimiser::CalibrationConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Environment variable holding the device arguments
pub const ENV_ARGS: &str = "LOOPCAL_ARGS";
/// Environment variable holding the log level
pub const ENV_LOG_LEVEL: &str = "LOOPCAL_LOG_LEVEL";
/// Environment variable holding the report directory
pub const ENV_REPORT_DIR: &str = "LOOPCAL_REPORT_DIR";
/// Environment variable holding the capture length
pub const ENV_SAMPLES_PER_CAPTURE: &str = "LOOPCAL_SAMPLES_PER_CAPTURE";

/// Log levels supported by the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = CliError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(CliError::InvalidLogLevel(s.to_string())),
        }
    }
}

impl LogLevel {
    /// Convert log level to tracing filter string
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        LogLevel::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// The `[calibration]` table of the config file.
///
/// Mirrors [`CalibrationConfig`] in file-friendly units: depths as two
/// integers, timeouts in milliseconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CalibrationSection {
    pub clock_rate_hz: f64,
    pub sample_rate_hz: f64,
    pub rx_antenna: String,
    pub tx_antenna: String,
    pub rx_lb_lna_gain_db: f64,
    pub rx_pga_gain_db: f64,
    pub rx_tia_gain_db: f64,
    pub rx_lna_gain_db: f64,
    pub tx_pad_gain_db: f64,
    pub tx_lb_pad_gain_db: f64,
    pub tx_freq_delta_hz: f64,
    /// Channel A, channel B
    pub tx_cordic_freq_hz: [f64; 2],
    pub search_depth_min: u32,
    pub search_depth_max: u32,
    pub steps_per_iter: usize,
    pub samples_per_capture: usize,
    pub bins_per_fft: usize,
    pub rx_target_level_dbfs: f64,
    pub max_rx_pga_gain_db: f64,
    pub acquisition_timeout_ms: u64,
    pub read_timeout_ms: u64,
}

impl Default for CalibrationSection {
    fn default() -> Self {
        let d = CalibrationConfig::default();
        Self {
            clock_rate_hz: d.clock_rate_hz,
            sample_rate_hz: d.sample_rate_hz,
            rx_antenna: d.rx_antenna,
            tx_antenna: d.tx_antenna,
            rx_lb_lna_gain_db: d.rx_lb_lna_gain_db,
            rx_pga_gain_db: d.rx_pga_gain_db,
            rx_tia_gain_db: d.rx_tia_gain_db,
            rx_lna_gain_db: d.rx_lna_gain_db,
            tx_pad_gain_db: d.tx_pad_gain_db,
            tx_lb_pad_gain_db: d.tx_lb_pad_gain_db,
            tx_freq_delta_hz: d.tx_freq_delta_hz,
            tx_cordic_freq_hz: d.tx_cordic_freq_hz.0,
            search_depth_min: *d.search_depths.start(),
            search_depth_max: *d.search_depths.end(),
            steps_per_iter: d.steps_per_iter,
            samples_per_capture: d.samples_per_capture,
            bins_per_fft: d.bins_per_fft,
            rx_target_level_dbfs: d.rx_target_level_dbfs,
            max_rx_pga_gain_db: d.max_rx_pga_gain_db,
            acquisition_timeout_ms: d.acquisition_timeout.as_millis() as u64,
            read_timeout_ms: d.read_timeout.as_millis() as u64,
        }
    }
}

impl CalibrationSection {
    /// The search configuration this section describes.
    pub fn to_calibration_config(&self) -> CalibrationConfig {
        CalibrationConfig {
            clock_rate_hz: self.clock_rate_hz,
            sample_rate_hz: self.sample_rate_hz,
            rx_antenna: self.rx_antenna.clone(),
            tx_antenna: self.tx_antenna.clone(),
            rx_lb_lna_gain_db: self.rx_lb_lna_gain_db,
            rx_pga_gain_db: self.rx_pga_gain_db,
            rx_tia_gain_db: self.rx_tia_gain_db,
            rx_lna_gain_db: self.rx_lna_gain_db,
            tx_pad_gain_db: self.tx_pad_gain_db,
            tx_lb_pad_gain_db: self.tx_lb_pad_gain_db,
            tx_freq_delta_hz: self.tx_freq_delta_hz,
            tx_cordic_freq_hz: PerChannel(self.tx_cordic_freq_hz),
            search_depths: self.search_depth_min..=self.search_depth_max,
            steps_per_iter: self.steps_per_iter,
            samples_per_capture: self.samples_per_capture,
            bins_per_fft: self.bins_per_fft,
            rx_target_level_dbfs: self.rx_target_level_dbfs,
            max_rx_pga_gain_db: self.max_rx_pga_gain_db,
            acquisition_timeout: Duration::from_millis(self.acquisition_timeout_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
        }
    }
}

/// Application configuration structure
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Device construction arguments
    pub args: String,
    /// Log level
    pub log_level: LogLevel,
    /// Directory the diagnostic report is written to
    pub report_dir: PathBuf,
    /// Search configuration
    pub calibration: CalibrationSection,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            args: String::new(),
            log_level: LogLevel::Info,
            report_dir: PathBuf::from("./loopcal-report"),
            calibration: CalibrationSection::default(),
        }
    }
}

impl AppConfig {
    /// Create a new AppConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CliError::FileError(format!("Failed to read {}: {}", path.display(), e)))?;

        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| CliError::FileError(format!("Failed to parse TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Override fields from `LOOPCAL_*` environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Override fields from any variable source
    pub fn apply_vars<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(args) = lookup(ENV_ARGS) {
            self.args = args;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = LogLevel::from_str(&level)?;
        }
        if let Some(dir) = lookup(ENV_REPORT_DIR) {
            self.report_dir = PathBuf::from(dir);
        }
        if let Some(samples) = lookup(ENV_SAMPLES_PER_CAPTURE) {
            self.calibration.samples_per_capture = samples
                .trim()
                .parse()
                .map_err(|_| CliError::EnvError(format!("{ENV_SAMPLES_PER_CAPTURE}={samples} is not a count")))?;
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.calibration_config()
            .validate()
            .map_err(|e| CliError::InvalidArgument(e.to_string()))
    }

    /// The search configuration
    pub fn calibration_config(&self) -> CalibrationConfig {
        self.calibration.to_calibration_config()
    }

    /// Merge with CLI arguments (CLI takes precedence)
    pub fn merge_with_cli(&mut self, cli: &CliArgs) -> Result<()> {
        if let Some(args) = &cli.args {
            self.args = args.clone();
        }
        if let Some(dir) = &cli.report_dir {
            self.report_dir = dir.clone();
        }
        match &cli.log_level {
            Some(level) => self.log_level = LogLevel::from_str(level)?,
            None if cli.verbose => self.log_level = LogLevel::Debug,
            None => {}
        }
        Ok(())
    }
}

/// CLI arguments structure
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Config file path
    pub config_file: Option<PathBuf>,
    /// Device arguments override
    pub args: Option<String>,
    /// Log level override
    pub log_level: Option<String>,
    /// Shorthand for `debug` when no level is given
    pub verbose: bool,
    /// Report directory override
    pub report_dir: Option<PathBuf>,
}

/// Build configuration from all sources
///
/// Priority (highest to lowest):
/// 1. CLI arguments
/// 2. Environment variables
/// 3. Config file
/// 4. Default values
pub fn build_config(cli: &CliArgs) -> Result<AppConfig> {
    let mut config = match &cli.config_file {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };

    config.apply_env()?;
    config.merge_with_cli(cli)?;
    config.validate()?;

    Ok(config)
}
