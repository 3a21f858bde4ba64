//! # service_cli
//!
//! The `loopcal` command: calibrates Rx/Tx IQ imbalance and Tx DC offset of
//! a dual-channel transceiver over its internal loopback, at one RF
//! frequency per invocation.
//!
//! ## Architecture Position
//!
//! The **S**ervice layer. Turns configuration from file, environment and
//! command line into a [`cal_optimiser::CalibrationConfig`], opens the
//! device through `adapter_device`, and writes a diagnostic report from the
//! outcome.
//!
//! ```text
//! loopcal --args driver=sim --freq-start 2.1e9
//! ```

pub mod calibrate;
pub mod config;
pub mod report;

mod error;

pub use error::{CliError, Result};

/// CLI version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
