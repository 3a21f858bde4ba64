//! CLI error types

use adapter_device::DeviceError;
use cal_optimiser::CalibrationError;
use thiserror::Error;

/// Errors surfaced by the `loopcal` binary.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration file error: {0}")]
    FileError(String),

    #[error("Environment variable error: {0}")]
    EnvError(String),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Calibration failed: {0}")]
    Calibration(#[from] CalibrationError),

    #[error("Report error: {0}")]
    Report(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Whether the error came from the configuration layers.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            CliError::InvalidLogLevel(_)
                | CliError::InvalidArgument(_)
                | CliError::FileError(_)
                | CliError::EnvError(_)
        )
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CliError::InvalidLogLevel("loud".to_string());
        assert!(err.to_string().contains("Invalid log level"));

        let err: CliError = DeviceError::Unsupported("hardware".to_string()).into();
        assert!(err.to_string().contains("Unsupported: hardware"));
        assert!(!err.is_config());
    }

    #[test]
    fn test_calibration_error_conversion() {
        let err: CliError = CalibrationError::invalid_config("bad depths").into();
        assert!(matches!(err, CliError::Calibration(_)));
        assert!(err.to_string().starts_with("Calibration failed"));
    }

    #[test]
    fn test_is_config() {
        assert!(CliError::EnvError("x".into()).is_config());
        assert!(CliError::FileError("x".into()).is_config());
        assert!(!CliError::Report("x".into()).is_config());
    }
}
