//! Device and acquisition error types.

use std::time::Duration;
use thiserror::Error;

/// Result alias for device calls.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors raised by a device capability call.
///
/// # Variants
///
/// - `Configuration`: a setter was rejected by the device
/// - `Stream`: a stream could not be set up, activated or closed
/// - `Unsupported`: the requested backend or feature is not available
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// A configuration call failed.
    #[error("Device configuration failed in {operation}: {message}")]
    Configuration {
        /// Name of the failed call (e.g. `set_gain`)
        operation: String,
        /// Driver-supplied description
        message: String,
    },

    /// A stream operation failed.
    #[error("Stream error: {message}")]
    Stream {
        /// Driver-supplied description
        message: String,
    },

    /// Backend or capability unavailable.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl DeviceError {
    /// Create a configuration error.
    pub fn configuration(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a stream error.
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream {
            message: message.into(),
        }
    }

    /// Check if this is a configuration error.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

/// Errors raised while acquiring a sample block.
///
/// All variants are fatal for the current calibration; nothing retries.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AcquisitionError {
    /// A stream read reported a negative status.
    #[error("Stream read failed with status {code} ({name}) after {collected} samples")]
    ReadStatus {
        /// Raw status code
        code: i32,
        /// Symbolic name of the status
        name: &'static str,
        /// Samples per channel collected before the failure
        collected: usize,
    },

    /// The capture did not complete before its deadline.
    #[error("Acquisition timed out after {timeout:?}: {collected} of {requested} samples")]
    Timeout {
        /// Samples per channel collected
        collected: usize,
        /// Samples per channel requested
        requested: usize,
        /// Deadline that elapsed
        timeout: Duration,
    },

    /// The capture was cancelled.
    #[error("Acquisition cancelled after {collected} samples")]
    Cancelled {
        /// Samples per channel collected
        collected: usize,
    },

    /// Activating the burst failed.
    #[error("Device error during acquisition: {0}")]
    Device(#[from] DeviceError),
}

impl AcquisitionError {
    /// Check if this is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if this is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Check if this is a failed read.
    pub fn is_read_status(&self) -> bool {
        matches!(self, Self::ReadStatus { .. })
    }
}
