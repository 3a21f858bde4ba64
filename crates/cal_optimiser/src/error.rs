//! Calibration error types.

use crate::engine::CalibrationStage;
use adapter_device::{AcquisitionError, DeviceError};
use thiserror::Error;

/// Errors that abort a calibration run.
///
/// Device and acquisition failures carry the stage they interrupted.
/// Corrections already applied when the failure occurred stay on the device.
///
/// # Examples
///
/// ```
/// use adapter_device::DeviceError;
/// use cal_optimiser::{CalibrationError, CalibrationStage};
///
/// let err = CalibrationError::configuration(
///     CalibrationStage::RxIqSearch,
///     DeviceError::configuration("set_iq_balance", "rejected"),
/// );
/// assert_eq!(err.stage(), Some(CalibrationStage::RxIqSearch));
/// assert!(err.to_string().contains("RX_IQ_SEARCH"));
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// The configuration cannot drive a search.
    #[error("Invalid calibration config: {0}")]
    InvalidConfig(String),

    /// A device setter failed.
    #[error("Device configuration failed during {stage}: {source}")]
    Configuration {
        /// Stage in progress
        stage: CalibrationStage,
        /// Underlying device error
        #[source]
        source: DeviceError,
    },

    /// A capture failed.
    #[error("Acquisition failed during {stage}: {source}")]
    Acquisition {
        /// Stage in progress
        stage: CalibrationStage,
        /// Underlying acquisition error
        #[source]
        source: AcquisitionError,
    },
}

impl CalibrationError {
    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Wrap a device error raised during `stage`.
    pub fn configuration(stage: CalibrationStage, source: DeviceError) -> Self {
        Self::Configuration { stage, source }
    }

    /// Wrap an acquisition error raised during `stage`.
    pub fn acquisition(stage: CalibrationStage, source: AcquisitionError) -> Self {
        Self::Acquisition { stage, source }
    }

    /// Stage the failure interrupted, if any.
    pub fn stage(&self) -> Option<CalibrationStage> {
        match self {
            Self::InvalidConfig(_) => None,
            Self::Configuration { stage, .. } | Self::Acquisition { stage, .. } => Some(*stage),
        }
    }

    /// Check if this is a configuration validation error.
    pub fn is_invalid_config(&self) -> bool {
        matches!(self, Self::InvalidConfig(_))
    }

    /// Check if this is a device setter failure.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// Check if this is a capture failure.
    pub fn is_acquisition(&self) -> bool {
        matches!(self, Self::Acquisition { .. })
    }
}
