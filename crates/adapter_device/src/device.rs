//! Transceiver capability traits.
//!
//! The calibration engine drives hardware only through these two traits.
//! [`CaptureDevice`] covers the receive stream; [`TransceiverDevice`] adds
//! tuning, gains, corrections and raw settings.
//!
//! Stream handles are owned by the caller and passed back into the device
//! for every stream call, so a device never hands out borrows of itself.

use crate::error::DeviceResult;
use cal_core::types::{Channel, Direction};
use num_complex::{Complex32, Complex64};
use std::fmt;
use std::time::Duration;

/// Tuning stage addressed by a frequency call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrequencyStage {
    /// RF local oscillator
    Rf,
    /// Baseband numerically-controlled oscillator (CORDIC)
    Baseband,
}

impl FrequencyStage {
    /// Driver name of the stage.
    pub fn name(self) -> &'static str {
        match self {
            FrequencyStage::Rf => "RF",
            FrequencyStage::Baseband => "BB",
        }
    }
}

impl fmt::Display for FrequencyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Named gain element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GainStage {
    /// Rx programmable gain amplifier
    Pga,
    /// Rx transimpedance amplifier
    Tia,
    /// Rx low-noise amplifier
    Lna,
    /// Rx loopback low-noise amplifier
    LbLna,
    /// Tx power amplifier driver
    Pad,
    /// Tx loopback power amplifier driver
    LbPad,
}

impl GainStage {
    /// Driver name of the element.
    pub fn name(self) -> &'static str {
        match self {
            GainStage::Pga => "PGA",
            GainStage::Tia => "TIA",
            GainStage::Lna => "LNA",
            GainStage::LbLna => "LB_LNA",
            GainStage::Pad => "PAD",
            GainStage::LbPad => "LB_PAD",
        }
    }
}

impl fmt::Display for GainStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stream status code, negative on failure.
///
/// Values follow the SoapySDR error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCode(pub i32);

impl StatusCode {
    /// No samples arrived within the read timeout.
    pub const TIMEOUT: StatusCode = StatusCode(-1);
    /// Generic stream failure.
    pub const STREAM_ERROR: StatusCode = StatusCode(-2);
    /// Corrupted data.
    pub const CORRUPTION: StatusCode = StatusCode(-3);
    /// Receive overflow.
    pub const OVERFLOW: StatusCode = StatusCode(-4);
    /// Operation not supported.
    pub const NOT_SUPPORTED: StatusCode = StatusCode(-5);
    /// Timed-operation error.
    pub const TIME_ERROR: StatusCode = StatusCode(-6);
    /// Transmit underflow.
    pub const UNDERFLOW: StatusCode = StatusCode(-7);

    /// Whether this status is a read timeout.
    pub fn is_timeout(self) -> bool {
        self == Self::TIMEOUT
    }

    /// Symbolic name of the status.
    pub fn name(self) -> &'static str {
        match self.0 {
            -1 => "TIMEOUT",
            -2 => "STREAM_ERROR",
            -3 => "CORRUPTION",
            -4 => "OVERFLOW",
            -5 => "NOT_SUPPORTED",
            -6 => "TIME_ERROR",
            -7 => "UNDERFLOW",
            _ => "UNKNOWN",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.name())
    }
}

/// Samples per channel delivered by one read, or the failing status.
pub type ReadResult = Result<usize, StatusCode>;

/// Receive-stream capabilities.
pub trait CaptureDevice {
    /// Opaque stream handle.
    type Stream;

    /// Open a multi-channel complex-float receive stream.
    fn setup_rx_stream(&mut self, channels: &[Channel]) -> DeviceResult<Self::Stream>;

    /// Start a finite burst of exactly `num_samples` per channel.
    fn activate_burst(&mut self, stream: &mut Self::Stream, num_samples: usize) -> DeviceResult<()>;

    /// Read into one buffer per stream channel.
    ///
    /// Blocks for at most `timeout`. Returns the number of samples written
    /// to each buffer, which may be fewer than the buffer length.
    fn read_stream(
        &mut self,
        stream: &mut Self::Stream,
        buffers: &mut [&mut [Complex32]],
        timeout: Duration,
    ) -> ReadResult;

    /// Close a stream and release its resources.
    fn close_stream(&mut self, stream: Self::Stream) -> DeviceResult<()>;
}

/// Full transceiver capability set used by calibration.
pub trait TransceiverDevice: CaptureDevice {
    /// Human-readable description of the device.
    fn description(&self) -> String;

    /// Tune one stage of one channel.
    fn set_frequency(
        &mut self,
        direction: Direction,
        channel: Channel,
        stage: FrequencyStage,
        freq_hz: f64,
    ) -> DeviceResult<()>;

    /// Set a named gain element.
    fn set_gain(
        &mut self,
        direction: Direction,
        channel: Channel,
        stage: GainStage,
        gain_db: f64,
    ) -> DeviceResult<()>;

    /// Select an antenna port.
    fn set_antenna(&mut self, direction: Direction, channel: Channel, name: &str) -> DeviceResult<()>;

    /// Apply a DC-offset correction.
    fn set_dc_offset(&mut self, direction: Direction, channel: Channel, offset: Complex64) -> DeviceResult<()>;

    /// Apply an IQ-imbalance correction.
    fn set_iq_balance(&mut self, direction: Direction, channel: Channel, balance: Complex64) -> DeviceResult<()>;

    /// Enable or disable automatic DC-offset removal.
    fn set_dc_offset_mode(&mut self, direction: Direction, channel: Channel, automatic: bool) -> DeviceResult<()>;

    /// Set the master clock rate.
    fn set_master_clock_rate(&mut self, rate_hz: f64) -> DeviceResult<()>;

    /// Set the sample rate of one channel.
    fn set_sample_rate(&mut self, direction: Direction, channel: Channel, rate_hz: f64) -> DeviceResult<()>;

    /// Write an arbitrary named low-level setting.
    fn write_setting(&mut self, key: &str, value: &str) -> DeviceResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(FrequencyStage::Rf.name(), "RF");
        assert_eq!(FrequencyStage::Baseband.name(), "BB");
        assert_eq!(GainStage::LbLna.name(), "LB_LNA");
        assert_eq!(GainStage::LbPad.to_string(), "LB_PAD");
    }

    #[test]
    fn test_status_code() {
        assert!(StatusCode::TIMEOUT.is_timeout());
        assert!(!StatusCode::OVERFLOW.is_timeout());
        assert_eq!(StatusCode::OVERFLOW.name(), "OVERFLOW");
        assert_eq!(StatusCode(-99).name(), "UNKNOWN");
        assert_eq!(StatusCode::CORRUPTION.to_string(), "-3 (CORRUPTION)");
    }
}
