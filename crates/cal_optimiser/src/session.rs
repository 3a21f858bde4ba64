//! Session controller.
//!
//! Owns the device for the length of one calibration: programs the fixed
//! front-end settings, switches on the loopback test tone, opens the capture
//! stream, runs the engine once and closes the stream again.

use crate::config::CalibrationConfig;
use crate::engine::{CalibrationEngine, CalibrationStage};
use crate::error::CalibrationError;
use crate::result::CalibrationOutcome;
use adapter_device::{CancelToken, CaptureSession, DeviceError, FrequencyStage, TransceiverDevice};
use cal_core::types::{Channel, Direction};
use tracing::info;

/// RF frequency both LOs are parked at before the rates are programmed.
///
/// The driver only applies new sample rates once the LOs are tuned.
pub const RATE_PROGRAMMING_FREQ_HZ: f64 = 1e9;

fn at_init(e: DeviceError) -> CalibrationError {
    CalibrationError::configuration(CalibrationStage::Init, e)
}

/// Program clock, rates, antennas, fixed gains and the test-tone generator.
pub fn configure_device<D: TransceiverDevice>(device: &mut D, config: &CalibrationConfig) -> Result<(), CalibrationError> {
    for direction in [Direction::Rx, Direction::Tx] {
        device
            .set_frequency(direction, Channel::A, FrequencyStage::Rf, RATE_PROGRAMMING_FREQ_HZ)
            .map_err(at_init)?;
    }

    device.set_master_clock_rate(config.clock_rate_hz).map_err(at_init)?;
    for ch in Channel::ALL {
        device
            .set_sample_rate(Direction::Tx, ch, config.sample_rate_hz)
            .map_err(at_init)?;
        device
            .set_sample_rate(Direction::Rx, ch, config.sample_rate_hz)
            .map_err(at_init)?;
        device.set_antenna(Direction::Rx, ch, &config.rx_antenna).map_err(at_init)?;
        device.set_antenna(Direction::Tx, ch, &config.tx_antenna).map_err(at_init)?;
        for (stage, gain_db) in config.tx_gain_plan() {
            device.set_gain(Direction::Tx, ch, stage, gain_db).map_err(at_init)?;
        }
        for (stage, gain_db) in config.rx_gain_plan() {
            device.set_gain(Direction::Rx, ch, stage, gain_db).map_err(at_init)?;
        }
        device.set_dc_offset_mode(Direction::Rx, ch, false).map_err(at_init)?;
    }

    for ch in Channel::ALL {
        device.write_setting("ACTIVE_CHANNEL", ch.letter()).map_err(at_init)?;
        device.write_setting("ENABLE_TXTSP_CONST", "true").map_err(at_init)?;
    }
    Ok(())
}

/// Runs one calibration on an owned device.
///
/// # Examples
///
/// ```
/// use adapter_device::{CancelToken, SimulatedLoopback};
/// use cal_optimiser::{CalibrationConfig, SessionController};
///
/// let config = CalibrationConfig::default().with_search_depths(2..=2);
/// let mut controller = SessionController::new(SimulatedLoopback::default(), config).unwrap();
/// let outcome = controller.run(1.2e9, &CancelToken::new()).unwrap();
/// assert_eq!(outcome.freq_hz, 1.2e9);
/// assert_eq!(controller.device().closed_streams(), 1);
/// ```
#[derive(Debug)]
pub struct SessionController<D: TransceiverDevice> {
    device: D,
    engine: CalibrationEngine,
}

impl<D: TransceiverDevice> SessionController<D> {
    /// Take ownership of `device`, validating `config`.
    pub fn new(device: D, config: CalibrationConfig) -> Result<Self, CalibrationError> {
        let engine = CalibrationEngine::new(config)?;
        info!(device = %device.description(), "device ready");
        Ok(Self { device, engine })
    }

    /// The device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// The engine, with the stage reached by the last run.
    pub fn engine(&self) -> &CalibrationEngine {
        &self.engine
    }

    /// Configure the device and calibrate at `freq_hz`.
    ///
    /// The capture stream is closed on every exit path.
    pub fn run(&mut self, freq_hz: f64, cancel: &CancelToken) -> Result<CalibrationOutcome, CalibrationError> {
        configure_device(&mut self.device, self.engine.config())?;

        let mut session = CaptureSession::open(&mut self.device).map_err(at_init)?;
        let outcome = self.engine.calibrate(&mut session, freq_hz, cancel)?;
        session
            .close()
            .map_err(|e| CalibrationError::configuration(CalibrationStage::Done, e))?;

        info!(
            freq_hz,
            elapsed_s = outcome.elapsed.as_secs_f64(),
            "calibration took {:.2} s",
            outcome.elapsed.as_secs_f64()
        );
        Ok(outcome)
    }

    /// Release the device.
    pub fn into_device(self) -> D {
        self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adapter_device::{GainStage, SimulatedLoopback};

    #[test]
    fn test_configure_device_programs_front_end() {
        let mut device = SimulatedLoopback::default();
        configure_device(&mut device, &CalibrationConfig::default()).unwrap();

        assert_eq!(device.master_clock_rate(), 80e6);
        assert_eq!(device.frequency(Direction::Tx, Channel::A, FrequencyStage::Rf), Some(1e9));
        for ch in Channel::ALL {
            assert_eq!(device.sample_rate(Direction::Rx, ch), 10e6);
            assert_eq!(device.antenna(Direction::Rx, ch), Some("LB1"));
            assert_eq!(device.antenna(Direction::Tx, ch), Some("BAND1"));
            assert_eq!(device.gain(Direction::Rx, ch, GainStage::LbLna), Some(40.0));
            assert_eq!(device.gain(Direction::Tx, ch, GainStage::Pad), Some(-10.0));
            assert_eq!(device.dc_offset_mode(Direction::Rx, ch), Some(false));
            assert!(device.test_tone_enabled(ch));
        }
        assert_eq!(device.settings().len(), 4);
    }

    #[test]
    fn test_run_closes_stream_on_failure() {
        let mut device = SimulatedLoopback::default();
        device.fail_reads_after(0);
        let config = CalibrationConfig::default().with_search_depths(2..=2);
        let mut controller = SessionController::new(device, config).unwrap();
        let err = controller.run(1e9, &CancelToken::new()).unwrap_err();
        assert!(err.is_acquisition());
        assert_eq!(controller.device().opened_streams(), 1);
        assert_eq!(controller.device().closed_streams(), 1);
    }

    #[test]
    fn test_configuration_failure_opens_no_stream() {
        let mut device = SimulatedLoopback::default();
        device.fail_operation("set_antenna");
        let mut controller = SessionController::new(device, CalibrationConfig::default()).unwrap();
        let err = controller.run(1e9, &CancelToken::new()).unwrap_err();
        assert_eq!(err.stage(), Some(CalibrationStage::Init));
        assert_eq!(controller.into_device().opened_streams(), 0);
    }
}
