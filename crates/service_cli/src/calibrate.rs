//! Calibration command implementation
//!
//! Opens the device named by the argument string and runs one calibration
//! at the requested frequency.

use crate::config::AppConfig;
use crate::error::{CliError, Result};
use adapter_device::{CancelToken, DeviceArgs, SimulatedLoopback, TransceiverDevice};
use cal_optimiser::{CalibrationConfig, CalibrationOutcome, SessionController};
use tracing::info;

/// Calibrate at `freq_hz` on the device selected by `config.args`.
///
/// `driver=sim` selects the simulated loopback; anything else goes to the
/// SoapySDR backend when it is compiled in.
pub fn run(config: &AppConfig, freq_hz: f64, cancel: &CancelToken) -> Result<CalibrationOutcome> {
    if !(freq_hz.is_finite() && freq_hz > 0.0) {
        return Err(CliError::InvalidArgument(format!(
            "--freq-start must be a positive frequency in Hz, got {freq_hz}"
        )));
    }

    let args = DeviceArgs::parse(&config.args);
    let calibration = config.calibration_config();
    info!(args = %args, freq_hz, "opening device");

    if args.is_simulated() {
        let device = SimulatedLoopback::from_args(&args)?;
        return run_on(device, calibration, freq_hz, cancel);
    }
    run_on_hardware(&args, calibration, freq_hz, cancel)
}

/// Calibrate on an already opened device, releasing it afterwards.
pub fn run_on<D: TransceiverDevice>(
    device: D,
    calibration: CalibrationConfig,
    freq_hz: f64,
    cancel: &CancelToken,
) -> Result<CalibrationOutcome> {
    let mut controller = SessionController::new(device, calibration)?;
    Ok(controller.run(freq_hz, cancel)?)
}

#[cfg(feature = "soapy")]
fn run_on_hardware(
    args: &DeviceArgs,
    calibration: CalibrationConfig,
    freq_hz: f64,
    cancel: &CancelToken,
) -> Result<CalibrationOutcome> {
    let device = adapter_device::soapy::SoapyDevice::open(args)?;
    run_on(device, calibration, freq_hz, cancel)
}

#[cfg(not(feature = "soapy"))]
fn run_on_hardware(
    args: &DeviceArgs,
    _calibration: CalibrationConfig,
    _freq_hz: f64,
    _cancel: &CancelToken,
) -> Result<CalibrationOutcome> {
    Err(adapter_device::DeviceError::Unsupported(format!(
        "no hardware backend for `{args}`; build with `--features soapy` or pass `--args driver=sim`"
    ))
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim_config() -> AppConfig {
        let mut config = AppConfig {
            args: "driver=sim,seed=11".to_string(),
            ..AppConfig::default()
        };
        config.calibration.search_depth_max = 3;
        config.calibration.samples_per_capture = 2000;
        config
    }

    #[test]
    fn test_run_on_simulated_device() {
        let outcome = run(&sim_config(), 2.4e9, &CancelToken::new()).unwrap();
        assert_eq!(outcome.freq_hz, 2.4e9);
        assert_eq!(outcome.candidates_evaluated, 36);
    }

    #[test]
    fn test_rejects_bad_frequency() {
        for freq in [0.0, -1e9, f64::NAN] {
            let err = run(&sim_config(), freq, &CancelToken::new()).unwrap_err();
            assert!(matches!(err, CliError::InvalidArgument(_)), "{freq}");
        }
    }

    #[test]
    fn test_bad_sim_args() {
        let config = AppConfig {
            args: "driver=sim,seed=x".to_string(),
            ..sim_config()
        };
        let err = run(&config, 1e9, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, CliError::Device(_)));
    }

    #[cfg(not(feature = "soapy"))]
    #[test]
    fn test_hardware_needs_soapy_feature() {
        let config = AppConfig {
            args: "driver=lime".to_string(),
            ..sim_config()
        };
        let err = run(&config, 1e9, &CancelToken::new()).unwrap_err();
        assert!(err.to_string().contains("--features soapy"));
    }

    #[test]
    fn test_cancelled_run() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = run(&sim_config(), 1e9, &cancel).unwrap_err();
        assert!(matches!(err, CliError::Calibration(e) if e.is_acquisition()));
    }
}
