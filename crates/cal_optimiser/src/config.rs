//! Calibration configuration.
//!
//! Every tunable of a calibration run lives in one immutable
//! [`CalibrationConfig`], built once and handed to the session controller and
//! the search engine.

use crate::error::CalibrationError;
use adapter_device::{AcquisitionOptions, CancelToken, GainStage};
use cal_core::types::PerChannel;
use std::ops::RangeInclusive;
use std::time::Duration;

/// Deepest search depth accepted.
///
/// At depth 52 the grid half-width `2^-52` is one ulp of 1.0; deeper grids
/// no longer move a correction.
pub const MAX_SEARCH_DEPTH: u32 = 52;

/// Configuration for one loopback calibration run.
///
/// # Examples
///
/// ```
/// use cal_optimiser::CalibrationConfig;
///
/// let config = CalibrationConfig::default();
/// assert_eq!(config.samples_per_capture, 8192);
/// assert!(config.validate().is_ok());
///
/// let config = CalibrationConfig::builder()
///     .search_depths(2..=6)
///     .samples_per_capture(10_000)
///     .build();
/// assert_eq!(config.search_depths, 2..=6);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationConfig {
    /// Master clock rate (Hz). Default: 80 MHz
    pub clock_rate_hz: f64,
    /// Rx/Tx sample rate (Hz). Default: 10 MHz
    pub sample_rate_hz: f64,
    /// Rx antenna port. Default: `LB1`
    pub rx_antenna: String,
    /// Tx antenna port. Default: `BAND1`
    pub tx_antenna: String,
    /// Rx loopback LNA gain (dB). Default: 40
    pub rx_lb_lna_gain_db: f64,
    /// Rx PGA gain before adjustment (dB). Default: 0
    pub rx_pga_gain_db: f64,
    /// Rx TIA gain (dB). Default: 0
    pub rx_tia_gain_db: f64,
    /// Rx LNA gain (dB). Default: 0
    pub rx_lna_gain_db: f64,
    /// Tx PAD gain (dB). Default: -10
    pub tx_pad_gain_db: f64,
    /// Tx loopback PAD gain (dB). Default: 0
    pub tx_lb_pad_gain_db: f64,
    /// Tx LO offset above the Rx LO (Hz). Default: 0.7 MHz
    pub tx_freq_delta_hz: f64,
    /// Tx baseband NCO frequency per channel (Hz). Default: 1.1 / 1.5 MHz
    pub tx_cordic_freq_hz: PerChannel<f64>,
    /// Search depths, ascending. Default: 2..=10
    pub search_depths: RangeInclusive<u32>,
    /// Grid points per axis. Default: 3
    pub steps_per_iter: usize,
    /// Samples per channel per capture. Default: 8192
    pub samples_per_capture: usize,
    /// FFT size for diagnostic spectra. Default: 1024
    pub bins_per_fft: usize,
    /// Level the Rx gain adjustment aims for (dBFS). Default: -10
    pub rx_target_level_dbfs: f64,
    /// Upper bound for the adjusted PGA gain (dB). Default: 19
    pub max_rx_pga_gain_db: f64,
    /// Deadline for one capture. Default: 5 s
    pub acquisition_timeout: Duration,
    /// Bound for one stream read. Default: 100 ms
    pub read_timeout: Duration,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            clock_rate_hz: 80e6,
            sample_rate_hz: 10e6,
            rx_antenna: "LB1".to_string(),
            tx_antenna: "BAND1".to_string(),
            rx_lb_lna_gain_db: 40.0,
            rx_pga_gain_db: 0.0,
            rx_tia_gain_db: 0.0,
            rx_lna_gain_db: 0.0,
            tx_pad_gain_db: -10.0,
            tx_lb_pad_gain_db: 0.0,
            tx_freq_delta_hz: 0.7e6,
            tx_cordic_freq_hz: PerChannel::new(1.1e6, 1.5e6),
            search_depths: 2..=10,
            steps_per_iter: 3,
            samples_per_capture: 8192,
            bins_per_fft: 1024,
            rx_target_level_dbfs: -10.0,
            max_rx_pga_gain_db: 19.0,
            acquisition_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_millis(100),
        }
    }
}

impl CalibrationConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration builder for fluent construction.
    pub fn builder() -> CalibrationConfigBuilder {
        CalibrationConfigBuilder::new()
    }

    /// Set the search depths.
    pub fn with_search_depths(mut self, depths: RangeInclusive<u32>) -> Self {
        self.search_depths = depths;
        self
    }

    /// Set the samples per capture.
    pub fn with_samples_per_capture(mut self, samples: usize) -> Self {
        self.samples_per_capture = samples;
        self
    }

    /// Set the capture deadline.
    pub fn with_acquisition_timeout(mut self, timeout: Duration) -> Self {
        self.acquisition_timeout = timeout;
        self
    }

    /// Fixed Rx gain elements, in programming order.
    pub fn rx_gain_plan(&self) -> [(GainStage, f64); 4] {
        [
            (GainStage::Pga, self.rx_pga_gain_db),
            (GainStage::Tia, self.rx_tia_gain_db),
            (GainStage::Lna, self.rx_lna_gain_db),
            (GainStage::LbLna, self.rx_lb_lna_gain_db),
        ]
    }

    /// Fixed Tx gain elements, in programming order.
    pub fn tx_gain_plan(&self) -> [(GainStage, f64); 2] {
        [
            (GainStage::Pad, self.tx_pad_gain_db),
            (GainStage::LbPad, self.tx_lb_pad_gain_db),
        ]
    }

    /// Frequency of the Rx image of the loopback tone.
    pub fn rx_image_freq_hz(&self) -> f64 {
        -self.tx_freq_delta_hz
    }

    /// Per-channel frequency of the Tx IQ-imbalance image.
    pub fn tx_image_freq_hz(&self) -> PerChannel<f64> {
        let delta = self.tx_freq_delta_hz;
        self.tx_cordic_freq_hz.map(|cordic| delta - cordic)
    }

    /// Acquisition limits for one capture.
    pub fn acquisition_options(&self, cancel: CancelToken) -> AcquisitionOptions {
        AcquisitionOptions::default()
            .with_timeout(self.acquisition_timeout)
            .with_read_timeout(self.read_timeout)
            .with_cancel(cancel)
    }

    /// Check the configuration for values the search cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::InvalidConfig`] naming the first problem.
    pub fn validate(&self) -> Result<(), CalibrationError> {
        if self.search_depths.is_empty() {
            return Err(CalibrationError::invalid_config(format!(
                "search depths {:?} are empty or descending",
                self.search_depths
            )));
        }
        if *self.search_depths.start() < 2 {
            return Err(CalibrationError::invalid_config(format!(
                "search depth must start at 2 or more, got {}",
                self.search_depths.start()
            )));
        }
        if *self.search_depths.end() > MAX_SEARCH_DEPTH {
            return Err(CalibrationError::invalid_config(format!(
                "search depth must end at {} or less, got {}",
                MAX_SEARCH_DEPTH,
                self.search_depths.end()
            )));
        }
        if self.steps_per_iter < 2 {
            return Err(CalibrationError::invalid_config(format!(
                "steps_per_iter must be at least 2, got {}",
                self.steps_per_iter
            )));
        }
        if self.samples_per_capture == 0 || self.bins_per_fft == 0 {
            return Err(CalibrationError::invalid_config("sample counts must be nonzero"));
        }
        if self.bins_per_fft % 2 != 0 {
            return Err(CalibrationError::invalid_config(format!(
                "bins_per_fft must be even, got {}",
                self.bins_per_fft
            )));
        }
        if self.bins_per_fft > self.samples_per_capture {
            return Err(CalibrationError::invalid_config(format!(
                "bins_per_fft ({}) exceeds samples_per_capture ({})",
                self.bins_per_fft, self.samples_per_capture
            )));
        }
        if !(self.sample_rate_hz > 0.0) || !(self.clock_rate_hz > 0.0) {
            return Err(CalibrationError::invalid_config(format!(
                "rates must be positive (sample {} Hz, clock {} Hz)",
                self.sample_rate_hz, self.clock_rate_hz
            )));
        }
        if self.acquisition_timeout.is_zero() || self.read_timeout.is_zero() {
            return Err(CalibrationError::invalid_config(format!(
                "timeouts must be nonzero (capture {:?}, read {:?})",
                self.acquisition_timeout, self.read_timeout
            )));
        }
        Ok(())
    }
}

/// Builder for [`CalibrationConfig`].
#[derive(Debug, Clone, Default)]
pub struct CalibrationConfigBuilder {
    config: CalibrationConfig,
}

impl CalibrationConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the master clock rate.
    pub fn clock_rate_hz(mut self, rate: f64) -> Self {
        self.config.clock_rate_hz = rate;
        self
    }

    /// Set the sample rate.
    pub fn sample_rate_hz(mut self, rate: f64) -> Self {
        self.config.sample_rate_hz = rate;
        self
    }

    /// Set the Rx and Tx antenna ports.
    pub fn antennas(mut self, rx: impl Into<String>, tx: impl Into<String>) -> Self {
        self.config.rx_antenna = rx.into();
        self.config.tx_antenna = tx.into();
        self
    }

    /// Set the Tx LO offset.
    pub fn tx_freq_delta_hz(mut self, delta: f64) -> Self {
        self.config.tx_freq_delta_hz = delta;
        self
    }

    /// Set the Tx baseband NCO frequencies.
    pub fn tx_cordic_freq_hz(mut self, a: f64, b: f64) -> Self {
        self.config.tx_cordic_freq_hz = PerChannel::new(a, b);
        self
    }

    /// Set the search depths.
    pub fn search_depths(mut self, depths: RangeInclusive<u32>) -> Self {
        self.config.search_depths = depths;
        self
    }

    /// Set the grid points per axis.
    pub fn steps_per_iter(mut self, steps: usize) -> Self {
        self.config.steps_per_iter = steps;
        self
    }

    /// Set the samples per capture.
    pub fn samples_per_capture(mut self, samples: usize) -> Self {
        self.config.samples_per_capture = samples;
        self
    }

    /// Set the diagnostic FFT size.
    pub fn bins_per_fft(mut self, bins: usize) -> Self {
        self.config.bins_per_fft = bins;
        self
    }

    /// Set the Rx gain target and PGA bound.
    pub fn rx_gain_target(mut self, level_dbfs: f64, max_pga_db: f64) -> Self {
        self.config.rx_target_level_dbfs = level_dbfs;
        self.config.max_rx_pga_gain_db = max_pga_db;
        self
    }

    /// Set the capture deadline and per-read bound.
    pub fn timeouts(mut self, acquisition: Duration, read: Duration) -> Self {
        self.config.acquisition_timeout = acquisition;
        self.config.read_timeout = read;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> CalibrationConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================
    // Defaults
    // ========================================

    #[test]
    fn test_default_config() {
        let config = CalibrationConfig::default();
        assert_eq!(config.clock_rate_hz, 80e6);
        assert_eq!(config.sample_rate_hz, 10e6);
        assert_eq!(config.rx_antenna, "LB1");
        assert_eq!(config.tx_antenna, "BAND1");
        assert_eq!(config.search_depths, 2..=10);
        assert_eq!(config.steps_per_iter, 3);
        assert_eq!(config.bins_per_fft, 1024);
        assert_eq!(config.max_rx_pga_gain_db, 19.0);
        assert_eq!(config, CalibrationConfig::new());
    }

    #[test]
    fn test_gain_plans() {
        let config = CalibrationConfig::default();
        assert_eq!(config.rx_gain_plan()[3], (GainStage::LbLna, 40.0));
        assert_eq!(config.tx_gain_plan()[0], (GainStage::Pad, -10.0));
    }

    #[test]
    fn test_tone_frequencies() {
        let config = CalibrationConfig::default();
        assert_eq!(config.rx_image_freq_hz(), -0.7e6);
        let image = config.tx_image_freq_hz();
        assert!((image.0[0] + 0.4e6).abs() < 1e-6);
        assert!((image.0[1] + 0.8e6).abs() < 1e-6);
    }

    // ========================================
    // Builder
    // ========================================

    #[test]
    fn test_builder_chained() {
        let config = CalibrationConfig::builder()
            .antennas("LB2", "BAND2")
            .tx_cordic_freq_hz(1.0e6, 2.0e6)
            .steps_per_iter(5)
            .rx_gain_target(-12.0, 15.0)
            .timeouts(Duration::from_secs(1), Duration::from_millis(20))
            .build();
        assert_eq!(config.rx_antenna, "LB2");
        assert_eq!(config.tx_cordic_freq_hz, PerChannel::new(1.0e6, 2.0e6));
        assert_eq!(config.steps_per_iter, 5);
        assert_eq!(config.rx_target_level_dbfs, -12.0);
        assert_eq!(config.read_timeout, Duration::from_millis(20));
    }

    #[test]
    fn test_acquisition_options_follow_config() {
        let config = CalibrationConfig::default().with_acquisition_timeout(Duration::from_millis(750));
        let opts = config.acquisition_options(CancelToken::new());
        assert_eq!(opts.timeout, Duration::from_millis(750));
        assert_eq!(opts.read_timeout, Duration::from_millis(100));
    }

    // ========================================
    // Validation
    // ========================================

    #[test]
    fn test_validate_rejects_shallow_depth() {
        let err = CalibrationConfig::default().with_search_depths(1..=4).validate().unwrap_err();
        assert!(err.is_invalid_config());
    }

    #[test]
    #[allow(clippy::reversed_empty_ranges)]
    fn test_validate_rejects_descending_depths() {
        assert!(CalibrationConfig::default().with_search_depths(6..=3).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_counts() {
        assert!(CalibrationConfig::builder().steps_per_iter(1).build().validate().is_err());
        assert!(CalibrationConfig::default().with_samples_per_capture(0).validate().is_err());
        assert!(CalibrationConfig::builder()
            .samples_per_capture(512)
            .build()
            .validate()
            .is_err());
        assert!(CalibrationConfig::builder().sample_rate_hz(0.0).build().validate().is_err());
        assert!(CalibrationConfig::builder().clock_rate_hz(f64::NAN).build().validate().is_err());
    }

    #[test]
    fn test_validate_rejects_odd_or_zero_fft_size() {
        let err = CalibrationConfig::builder().bins_per_fft(1023).build().validate().unwrap_err();
        assert!(err.is_invalid_config());
        assert!(err.to_string().contains("even"));
        assert!(CalibrationConfig::builder().bins_per_fft(0).build().validate().is_err());
        assert!(CalibrationConfig::builder().bins_per_fft(1022).build().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let err = CalibrationConfig::default()
            .with_acquisition_timeout(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("timeouts"));
        assert!(CalibrationConfig::builder()
            .timeouts(Duration::from_secs(1), Duration::ZERO)
            .build()
            .validate()
            .is_err());
    }

    #[test]
    fn test_validate_bounds_search_depth() {
        assert!(CalibrationConfig::default()
            .with_search_depths(2..=MAX_SEARCH_DEPTH)
            .validate()
            .is_ok());
        let err = CalibrationConfig::default()
            .with_search_depths(2..=MAX_SEARCH_DEPTH + 1)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("end at 52"));
        assert!(CalibrationConfig::default()
            .with_search_depths(2..=u32::MAX)
            .validate()
            .is_err());
    }
}
