//! Calibration search engine.
//!
//! Runs the calibration at one RF frequency as a strictly sequential state
//! machine:
//!
//! ```text
//! INIT → RX_GAIN_ADJUST → RX_IQ_SEARCH → TX_IQ_DC_SEARCH → DONE
//! ```
//!
//! Both searches are shrinking-grid coordinate descents. At every depth the
//! best corrections are snapshotted once, and every test point of that depth
//! is composed onto the snapshot, never onto a best found mid-depth.

use crate::config::CalibrationConfig;
use crate::error::CalibrationError;
use crate::result::{CalibrationOutcome, CorrectionResult, StageCaptures};
use crate::state::SearchState;
use crate::test_points::TestPoints;
use adapter_device::{
    AcquisitionOptions, CancelToken, CaptureSession, DeviceError, FrequencyStage, GainStage, TransceiverDevice,
};
use cal_core::math::tone::measure_tone_level;
use cal_core::types::{compose_iq, offset_dc, Channel, CorrectionKind, Direction, PerChannel, SampleBlock};
use num_complex::Complex64;
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, trace};

/// Stage of a calibration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CalibrationStage {
    /// Tuning and clearing corrections
    Init,
    /// One-shot Rx PGA gain adjustment
    RxGainAdjust,
    /// Rx IQ-imbalance search
    RxIqSearch,
    /// Joint Tx IQ-imbalance and DC-offset search
    TxIqDcSearch,
    /// Finished
    Done,
}

impl CalibrationStage {
    /// Upper-case stage name.
    pub fn name(self) -> &'static str {
        match self {
            CalibrationStage::Init => "INIT",
            CalibrationStage::RxGainAdjust => "RX_GAIN_ADJUST",
            CalibrationStage::RxIqSearch => "RX_IQ_SEARCH",
            CalibrationStage::TxIqDcSearch => "TX_IQ_DC_SEARCH",
            CalibrationStage::Done => "DONE",
        }
    }

    /// The stage that follows this one.
    pub fn next(self) -> Option<Self> {
        match self {
            CalibrationStage::Init => Some(CalibrationStage::RxGainAdjust),
            CalibrationStage::RxGainAdjust => Some(CalibrationStage::RxIqSearch),
            CalibrationStage::RxIqSearch => Some(CalibrationStage::TxIqDcSearch),
            CalibrationStage::TxIqDcSearch => Some(CalibrationStage::Done),
            CalibrationStage::Done => None,
        }
    }
}

impl fmt::Display for CalibrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tone levels of both channels of one capture.
///
/// Channels are measured independently (in parallel with the `parallel`
/// feature); the result does not depend on the order.
pub fn measure_levels(block: &SampleBlock, freq_hz: PerChannel<f64>, sample_rate_hz: f64) -> PerChannel<f64> {
    let measure = |ch: Channel| measure_tone_level(block.channel(ch), freq_hz[ch], sample_rate_hz);

    #[cfg(feature = "parallel")]
    {
        let (a, b) = rayon::join(|| measure(Channel::A), || measure(Channel::B));
        PerChannel::new(a, b)
    }

    #[cfg(not(feature = "parallel"))]
    {
        PerChannel::from_fn(measure)
    }
}

/// Shrinking-grid calibration engine.
///
/// The engine is the only issuer of device calls while a run is in
/// progress. On failure it stops immediately; corrections already applied
/// stay on the device.
///
/// # Examples
///
/// ```
/// use adapter_device::{CancelToken, CaptureSession, SimulatedLoopback};
/// use cal_optimiser::{CalibrationConfig, CalibrationEngine, CalibrationStage};
///
/// let config = CalibrationConfig::default()
///     .with_search_depths(2..=3)
///     .with_samples_per_capture(2000);
/// let mut engine = CalibrationEngine::new(config).unwrap();
///
/// let mut device = SimulatedLoopback::default();
/// let mut session = CaptureSession::open(&mut device).unwrap();
/// let outcome = engine.calibrate(&mut session, 1.5e9, &CancelToken::new()).unwrap();
/// session.close().unwrap();
///
/// assert_eq!(engine.stage(), CalibrationStage::Done);
/// assert_eq!(outcome.candidates_evaluated, 2 * 2 * 9);
/// ```
#[derive(Debug, Clone)]
pub struct CalibrationEngine {
    config: CalibrationConfig,
    stage: CalibrationStage,
}

impl CalibrationEngine {
    /// Create an engine, validating the configuration.
    pub fn new(config: CalibrationConfig) -> Result<Self, CalibrationError> {
        config.validate()?;
        Ok(Self {
            config,
            stage: CalibrationStage::Init,
        })
    }

    /// The configuration.
    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Stage reached by the current or last run.
    pub fn stage(&self) -> CalibrationStage {
        self.stage
    }

    /// Calibrate both channels at Rx RF frequency `freq_hz`.
    ///
    /// # Errors
    ///
    /// - [`CalibrationError::Configuration`] when a device setter fails
    /// - [`CalibrationError::Acquisition`] when a capture fails, times out or
    ///   is cancelled through `cancel`
    pub fn calibrate<D: TransceiverDevice>(
        &mut self,
        session: &mut CaptureSession<'_, D>,
        freq_hz: f64,
        cancel: &CancelToken,
    ) -> Result<CalibrationOutcome, CalibrationError> {
        let started = Instant::now();
        let options = self.config.acquisition_options(cancel.clone());
        self.stage = CalibrationStage::Init;
        info!(freq_hz, "calibration started");

        self.tune_and_clear(session.device(), freq_hz)?;

        self.advance();
        let rx_pga_gain_db = self.adjust_rx_gain(session, &options)?;

        self.advance();
        let rx_initial = self.capture(session, &options)?;
        let rx_iq = self.search_rx_iq(session, &options)?;
        self.apply(session.device(), Direction::Rx, &rx_iq)?;
        let rx_final = self.capture(session, &options)?;
        info!(
            rx_iq_a = %rx_iq.corrections()[Channel::A],
            rx_iq_b = %rx_iq.corrections()[Channel::B],
            "best Rx IQ corrections"
        );

        self.advance();
        let on_device = self.map_device_err();
        for ch in Channel::ALL {
            session
                .device()
                .set_frequency(Direction::Tx, ch, FrequencyStage::Baseband, self.config.tx_cordic_freq_hz[ch])
                .map_err(&on_device)?;
        }
        let tx_initial = self.capture(session, &options)?;
        let (tx_iq, tx_dc) = self.search_tx_iq_dc(session, &options)?;
        self.apply(session.device(), Direction::Tx, &tx_iq)?;
        self.apply(session.device(), Direction::Tx, &tx_dc)?;
        let tx_final = self.capture(session, &options)?;
        info!(
            tx_iq_a = %tx_iq.corrections()[Channel::A],
            tx_iq_b = %tx_iq.corrections()[Channel::B],
            tx_dc_a = %tx_dc.corrections()[Channel::A],
            tx_dc_b = %tx_dc.corrections()[Channel::B],
            "best Tx corrections"
        );

        self.advance();
        let points_per_depth = self.config.steps_per_iter * self.config.steps_per_iter;
        let depths = self.config.search_depths.clone().count();
        let elapsed = started.elapsed();
        info!(elapsed_s = elapsed.as_secs_f64(), "calibration finished");

        Ok(CalibrationOutcome {
            freq_hz,
            rx_pga_gain_db,
            rx_iq: CorrectionResult::from(&rx_iq),
            tx_iq: CorrectionResult::from(&tx_iq),
            tx_dc: CorrectionResult::from(&tx_dc),
            captures: StageCaptures {
                rx_initial,
                rx_final,
                tx_initial,
                tx_final,
            },
            candidates_evaluated: 2 * depths * points_per_depth,
            elapsed,
        })
    }

    fn advance(&mut self) {
        if let Some(next) = self.stage.next() {
            debug!(from = %self.stage, to = %next, "stage transition");
            self.stage = next;
        }
    }

    fn map_device_err(&self) -> impl Fn(DeviceError) -> CalibrationError {
        let stage = self.stage;
        move |e| CalibrationError::configuration(stage, e)
    }

    fn capture<D: TransceiverDevice>(
        &self,
        session: &mut CaptureSession<'_, D>,
        options: &AcquisitionOptions,
    ) -> Result<SampleBlock, CalibrationError> {
        session
            .acquire(self.config.samples_per_capture, options)
            .map_err(|e| CalibrationError::acquisition(self.stage, e))
    }

    /// Write one correction to one channel.
    fn write_correction<D: TransceiverDevice>(
        &self,
        device: &mut D,
        direction: Direction,
        kind: CorrectionKind,
        channel: Channel,
        value: Complex64,
    ) -> Result<(), CalibrationError> {
        match kind {
            CorrectionKind::IqBalance => device.set_iq_balance(direction, channel, value),
            CorrectionKind::DcOffset => device.set_dc_offset(direction, channel, value),
        }
        .map_err(self.map_device_err())
    }

    /// Write one correction per channel.
    fn write_corrections<D: TransceiverDevice>(
        &self,
        device: &mut D,
        direction: Direction,
        kind: CorrectionKind,
        values: PerChannel<Complex64>,
    ) -> Result<(), CalibrationError> {
        for (ch, &value) in values.iter() {
            self.write_correction(device, direction, kind, ch, value)?;
        }
        Ok(())
    }

    fn apply<D: TransceiverDevice>(
        &self,
        device: &mut D,
        direction: Direction,
        state: &SearchState,
    ) -> Result<(), CalibrationError> {
        self.write_corrections(device, direction, state.kind(), state.corrections())
    }

    /// Tune Rx to `freq_hz` and Tx `tx_freq_delta_hz` above it, zero the
    /// baseband NCOs and reset every correction to identity.
    fn tune_and_clear<D: TransceiverDevice>(&self, device: &mut D, freq_hz: f64) -> Result<(), CalibrationError> {
        let on_device = self.map_device_err();
        device
            .set_frequency(Direction::Rx, Channel::A, FrequencyStage::Rf, freq_hz)
            .map_err(&on_device)?;
        device
            .set_frequency(
                Direction::Tx,
                Channel::A,
                FrequencyStage::Rf,
                freq_hz + self.config.tx_freq_delta_hz,
            )
            .map_err(&on_device)?;

        for ch in Channel::ALL {
            device
                .set_frequency(Direction::Tx, ch, FrequencyStage::Baseband, 0.0)
                .map_err(&on_device)?;
            device
                .set_frequency(Direction::Rx, ch, FrequencyStage::Baseband, 0.0)
                .map_err(&on_device)?;
        }
        let dc_identity = PerChannel::splat(CorrectionKind::DcOffset.identity());
        let iq_identity = PerChannel::splat(CorrectionKind::IqBalance.identity());
        self.write_corrections(device, Direction::Tx, CorrectionKind::DcOffset, dc_identity)?;
        self.write_corrections(device, Direction::Tx, CorrectionKind::IqBalance, iq_identity)?;
        self.write_corrections(device, Direction::Rx, CorrectionKind::IqBalance, iq_identity)?;
        Ok(())
    }

    /// Bring the loopback tone toward the target level with one PGA step.
    fn adjust_rx_gain<D: TransceiverDevice>(
        &self,
        session: &mut CaptureSession<'_, D>,
        options: &AcquisitionOptions,
    ) -> Result<PerChannel<f64>, CalibrationError> {
        let on_device = self.map_device_err();
        let base = self.config.rx_pga_gain_db;
        for ch in Channel::ALL {
            session
                .device()
                .set_gain(Direction::Rx, ch, GainStage::Pga, base)
                .map_err(&on_device)?;
        }

        let block = self.capture(session, options)?;
        let tone = PerChannel::splat(self.config.tx_freq_delta_hz);
        let levels = measure_levels(&block, tone, self.config.sample_rate_hz);

        let mut gains = PerChannel::splat(base);
        for ch in Channel::ALL {
            let delta_db = self.config.rx_target_level_dbfs - levels[ch];
            let gain_db = (base + delta_db).min(self.config.max_rx_pga_gain_db);
            info!(channel = %ch, delta_db, level_dbfs = levels[ch], pga_db = gain_db, "Rx gain adjusted");
            session
                .device()
                .set_gain(Direction::Rx, ch, GainStage::Pga, gain_db)
                .map_err(&on_device)?;
            gains[ch] = gain_db;
        }
        Ok(gains)
    }

    /// Minimise the Rx image of the loopback tone.
    fn search_rx_iq<D: TransceiverDevice>(
        &self,
        session: &mut CaptureSession<'_, D>,
        options: &AcquisitionOptions,
    ) -> Result<SearchState, CalibrationError> {
        let mut iq = SearchState::new(CorrectionKind::IqBalance);
        let image = PerChannel::splat(self.config.rx_image_freq_hz());

        for depth in self.config.search_depths.clone() {
            let start = iq.snapshot();
            let points = TestPoints::new(depth, self.config.steps_per_iter);
            let half_width = points.scale();
            for point in points {
                let trial = PerChannel::from_fn(|ch| compose_iq(point.iq, start[ch]));
                self.write_corrections(session.device(), Direction::Rx, CorrectionKind::IqBalance, trial)?;

                let block = self.capture(session, options)?;
                let levels = measure_levels(&block, image, self.config.sample_rate_hz);
                for ch in Channel::ALL {
                    iq.offer(ch, trial[ch], levels[ch]);
                }
                trace!(depth, level_a = levels[Channel::A], level_b = levels[Channel::B], "Rx IQ candidate");
            }
            debug!(
                depth,
                half_width,
                best_a = iq.channel(Channel::A).level_dbfs(),
                best_b = iq.channel(Channel::B).level_dbfs(),
                "Rx IQ depth complete"
            );
        }
        Ok(iq)
    }

    /// Minimise the Tx image and the Tx DC leakage together.
    ///
    /// One capture per test point feeds both searches; each keeps its own
    /// best per channel.
    fn search_tx_iq_dc<D: TransceiverDevice>(
        &self,
        session: &mut CaptureSession<'_, D>,
        options: &AcquisitionOptions,
    ) -> Result<(SearchState, SearchState), CalibrationError> {
        let mut iq = SearchState::new(CorrectionKind::IqBalance);
        let mut dc = SearchState::new(CorrectionKind::DcOffset);
        let image = self.config.tx_image_freq_hz();
        let leakage = PerChannel::splat(self.config.tx_freq_delta_hz);
        let rate = self.config.sample_rate_hz;

        for depth in self.config.search_depths.clone() {
            let iq_start = iq.snapshot();
            let dc_start = dc.snapshot();
            let points = TestPoints::new(depth, self.config.steps_per_iter);
            let half_width = points.scale();
            for point in points {
                let iq_trial = PerChannel::from_fn(|ch| compose_iq(point.iq, iq_start[ch]));
                let dc_trial = PerChannel::from_fn(|ch| offset_dc(dc_start[ch], point.dc));
                let device = session.device();
                for ch in Channel::ALL {
                    self.write_correction(device, Direction::Tx, CorrectionKind::IqBalance, ch, iq_trial[ch])?;
                    self.write_correction(device, Direction::Tx, CorrectionKind::DcOffset, ch, dc_trial[ch])?;
                }

                let block = self.capture(session, options)?;
                let image_levels = measure_levels(&block, image, rate);
                let leakage_levels = measure_levels(&block, leakage, rate);
                for ch in Channel::ALL {
                    iq.offer(ch, iq_trial[ch], image_levels[ch]);
                    dc.offer(ch, dc_trial[ch], leakage_levels[ch]);
                }
                trace!(
                    depth,
                    image_a = image_levels[Channel::A],
                    image_b = image_levels[Channel::B],
                    dc_a = leakage_levels[Channel::A],
                    dc_b = leakage_levels[Channel::B],
                    "Tx candidate"
                );
            }
            debug!(
                depth,
                half_width,
                iq_a = iq.channel(Channel::A).level_dbfs(),
                iq_b = iq.channel(Channel::B).level_dbfs(),
                dc_a = dc.channel(Channel::A).level_dbfs(),
                dc_b = dc.channel(Channel::B).level_dbfs(),
                "Tx IQ/DC depth complete"
            );
        }
        Ok((iq, dc))
    }
}
