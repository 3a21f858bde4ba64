//! Simulated loopback transceiver.
//!
//! A software model of a two-channel transceiver with its transmit output
//! looped back into the receiver. Impairments are known in advance, so the
//! optimal corrections are known too:
//!
//! - Tx baseband per channel: the constant test tone (when enabled), shifted
//!   by the Tx baseband NCO, plus its IQ-imbalance image and DC leakage:
//!   `x + εₜ·conj(x) + d + ℓ`, with `εₜ = (mₜ·cₜ − 1) / 2`
//! - Loopback: scaled by the Rx PGA gain, shifted by the Tx/Rx LO offset,
//!   with a little crosstalk from the other channel
//! - Rx: `r + εᵣ·conj(r)`, with `εᵣ = (mᵣ·cᵣ − 1) / 2`, plus Gaussian noise
//!
//! where `m` is the true imbalance, `c` the applied IQ correction, `d` the
//! applied Tx DC correction and `ℓ` the true Tx DC leakage.

use crate::args::DeviceArgs;
use crate::device::{CaptureDevice, FrequencyStage, GainStage, ReadResult, StatusCode, TransceiverDevice};
use crate::error::{DeviceError, DeviceResult};
use cal_core::types::{Channel, CorrectionKind, Direction, PerChannel};
use num_complex::{Complex32, Complex64};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use std::collections::HashMap;
use std::f64::consts::PI;
use std::time::Duration;
use tracing::debug;

/// Impairments and signal levels of the simulated loopback.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopbackModel {
    /// True Rx IQ imbalance per channel
    pub rx_imbalance: PerChannel<Complex64>,
    /// True Tx IQ imbalance per channel
    pub tx_imbalance: PerChannel<Complex64>,
    /// True Tx DC leakage per channel (full-scale units)
    pub tx_dc_leakage: PerChannel<Complex64>,
    /// Received test-tone amplitude at 0 dB PGA gain
    pub tone_amplitude: f64,
    /// Relative amplitude of the other channel's signal
    pub crosstalk: f64,
    /// RMS of the complex receiver noise
    pub noise_rms: f64,
    /// Noise generator seed
    pub seed: u64,
    /// Largest number of samples one read returns
    pub max_read: usize,
}

impl Default for LoopbackModel {
    fn default() -> Self {
        Self {
            rx_imbalance: PerChannel::new(
                Complex64::from_polar(2f64.powf(0.15), 0.12),
                Complex64::from_polar(2f64.powf(-0.1), -0.2),
            ),
            tx_imbalance: PerChannel::new(
                Complex64::from_polar(2f64.powf(-0.12), 0.18),
                Complex64::from_polar(2f64.powf(0.2), -0.1),
            ),
            tx_dc_leakage: PerChannel::new(Complex64::new(0.06, -0.04), Complex64::new(-0.03, 0.08)),
            tone_amplitude: 0.03,
            crosstalk: 0.01,
            noise_rms: 1e-5,
            seed: 0x5eed,
            max_read: 4096,
        }
    }
}

impl LoopbackModel {
    /// Rx IQ correction that cancels the Rx image.
    pub fn optimal_rx_iq(&self, ch: Channel) -> Complex64 {
        self.rx_imbalance[ch].inv()
    }

    /// Tx IQ correction that cancels the Tx image.
    pub fn optimal_tx_iq(&self, ch: Channel) -> Complex64 {
        self.tx_imbalance[ch].inv()
    }

    /// Tx DC correction that cancels the Tx leakage.
    pub fn optimal_tx_dc(&self, ch: Channel) -> Complex64 {
        -self.tx_dc_leakage[ch]
    }

    /// Set the noise seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the receiver noise RMS.
    pub fn with_noise_rms(mut self, noise_rms: f64) -> Self {
        self.noise_rms = noise_rms;
        self
    }

    /// Set the largest read size.
    pub fn with_max_read(mut self, max_read: usize) -> Self {
        self.max_read = max_read;
        self
    }
}

/// Stream handle of the simulated device.
#[derive(Debug)]
pub struct SimStream {
    channels: Vec<Channel>,
}

/// Software transceiver implementing the full capability set.
#[derive(Debug)]
pub struct SimulatedLoopback {
    model: LoopbackModel,
    rng: StdRng,
    noise_sigma: f64,
    master_clock_rate: f64,
    sample_rates: HashMap<(Direction, Channel), f64>,
    frequencies: HashMap<(Direction, Channel, FrequencyStage), f64>,
    gains: HashMap<(Direction, Channel, GainStage), f64>,
    antennas: HashMap<(Direction, Channel), String>,
    iq_balance: HashMap<(Direction, Channel), Complex64>,
    dc_offset: HashMap<(Direction, Channel), Complex64>,
    dc_auto: HashMap<(Direction, Channel), bool>,
    settings: Vec<(String, String)>,
    active_channel: Channel,
    tsp_const: PerChannel<bool>,
    clock: u64,
    burst_remaining: usize,
    reads: usize,
    iq_writes: usize,
    open_streams: usize,
    closed_streams: usize,
    fail_read_after: Option<usize>,
    stall_reads: bool,
    fail_operation: Option<String>,
}

impl Default for SimulatedLoopback {
    fn default() -> Self {
        Self::new(LoopbackModel::default())
    }
}

impl SimulatedLoopback {
    /// Default sample rate before any `set_sample_rate` call.
    pub const DEFAULT_SAMPLE_RATE: f64 = 10e6;

    /// Create a device with the given impairments.
    pub fn new(model: LoopbackModel) -> Self {
        Self {
            rng: StdRng::seed_from_u64(model.seed),
            noise_sigma: (model.noise_rms / 2f64.sqrt()).max(0.0),
            model,
            master_clock_rate: 0.0,
            sample_rates: HashMap::new(),
            frequencies: HashMap::new(),
            gains: HashMap::new(),
            antennas: HashMap::new(),
            iq_balance: HashMap::new(),
            dc_offset: HashMap::new(),
            dc_auto: HashMap::new(),
            settings: Vec::new(),
            active_channel: Channel::A,
            tsp_const: PerChannel::splat(false),
            clock: 0,
            burst_remaining: 0,
            reads: 0,
            iq_writes: 0,
            open_streams: 0,
            closed_streams: 0,
            fail_read_after: None,
            stall_reads: false,
            fail_operation: None,
        }
    }

    /// Create from device arguments (`seed`, `noise`, `max_read` keys).
    pub fn from_args(args: &DeviceArgs) -> DeviceResult<Self> {
        let mut model = LoopbackModel::default();
        if let Some(seed) = args.get("seed") {
            model.seed = seed
                .parse()
                .map_err(|_| DeviceError::configuration("parse_args", format!("invalid seed: {seed}")))?;
        }
        if let Some(noise) = args.get("noise") {
            model.noise_rms = noise
                .parse()
                .map_err(|_| DeviceError::configuration("parse_args", format!("invalid noise: {noise}")))?;
        }
        if let Some(max_read) = args.get("max_read") {
            model.max_read = max_read
                .parse()
                .map_err(|_| DeviceError::configuration("parse_args", format!("invalid max_read: {max_read}")))?;
        }
        Ok(Self::new(model))
    }

    /// Fail every read after `reads` successful ones with `STREAM_ERROR`.
    pub fn fail_reads_after(&mut self, reads: usize) {
        self.fail_read_after = Some(reads);
    }

    /// Make every read time out without delivering samples.
    pub fn stall_reads(&mut self) {
        self.stall_reads = true;
    }

    /// Reject every call to the named capability (e.g. `"set_iq_balance"`).
    pub fn fail_operation(&mut self, operation: &str) {
        self.fail_operation = Some(operation.to_string());
    }

    /// The impairment model.
    pub fn model(&self) -> &LoopbackModel {
        &self.model
    }

    /// Currently applied IQ correction.
    pub fn iq_balance(&self, direction: Direction, channel: Channel) -> Complex64 {
        self.iq_balance
            .get(&(direction, channel))
            .copied()
            .unwrap_or_else(|| CorrectionKind::IqBalance.identity())
    }

    /// Currently applied DC correction.
    pub fn dc_offset(&self, direction: Direction, channel: Channel) -> Complex64 {
        self.dc_offset
            .get(&(direction, channel))
            .copied()
            .unwrap_or_else(|| CorrectionKind::DcOffset.identity())
    }

    /// Automatic DC-removal mode, if it was set.
    pub fn dc_offset_mode(&self, direction: Direction, channel: Channel) -> Option<bool> {
        self.dc_auto.get(&(direction, channel)).copied()
    }

    /// Gain of a named element, if it was set.
    pub fn gain(&self, direction: Direction, channel: Channel, stage: GainStage) -> Option<f64> {
        self.gains.get(&(direction, channel, stage)).copied()
    }

    /// Frequency of a stage, if it was set.
    pub fn frequency(&self, direction: Direction, channel: Channel, stage: FrequencyStage) -> Option<f64> {
        self.frequencies.get(&(direction, channel, stage)).copied()
    }

    /// Selected antenna, if it was set.
    pub fn antenna(&self, direction: Direction, channel: Channel) -> Option<&str> {
        self.antennas.get(&(direction, channel)).map(String::as_str)
    }

    /// Sample rate of a channel.
    pub fn sample_rate(&self, direction: Direction, channel: Channel) -> f64 {
        self.sample_rates
            .get(&(direction, channel))
            .copied()
            .unwrap_or(Self::DEFAULT_SAMPLE_RATE)
    }

    /// Master clock rate (0 until set).
    pub fn master_clock_rate(&self) -> f64 {
        self.master_clock_rate
    }

    /// Every setting written, in order.
    pub fn settings(&self) -> &[(String, String)] {
        &self.settings
    }

    /// Whether the constant test-tone generator is on for a channel.
    pub fn test_tone_enabled(&self, channel: Channel) -> bool {
        self.tsp_const[channel]
    }

    /// Number of successful reads.
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Number of IQ-correction writes.
    pub fn iq_writes(&self) -> usize {
        self.iq_writes
    }

    /// Streams opened so far.
    pub fn opened_streams(&self) -> usize {
        self.open_streams
    }

    /// Streams closed so far.
    pub fn closed_streams(&self) -> usize {
        self.closed_streams
    }

    fn check(&self, operation: &str) -> DeviceResult<()> {
        match &self.fail_operation {
            Some(op) if op == operation => Err(DeviceError::configuration(operation, "injected failure")),
            _ => Ok(()),
        }
    }

    fn stage_frequency(&self, direction: Direction, channel: Channel, stage: FrequencyStage) -> f64 {
        self.frequency(direction, channel, stage).unwrap_or(0.0)
    }

    fn imbalance_error(&self, direction: Direction, channel: Channel) -> Complex64 {
        let truth = match direction {
            Direction::Rx => self.model.rx_imbalance[channel],
            Direction::Tx => self.model.tx_imbalance[channel],
        };
        (truth * self.iq_balance(direction, channel) - 1.0) / 2.0
    }

    fn tx_path(&self, channel: Channel) -> TxPath {
        TxPath {
            tone: self.tsp_const[channel],
            nco_hz: self.stage_frequency(Direction::Tx, channel, FrequencyStage::Baseband),
            image: self.imbalance_error(Direction::Tx, channel),
            dc: self.model.tx_dc_leakage[channel] + self.dc_offset(Direction::Tx, channel),
        }
    }

    fn rx_path(&self, channel: Channel) -> RxPath {
        // One LO per direction, tuned through channel A
        let lo_offset = self.stage_frequency(Direction::Tx, Channel::A, FrequencyStage::Rf)
            - self.stage_frequency(Direction::Rx, Channel::A, FrequencyStage::Rf);
        let rx_nco = self.stage_frequency(Direction::Rx, channel, FrequencyStage::Baseband);
        let pga = self.gain(Direction::Rx, channel, GainStage::Pga).unwrap_or(0.0);
        RxPath {
            rate_hz: self.sample_rate(Direction::Rx, channel),
            shift_hz: lo_offset - rx_nco,
            scale: self.model.tone_amplitude * 10f64.powf(pga / 20.0),
            image: self.imbalance_error(Direction::Rx, channel),
        }
    }

    fn noise(&mut self) -> Complex64 {
        let re: f64 = StandardNormal.sample(&mut self.rng);
        let im: f64 = StandardNormal.sample(&mut self.rng);
        Complex64::new(re, im) * self.noise_sigma
    }
}

/// Tx chain state, frozen for the length of one read.
#[derive(Debug, Clone, Copy)]
struct TxPath {
    tone: bool,
    nco_hz: f64,
    image: Complex64,
    dc: Complex64,
}

impl TxPath {
    fn output(&self, t: f64) -> Complex64 {
        if !self.tone {
            return self.dc;
        }
        let x = Complex64::from_polar(1.0, 2.0 * PI * self.nco_hz * t);
        x + self.image * x.conj() + self.dc
    }
}

/// Rx chain state, frozen for the length of one read.
#[derive(Debug, Clone, Copy)]
struct RxPath {
    rate_hz: f64,
    shift_hz: f64,
    scale: f64,
    image: Complex64,
}

impl CaptureDevice for SimulatedLoopback {
    type Stream = SimStream;

    fn setup_rx_stream(&mut self, channels: &[Channel]) -> DeviceResult<SimStream> {
        self.check("setup_rx_stream")?;
        self.open_streams += 1;
        Ok(SimStream {
            channels: channels.to_vec(),
        })
    }

    fn activate_burst(&mut self, _stream: &mut SimStream, num_samples: usize) -> DeviceResult<()> {
        self.check("activate_burst")?;
        self.burst_remaining = num_samples;
        Ok(())
    }

    fn read_stream(
        &mut self,
        stream: &mut SimStream,
        buffers: &mut [&mut [Complex32]],
        timeout: Duration,
    ) -> ReadResult {
        if self.stall_reads {
            std::thread::sleep(timeout.min(Duration::from_millis(1)));
            return Err(StatusCode::TIMEOUT);
        }
        if let Some(limit) = self.fail_read_after {
            if self.reads >= limit {
                return Err(StatusCode::STREAM_ERROR);
            }
        }
        if self.burst_remaining == 0 {
            return Err(StatusCode::TIMEOUT);
        }
        if buffers.len() != stream.channels.len() {
            return Err(StatusCode::NOT_SUPPORTED);
        }

        let capacity = buffers.iter().map(|b| b.len()).min().unwrap_or(0);
        let count = self.burst_remaining.min(self.model.max_read).min(capacity);
        let tx = PerChannel::from_fn(|ch| self.tx_path(ch));
        let crosstalk = self.model.crosstalk;
        for (buffer, &channel) in buffers.iter_mut().zip(&stream.channels) {
            let rx = self.rx_path(channel);
            for (i, slot) in buffer[..count].iter_mut().enumerate() {
                let t = (self.clock + i as u64) as f64 / rx.rate_hz;
                let looped = tx[channel].output(t) + tx[channel.other()].output(t) * crosstalk;
                let r = looped * rx.scale * Complex64::from_polar(1.0, 2.0 * PI * rx.shift_hz * t);
                let y = r + rx.image * r.conj() + self.noise();
                *slot = Complex32::new(y.re as f32, y.im as f32);
            }
        }

        self.clock += count as u64;
        self.burst_remaining -= count;
        self.reads += 1;
        Ok(count)
    }

    fn close_stream(&mut self, _stream: SimStream) -> DeviceResult<()> {
        self.closed_streams += 1;
        self.burst_remaining = 0;
        Ok(())
    }
}

impl TransceiverDevice for SimulatedLoopback {
    fn description(&self) -> String {
        format!(
            "SimulatedLoopback(seed={}, noise_rms={:e}, max_read={})",
            self.model.seed, self.model.noise_rms, self.model.max_read
        )
    }

    fn set_frequency(
        &mut self,
        direction: Direction,
        channel: Channel,
        stage: FrequencyStage,
        freq_hz: f64,
    ) -> DeviceResult<()> {
        self.check("set_frequency")?;
        self.frequencies.insert((direction, channel, stage), freq_hz);
        Ok(())
    }

    fn set_gain(&mut self, direction: Direction, channel: Channel, stage: GainStage, gain_db: f64) -> DeviceResult<()> {
        self.check("set_gain")?;
        self.gains.insert((direction, channel, stage), gain_db);
        Ok(())
    }

    fn set_antenna(&mut self, direction: Direction, channel: Channel, name: &str) -> DeviceResult<()> {
        self.check("set_antenna")?;
        self.antennas.insert((direction, channel), name.to_string());
        Ok(())
    }

    fn set_dc_offset(&mut self, direction: Direction, channel: Channel, offset: Complex64) -> DeviceResult<()> {
        self.check("set_dc_offset")?;
        self.dc_offset.insert((direction, channel), offset);
        Ok(())
    }

    fn set_iq_balance(&mut self, direction: Direction, channel: Channel, balance: Complex64) -> DeviceResult<()> {
        self.check("set_iq_balance")?;
        self.iq_writes += 1;
        self.iq_balance.insert((direction, channel), balance);
        Ok(())
    }

    fn set_dc_offset_mode(&mut self, direction: Direction, channel: Channel, automatic: bool) -> DeviceResult<()> {
        self.check("set_dc_offset_mode")?;
        self.dc_auto.insert((direction, channel), automatic);
        Ok(())
    }

    fn set_master_clock_rate(&mut self, rate_hz: f64) -> DeviceResult<()> {
        self.check("set_master_clock_rate")?;
        self.master_clock_rate = rate_hz;
        Ok(())
    }

    fn set_sample_rate(&mut self, direction: Direction, channel: Channel, rate_hz: f64) -> DeviceResult<()> {
        self.check("set_sample_rate")?;
        if rate_hz <= 0.0 {
            return Err(DeviceError::configuration(
                "set_sample_rate",
                format!("rate must be positive, got {rate_hz}"),
            ));
        }
        self.sample_rates.insert((direction, channel), rate_hz);
        Ok(())
    }

    fn write_setting(&mut self, key: &str, value: &str) -> DeviceResult<()> {
        self.check("write_setting")?;
        match key {
            "ACTIVE_CHANNEL" => {
                self.active_channel = match value {
                    "A" => Channel::A,
                    "B" => Channel::B,
                    other => {
                        return Err(DeviceError::configuration(
                            "write_setting",
                            format!("unknown channel: {other}"),
                        ))
                    }
                };
            }
            "ENABLE_TXTSP_CONST" => {
                self.tsp_const[self.active_channel] = value == "true";
            }
            _ => debug!(key, value, "setting has no effect on the simulation"),
        }
        self.settings.push((key.to_string(), value.to_string()));
        Ok(())
    }
}
