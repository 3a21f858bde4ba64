//! Calibration results.

use crate::state::SearchState;
use cal_core::types::{CorrectionKind, PerChannel, SampleBlock};
use num_complex::Complex64;
use std::time::Duration;

/// Final correction of one search, per channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectionResult {
    /// Correction kind
    pub kind: CorrectionKind,
    /// Best correction found
    pub correction: PerChannel<Complex64>,
    /// Level measured with that correction (dBFS)
    pub level_dbfs: PerChannel<f64>,
    /// Number of times the best was replaced
    pub updates: PerChannel<usize>,
}

impl From<&SearchState> for CorrectionResult {
    fn from(state: &SearchState) -> Self {
        Self {
            kind: state.kind(),
            correction: state.corrections(),
            level_dbfs: state.levels_dbfs(),
            updates: state.updates(),
        }
    }
}

/// Captures taken before and after each search stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageCaptures {
    /// Rx path before the Rx IQ search
    pub rx_initial: SampleBlock,
    /// Rx path with the Rx IQ correction applied
    pub rx_final: SampleBlock,
    /// Tx path before the Tx IQ/DC search
    pub tx_initial: SampleBlock,
    /// Tx path with all corrections applied
    pub tx_final: SampleBlock,
}

/// Everything a successful calibration at one frequency produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationOutcome {
    /// Rx RF frequency calibrated at (Hz)
    pub freq_hz: f64,
    /// PGA gain chosen by the gain adjustment (dB)
    pub rx_pga_gain_db: PerChannel<f64>,
    /// Rx IQ-imbalance correction
    pub rx_iq: CorrectionResult,
    /// Tx IQ-imbalance correction
    pub tx_iq: CorrectionResult,
    /// Tx DC-offset correction
    pub tx_dc: CorrectionResult,
    /// Before/after captures
    pub captures: StageCaptures,
    /// Candidates evaluated across both searches
    pub candidates_evaluated: usize,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
}
