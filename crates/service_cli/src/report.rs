//! Diagnostic report.
//!
//! Turns the before/after captures of a finished calibration into two files
//! under the report directory:
//!
//! - `spectrum.csv`: bin frequency plus the averaged power spectrum of each
//!   of the eight channel captures
//! - `summary.json`: corrections, best levels and the spur levels read off
//!   those spectra
//!
//! The report only consumes a [`CalibrationOutcome`]; nothing here talks to
//! the device.

use crate::error::{CliError, Result};
use cal_core::math::spectrum::{bin_frequencies, marker_level, power_spectrum};
use cal_core::types::{Channel, Direction, PerChannel, SampleBlock};
use cal_optimiser::{CalibrationConfig, CalibrationOutcome, CorrectionResult};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Spectrum file name
pub const SPECTRUM_FILE: &str = "spectrum.csv";
/// Summary file name
pub const SUMMARY_FILE: &str = "summary.json";

/// Paths of a written report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub spectrum: PathBuf,
    pub summary: PathBuf,
}

/// Power spectrum of one channel of one capture.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSpectrum {
    /// Column name, e.g. `tx_final_b`
    pub name: String,
    /// Path the capture exercised
    pub direction: Direction,
    /// Channel
    pub channel: Channel,
    /// Whether the capture precedes its search
    pub initial: bool,
    /// dBFS per bin, from `-rate/2` upwards
    pub levels_dbfs: Vec<f64>,
}

impl CaptureSpectrum {
    /// Human-readable title, e.g. `Tx ChB Corrected`.
    pub fn title(&self) -> String {
        let when = if self.initial { "Initial" } else { "Corrected" };
        format!("{} {} {}", self.direction, self.channel, when)
    }
}

/// A labelled spur read off a spectrum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub label: String,
    pub freq_hz: f64,
    /// Peak level near `freq_hz`, `None` for an empty spectrum
    pub level_dbfs: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureSummary {
    pub name: String,
    pub title: String,
    pub markers: Vec<Marker>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionSummary {
    pub re: f64,
    pub im: f64,
    pub level_dbfs: f64,
    pub updates: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSummary {
    pub channel: Channel,
    pub rx_pga_gain_db: f64,
    pub rx_iq: CorrectionSummary,
    pub tx_iq: CorrectionSummary,
    pub tx_dc: CorrectionSummary,
}

/// Contents of `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub freq_hz: f64,
    pub elapsed_s: f64,
    pub candidates_evaluated: usize,
    pub channels: Vec<ChannelSummary>,
    pub captures: Vec<CaptureSummary>,
}

fn correction_summary(result: &CorrectionResult, ch: Channel) -> CorrectionSummary {
    CorrectionSummary {
        re: result.correction[ch].re,
        im: result.correction[ch].im,
        level_dbfs: result.level_dbfs[ch],
        updates: result.updates[ch],
    }
}

/// Spectra of the eight channel captures, in plotting order.
///
/// # Errors
///
/// Returns [`CliError::Report`] if a capture is shorter than one FFT frame.
pub fn capture_spectra(config: &CalibrationConfig, outcome: &CalibrationOutcome) -> Result<Vec<CaptureSpectrum>> {
    let captures: [(&str, &SampleBlock, Direction, bool); 4] = [
        ("rx_initial", &outcome.captures.rx_initial, Direction::Rx, true),
        ("rx_final", &outcome.captures.rx_final, Direction::Rx, false),
        ("tx_initial", &outcome.captures.tx_initial, Direction::Tx, true),
        ("tx_final", &outcome.captures.tx_final, Direction::Tx, false),
    ];

    let mut spectra = Vec::with_capacity(8);
    for (stem, block, direction, initial) in captures {
        for ch in Channel::ALL {
            let levels_dbfs = power_spectrum(block.channel(ch), config.bins_per_fft)
                .map_err(|e| CliError::Report(format!("{stem} {ch}: {e}")))?;
            spectra.push(CaptureSpectrum {
                name: format!("{stem}_{}", ch.letter().to_lowercase()),
                direction,
                channel: ch,
                initial,
                levels_dbfs,
            });
        }
    }
    Ok(spectra)
}

/// Spurs of interest in one capture.
pub fn markers(config: &CalibrationConfig, spectrum: &CaptureSpectrum) -> Vec<Marker> {
    let delta = config.tx_freq_delta_hz;
    let cordic: PerChannel<f64> = config.tx_cordic_freq_hz;
    let ch = spectrum.channel;

    let points = match spectrum.direction {
        Direction::Rx => vec![("Tx tone".to_string(), delta), ("Rx imbal".to_string(), -delta)],
        Direction::Tx => vec![
            ("Tx tone".to_string(), delta + cordic[ch]),
            ("Tx dc".to_string(), delta),
            ("Tx imbal".to_string(), delta - cordic[ch]),
            (format!("{} leak", ch.other()), delta + cordic[ch.other()]),
        ],
    };

    points
        .into_iter()
        .map(|(label, freq_hz)| Marker {
            label,
            freq_hz,
            level_dbfs: marker_level(&spectrum.levels_dbfs, freq_hz, config.sample_rate_hz),
        })
        .collect()
}

/// Build the summary from an outcome and its spectra.
pub fn summarize(config: &CalibrationConfig, outcome: &CalibrationOutcome, spectra: &[CaptureSpectrum]) -> Summary {
    let channels = Channel::ALL
        .iter()
        .map(|&ch| ChannelSummary {
            channel: ch,
            rx_pga_gain_db: outcome.rx_pga_gain_db[ch],
            rx_iq: correction_summary(&outcome.rx_iq, ch),
            tx_iq: correction_summary(&outcome.tx_iq, ch),
            tx_dc: correction_summary(&outcome.tx_dc, ch),
        })
        .collect();

    let captures = spectra
        .iter()
        .map(|s| CaptureSummary {
            name: s.name.clone(),
            title: s.title(),
            markers: markers(config, s),
        })
        .collect();

    Summary {
        freq_hz: outcome.freq_hz,
        elapsed_s: outcome.elapsed.as_secs_f64(),
        candidates_evaluated: outcome.candidates_evaluated,
        channels,
        captures,
    }
}

fn write_spectrum_csv(path: &Path, config: &CalibrationConfig, spectra: &[CaptureSpectrum]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["frequency_hz".to_string()];
    header.extend(spectra.iter().map(|s| s.name.clone()));
    writer.write_record(&header)?;

    let freqs = bin_frequencies(config.bins_per_fft, config.sample_rate_hz);
    for (k, freq) in freqs.iter().enumerate() {
        let mut row = vec![freq.to_string()];
        row.extend(spectra.iter().map(|s| format!("{:.3}", s.levels_dbfs[k])));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write `spectrum.csv` and `summary.json` into `dir`, creating it if needed.
pub fn write_report(dir: &Path, config: &CalibrationConfig, outcome: &CalibrationOutcome) -> Result<ReportPaths> {
    fs::create_dir_all(dir)?;
    let spectra = capture_spectra(config, outcome)?;

    let paths = ReportPaths {
        spectrum: dir.join(SPECTRUM_FILE),
        summary: dir.join(SUMMARY_FILE),
    };
    write_spectrum_csv(&paths.spectrum, config, &spectra)?;

    let summary = summarize(config, outcome, &spectra);
    fs::write(&paths.summary, serde_json::to_string_pretty(&summary)?)?;

    info!(
        spectrum = %paths.spectrum.display(),
        summary = %paths.summary.display(),
        "report written"
    );
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use adapter_device::{CancelToken, SimulatedLoopback};
    use cal_optimiser::SessionController;

    fn small_config() -> CalibrationConfig {
        CalibrationConfig::builder()
            .search_depths(2..=3)
            .samples_per_capture(2048)
            .bins_per_fft(256)
            .build()
    }

    fn outcome(config: &CalibrationConfig) -> CalibrationOutcome {
        let mut controller = SessionController::new(SimulatedLoopback::default(), config.clone()).unwrap();
        controller.run(1.8e9, &CancelToken::new()).unwrap()
    }

    #[test]
    fn test_spectra_cover_all_captures() {
        let config = small_config();
        let spectra = capture_spectra(&config, &outcome(&config)).unwrap();
        let names: Vec<_> = spectra.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "rx_initial_a",
                "rx_initial_b",
                "rx_final_a",
                "rx_final_b",
                "tx_initial_a",
                "tx_initial_b",
                "tx_final_a",
                "tx_final_b"
            ]
        );
        assert!(spectra.iter().all(|s| s.levels_dbfs.len() == 256));
        assert_eq!(spectra[7].title(), "Tx ChB Corrected");
        assert_eq!(spectra[0].title(), "Rx ChA Initial");
    }

    #[test]
    fn test_markers_per_direction() {
        let config = small_config();
        let spectra = capture_spectra(&config, &outcome(&config)).unwrap();

        let rx = markers(&config, &spectra[0]);
        assert_eq!(rx.len(), 2);
        assert_eq!(rx[1].label, "Rx imbal");
        assert_eq!(rx[1].freq_hz, -0.7e6);

        let tx_b = markers(&config, &spectra[5]);
        let labels: Vec<_> = tx_b.iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, ["Tx tone", "Tx dc", "Tx imbal", "ChA leak"]);
        assert_eq!(tx_b[0].freq_hz, 0.7e6 + 1.5e6);
        assert_eq!(tx_b[3].freq_hz, 0.7e6 + 1.1e6);
        assert!(tx_b.iter().all(|m| m.level_dbfs.is_some()));
    }

    #[test]
    fn test_tone_marker_dominates_spectrum() {
        let config = small_config();
        let spectra = capture_spectra(&config, &outcome(&config)).unwrap();
        for spectrum in &spectra {
            let tone = markers(&config, spectrum)[0].level_dbfs.unwrap();
            let median = {
                let mut sorted = spectrum.levels_dbfs.clone();
                sorted.sort_by(f64::total_cmp);
                sorted[sorted.len() / 2]
            };
            assert!(tone > median + 30.0, "{}: tone {tone} median {median}", spectrum.name);
        }
    }

    #[test]
    fn test_short_capture_is_report_error() {
        let config = small_config();
        let outcome = outcome(&config);
        let too_wide = CalibrationConfig {
            bins_per_fft: 4096,
            ..config
        };
        let err = capture_spectra(&too_wide, &outcome).unwrap_err();
        assert!(matches!(err, CliError::Report(_)));
    }

    #[test]
    fn test_write_report() {
        let config = small_config();
        let outcome = outcome(&config);
        let dir = tempfile::tempdir().unwrap();
        let report_dir = dir.path().join("nested");

        let paths = write_report(&report_dir, &config, &outcome).unwrap();
        assert_eq!(paths.spectrum, report_dir.join(SPECTRUM_FILE));

        let mut reader = csv::Reader::from_path(&paths.spectrum).unwrap();
        let header = reader.headers().unwrap().clone();
        assert_eq!(header.len(), 9);
        assert_eq!(&header[0], "frequency_hz");
        assert_eq!(reader.records().count(), 256);

        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&paths.summary).unwrap()).unwrap();
        assert_eq!(json["freq_hz"], 1.8e9);
        assert_eq!(json["channels"].as_array().unwrap().len(), 2);
        assert_eq!(json["channels"][1]["channel"], "B");
        assert_eq!(json["captures"].as_array().unwrap().len(), 8);
        assert_eq!(json["candidates_evaluated"], 36);
    }
}
