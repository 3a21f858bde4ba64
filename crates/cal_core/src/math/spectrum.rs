//! Averaged windowed power spectrum.
//!
//! Used only for diagnostics: the search loop never consults it. Each frame
//! is Hann-windowed, transformed, reordered so DC sits in the middle, and
//! normalised by FFT size and window power. Frames are averaged in linear
//! power. Bins are floored at a magnitude of `1e-20` before conversion.

use super::tone::MAGNITUDE_FLOOR;
use super::window::{hann, window_power};
use crate::types::SpectrumError;
use num_complex::{Complex, Complex64};
use num_traits::Float;
use rustfft::FftPlanner;

/// Power spectrum in dBFS, `fft_size` bins ordered from `-rate/2` upwards.
///
/// Uses `floor(samples.len() / fft_size)` non-overlapping frames.
///
/// # Errors
///
/// - [`SpectrumError::InvalidFftSize`] if `fft_size` is zero or odd
/// - [`SpectrumError::InsufficientSamples`] if there is not one full frame
pub fn power_spectrum<T: Float>(samples: &[Complex<T>], fft_size: usize) -> Result<Vec<f64>, SpectrumError> {
    if fft_size == 0 || fft_size % 2 != 0 {
        return Err(SpectrumError::invalid_fft_size(fft_size));
    }
    let num_frames = samples.len() / fft_size;
    if num_frames == 0 {
        return Err(SpectrumError::insufficient_samples(fft_size, samples.len()));
    }

    let window = hann(fft_size);
    let norm_db = 20.0 * (fft_size as f64).log10() + 10.0 * window_power(&window).log10();
    let fft = FftPlanner::<f64>::new().plan_fft_forward(fft_size);

    let mut linear = vec![0.0_f64; fft_size];
    let mut frame = vec![Complex64::new(0.0, 0.0); fft_size];
    for chunk in samples.chunks_exact(fft_size) {
        for ((slot, s), w) in frame.iter_mut().zip(chunk).zip(&window) {
            *slot = Complex64::new(
                s.re.to_f64().unwrap_or(f64::NAN) * w,
                s.im.to_f64().unwrap_or(f64::NAN) * w,
            );
        }
        fft.process(&mut frame);

        let half = fft_size / 2;
        for (k, bin) in frame.iter().enumerate() {
            let shifted = (k + half) % fft_size;
            let db = 20.0 * bin.norm().max(MAGNITUDE_FLOOR).log10() - norm_db;
            linear[shifted] += 10f64.powf(db / 10.0);
        }
    }

    Ok(linear
        .into_iter()
        .map(|p| 10.0 * (p / num_frames as f64).log10())
        .collect())
}

/// Centre frequency of each bin of a reordered spectrum.
pub fn bin_frequencies(fft_size: usize, sample_rate_hz: f64) -> Vec<f64> {
    let step = sample_rate_hz / fft_size as f64;
    (0..fft_size)
        .map(|k| -sample_rate_hz / 2.0 + k as f64 * step)
        .collect()
}

/// Index of the bin containing `freq_hz` in a reordered spectrum.
pub fn bin_index(fft_size: usize, freq_hz: f64, sample_rate_hz: f64) -> usize {
    let half = (fft_size / 2) as i64;
    let offset = (fft_size as f64 * freq_hz / sample_rate_hz).trunc() as i64;
    (half + offset).clamp(0, fft_size as i64 - 1) as usize
}

/// Peak level within three bins below and two above `freq_hz`.
///
/// Returns `None` for an empty spectrum.
pub fn marker_level(spectrum: &[f64], freq_hz: f64, sample_rate_hz: f64) -> Option<f64> {
    if spectrum.is_empty() {
        return None;
    }
    let centre = bin_index(spectrum.len(), freq_hz, sample_rate_hz);
    let lo = centre.saturating_sub(3);
    let hi = (centre + 3).min(spectrum.len());
    spectrum[lo..hi].iter().copied().reduce(f64::max)
}
