//! Coherent single-tone level measurement.
//!
//! The level of a component at `freq` is found by mixing the capture with a
//! complex exponential at `-freq` (moving that component to DC) and taking
//! the mean of the result. This is a single DFT bin evaluated at an
//! arbitrary, not necessarily bin-aligned, frequency.

use num_complex::{Complex, Complex64};
use num_traits::Float;
use std::f64::consts::PI;

/// Magnitude floor applied before conversion to decibels.
pub const MAGNITUDE_FLOOR: f64 = 1e-20;

/// Level reported for an empty capture, `20 log10(MAGNITUDE_FLOOR)`.
pub const FLOOR_LEVEL_DBFS: f64 = -400.0;

/// Complex amplitude of the component at `freq_hz`.
///
/// Returns the mean of `samples[n] * exp(-j 2π freq n / rate)`.
pub fn tone_amplitude<T: Float>(samples: &[Complex<T>], freq_hz: f64, sample_rate_hz: f64) -> Complex64 {
    if samples.is_empty() {
        return Complex64::new(0.0, 0.0);
    }
    let step = -2.0 * PI * freq_hz / sample_rate_hz;
    let sum = samples
        .iter()
        .enumerate()
        .fold(Complex64::new(0.0, 0.0), |acc, (n, s)| {
            let x = Complex64::new(
                s.re.to_f64().unwrap_or(f64::NAN),
                s.im.to_f64().unwrap_or(f64::NAN),
            );
            acc + x * Complex64::from_polar(1.0, step * n as f64)
        });
    sum / samples.len() as f64
}

/// Level in dBFS of the component at `freq_hz`.
///
/// `20 log10(max(|amplitude|, 1e-20))`. An empty capture yields
/// [`FLOOR_LEVEL_DBFS`].
///
/// # Example
///
/// ```
/// use cal_core::math::tone::measure_tone_level;
/// use num_complex::Complex32;
///
/// let rate = 10e6;
/// let samples: Vec<Complex32> = (0..8192)
///     .map(|n| {
///         let phase = 2.0 * std::f64::consts::PI * 0.7e6 * n as f64 / rate;
///         Complex32::new(phase.cos() as f32, phase.sin() as f32)
///     })
///     .collect();
///
/// let on_tone = measure_tone_level(&samples, 0.7e6, rate);
/// let off_tone = measure_tone_level(&samples, 2e6, rate);
/// assert!(on_tone.abs() < 0.5);
/// assert!(off_tone < on_tone - 20.0);
/// ```
pub fn measure_tone_level<T: Float>(samples: &[Complex<T>], freq_hz: f64, sample_rate_hz: f64) -> f64 {
    let magnitude = tone_amplitude(samples, freq_hz, sample_rate_hz).norm();
    20.0 * magnitude.max(MAGNITUDE_FLOOR).log10()
}
