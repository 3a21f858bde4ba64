//! Window functions.

use std::f64::consts::PI;

/// Symmetric Hann window of length `n`.
///
/// `w[k] = 0.5 - 0.5 cos(2πk / (n - 1))`, so both endpoints are zero.
pub fn hann(n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let denom = (n - 1) as f64;
            (0..n)
                .map(|k| 0.5 - 0.5 * (2.0 * PI * k as f64 / denom).cos())
                .collect()
        }
    }
}

/// Mean power of a window, `Σ w² / n`.
pub fn window_power(window: &[f64]) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    window.iter().map(|w| w * w).sum::<f64>() / window.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_hann_endpoints_and_peak() {
        let w = hann(9);
        assert_abs_diff_eq!(w[0], 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(w[8], 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(w[4], 1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_hann_degenerate_lengths() {
        assert!(hann(0).is_empty());
        assert_eq!(hann(1), vec![1.0]);
    }

    #[test]
    fn test_window_power_hann_large() {
        // Σ w² / n → 3/8 for long Hann windows
        let w = hann(4096);
        assert_abs_diff_eq!(window_power(&w), 0.375, epsilon = 1e-3);
    }
}
