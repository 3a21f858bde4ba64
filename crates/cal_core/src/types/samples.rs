//! Dual-channel sample blocks.

use super::path::{Channel, PerChannel};
use num_complex::{Complex, Complex32, Complex64};
use num_traits::Float;

/// Subtract the arithmetic mean from a sample sequence in place.
///
/// The mean is accumulated in `f64` regardless of the sample precision.
pub fn remove_dc<T: Float>(samples: &mut [Complex<T>]) {
    if samples.is_empty() {
        return;
    }
    let sum = samples.iter().fold(Complex64::new(0.0, 0.0), |acc, s| {
        acc + Complex64::new(
            s.re.to_f64().unwrap_or(f64::NAN),
            s.im.to_f64().unwrap_or(f64::NAN),
        )
    });
    let mean = sum / samples.len() as f64;
    let mean_re = T::from(mean.re).unwrap_or_else(T::nan);
    let mean_im = T::from(mean.im).unwrap_or_else(T::nan);
    for s in samples.iter_mut() {
        s.re = s.re - mean_re;
        s.im = s.im - mean_im;
    }
}

/// One capture of both channels, equal length, with DC removed.
///
/// A block is owned by whichever step acquired it and is never shared
/// mutably.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBlock {
    channels: PerChannel<Vec<Complex32>>,
}

impl SampleBlock {
    /// Build a block from raw captures, removing each channel's mean.
    ///
    /// # Panics
    ///
    /// Panics if the two channels differ in length.
    pub fn from_raw(mut a: Vec<Complex32>, mut b: Vec<Complex32>) -> Self {
        assert_eq!(a.len(), b.len(), "channel captures must be equal length");
        remove_dc(&mut a);
        remove_dc(&mut b);
        Self {
            channels: PerChannel::new(a, b),
        }
    }

    /// Samples for one channel.
    pub fn channel(&self, ch: Channel) -> &[Complex32] {
        &self.channels[ch]
    }

    /// Samples per channel.
    pub fn len(&self) -> usize {
        self.channels[Channel::A].len()
    }

    /// Whether the block holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn mean(samples: &[Complex32]) -> Complex64 {
        samples
            .iter()
            .fold(Complex64::new(0.0, 0.0), |acc, s| {
                acc + Complex64::new(s.re as f64, s.im as f64)
            })
            / samples.len() as f64
    }

    #[test]
    fn test_remove_dc_zero_mean() {
        let mut samples: Vec<Complex32> = (0..100)
            .map(|i| Complex32::new(0.3 + (i as f32 * 0.1).sin(), -0.2))
            .collect();
        remove_dc(&mut samples);
        let m = mean(&samples);
        assert_abs_diff_eq!(m.re, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(m.im, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_remove_dc_empty() {
        let mut samples: Vec<Complex32> = Vec::new();
        remove_dc(&mut samples);
        assert!(samples.is_empty());
    }

    #[test]
    fn test_block_from_raw() {
        let a = vec![Complex32::new(1.0, 1.0); 16];
        let b = vec![Complex32::new(-0.5, 0.25); 16];
        let block = SampleBlock::from_raw(a, b);
        assert_eq!(block.len(), 16);
        assert!(!block.is_empty());
        for ch in Channel::ALL {
            assert!(block.channel(ch).iter().all(|s| s.norm() < 1e-6));
        }
    }

    #[test]
    #[should_panic(expected = "equal length")]
    fn test_block_length_mismatch_panics() {
        let _ = SampleBlock::from_raw(vec![Complex32::new(0.0, 0.0); 4], Vec::new());
    }
}
