//! Error types for spectral estimation.

use thiserror::Error;

/// Errors raised by [`crate::math::spectrum`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpectrumError {
    /// FFT size must be a positive even number.
    #[error("Invalid FFT size: {size} (must be positive and even)")]
    InvalidFftSize {
        /// The rejected size
        size: usize,
    },

    /// Fewer samples than one FFT frame.
    #[error("Insufficient samples: need at least {required}, got {provided}")]
    InsufficientSamples {
        /// Samples needed for one frame
        required: usize,
        /// Samples supplied
        provided: usize,
    },
}

impl SpectrumError {
    /// Create an invalid FFT size error.
    pub fn invalid_fft_size(size: usize) -> Self {
        Self::InvalidFftSize { size }
    }

    /// Create an insufficient samples error.
    pub fn insufficient_samples(required: usize, provided: usize) -> Self {
        Self::InsufficientSamples { required, provided }
    }
}
