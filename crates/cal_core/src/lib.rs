//! # cal_core: Measurement Foundation for Loopback Calibration
//!
//! ## Layer 1 (Foundation) Role
//!
//! cal_core is the bottom layer of the calibration workspace, providing:
//! - Signal path and channel identifiers (`types::path`)
//! - Correction algebra for IQ-imbalance and DC-offset terms (`types::correction`)
//! - DC-removed dual-channel sample blocks (`types::samples`)
//! - Coherent single-tone level measurement (`math::tone`)
//! - Averaged windowed power spectra for diagnostics (`math::spectrum`)
//!
//! ## Zero Hardware Principle
//!
//! Layer 1 knows nothing about devices or streams. Everything here is a pure
//! function of its inputs, which is what makes the search engine above it
//! testable against simulated hardware.
//!
//! ## Usage Examples
//!
//! ```rust
//! use cal_core::math::tone::measure_tone_level;
//! use cal_core::types::correction::compose_iq;
//! use num_complex::Complex64;
//!
//! let rate = 10e6;
//! let tone: Vec<Complex64> = (0..1000)
//!     .map(|n| Complex64::from_polar(1.0, 2.0 * std::f64::consts::PI * 1e6 * n as f64 / rate))
//!     .collect();
//! let level = measure_tone_level(&tone, 1e6, rate);
//! assert!(level.abs() < 1e-6);
//!
//! let corr = compose_iq(Complex64::new(1.0, 0.0), Complex64::from_polar(1.1, 0.2));
//! assert!((corr.norm() - 1.1).abs() < 1e-12);
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod math;
pub mod types;
