//! Signal measurement for loopback calibration.
//!
//! - [`tone`]: coherent level of a single frequency component (drives the search)
//! - [`spectrum`]: averaged windowed power spectrum (diagnostics only)
//! - [`window`]: window functions used by the spectrum estimator

pub mod spectrum;
pub mod tone;
pub mod window;
