//! Core types for loopback calibration.
//!
//! This module provides:
//! - [`Direction`], [`Channel`], [`PerChannel`]: addressing of the two signal paths
//! - [`CorrectionKind`] and the correction algebra in [`correction`]
//! - [`SampleBlock`]: one DC-removed capture of both channels
//! - [`SpectrumError`]: errors from spectral estimation

pub mod correction;
pub mod error;
pub mod path;
pub mod samples;

pub use correction::{clamp_dc, clamp_unit, compose_iq, offset_dc, CorrectionKind};
pub use error::SpectrumError;
pub use path::{Channel, Direction, PerChannel};
pub use samples::{remove_dc, SampleBlock};
