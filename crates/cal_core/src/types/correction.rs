//! Correction algebra for IQ-imbalance and DC-offset terms.
//!
//! Both correction kinds are complex numbers:
//! - An IQ-imbalance correction is a multiplier, identity `1 + 0j`.
//!   Refinement composes a delta with a base by multiplying magnitudes and
//!   adding phases, which is complex multiplication in polar form.
//! - A DC-offset correction is an additive term, identity `0 + 0j`, with
//!   each real/imaginary component bounded to `[-1, 1]`.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of correction applied to a signal path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CorrectionKind {
    /// Multiplicative IQ-imbalance correction
    IqBalance,
    /// Additive DC-offset correction
    DcOffset,
}

impl CorrectionKind {
    /// The value that leaves the signal unchanged.
    pub fn identity(self) -> Complex64 {
        match self {
            CorrectionKind::IqBalance => Complex64::new(1.0, 0.0),
            CorrectionKind::DcOffset => Complex64::new(0.0, 0.0),
        }
    }
}

impl fmt::Display for CorrectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrectionKind::IqBalance => write!(f, "IQ"),
            CorrectionKind::DcOffset => write!(f, "DC"),
        }
    }
}

/// Compose an IQ delta onto a base correction.
///
/// The result has magnitude `|delta| * |base|` and phase
/// `arg(delta) + arg(base)`, which equals `delta * base`.
///
/// # Example
///
/// ```
/// use cal_core::types::compose_iq;
/// use num_complex::Complex64;
///
/// let a = Complex64::from_polar(1.05, 0.1);
/// let b = Complex64::from_polar(0.98, -0.03);
/// let c = compose_iq(a, b);
/// assert!((c - a * b).norm() < 1e-12);
/// ```
pub fn compose_iq(delta: Complex64, base: Complex64) -> Complex64 {
    Complex64::from_polar(delta.norm() * base.norm(), delta.arg() + base.arg())
}

/// Clamp a real value to `[-1, 1]`.
pub fn clamp_unit(x: f64) -> f64 {
    x.clamp(-1.0, 1.0)
}

/// Clamp both components of a DC correction to `[-1, 1]`.
pub fn clamp_dc(value: Complex64) -> Complex64 {
    Complex64::new(clamp_unit(value.re), clamp_unit(value.im))
}

/// Offset a DC correction by `delta`, clamping the result per component.
pub fn offset_dc(base: Complex64, delta: Complex64) -> Complex64 {
    clamp_dc(base + delta)
}
