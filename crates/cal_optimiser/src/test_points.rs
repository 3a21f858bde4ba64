//! Shrinking grid of candidate correction deltas.
//!
//! At depth `D` the grid half-width is `s = 2^-D`:
//!
//! - DC deltas cover `[-s, s]` on both axes, Q varying fastest
//! - IQ deltas cover phase `[-(π/2)s, (π/2)s]` and log2 gain `[-s, s]`,
//!   gain varying fastest, turned into a multiplier `2^gain · e^{j·phase}`
//!
//! The two grids are paired by position, not crossed, so a depth yields
//! `steps²` points in total.

use num_complex::Complex64;
use std::f64::consts::FRAC_PI_2;

/// One candidate: a DC delta and an IQ delta evaluated together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestPoint {
    /// Additive DC-offset delta
    pub dc: Complex64,
    /// Multiplicative IQ-imbalance delta
    pub iq: Complex64,
}

/// Lazy iterator over the test points of one search depth.
#[derive(Debug, Clone)]
pub struct TestPoints {
    scale: f64,
    steps: usize,
    next: usize,
}

impl TestPoints {
    /// Grid for `depth` with `steps` points per axis.
    ///
    /// # Example
    ///
    /// ```
    /// use cal_optimiser::TestPoints;
    ///
    /// let points: Vec<_> = TestPoints::new(2, 3).collect();
    /// assert_eq!(points.len(), 9);
    /// // The centre point leaves the correction unchanged
    /// assert!((points[4].iq.re - 1.0).abs() < 1e-12);
    /// assert_eq!(points[4].dc.norm(), 0.0);
    /// ```
    pub fn new(depth: u32, steps: usize) -> Self {
        Self {
            scale: (-f64::from(depth)).exp2(),
            steps,
            next: 0,
        }
    }

    /// Grid half-width `2^-depth`.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    fn point(&self, index: usize) -> TestPoint {
        let outer = linspace(self.scale, self.steps, index / self.steps);
        let inner = linspace(self.scale, self.steps, index % self.steps);
        TestPoint {
            dc: Complex64::new(outer, inner),
            iq: Complex64::from_polar(2f64.powf(inner), FRAC_PI_2 * outer),
        }
    }
}

/// `i`-th of `n` evenly spaced values over `[-half_width, half_width]`.
fn linspace(half_width: f64, n: usize, i: usize) -> f64 {
    if n < 2 {
        return -half_width;
    }
    -half_width + 2.0 * half_width * i as f64 / (n - 1) as f64
}

impl Iterator for TestPoints {
    type Item = TestPoint;

    fn next(&mut self) -> Option<TestPoint> {
        if self.next >= self.steps * self.steps {
            return None;
        }
        let point = self.point(self.next);
        self.next += 1;
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.steps * self.steps).saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TestPoints {}
