//! Best-so-far tracking for the correction searches.

use cal_core::types::{Channel, CorrectionKind, PerChannel};
use num_complex::Complex64;

/// Best correction seen for one channel of one search.
///
/// The level starts at `+∞`, so the first finite measurement is always
/// recorded. A candidate replaces the best only on a strictly lower level;
/// ties and NaN never replace it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestTracker {
    correction: Complex64,
    level_dbfs: f64,
    updates: usize,
}

impl BestTracker {
    /// Start from `initial` with no measured level.
    pub fn new(initial: Complex64) -> Self {
        Self {
            correction: initial,
            level_dbfs: f64::INFINITY,
            updates: 0,
        }
    }

    /// Start from the identity of `kind`.
    pub fn identity(kind: CorrectionKind) -> Self {
        Self::new(kind.identity())
    }

    /// Offer a measured candidate. Returns whether it became the best.
    pub fn offer(&mut self, candidate: Complex64, level_dbfs: f64) -> bool {
        if level_dbfs < self.level_dbfs {
            self.correction = candidate;
            self.level_dbfs = level_dbfs;
            self.updates += 1;
            true
        } else {
            false
        }
    }

    /// Best correction so far.
    pub fn correction(&self) -> Complex64 {
        self.correction
    }

    /// Level measured with the best correction.
    pub fn level_dbfs(&self) -> f64 {
        self.level_dbfs
    }

    /// Number of times the best was replaced.
    pub fn updates(&self) -> usize {
        self.updates
    }
}

/// Per-channel best trackers for one correction kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchState {
    kind: CorrectionKind,
    best: PerChannel<BestTracker>,
}

impl SearchState {
    /// Both channels at the identity of `kind`.
    pub fn new(kind: CorrectionKind) -> Self {
        Self {
            kind,
            best: PerChannel::splat(BestTracker::identity(kind)),
        }
    }

    /// Correction kind being searched.
    pub fn kind(&self) -> CorrectionKind {
        self.kind
    }

    /// Immutable copy of the best corrections, taken at the start of a depth.
    pub fn snapshot(&self) -> PerChannel<Complex64> {
        PerChannel::from_fn(|ch| self.best[ch].correction())
    }

    /// Offer a candidate for one channel.
    pub fn offer(&mut self, channel: Channel, candidate: Complex64, level_dbfs: f64) -> bool {
        self.best[channel].offer(candidate, level_dbfs)
    }

    /// Tracker for one channel.
    pub fn channel(&self, channel: Channel) -> &BestTracker {
        &self.best[channel]
    }

    /// Best corrections for both channels.
    pub fn corrections(&self) -> PerChannel<Complex64> {
        self.snapshot()
    }

    /// Best levels for both channels.
    pub fn levels_dbfs(&self) -> PerChannel<f64> {
        PerChannel::from_fn(|ch| self.best[ch].level_dbfs())
    }

    /// Update counts for both channels.
    pub fn updates(&self) -> PerChannel<usize> {
        PerChannel::from_fn(|ch| self.best[ch].updates())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_first_finite_level_is_recorded() {
        let mut best = BestTracker::identity(CorrectionKind::IqBalance);
        assert_eq!(best.level_dbfs(), f64::INFINITY);
        assert!(best.offer(Complex64::new(1.1, 0.0), 25.0));
        assert_eq!(best.correction(), Complex64::new(1.1, 0.0));
    }

    #[test]
    fn test_level_above_one_dbfs_is_still_recorded() {
        let mut state = SearchState::new(CorrectionKind::DcOffset);
        assert!(state.offer(Channel::A, Complex64::new(0.25, -0.25), 3.0));
        assert_eq!(state.levels_dbfs()[Channel::A], 3.0);
        assert_eq!(state.levels_dbfs()[Channel::B], f64::INFINITY);
        assert_eq!(state.updates(), PerChannel::new(1, 0));
        assert!(state.offer(Channel::A, Complex64::new(0.0, 0.0), 1.0));
        assert_eq!(state.channel(Channel::A).level_dbfs(), 1.0);
    }

    #[test]
    fn test_ties_do_not_replace() {
        let mut best = BestTracker::identity(CorrectionKind::DcOffset);
        best.offer(Complex64::new(0.1, 0.0), -60.0);
        assert!(!best.offer(Complex64::new(0.2, 0.0), -60.0));
        assert!(!best.offer(Complex64::new(0.3, 0.0), f64::NAN));
        assert_eq!(best.correction(), Complex64::new(0.1, 0.0));
        assert_eq!(best.updates(), 1);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut state = SearchState::new(CorrectionKind::IqBalance);
        let start = state.snapshot();
        state.offer(Channel::B, Complex64::new(0.9, 0.1), -50.0);
        assert_eq!(start[Channel::B], Complex64::new(1.0, 0.0));
        assert_eq!(state.corrections()[Channel::B], Complex64::new(0.9, 0.1));
        assert_eq!(state.corrections()[Channel::A], Complex64::new(1.0, 0.0));
        assert_eq!(state.updates(), PerChannel::new(0, 1));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_best_level_strictly_decreases_on_update(
            levels in prop::collection::vec(-120.0f64..20.0, 1..40)
        ) {
            let mut best = BestTracker::identity(CorrectionKind::IqBalance);
            let mut previous = best.level_dbfs();
            for (i, &level) in levels.iter().enumerate() {
                let replaced = best.offer(Complex64::new(i as f64, 0.0), level);
                if replaced {
                    prop_assert!(best.level_dbfs() < previous);
                } else {
                    prop_assert_eq!(best.level_dbfs(), previous);
                }
                previous = best.level_dbfs();
            }
            let min = levels.iter().cloned().fold(f64::INFINITY, f64::min);
            prop_assert_eq!(best.level_dbfs(), min);
        }
    }
}
