//! Running averages for training logs (loss, accuracy, ...).

use std::fmt;

/// Averaging mode, fixed when the statistic is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatMode {
    /// Weighted mean over every observation seen so far.
    Cumulative,
    /// Arithmetic mean for the first `n` observations, then an exponential
    /// moving average with rate `1 / n`.
    Windowed(usize),
}

/// Online average of a scalar metric.
///
/// Updated by a single owner; there is no interior mutability.
#[derive(Debug, Clone)]
pub struct Statistic {
    mode: StatMode,
    count: u64,
    /// Sum of weights; cumulative mode only.
    weight: f64,
    /// Weighted sum (cumulative) or current average (windowed).
    total: f64,
}

impl Statistic {
    /// `window == 0` selects the cumulative mode.
    pub fn new(window: usize) -> Self {
        let mode = if window == 0 {
            StatMode::Cumulative
        } else {
            StatMode::Windowed(window)
        };
        Self {
            mode,
            count: 0,
            weight: 0.0,
            total: 0.0,
        }
    }

    pub fn cumulative() -> Self {
        Self::new(0)
    }

    pub fn windowed(window: usize) -> Self {
        assert!(window > 0, "windowed statistic needs a window > 0");
        Self::new(window)
    }

    /// Record one observation with weight 1.
    pub fn update(&mut self, value: f64) {
        self.update_weighted(value, 1.0);
    }

    /// Record one observation. `weight` only matters in cumulative mode.
    pub fn update_weighted(&mut self, value: f64, weight: f64) {
        self.count += 1;
        match self.mode {
            StatMode::Cumulative => {
                self.weight += weight;
                self.total += value * weight;
            }
            StatMode::Windowed(window) => {
                let n = self.count.min(window as u64) as f64;
                self.total += (value - self.total) / n;
            }
        }
    }

    /// Current average.
    ///
    /// A cumulative statistic that has seen no weight returns NaN.
    pub fn value(&self) -> f64 {
        match self.mode {
            StatMode::Cumulative => self.total / self.weight,
            StatMode::Windowed(_) => self.total,
        }
    }

    pub fn mode(&self) -> StatMode {
        self.mode
    }

    /// Number of updates recorded.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Forget every observation, keeping the mode.
    pub fn reset(&mut self) {
        self.count = 0;
        self.weight = 0.0;
        self.total = 0.0;
    }
}

impl Default for Statistic {
    fn default() -> Self {
        Self::cumulative()
    }
}

impl From<&Statistic> for f64 {
    fn from(stat: &Statistic) -> f64 {
        stat.value()
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.value())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cumulative_mean() {
        let mut stat = Statistic::cumulative();
        for v in [1.0, 2.0, 3.0] {
            stat.update(v);
        }
        assert_eq!(stat.value(), 2.0);
        assert_eq!(stat.count(), 3);
        assert_eq!(stat.mode(), StatMode::Cumulative);
    }

    #[test]
    fn cumulative_respects_weights() {
        let mut stat = Statistic::new(0);
        stat.update_weighted(1.0, 3.0);
        stat.update_weighted(5.0, 1.0);
        assert_eq!(stat.value(), 2.0);
    }

    #[test]
    fn windowed_means_then_smooths() {
        let mut stat = Statistic::windowed(2);
        stat.update(10.0);
        assert_eq!(stat.value(), 10.0);
        stat.update(20.0);
        assert_eq!(stat.value(), 15.0);
        stat.update(30.0);
        assert_eq!(stat.value(), 22.5);
    }

    #[test]
    fn windowed_is_arithmetic_mean_within_window() {
        let mut stat = Statistic::new(10);
        for v in [4.0, 8.0, 6.0, 2.0] {
            stat.update(v);
        }
        assert!((stat.value() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn windowed_ignores_weight() {
        let mut plain = Statistic::new(3);
        let mut weighted = Statistic::new(3);
        for (v, w) in [(1.0, 10.0), (7.0, 0.5), (4.0, 2.0), (9.0, 3.0)] {
            plain.update(v);
            weighted.update_weighted(v, w);
        }
        assert_eq!(plain.value(), weighted.value());
    }

    #[test]
    fn empty_cumulative_is_nan() {
        assert!(Statistic::cumulative().value().is_nan());
        assert_eq!(Statistic::windowed(5).value(), 0.0);
    }

    #[test]
    fn display_six_decimals() {
        let mut stat = Statistic::cumulative();
        stat.update(1.0 / 3.0);
        assert_eq!(stat.to_string(), "0.333333");

        let mut stat = Statistic::windowed(4);
        stat.update(2.0);
        assert_eq!(format!("{stat}"), "2.000000");
        stat.update(-8.0);
        assert_eq!(stat.to_string(), "-3.000000");
        assert_eq!(f64::from(&stat), -3.0);
    }

    #[test]
    fn reset_keeps_mode() {
        let mut stat = Statistic::windowed(2);
        stat.update(10.0);
        stat.update(20.0);
        stat.reset();
        assert_eq!(stat.count(), 0);
        assert_eq!(stat.mode(), StatMode::Windowed(2));
        stat.update(4.0);
        assert_eq!(stat.value(), 4.0);
    }

    #[test]
    #[should_panic(expected = "window > 0")]
    fn windowed_rejects_zero() {
        Statistic::windowed(0);
    }
}
