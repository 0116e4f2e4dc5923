//! Learning-rate schedule: linear warmup → polynomial decay.
//!
//! ```text
//! warmup (iter < warmup_iters):
//!   lr = warmup_lr + (lr - warmup_lr) * iter / warmup_iters
//!
//! decay (iter >= warmup_iters):
//!   frac = (iter - warmup_iters) / (max_iters - warmup_iters)
//!   lr   = lr * max(1 - frac, 0) ^ lr_pow
//! ```
//!
//! The same rate is written to every parameter group; decay and no-decay
//! groups differ only in their weight decay.

use segtrain_common::PolyLrSchedule;

// ── Pure schedule ───────────────────────────────────────────────────────────

/// Learning rate at iteration `cur_iter`.
///
/// Callers are expected to have run [`PolyLrSchedule::validate`]; nothing is
/// checked here. Past `max_iters` the rate is pinned at zero.
pub fn poly_lr(cur_iter: usize, schedule: &PolyLrSchedule) -> f64 {
    if cur_iter < schedule.warmup_iters {
        let frac = cur_iter as f64 / schedule.warmup_iters as f64;
        let step = schedule.lr - schedule.warmup_lr;
        return schedule.warmup_lr + step * frac;
    }

    let frac = (cur_iter - schedule.warmup_iters) as f64
        / (schedule.max_iters as f64 - schedule.warmup_iters as f64);
    // f64::max drops a NaN operand, so an empty decay phase also lands on 0.
    let scale = (1.0 - frac).max(0.0).powf(schedule.lr_pow);
    schedule.lr * scale
}

// ── Optimiser seam ──────────────────────────────────────────────────────────

/// Anything whose parameter groups can all be set to one learning rate.
pub trait LrControl {
    fn set_lr_all_groups(&mut self, lr: f64);
}

/// Compute the rate for `cur_iter`, write it to every group of `optimizer`,
/// and return it so the caller can record it.
pub fn adjust_learning_rate<O: LrControl + ?Sized>(
    optimizer: &mut O,
    schedule: &PolyLrSchedule,
    cur_iter: usize,
) -> f64 {
    let lr = poly_lr(cur_iter, schedule);
    optimizer.set_lr_all_groups(lr);
    lr
}

// ── Stateful cursor ─────────────────────────────────────────────────────────

/// [`PolyLrSchedule`] plus the iteration counter of a training loop.
#[derive(Debug, Clone)]
pub struct PolyLrScheduler {
    schedule: PolyLrSchedule,
    step: usize,
}

impl PolyLrScheduler {
    pub fn new(schedule: PolyLrSchedule) -> Self {
        Self { schedule, step: 0 }
    }

    /// Learning rate at the current step.
    pub fn current_lr(&self) -> f64 {
        poly_lr(self.step, &self.schedule)
    }

    /// Write the current rate to `optimizer` and return it.
    pub fn apply<O: LrControl + ?Sized>(&self, optimizer: &mut O) -> f64 {
        adjust_learning_rate(optimizer, &self.schedule, self.step)
    }

    pub fn advance(&mut self) {
        self.step += 1;
    }

    pub fn step(&self) -> usize {
        self.step
    }

    /// Jump to `step`, e.g. when resuming from a checkpoint.
    pub fn set_step(&mut self, step: usize) {
        self.step = step;
    }

    pub fn schedule(&self) -> &PolyLrSchedule {
        &self.schedule
    }

    /// True once the iteration budget is spent.
    pub fn finished(&self) -> bool {
        self.step >= self.schedule.max_iters
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn warmup_linear() -> PolyLrSchedule {
        PolyLrSchedule {
            lr: 0.1,
            warmup_lr: 0.0,
            warmup_iters: 100,
            max_iters: 1000,
            lr_pow: 1.0,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn lr_reference_points() {
        let s = warmup_linear();
        assert!(close(poly_lr(0, &s), 0.0));
        assert!(close(poly_lr(50, &s), 0.05));
        assert!(close(poly_lr(100, &s), 0.1));
        assert!(close(poly_lr(550, &s), 0.05));
        assert!(close(poly_lr(1000, &s), 0.0));
    }

    #[test]
    fn lr_continuous_at_warmup_boundary() {
        let s = warmup_linear();
        let before = poly_lr(99, &s);
        let at = poly_lr(100, &s);
        assert!(close(at, s.lr));
        assert!((at - before - 0.001).abs() < 1e-12);
    }

    #[test]
    fn lr_warmup_from_nonzero_start() {
        let s = PolyLrSchedule {
            warmup_lr: 0.02,
            ..warmup_linear()
        };
        assert!(close(poly_lr(0, &s), 0.02));
        assert!(close(poly_lr(50, &s), 0.06));
    }

    #[test]
    fn lr_never_negative_past_budget() {
        let s = PolyLrSchedule {
            lr_pow: 0.9,
            ..warmup_linear()
        };
        for iter in [1000, 1001, 2000, 1_000_000] {
            let lr = poly_lr(iter, &s);
            assert_eq!(lr, 0.0, "iter {iter}");
        }
    }

    #[test]
    fn lr_no_warmup_decays_from_zero() {
        let s = PolyLrSchedule {
            lr: 0.01,
            warmup_lr: 0.5,
            warmup_iters: 0,
            max_iters: 100,
            lr_pow: 2.0,
        };
        assert!(close(poly_lr(0, &s), 0.01));
        // (1 - 0.5)^2 = 0.25
        assert!(close(poly_lr(50, &s), 0.0025));
    }

    #[test]
    fn lr_decay_is_monotone() {
        let s = PolyLrSchedule {
            lr_pow: 0.9,
            ..warmup_linear()
        };
        let lrs: Vec<f64> = (100..=1000).map(|i| poly_lr(i, &s)).collect();
        assert!(lrs.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn lr_empty_decay_phase_is_zero_not_nan() {
        let s = PolyLrSchedule {
            warmup_iters: 10,
            max_iters: 10,
            ..warmup_linear()
        };
        assert_eq!(poly_lr(10, &s), 0.0);
        assert_eq!(poly_lr(11, &s), 0.0);
    }

    struct Groups(Vec<f64>);

    impl LrControl for Groups {
        fn set_lr_all_groups(&mut self, lr: f64) {
            self.0.iter_mut().for_each(|g| *g = lr);
        }
    }

    #[test]
    fn adjust_broadcasts_and_returns_rate() {
        let mut groups = Groups(vec![1.0, 2.0]);
        let lr = adjust_learning_rate(&mut groups, &warmup_linear(), 50);
        assert!(close(lr, 0.05));
        assert_eq!(groups.0, vec![lr, lr]);
    }

    #[test]
    fn scheduler_cursor() {
        let mut sched = PolyLrScheduler::new(warmup_linear());
        assert_eq!(sched.current_lr(), 0.0);
        for _ in 0..50 {
            sched.advance();
        }
        assert_eq!(sched.step(), 50);
        assert!(close(sched.current_lr(), 0.05));

        sched.set_step(1000);
        assert!(sched.finished());
        let mut groups = Groups(vec![0.3]);
        assert_eq!(sched.apply(&mut groups), 0.0);
        assert_eq!(groups.0, vec![0.0]);
    }
}
