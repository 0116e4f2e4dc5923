//! # segtrain-train — Training-Loop Helpers
//!
//! * **[`poly_lr`]** / **[`PolyLrScheduler`]** — warmup → polynomial decay,
//!   broadcast to every parameter group via [`adjust_learning_rate`].
//! * **[`GroupedAdamW`]** — AdamW with per-group weight decay, fed by
//!   [`segtrain_core::group_weight`].
//! * **[`Statistic`]** — cumulative or windowed running average for logs.

pub mod optimizer;
pub mod scheduler;
pub mod statistic;

pub use optimizer::GroupedAdamW;
pub use scheduler::{adjust_learning_rate, poly_lr, LrControl, PolyLrScheduler};
pub use statistic::{StatMode, Statistic};
