//! # segtrain-common — Shared Configuration
//!
//! Types shared across every crate in the workspace:
//!
//! * **[`RunConfig`]** — schedule + optimiser + logging knobs (serialised as JSON).
//! * **[`PolyLrSchedule`]** — warmup → polynomial decay hyper-parameters.
//! * **[`OptimConfig`]** — AdamW defaults applied to every parameter group.

pub mod config;

pub use config::{OptimConfig, PolyLrSchedule, RunConfig};
