//! Run configuration for segtrain.
//!
//! Serialised as JSON. Every field has a sensible default so a minimal `{}`
//! JSON produces a usable configuration.

use std::path::Path;

use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};

// ── Schedule ────────────────────────────────────────────────────────────────

/// Warmup → polynomial decay learning-rate schedule.
///
/// The iteration counter itself is not part of the schedule; it is owned by
/// the training loop and passed in on every evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolyLrSchedule {
    /// Target learning rate, reached at the end of warmup.
    #[serde(default = "default_lr")]
    pub lr: f64,
    /// Learning rate at iteration 0 of the warmup ramp.
    #[serde(default)]
    pub warmup_lr: f64,
    /// Number of linear warmup iterations (0 = decay from iteration 0).
    #[serde(default)]
    pub warmup_iters: usize,
    /// Total iteration budget (warmup + decay).
    #[serde(default = "default_max_iters")]
    pub max_iters: usize,
    /// Exponent of the decay curve (1.0 = linear, 0.9 = "poly").
    #[serde(default = "default_lr_pow")]
    pub lr_pow: f64,
}

// ── Optimiser ───────────────────────────────────────────────────────────────

/// AdamW hyper-parameters shared by every parameter group.
///
/// Groups carrying their own weight-decay override ignore `weight_decay`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimConfig {
    #[serde(default = "default_weight_decay")]
    pub weight_decay: f64,
    #[serde(default = "default_beta1")]
    pub beta1: f64,
    #[serde(default = "default_beta2")]
    pub beta2: f64,
    #[serde(default = "default_eps")]
    pub eps: f64,
}

// ── Run ─────────────────────────────────────────────────────────────────────

/// Everything the helpers need from a training run's configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub schedule: PolyLrSchedule,
    #[serde(default)]
    pub optim: OptimConfig,
    /// Window for logged running statistics (0 = cumulative average).
    #[serde(default = "default_log_window")]
    pub log_window: usize,
}

// ── Default value functions ─────────────────────────────────────────────────

fn default_lr() -> f64 {
    0.02
}
fn default_max_iters() -> usize {
    10_000
}
fn default_lr_pow() -> f64 {
    0.9
}
fn default_weight_decay() -> f64 {
    1e-4
}
fn default_beta1() -> f64 {
    0.9
}
fn default_beta2() -> f64 {
    0.999
}
fn default_eps() -> f64 {
    1e-8
}
fn default_log_window() -> usize {
    20
}

// ── Impl ────────────────────────────────────────────────────────────────────

impl Default for PolyLrSchedule {
    fn default() -> Self {
        Self {
            lr: default_lr(),
            warmup_lr: 0.0,
            warmup_iters: 0,
            max_iters: default_max_iters(),
            lr_pow: default_lr_pow(),
        }
    }
}

impl PolyLrSchedule {
    /// Check the caller contract of the schedule.
    ///
    /// The schedule function itself does not check anything; run this once
    /// when the configuration is loaded.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.max_iters > self.warmup_iters,
            "max_iters ({}) must be greater than warmup_iters ({})",
            self.max_iters,
            self.warmup_iters,
        );
        ensure!(
            self.lr.is_finite() && self.lr >= 0.0,
            "lr must be a non-negative finite number, got {}",
            self.lr
        );
        ensure!(
            self.warmup_lr.is_finite() && self.warmup_lr >= 0.0,
            "warmup_lr must be a non-negative finite number, got {}",
            self.warmup_lr
        );
        ensure!(
            self.lr_pow.is_finite() && self.lr_pow >= 0.0,
            "lr_pow must be a non-negative finite number, got {}",
            self.lr_pow
        );
        Ok(())
    }
}

impl Default for OptimConfig {
    fn default() -> Self {
        Self {
            weight_decay: default_weight_decay(),
            beta1: default_beta1(),
            beta2: default_beta2(),
            eps: default_eps(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            schedule: PolyLrSchedule::default(),
            optim: OptimConfig::default(),
            log_window: default_log_window(),
        }
    }
}

impl RunConfig {
    /// Save config to a JSON file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing config to {}", path.display()))?;
        Ok(())
    }

    /// Load config from a JSON file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let config = serde_json::from_str(&json)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Load and validate in one go.
    pub fn load_validated(path: &Path) -> anyhow::Result<Self> {
        let config = Self::load(path)?;
        config.schedule.validate()?;
        Ok(config)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_json_uses_defaults() {
        let config: RunConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RunConfig::default());
        assert_eq!(config.schedule.lr, 0.02);
        assert_eq!(config.schedule.lr_pow, 0.9);
        assert_eq!(config.optim.weight_decay, 1e-4);
        assert_eq!(config.log_window, 20);
    }

    #[test]
    fn partial_schedule_keeps_other_defaults() {
        let json = r#"{ "schedule": { "warmup_iters": 100, "warmup_lr": 0.001 } }"#;
        let config: RunConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.schedule.warmup_iters, 100);
        assert_eq!(config.schedule.warmup_lr, 0.001);
        assert_eq!(config.schedule.max_iters, 10_000);
        assert_eq!(config.optim.beta2, 0.999);
    }

    #[test]
    fn save_then_load() {
        let file = NamedTempFile::new().unwrap();
        let mut config = RunConfig::default();
        config.schedule.max_iters = 1234;
        config.log_window = 0;
        config.save(file.path()).unwrap();
        let loaded = RunConfig::load(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn load_missing_file_errors() {
        assert!(RunConfig::load(Path::new("definitely_missing.json")).is_err());
    }

    #[test]
    fn validate_rejects_empty_decay_phase() {
        let schedule = PolyLrSchedule {
            warmup_iters: 100,
            max_iters: 100,
            ..Default::default()
        };
        let err = schedule.validate().unwrap_err();
        assert!(err.to_string().contains("max_iters"));
    }

    #[test]
    fn validate_rejects_negative_pow() {
        let schedule = PolyLrSchedule {
            lr_pow: -1.0,
            ..Default::default()
        };
        assert!(schedule.validate().is_err());
    }

    #[test]
    fn validate_accepts_defaults() {
        PolyLrSchedule::default().validate().unwrap();
    }
}
