//! AdamW over weight-decay parameter groups.
//!
//! candle's `AdamW` applies a single weight decay to all of its variables,
//! so each group gets its own instance. Learning rates are always written to
//! every group at once.

use candle_core::{backprop::GradStore, Result, Tensor};
use candle_nn::{AdamW, Optimizer, ParamsAdamW};

use segtrain_common::OptimConfig;
use segtrain_core::ParamGroups;

use crate::scheduler::LrControl;

struct GroupState {
    name: &'static str,
    num_params: usize,
    weight_decay: f64,
    optimizer: AdamW,
}

/// One candle `AdamW` per parameter group.
pub struct GroupedAdamW {
    groups: Vec<GroupState>,
}

impl GroupedAdamW {
    /// Build the optimiser with initial learning rate `lr`.
    ///
    /// Groups without a weight-decay override use `config.weight_decay`.
    pub fn new(groups: &ParamGroups, config: &OptimConfig, lr: f64) -> Result<Self> {
        let mut states = Vec::with_capacity(2);
        for group in groups.iter() {
            let weight_decay = group.effective_weight_decay(config.weight_decay);
            let optimizer = AdamW::new(
                group.params.clone(),
                ParamsAdamW {
                    lr,
                    beta1: config.beta1,
                    beta2: config.beta2,
                    eps: config.eps,
                    weight_decay,
                },
            )?;
            tracing::info!(
                group = group.name,
                params = group.len(),
                weight_decay,
                "Parameter group"
            );
            states.push(GroupState {
                name: group.name,
                num_params: group.len(),
                weight_decay,
                optimizer,
            });
        }
        Ok(Self { groups: states })
    }

    /// Apply one update to every group.
    pub fn step(&mut self, grads: &GradStore) -> Result<()> {
        for group in &mut self.groups {
            group.optimizer.step(grads)?;
        }
        Ok(())
    }

    /// Backward pass on `loss`, then [`step`](Self::step).
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        let grads = loss.backward()?;
        self.step(&grads)
    }

    pub fn set_learning_rate(&mut self, lr: f64) {
        for group in &mut self.groups {
            group.optimizer.set_learning_rate(lr);
        }
    }

    /// Learning rate of the first group (all groups share it).
    pub fn learning_rate(&self) -> f64 {
        self.groups
            .first()
            .map(|g| g.optimizer.learning_rate())
            .unwrap_or(0.0)
    }

    pub fn group_learning_rates(&self) -> Vec<f64> {
        self.groups
            .iter()
            .map(|g| g.optimizer.learning_rate())
            .collect()
    }

    pub fn group_weight_decays(&self) -> Vec<f64> {
        self.groups.iter().map(|g| g.weight_decay).collect()
    }

    pub fn group_names(&self) -> Vec<&'static str> {
        self.groups.iter().map(|g| g.name).collect()
    }

    pub fn group_sizes(&self) -> Vec<usize> {
        self.groups.iter().map(|g| g.num_params).collect()
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }
}

impl LrControl for GroupedAdamW {
    fn set_lr_all_groups(&mut self, lr: f64) {
        self.set_learning_rate(lr);
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
