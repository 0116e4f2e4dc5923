//! Weight-decay parameter groups.
//!
//! Linear and convolution weights are regularised; their biases and every
//! batch-norm parameter are not. The groups hold `Var` handles, so stepping
//! an optimiser built from them updates the model's own storage.

use std::collections::HashSet;

use candle_core::Var;

use crate::layer::{DecayClass, Layer};

/// A named set of parameters with an optional weight-decay override.
#[derive(Debug, Clone)]
pub struct ParamGroup {
    pub name: &'static str,
    pub params: Vec<Var>,
    /// `None` inherits the optimiser's default weight decay.
    pub weight_decay: Option<f64>,
}

impl ParamGroup {
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Weight decay this group trains with, given the optimiser default.
    pub fn effective_weight_decay(&self, default: f64) -> f64 {
        self.weight_decay.unwrap_or(default)
    }
}

/// The two groups produced by [`group_weight`].
#[derive(Debug, Clone)]
pub struct ParamGroups {
    pub decay: ParamGroup,
    pub no_decay: ParamGroup,
}

impl ParamGroups {
    /// Both groups, `decay` first.
    pub fn iter(&self) -> impl Iterator<Item = &ParamGroup> {
        [&self.decay, &self.no_decay].into_iter()
    }

    /// Total number of grouped tensors.
    pub fn num_params(&self) -> usize {
        self.decay.len() + self.no_decay.len()
    }
}

/// Split the trainable tensors of `model` into a decay and a no-decay group.
///
/// Every module of the tree is visited, not only the top level. A var
/// shared by several layers lands in a group once.
///
/// # Panics
/// If the groups do not account for every trainable tensor of the model.
/// That happens when a layer of kind `Other` owns parameters: it has no
/// decay classification, and dropping its tensors silently would leave them
/// out of training.
pub fn group_weight(model: &Layer) -> ParamGroups {
    let mut decay = Vec::new();
    let mut no_decay = Vec::new();

    // Tied vars are grouped once, by the first layer that classifies them.
    let mut seen = HashSet::new();

    for module in model.modules() {
        for (slot, var) in module.own_params() {
            let Some(class) = module.kind().classify(slot) else {
                continue;
            };
            if !seen.insert(var.as_tensor().id()) {
                continue;
            }
            match class {
                DecayClass::Decay => decay.push(var.clone()),
                DecayClass::NoDecay => no_decay.push(var.clone()),
            }
        }
    }

    let total = model.num_params();
    assert_eq!(
        total,
        decay.len() + no_decay.len(),
        "parameter grouping covers {} of {} trainable tensors ({} decay, {} no-decay); \
         a layer with an unclassified kind owns parameters",
        decay.len() + no_decay.len(),
        total,
        decay.len(),
        no_decay.len(),
    );

    ParamGroups {
        decay: ParamGroup {
            name: "decay",
            params: decay,
            weight_decay: None,
        },
        no_decay: ParamGroup {
            name: "no_decay",
            params: no_decay,
            weight_decay: Some(0.0),
        },
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
