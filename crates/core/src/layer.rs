//! Layer tree: the minimal view of a model needed for parameter grouping.
//!
//! Every node carries a [`LayerKind`] fixed at construction, an optional
//! weight and an optional bias. Parameters are created through a
//! [`VarBuilder`], so they live in the caller's `VarMap` and the handles held
//! here alias that storage.

use std::collections::HashSet;

use candle_core::{Result, Shape, Var};
use candle_nn::{init, Init, VarBuilder};

// ── Kinds ───────────────────────────────────────────────────────────────────

/// Closed set of layer kinds known to the grouper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerKind {
    Linear,
    /// Convolution of any spatial dimensionality (1d, 2d, 3d, ...).
    Conv { dims: usize },
    /// Batch normalisation of any dimensionality.
    BatchNorm { dims: usize },
    /// Anything else: containers, activations, embeddings, ...
    Other(String),
}

/// Which parameter slot of a layer a tensor occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSlot {
    Weight,
    Bias,
}

/// Weight-decay classification of a single tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecayClass {
    Decay,
    NoDecay,
}

impl LayerKind {
    /// Weight-decay classification of `slot` for this kind.
    ///
    /// `None` means the kind has no classification; any tensor it owns is
    /// left out of both groups.
    pub fn classify(&self, slot: ParamSlot) -> Option<DecayClass> {
        match (self, slot) {
            (Self::Linear | Self::Conv { .. }, ParamSlot::Weight) => Some(DecayClass::Decay),
            (Self::Linear | Self::Conv { .. }, ParamSlot::Bias) => Some(DecayClass::NoDecay),
            (Self::BatchNorm { .. }, _) => Some(DecayClass::NoDecay),
            (Self::Other(_), _) => None,
        }
    }

    /// Short display tag, e.g. `conv2d` or `batch_norm1d`.
    pub fn tag(&self) -> String {
        match self {
            Self::Linear => "linear".to_string(),
            Self::Conv { dims } => format!("conv{dims}d"),
            Self::BatchNorm { dims } => format!("batch_norm{dims}d"),
            Self::Other(name) => name.clone(),
        }
    }
}

// ── Layer ───────────────────────────────────────────────────────────────────

/// A node of the module tree.
#[derive(Debug, Clone)]
pub struct Layer {
    name: String,
    kind: LayerKind,
    weight: Option<Var>,
    bias: Option<Var>,
    children: Vec<Layer>,
}

impl Layer {
    /// Parameter-free node of the given kind.
    pub fn new(name: impl Into<String>, kind: LayerKind) -> Self {
        Self {
            name: name.into(),
            kind,
            weight: None,
            bias: None,
            children: Vec::new(),
        }
    }

    /// Container node (kind `Other`) with no parameters of its own.
    pub fn container(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(name.clone(), LayerKind::Other(name))
    }

    /// `Other`-kind layer wrapping arbitrary trainable tensors
    /// (an embedding table, a layer norm, ...).
    pub fn other(name: impl Into<String>, weight: Option<Var>, bias: Option<Var>) -> Self {
        let name = name.into();
        Self {
            kind: LayerKind::Other(name.clone()),
            name,
            weight,
            bias,
            children: Vec::new(),
        }
    }

    /// Fully connected layer. `vb` should be scoped to the layer prefix
    /// (e.g. `vb.pp("fc")`).
    pub fn linear(in_dim: usize, out_dim: usize, bias: bool, vb: VarBuilder) -> Result<Self> {
        let weight = trainable(&vb, (out_dim, in_dim), "weight", init::DEFAULT_KAIMING_NORMAL)?;
        let bias = if bias {
            Some(trainable(&vb, out_dim, "bias", Init::Const(0.0))?)
        } else {
            None
        };
        Ok(Self {
            name: vb.prefix(),
            kind: LayerKind::Linear,
            weight: Some(weight),
            bias,
            children: Vec::new(),
        })
    }

    /// `dims`-dimensional convolution with a square kernel.
    ///
    /// Weight shape: `(out_channels, in_channels, kernel, ..., kernel)`.
    pub fn conv(
        dims: usize,
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        bias: bool,
        vb: VarBuilder,
    ) -> Result<Self> {
        let mut shape = vec![out_channels, in_channels];
        shape.extend(std::iter::repeat(kernel).take(dims));
        let weight = trainable(&vb, shape, "weight", init::DEFAULT_KAIMING_NORMAL)?;
        let bias = if bias {
            Some(trainable(&vb, out_channels, "bias", Init::Const(0.0))?)
        } else {
            None
        };
        Ok(Self {
            name: vb.prefix(),
            kind: LayerKind::Conv { dims },
            weight: Some(weight),
            bias,
            children: Vec::new(),
        })
    }

    /// Affine batch normalisation: weight initialised to 1, bias to 0.
    ///
    /// Running mean/variance are buffers, not trainable, and are not tracked.
    pub fn batch_norm(dims: usize, num_features: usize, vb: VarBuilder) -> Result<Self> {
        let weight = trainable(&vb, num_features, "weight", Init::Const(1.0))?;
        let bias = trainable(&vb, num_features, "bias", Init::Const(0.0))?;
        Ok(Self {
            name: vb.prefix(),
            kind: LayerKind::BatchNorm { dims },
            weight: Some(weight),
            bias: Some(bias),
            children: Vec::new(),
        })
    }

    /// Append a child and return `self` (builder style).
    pub fn with_child(mut self, child: Layer) -> Self {
        self.children.push(child);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &LayerKind {
        &self.kind
    }

    pub fn weight(&self) -> Option<&Var> {
        self.weight.as_ref()
    }

    pub fn bias(&self) -> Option<&Var> {
        self.bias.as_ref()
    }

    pub fn children(&self) -> &[Layer] {
        &self.children
    }

    /// The present parameters of this node only, tagged with their slot.
    pub fn own_params(&self) -> impl Iterator<Item = (ParamSlot, &Var)> {
        let weight = self.weight.iter().map(|w| (ParamSlot::Weight, w));
        let bias = self.bias.iter().map(|b| (ParamSlot::Bias, b));
        weight.chain(bias)
    }

    /// Depth-first walk over this node and every descendant.
    pub fn modules(&self) -> Modules<'_> {
        Modules { stack: vec![self] }
    }

    /// Every trainable tensor of the tree, once each, in traversal order.
    ///
    /// A var shared between layers (tied weights) is listed only once.
    pub fn unique_params(&self) -> Vec<&Var> {
        let mut seen = HashSet::new();
        self.modules()
            .flat_map(|m| m.own_params())
            .map(|(_, v)| v)
            .filter(|v| seen.insert(v.as_tensor().id()))
            .collect()
    }

    /// Number of distinct trainable tensors owned by the whole tree, whatever
    /// their kind.
    pub fn num_params(&self) -> usize {
        self.unique_params().len()
    }

    /// Total number of scalar parameters in the tree.
    pub fn num_elements(&self) -> usize {
        self.unique_params()
            .iter()
            .map(|v| v.as_tensor().elem_count())
            .sum()
    }
}

/// Pre-order iterator returned by [`Layer::modules`].
pub struct Modules<'a> {
    stack: Vec<&'a Layer>,
}

impl<'a> Iterator for Modules<'a> {
    type Item = &'a Layer;

    fn next(&mut self) -> Option<Self::Item> {
        let layer = self.stack.pop()?;
        // Reverse so children come out in declaration order.
        self.stack.extend(layer.children.iter().rev());
        Some(layer)
    }
}

/// Create (or fetch) a variable through `vb` and keep a `Var` handle to it.
///
/// With a `VarMap` backend the returned tensor already is a variable, so
/// `Var::from_tensor` shares its storage rather than copying.
fn trainable<S: Into<Shape>>(vb: &VarBuilder, shape: S, name: &str, init: Init) -> Result<Var> {
    let t = vb.get_with_hints(shape, name, init)?;
    Var::from_tensor(&t)
}

// ── Tests ───────────────────────────────────────────────────────────────────
