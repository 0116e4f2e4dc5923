//! # segtrain-core — Layer Tree & Parameter Grouping
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`layer`] | `Layer` tree, `LayerKind` (Linear / Conv / BatchNorm / Other), builders over `VarBuilder` |
//! | [`groups`] | `group_weight`: split trainable tensors into decay / no-decay groups |
//!
//! Layer kinds are resolved once, when the tree is built. Grouping then asks
//! each kind how its weight and bias should be regularised instead of
//! inspecting concrete layer types.

pub mod groups;
pub mod layer;

// ── Public re-exports ───────────────────────────────────────────────────────

pub use groups::{group_weight, ParamGroup, ParamGroups};
pub use layer::{DecayClass, Layer, LayerKind, Modules, ParamSlot};
