//! # wrn
//!
//! Wide Residual Networks as explicit, backend-independent graphs, plus the
//! small utilities a training driver needs around them.
//!
//! ## Modules
//!
//! - **core** — Tensor, Shape and the channels-first / channels-last `DataFormat`
//! - **nn** — Operator records, graph builder, residual blocks, `create_wide_residual_network`
//! - **train** — Step-decay learning-rate schedules, `hms_string`, training timer
//! - **data** — `Transform` trait and random cutout augmentation

/// Tensor and layout primitives.
pub use wrn_core as core;

/// Network graph construction.
pub use wrn_nn as nn;

/// Training utilities.
pub use wrn_train as train;

/// Data augmentation.
pub use wrn_data as data;

pub use wrn_nn::{create_wide_residual_network, Model, WrnConfig};
