use std::path::Path;

use serde::{Deserialize, Serialize};
use wrn_core::{DataFormat, Shape};

use crate::error::{GraphError, GraphResult};
use crate::network::STAGES;

/// Spatial window of the final average pooling.
pub const POOL_WINDOW: usize = 8;

/// Hyper-parameters of a Wide Residual Network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WrnConfig {
    /// Per-sample input shape, ordered according to `data_format`.
    pub input_dim: Vec<usize>,
    pub nb_classes: usize,
    /// Blocks per stage (N). The network has `6 * n + 4` convolutions.
    pub n: usize,
    /// Width multiplier (k).
    pub k: usize,
    /// Dropout between the two convolutions of identity blocks; 0 disables it.
    pub dropout: f64,
    pub data_format: DataFormat,
}

impl Default for WrnConfig {
    fn default() -> Self {
        WrnConfig {
            input_dim: vec![32, 32, 3],
            nb_classes: 10,
            n: 4,
            k: 10,
            dropout: 0.3,
            data_format: DataFormat::ChannelsLast,
        }
    }
}

impl WrnConfig {
    pub fn new(input_dim: Vec<usize>, nb_classes: usize, n: usize, k: usize, dropout: f64) -> Self {
        WrnConfig {
            input_dim,
            nb_classes,
            n,
            k,
            dropout,
            data_format: DataFormat::ChannelsLast,
        }
    }

    pub fn with_data_format(mut self, format: DataFormat) -> Self {
        self.data_format = format;
        self
    }

    /// Set `n` from a total convolution depth: `n = (depth - 4) / 6`.
    pub fn with_total_depth(mut self, depth: usize) -> GraphResult<Self> {
        match depth.checked_sub(4) {
            Some(d) if d > 0 && d % 6 == 0 => {
                self.n = d / 6;
                Ok(self)
            }
            _ => Err(GraphError::InvalidConfig(format!(
                "depth {} is not of the form 6n + 4 with n >= 1",
                depth
            ))),
        }
    }

    /// Number of convolutions in the assembled network.
    ///
    /// Saturates for `n` values that [`validate`](Self::validate) rejects.
    pub fn total_depth(&self) -> usize {
        self.n.saturating_mul(6).saturating_add(4)
    }

    pub fn input_shape(&self) -> Shape {
        Shape::from_slice(&self.input_dim)
    }

    pub fn from_json_str(s: &str) -> GraphResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> GraphResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check every parameter before any graph node is created.
    pub fn validate(&self) -> GraphResult<()> {
        if self.n == 0 {
            return Err(GraphError::InvalidConfig("n must be at least 1".into()));
        }
        if self.k == 0 {
            return Err(GraphError::InvalidConfig("k must be at least 1".into()));
        }
        let widest = STAGES.iter().map(|&(base, _)| base).max().unwrap_or(1);
        if widest.checked_mul(self.k).is_none() {
            return Err(GraphError::InvalidConfig(format!(
                "k = {} overflows the widest stage ({} * k channels)",
                self.k, widest
            )));
        }
        if self.n.checked_mul(6).and_then(|d| d.checked_add(4)).is_none() {
            return Err(GraphError::InvalidConfig(format!(
                "n = {} overflows the depth 6n + 4",
                self.n
            )));
        }
        if self.nb_classes == 0 {
            return Err(GraphError::InvalidConfig("nb_classes must be at least 1".into()));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(GraphError::InvalidConfig(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }

        let shape = self.input_shape();
        if shape.dims().contains(&0) {
            return Err(GraphError::Shape(format!("input_dim {} has an empty axis", shape)));
        }
        let (h, w, _) = self.data_format.split(&shape).map_err(|_| {
            GraphError::Shape(format!(
                "input_dim must have 3 axes ({}), got {}",
                self.data_format, shape
            ))
        })?;

        for (axis, size) in [("height", h), ("width", w)] {
            let reduced = reduced_extent(size);
            if reduced < POOL_WINDOW {
                return Err(GraphError::Shape(format!(
                    "input {} {} shrinks to {} after the two stride-2 stages, smaller than the {}x{} pooling window",
                    axis, size, reduced, POOL_WINDOW, POOL_WINDOW
                )));
            }
        }
        Ok(())
    }
}

/// Spatial extent reaching the pooling layer: the stem pads by one on each
/// side, then stages two and three each halve, rounding up.
pub(crate) fn reduced_extent(size: usize) -> usize {
    size.saturating_add(2).div_ceil(2).div_ceil(2)
}
