use serde::{Deserialize, Serialize};
use std::fmt;
use wrn_core::{DataFormat, Shape};

use crate::error::{GraphError, GraphResult};

/// Convolution border handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Padding {
    /// No implicit padding; the kernel must fit inside the input.
    Valid,
    /// Output spatial size is `ceil(input / stride)`.
    Same,
}

/// Weight initialization scheme recorded on a layer for the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Initializer {
    HeNormal,
    GlorotUniform,
    Uniform,
    Ones,
    Zeros,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Relu,
    Softmax,
    Linear,
}

/// 2D convolution parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conv2dSpec {
    pub filters: usize,
    pub kernel: (usize, usize),
    pub strides: (usize, usize),
    pub padding: Padding,
    pub use_bias: bool,
    pub kernel_initializer: Initializer,
}

impl Conv2dSpec {
    /// Stride 1, valid padding, with bias, glorot-uniform kernel.
    pub fn new(filters: usize, kernel: (usize, usize)) -> Self {
        Conv2dSpec {
            filters,
            kernel,
            strides: (1, 1),
            padding: Padding::Valid,
            use_bias: true,
            kernel_initializer: Initializer::GlorotUniform,
        }
    }

    pub fn strides(mut self, strides: (usize, usize)) -> Self {
        self.strides = strides;
        self
    }

    pub fn padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    pub fn no_bias(mut self) -> Self {
        self.use_bias = false;
        self
    }

    pub fn initializer(mut self, init: Initializer) -> Self {
        self.kernel_initializer = init;
        self
    }

    fn out_dim(&self, input: usize, kernel: usize, stride: usize) -> Option<usize> {
        match self.padding {
            Padding::Valid => input.checked_sub(kernel).map(|d| d / stride + 1),
            Padding::Same => Some(input.div_ceil(stride)),
        }
    }
}

/// Batch normalization parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchNormSpec {
    /// Channel axis in the per-sample shape.
    pub axis: usize,
    pub momentum: f64,
    pub epsilon: f64,
    pub gamma_initializer: Initializer,
}

impl BatchNormSpec {
    /// Momentum 0.1, epsilon 1e-5, uniform gamma.
    pub fn new(axis: usize) -> Self {
        BatchNormSpec {
            axis,
            momentum: 0.1,
            epsilon: 1e-5,
            gamma_initializer: Initializer::Uniform,
        }
    }
}

/// Fully connected projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseSpec {
    pub units: usize,
    pub activation: Activation,
    pub use_bias: bool,
}

impl DenseSpec {
    pub fn new(units: usize, activation: Activation) -> Self {
        DenseSpec {
            units,
            activation,
            use_bias: true,
        }
    }
}

/// Operator record: what a graph node computes, without computing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    Input { shape: Shape },
    ZeroPad2d { padding: (usize, usize) },
    Conv2d(Conv2dSpec),
    BatchNorm(BatchNormSpec),
    Activation { function: Activation },
    Dropout { rate: f64 },
    Add,
    AvgPool2d { pool: (usize, usize) },
    Flatten,
    Dense(DenseSpec),
}

/// Discriminant of [`Op`], used for counting and naming nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Input,
    ZeroPad2d,
    Conv2d,
    BatchNorm,
    Activation,
    Dropout,
    Add,
    AvgPool2d,
    Flatten,
    Dense,
}

impl OpKind {
    /// Prefix for generated node names.
    pub fn prefix(self) -> &'static str {
        match self {
            OpKind::Input => "input",
            OpKind::ZeroPad2d => "zero_padding2d",
            OpKind::Conv2d => "conv2d",
            OpKind::BatchNorm => "batch_normalization",
            OpKind::Activation => "activation",
            OpKind::Dropout => "dropout",
            OpKind::Add => "add",
            OpKind::AvgPool2d => "average_pooling2d",
            OpKind::Flatten => "flatten",
            OpKind::Dense => "dense",
        }
    }

    /// Number of inputs the operator consumes.
    pub fn arity(self) -> usize {
        match self {
            OpKind::Input => 0,
            OpKind::Add => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OpKind::Input => "Input",
            OpKind::ZeroPad2d => "ZeroPadding2D",
            OpKind::Conv2d => "Conv2D",
            OpKind::BatchNorm => "BatchNormalization",
            OpKind::Activation => "Activation",
            OpKind::Dropout => "Dropout",
            OpKind::Add => "Add",
            OpKind::AvgPool2d => "AveragePooling2D",
            OpKind::Flatten => "Flatten",
            OpKind::Dense => "Dense",
        };
        write!(f, "{}", name)
    }
}

fn image_dims(shape: &Shape, format: DataFormat, kind: OpKind) -> GraphResult<(usize, usize, usize)> {
    format
        .split(shape)
        .map_err(|_| GraphError::Shape(format!("{} expects a rank-3 image, got {}", kind, shape)))
}

impl Op {
    pub fn kind(&self) -> OpKind {
        match self {
            Op::Input { .. } => OpKind::Input,
            Op::ZeroPad2d { .. } => OpKind::ZeroPad2d,
            Op::Conv2d(_) => OpKind::Conv2d,
            Op::BatchNorm(_) => OpKind::BatchNorm,
            Op::Activation { .. } => OpKind::Activation,
            Op::Dropout { .. } => OpKind::Dropout,
            Op::Add => OpKind::Add,
            Op::AvgPool2d { .. } => OpKind::AvgPool2d,
            Op::Flatten => OpKind::Flatten,
            Op::Dense(_) => OpKind::Dense,
        }
    }

    /// Per-sample output shape of this operator given its inputs' shapes.
    pub fn infer_shape(&self, inputs: &[&Shape], format: DataFormat) -> GraphResult<Shape> {
        let kind = self.kind();
        if inputs.len() != kind.arity() {
            return Err(GraphError::Arity {
                op: kind.prefix(),
                expected: kind.arity(),
                got: inputs.len(),
            });
        }

        match self {
            Op::Input { shape } => {
                if shape.ndim() == 0 || shape.dims().contains(&0) {
                    return Err(GraphError::Shape(format!("invalid input shape {}", shape)));
                }
                Ok(shape.clone())
            }
            Op::ZeroPad2d { padding } => {
                let (h, w, c) = image_dims(inputs[0], format, kind)?;
                let pad = |size: usize, p: usize| {
                    p.checked_mul(2).and_then(|p| size.checked_add(p)).ok_or_else(|| {
                        GraphError::Shape(format!("padding {:?} overflows input {}", padding, inputs[0]))
                    })
                };
                Ok(format.image_shape(pad(h, padding.0)?, pad(w, padding.1)?, c))
            }
            Op::Conv2d(spec) => {
                let (h, w, _) = image_dims(inputs[0], format, kind)?;
                let (kh, kw) = spec.kernel;
                let (sh, sw) = spec.strides;
                if spec.filters == 0 || kh == 0 || kw == 0 || sh == 0 || sw == 0 {
                    return Err(GraphError::InvalidConfig(format!(
                        "conv2d needs positive filters, kernel and strides, got {} filters, kernel {:?}, strides {:?}",
                        spec.filters, spec.kernel, spec.strides
                    )));
                }
                match (spec.out_dim(h, kh, sh), spec.out_dim(w, kw, sw)) {
                    (Some(oh), Some(ow)) => Ok(format.image_shape(oh, ow, spec.filters)),
                    _ => Err(GraphError::Shape(format!(
                        "conv2d kernel {}x{} does not fit input {}",
                        kh, kw, inputs[0]
                    ))),
                }
            }
            Op::BatchNorm(spec) => {
                if spec.axis >= inputs[0].ndim() {
                    return Err(GraphError::Shape(format!(
                        "batch normalization axis {} out of range for {}",
                        spec.axis, inputs[0]
                    )));
                }
                Ok(inputs[0].clone())
            }
            Op::Activation { .. } => Ok(inputs[0].clone()),
            Op::Dropout { rate } => {
                if !(*rate > 0.0 && *rate < 1.0) {
                    return Err(GraphError::InvalidConfig(format!(
                        "dropout rate must be in (0, 1), got {}",
                        rate
                    )));
                }
                Ok(inputs[0].clone())
            }
            Op::Add => {
                if inputs[0] != inputs[1] {
                    return Err(GraphError::BranchMismatch {
                        left: inputs[0].to_vec(),
                        right: inputs[1].to_vec(),
                    });
                }
                Ok(inputs[0].clone())
            }
            Op::AvgPool2d { pool } => {
                let (h, w, c) = image_dims(inputs[0], format, kind)?;
                let (ph, pw) = *pool;
                if ph == 0 || pw == 0 {
                    return Err(GraphError::InvalidConfig(format!(
                        "pool size must be positive, got {:?}",
                        pool
                    )));
                }
                if h < ph || w < pw {
                    return Err(GraphError::Shape(format!(
                        "{}x{} pooling window does not fit input {}",
                        ph, pw, inputs[0]
                    )));
                }
                Ok(format.image_shape((h - ph) / ph + 1, (w - pw) / pw + 1, c))
            }
            Op::Flatten => {
                let n = inputs[0].checked_numel().ok_or_else(|| {
                    GraphError::Shape(format!("flattening {} overflows the element count", inputs[0]))
                })?;
                Ok(Shape::new(vec![n]))
            }
            Op::Dense(spec) => {
                if spec.units == 0 {
                    return Err(GraphError::InvalidConfig("dense layer needs at least one unit".into()));
                }
                if inputs[0].ndim() != 1 {
                    return Err(GraphError::Shape(format!(
                        "dense expects a flat input, got {}",
                        inputs[0]
                    )));
                }
                Ok(Shape::new(vec![spec.units]))
            }
        }
    }

    /// `(total, trainable)` weight counts for this operator.
    ///
    /// Batch normalization holds four vectors per channel, of which only
    /// gamma and beta are trainable. Counts saturate at `usize::MAX`.
    pub fn param_count(&self, inputs: &[&Shape], format: DataFormat) -> (usize, usize) {
        match self {
            Op::Conv2d(spec) => {
                let cin = inputs
                    .first()
                    .and_then(|s| s.dim(format.channel_axis()).ok())
                    .unwrap_or(0);
                let mut n = spec
                    .kernel
                    .0
                    .saturating_mul(spec.kernel.1)
                    .saturating_mul(cin)
                    .saturating_mul(spec.filters);
                if spec.use_bias {
                    n = n.saturating_add(spec.filters);
                }
                (n, n)
            }
            Op::BatchNorm(spec) => {
                let c = inputs.first().and_then(|s| s.dim(spec.axis).ok()).unwrap_or(0);
                (c.saturating_mul(4), c.saturating_mul(2))
            }
            Op::Dense(spec) => {
                let fan_in = inputs
                    .first()
                    .map(|s| s.checked_numel().unwrap_or(usize::MAX))
                    .unwrap_or(0);
                let mut n = fan_in.saturating_mul(spec.units);
                if spec.use_bias {
                    n = n.saturating_add(spec.units);
                }
                (n, n)
            }
            _ => (0, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CL: DataFormat = DataFormat::ChannelsLast;

    fn s(dims: &[usize]) -> Shape {
        Shape::from_slice(dims)
    }

    #[test]
    fn test_conv_valid_and_same() {
        let x = s(&[36, 36, 16]);
        let valid = Op::Conv2d(Conv2dSpec::new(32, (3, 3)).strides((2, 2)));
        assert_eq!(valid.infer_shape(&[&x], CL).unwrap().dims(), &[17, 17, 32]);

        let y = s(&[34, 34, 16]);
        let same = Op::Conv2d(Conv2dSpec::new(32, (1, 1)).strides((2, 2)).padding(Padding::Same));
        assert_eq!(same.infer_shape(&[&y], CL).unwrap().dims(), &[17, 17, 32]);
    }

    #[test]
    fn test_conv_kernel_too_large() {
        let x = s(&[2, 2, 3]);
        let op = Op::Conv2d(Conv2dSpec::new(8, (3, 3)));
        assert!(matches!(op.infer_shape(&[&x], CL), Err(GraphError::Shape(_))));
    }

    #[test]
    fn test_conv_zero_stride_rejected() {
        let x = s(&[8, 8, 3]);
        let op = Op::Conv2d(Conv2dSpec::new(8, (3, 3)).strides((0, 1)));
        assert!(matches!(op.infer_shape(&[&x], CL), Err(GraphError::InvalidConfig(_))));
    }

    #[test]
    fn test_channels_first_padding() {
        let x = s(&[3, 32, 30]);
        let op = Op::ZeroPad2d { padding: (1, 2) };
        let out = op.infer_shape(&[&x], DataFormat::ChannelsFirst).unwrap();
        assert_eq!(out.dims(), &[3, 34, 34]);
    }

    #[test]
    fn test_add_requires_matching_branches() {
        let a = s(&[8, 8, 16]);
        let b = s(&[8, 8, 32]);
        assert!(Op::Add.infer_shape(&[&a, &a], CL).is_ok());
        match Op::Add.infer_shape(&[&a, &b], CL) {
            Err(GraphError::BranchMismatch { left, right }) => {
                assert_eq!(left, vec![8, 8, 16]);
                assert_eq!(right, vec![8, 8, 32]);
            }
            other => panic!("expected branch mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_arity_checked() {
        let a = s(&[8, 8, 16]);
        assert!(matches!(
            Op::Add.infer_shape(&[&a], CL),
            Err(GraphError::Arity { expected: 2, got: 1, .. })
        ));
    }

    #[test]
    fn test_avg_pool_floor() {
        let x = s(&[9, 9, 64]);
        let op = Op::AvgPool2d { pool: (8, 8) };
        assert_eq!(op.infer_shape(&[&x], CL).unwrap().dims(), &[1, 1, 64]);

        let small = s(&[7, 7, 64]);
        assert!(matches!(op.infer_shape(&[&small], CL), Err(GraphError::Shape(_))));
    }

    #[test]
    fn test_dropout_rate_bounds() {
        let x = s(&[4]);
        assert!(Op::Dropout { rate: 0.3 }.infer_shape(&[&x], CL).is_ok());
        assert!(Op::Dropout { rate: 0.0 }.infer_shape(&[&x], CL).is_err());
        assert!(Op::Dropout { rate: 1.0 }.infer_shape(&[&x], CL).is_err());
    }

    #[test]
    fn test_dense_needs_flat_input() {
        let op = Op::Dense(DenseSpec::new(10, Activation::Softmax));
        assert!(op.infer_shape(&[&s(&[1, 1, 64])], CL).is_err());
        assert_eq!(op.infer_shape(&[&s(&[64])], CL).unwrap().dims(), &[10]);
    }

    #[test]
    fn test_param_counts() {
        let x = s(&[32, 32, 16]);
        let conv = Op::Conv2d(Conv2dSpec::new(32, (3, 3)).no_bias());
        assert_eq!(conv.param_count(&[&x], CL), (3 * 3 * 16 * 32, 3 * 3 * 16 * 32));

        let bn = Op::BatchNorm(BatchNormSpec::new(2));
        assert_eq!(bn.param_count(&[&x], CL), (64, 32));

        let dense = Op::Dense(DenseSpec::new(10, Activation::Softmax));
        assert_eq!(dense.param_count(&[&s(&[64])], CL), (650, 650));
    }

    #[test]
    fn test_huge_shapes_fail_instead_of_wrapping() {
        let x = s(&[usize::MAX, 4, 3]);
        let pad = Op::ZeroPad2d { padding: (1, 1) };
        assert!(matches!(pad.infer_shape(&[&x], CL), Err(GraphError::Shape(_))));
        assert!(matches!(Op::Flatten.infer_shape(&[&x], CL), Err(GraphError::Shape(_))));

        let wide = s(&[8, 8, usize::MAX / 2]);
        let conv = Op::Conv2d(Conv2dSpec::new(usize::MAX / 2, (3, 3)));
        assert_eq!(conv.param_count(&[&wide], CL), (usize::MAX, usize::MAX));
    }

    #[test]
    fn test_op_json_tagging() {
        let op = Op::Conv2d(Conv2dSpec::new(16, (3, 3)).no_bias().initializer(Initializer::HeNormal));
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["op"], "conv2d");
        assert_eq!(json["kernel_initializer"], "he_normal");
        let back: Op = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }
}
