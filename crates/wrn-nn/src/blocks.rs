use crate::error::{GraphError, GraphResult};
use crate::graph::{GraphBuilder, NodeId};
use crate::op::{Conv2dSpec, Initializer, Padding};

/// Bias-free, he-normal convolution used throughout the residual blocks.
fn wide_conv(filters: usize, kernel: (usize, usize), stride: (usize, usize), padding: Padding) -> Conv2dSpec {
    Conv2dSpec::new(filters, kernel)
        .strides(stride)
        .padding(padding)
        .no_bias()
        .initializer(Initializer::HeNormal)
}

/// Channel count `base * k`, rejecting widths that do not fit in `usize`.
fn widen(base: usize, k: usize) -> GraphResult<usize> {
    base.checked_mul(k).ok_or_else(|| {
        GraphError::InvalidConfig(format!("width {} * {} overflows the channel count", base, k))
    })
}

/// Expansion block: the first block of every stage.
///
/// Widens the input to `base * k` channels and applies `stride` to the
/// spatial axes. The shortcut is the normalized, activated input projected
/// by a strided 1x1 convolution.
pub fn expand_conv(
    g: &mut GraphBuilder,
    init: NodeId,
    base: usize,
    k: usize,
    stride: (usize, usize),
) -> GraphResult<NodeId> {
    let filters = widen(base, k)?;

    let shortcut = g.batch_norm(init)?;
    let shortcut = g.relu(shortcut)?;

    let x = g.zero_pad(shortcut, (1, 1))?;
    let x = g.conv2d(x, wide_conv(filters, (3, 3), stride, Padding::Valid))?;
    let x = g.batch_norm(x)?;
    let x = g.relu(x)?;
    let x = g.zero_pad(x, (1, 1))?;
    let x = g.conv2d(x, wide_conv(filters, (3, 3), (1, 1), Padding::Valid))?;

    let shortcut = g.conv2d(shortcut, wide_conv(filters, (1, 1), stride, Padding::Same))?;
    g.add(x, shortcut)
}

/// Identity block: shape-preserving residual unit with an unmodified shortcut.
///
/// `_stride` is accepted for call-site symmetry with [`expand_conv`] and
/// has no effect; both convolutions always use stride 1. A dropout node is
/// inserted between the convolutions only when `dropout > 0`.
pub fn conv_block(
    g: &mut GraphBuilder,
    input: NodeId,
    n: usize,
    _stride: (usize, usize),
    k: usize,
    dropout: f64,
) -> GraphResult<NodeId> {
    if !(0.0..1.0).contains(&dropout) {
        return Err(GraphError::InvalidConfig(format!(
            "dropout must be in [0, 1), got {}",
            dropout
        )));
    }
    let filters = widen(n, k)?;

    let x = g.batch_norm(input)?;
    let x = g.relu(x)?;
    let mut x = g.conv2d(x, wide_conv(filters, (3, 3), (1, 1), Padding::Same))?;
    if dropout > 0.0 {
        x = g.dropout(x, dropout)?;
    }
    let x = g.batch_norm(x)?;
    let x = g.relu(x)?;
    let x = g.conv2d(x, wide_conv(filters, (3, 3), (1, 1), Padding::Same))?;

    g.add(input, x)
}
