use log::{debug, info};

use crate::blocks::{conv_block, expand_conv};
use crate::config::{WrnConfig, POOL_WINDOW};
use crate::error::GraphResult;
use crate::graph::{GraphBuilder, Model};
use crate::op::{Activation, Conv2dSpec, DenseSpec, Initializer, Padding};

/// Filters of the stem convolution.
const STEM_FILTERS: usize = 16;

/// `(base channels, stride)` of the three stages.
pub(crate) const STAGES: [(usize, (usize, usize)); 3] = [(16, (1, 1)), (32, (2, 2)), (64, (2, 2))];

/// Build a Wide Residual Network WRN-(6n+4)-k.
///
/// Layout: zero-pad + 3x3 stem convolution, then three stages each made of
/// one [`expand_conv`] followed by `n - 1` [`conv_block`]s, then 8x8
/// average pooling, flatten and a softmax dense head.
///
/// The stage stride is also passed to the identity blocks, where it has no
/// effect.
pub fn create_wide_residual_network(config: &WrnConfig) -> GraphResult<Model> {
    config.validate()?;

    let mut g = GraphBuilder::new(config.data_format);
    let ip = g.input(config.input_shape())?;

    let x = g.zero_pad(ip, (1, 1))?;
    let mut x = g.conv2d(
        x,
        Conv2dSpec::new(STEM_FILTERS, (3, 3))
            .padding(Padding::Same)
            .no_bias()
            .initializer(Initializer::HeNormal),
    )?;

    for (stage, &(base, stride)) in STAGES.iter().enumerate() {
        x = expand_conv(&mut g, x, base, config.k, stride)?;
        for _ in 1..config.n {
            x = conv_block(&mut g, x, base, stride, config.k, config.dropout)?;
        }
        debug!("stage {} output {}", stage + 1, g.shape(x)?);
    }

    let x = g.avg_pool(x, (POOL_WINDOW, POOL_WINDOW))?;
    let x = g.flatten(x)?;
    let x = g.dense(x, DenseSpec::new(config.nb_classes, Activation::Softmax))?;

    let model = g.finish(x)?;
    info!(
        "Wide Residual Network-{}-{} created.",
        config.total_depth(),
        config.k
    );
    Ok(model)
}
