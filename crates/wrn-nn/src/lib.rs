pub mod error;
pub mod op;
pub mod graph;
pub mod backend;
pub mod blocks;
pub mod config;
pub mod network;

pub use error::{GraphError, GraphResult};
pub use op::{Activation, BatchNormSpec, Conv2dSpec, DenseSpec, Initializer, Op, OpKind, Padding};
pub use graph::{GraphBuilder, Model, Node, NodeId};
pub use backend::Backend;
pub use blocks::{conv_block, expand_conv};
pub use config::WrnConfig;
pub use network::create_wide_residual_network;
