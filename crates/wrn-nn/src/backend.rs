use crate::error::GraphResult;
use crate::graph::Node;

/// Numerical engine that gives meaning to operator records.
///
/// [`Model::forward`](crate::Model::forward) calls `eval` once per node,
/// in topological order, passing the values of the node's inputs.
pub trait Backend {
    type Value: Clone;

    fn eval(&mut self, node: &Node, inputs: &[&Self::Value]) -> GraphResult<Self::Value>;
}
