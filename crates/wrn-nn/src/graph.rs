use std::collections::HashMap;
use std::fmt::Write as _;

use serde::Serialize;
use wrn_core::{DataFormat, Shape};

use crate::backend::Backend;
use crate::error::{GraphError, GraphResult};
use crate::op::{Activation, BatchNormSpec, Conv2dSpec, DenseSpec, Op, OpKind};

pub type NodeId = usize;

/// A node in the computation graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub op: Op,
    pub inputs: Vec<NodeId>,
    /// Per-sample output shape (no batch axis).
    pub shape: Shape,
}

/// Append-only graph under construction.
///
/// A node may only reference nodes pushed before it, so insertion order is
/// a topological order. Shapes are inferred as nodes are pushed and any
/// inconsistency is reported immediately.
#[derive(Debug)]
pub struct GraphBuilder {
    format: DataFormat,
    nodes: Vec<Node>,
    input: Option<NodeId>,
    counters: HashMap<OpKind, usize>,
}

impl GraphBuilder {
    pub fn new(format: DataFormat) -> Self {
        GraphBuilder {
            format,
            nodes: Vec::new(),
            input: None,
            counters: HashMap::new(),
        }
    }

    pub fn format(&self) -> DataFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Output shape of an already pushed node.
    pub fn shape(&self, id: NodeId) -> GraphResult<&Shape> {
        self.nodes
            .get(id)
            .map(|n| &n.shape)
            .ok_or(GraphError::UnknownNode(id))
    }

    /// Declare the graph's single input.
    pub fn input(&mut self, shape: Shape) -> GraphResult<NodeId> {
        if self.input.is_some() {
            return Err(GraphError::InvalidConfig("graph already has an input node".into()));
        }
        let id = self.push_node(Op::Input { shape }, &[])?;
        self.input = Some(id);
        Ok(id)
    }

    /// Append an operator applied to `inputs`.
    pub fn push(&mut self, op: Op, inputs: &[NodeId]) -> GraphResult<NodeId> {
        if op.kind() == OpKind::Input {
            return Err(GraphError::InvalidConfig(
                "input nodes are declared with GraphBuilder::input".into(),
            ));
        }
        self.push_node(op, inputs)
    }

    fn push_node(&mut self, op: Op, inputs: &[NodeId]) -> GraphResult<NodeId> {
        let shapes = inputs
            .iter()
            .map(|&i| self.shape(i))
            .collect::<GraphResult<Vec<_>>>()?;
        let shape = op.infer_shape(&shapes, self.format)?;

        let kind = op.kind();
        let counter = self.counters.entry(kind).or_insert(0);
        *counter += 1;
        let name = format!("{}_{}", kind.prefix(), counter);

        let id = self.nodes.len();
        self.nodes.push(Node {
            id,
            name,
            op,
            inputs: inputs.to_vec(),
            shape,
        });
        Ok(id)
    }

    // ─── Layer shorthands ───────────────────────────────────────────────────

    pub fn zero_pad(&mut self, x: NodeId, padding: (usize, usize)) -> GraphResult<NodeId> {
        self.push(Op::ZeroPad2d { padding }, &[x])
    }

    pub fn conv2d(&mut self, x: NodeId, spec: Conv2dSpec) -> GraphResult<NodeId> {
        self.push(Op::Conv2d(spec), &[x])
    }

    /// Batch normalization over the builder's channel axis.
    pub fn batch_norm(&mut self, x: NodeId) -> GraphResult<NodeId> {
        let axis = self.format.channel_axis();
        self.push(Op::BatchNorm(BatchNormSpec::new(axis)), &[x])
    }

    pub fn relu(&mut self, x: NodeId) -> GraphResult<NodeId> {
        self.push(Op::Activation { function: Activation::Relu }, &[x])
    }

    pub fn dropout(&mut self, x: NodeId, rate: f64) -> GraphResult<NodeId> {
        self.push(Op::Dropout { rate }, &[x])
    }

    pub fn add(&mut self, a: NodeId, b: NodeId) -> GraphResult<NodeId> {
        self.push(Op::Add, &[a, b])
    }

    pub fn avg_pool(&mut self, x: NodeId, pool: (usize, usize)) -> GraphResult<NodeId> {
        self.push(Op::AvgPool2d { pool }, &[x])
    }

    pub fn flatten(&mut self, x: NodeId) -> GraphResult<NodeId> {
        self.push(Op::Flatten, &[x])
    }

    pub fn dense(&mut self, x: NodeId, spec: DenseSpec) -> GraphResult<NodeId> {
        self.push(Op::Dense(spec), &[x])
    }

    /// Freeze the graph with `output` as its result node.
    pub fn finish(self, output: NodeId) -> GraphResult<Model> {
        let input = self
            .input
            .ok_or_else(|| GraphError::InvalidConfig("graph has no input node".into()))?;
        if output >= self.nodes.len() {
            return Err(GraphError::UnknownNode(output));
        }
        Ok(Model {
            format: self.format,
            nodes: self.nodes,
            input,
            output,
        })
    }
}

/// Immutable single-input, single-output network graph.
///
/// Only [`GraphBuilder::finish`] produces one; the JSON form is export-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Model {
    format: DataFormat,
    nodes: Vec<Node>,
    input: NodeId,
    output: NodeId,
}

impl Model {
    pub fn data_format(&self) -> DataFormat {
        self.format
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> GraphResult<&Node> {
        self.nodes.get(id).ok_or(GraphError::UnknownNode(id))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn input(&self) -> NodeId {
        self.input
    }

    pub fn output(&self) -> NodeId {
        self.output
    }

    pub fn input_shape(&self) -> &Shape {
        &self.nodes[self.input].shape
    }

    pub fn output_shape(&self) -> &Shape {
        &self.nodes[self.output].shape
    }

    /// Number of nodes of the given kind.
    pub fn count(&self, kind: OpKind) -> usize {
        self.nodes.iter().filter(|n| n.op.kind() == kind).count()
    }

    pub fn conv_count(&self) -> usize {
        self.count(OpKind::Conv2d)
    }

    /// Shapes feeding `node`, in input order.
    pub fn input_shapes(&self, node: &Node) -> Vec<&Shape> {
        node.inputs.iter().map(|&i| &self.nodes[i].shape).collect()
    }

    fn param_counts(&self) -> (usize, usize) {
        self.nodes.iter().fold((0, 0), |(total, trainable), node| {
            let (t, tr) = node.op.param_count(&self.input_shapes(node), self.format);
            (total.saturating_add(t), trainable.saturating_add(tr))
        })
    }

    /// Total number of weights, including batch-norm running statistics.
    pub fn param_count(&self) -> usize {
        self.param_counts().0
    }

    pub fn trainable_param_count(&self) -> usize {
        self.param_counts().1
    }

    /// Layer-by-layer table of names, shapes and weight counts.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(96);
        let _ = writeln!(
            out,
            "{:<40}{:<20}{:>10}  {}",
            "Layer (type)", "Output Shape", "Param #", "Connected to"
        );
        let _ = writeln!(out, "{}", rule);
        for node in &self.nodes {
            let (params, _) = node.op.param_count(&self.input_shapes(node), self.format);
            let sources: Vec<&str> = node
                .inputs
                .iter()
                .map(|&i| self.nodes[i].name.as_str())
                .collect();
            let _ = writeln!(
                out,
                "{:<40}{:<20}{:>10}  {}",
                format!("{} ({})", node.name, node.op.kind()),
                node.shape.to_string(),
                params,
                sources.join(", ")
            );
        }
        let (total, trainable) = self.param_counts();
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "Total params: {}", total);
        let _ = writeln!(out, "Trainable params: {}", trainable);
        let _ = writeln!(out, "Non-trainable params: {}", total - trainable);
        out
    }

    pub fn to_json(&self) -> GraphResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Evaluate the graph on `input` with the given backend.
    ///
    /// Nodes are visited in insertion order; each value is dropped once the
    /// last node consuming it has been evaluated.
    pub fn forward<B: Backend>(&self, backend: &mut B, input: B::Value) -> GraphResult<B::Value> {
        let mut last_use = vec![0usize; self.nodes.len()];
        for node in &self.nodes {
            for &i in &node.inputs {
                last_use[i] = node.id;
            }
        }
        last_use[self.output] = usize::MAX;

        let mut values: Vec<Option<B::Value>> = vec![None; self.nodes.len()];
        values[self.input] = Some(input);

        for node in &self.nodes {
            if node.id == self.input {
                continue;
            }
            let value = {
                let args = node
                    .inputs
                    .iter()
                    .map(|&i| values[i].as_ref().ok_or(GraphError::UnknownNode(i)))
                    .collect::<GraphResult<Vec<_>>>()?;
                backend.eval(node, &args)?
            };
            values[node.id] = Some(value);
            for &i in &node.inputs {
                if last_use[i] == node.id {
                    values[i] = None;
                }
            }
        }

        values[self.output]
            .take()
            .ok_or(GraphError::UnknownNode(self.output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::Padding;

    fn tiny() -> GraphResult<Model> {
        let mut g = GraphBuilder::new(DataFormat::ChannelsLast);
        let x = g.input(Shape::new(vec![8, 8, 3]))?;
        let c = g.conv2d(x, Conv2dSpec::new(4, (3, 3)).padding(Padding::Same))?;
        let r = g.relu(c)?;
        let s = g.add(c, r)?;
        let p = g.avg_pool(s, (8, 8))?;
        let f = g.flatten(p)?;
        let d = g.dense(f, DenseSpec::new(2, Activation::Softmax))?;
        g.finish(d)
    }

    #[test]
    fn test_builder_infers_shapes_and_names() {
        let m = tiny().unwrap();
        assert_eq!(m.len(), 7);
        assert_eq!(m.input_shape().dims(), &[8, 8, 3]);
        assert_eq!(m.output_shape().dims(), &[2]);
        assert_eq!(m.nodes()[1].name, "conv2d_1");
        assert_eq!(m.nodes()[3].inputs, vec![1, 2]);
    }

    #[test]
    fn test_second_input_rejected() {
        let mut g = GraphBuilder::new(DataFormat::ChannelsLast);
        g.input(Shape::new(vec![4, 4, 1])).unwrap();
        assert!(g.input(Shape::new(vec![4, 4, 1])).is_err());
        assert!(g.push(Op::Input { shape: Shape::new(vec![1]) }, &[]).is_err());
    }

    #[test]
    fn test_unknown_node() {
        let mut g = GraphBuilder::new(DataFormat::ChannelsLast);
        g.input(Shape::new(vec![4, 4, 1])).unwrap();
        assert!(matches!(g.relu(5), Err(GraphError::UnknownNode(5))));
        assert!(matches!(g.finish(9), Err(GraphError::UnknownNode(9))));
    }

    #[test]
    fn test_finish_without_input() {
        let g = GraphBuilder::new(DataFormat::ChannelsLast);
        assert!(matches!(g.finish(0), Err(GraphError::InvalidConfig(_))));
    }

    #[test]
    fn test_params_and_summary() {
        let m = tiny().unwrap();
        // conv 3*3*3*4 + 4, dense 4*2 + 2
        assert_eq!(m.param_count(), 112 + 10);
        assert_eq!(m.trainable_param_count(), 122);
        let summary = m.summary();
        assert!(summary.contains("conv2d_1 (Conv2D)"));
        assert!(summary.contains("Total params: 122"));
    }

    #[test]
    fn test_json_export() {
        let m = tiny().unwrap();
        let v: serde_json::Value = serde_json::from_str(&m.to_json().unwrap()).unwrap();
        assert_eq!(v["format"], "channels_last");
        assert_eq!(v["nodes"].as_array().unwrap().len(), 7);
        assert_eq!(v["nodes"][1]["name"], "conv2d_1");
        assert_eq!(v["nodes"][1]["op"]["op"], "conv2d");
        assert_eq!(v["nodes"][3]["inputs"], serde_json::json!([1, 2]));
        assert_eq!(v["nodes"][6]["shape"], serde_json::json!([2]));
        assert_eq!(v["input"], 0);
        assert_eq!(v["output"], 6);
    }
}
