// Graph: arena of expression nodes
//
// Nodes are appended to a Vec and addressed by NodeId. An operation can only
// refer to nodes that already exist, so:
//
//   - the graph is acyclic by construction, and
//   - arena order is a topological order (operands before users).
//
// Shapes are inferred when a node is created. Malformed operations (unknown
// operand, incompatible shapes) are rejected right there, which means an
// engine never sees a graph it cannot evaluate.
//
// Leaves hold their value in `binding`: parameters hold a mutable scalar,
// data leaves hold an immutable shared column. Operation nodes never hold a
// value; engines keep intermediate results in their own buffers.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::op::{BinaryOp, NodeId, Op, UnaryOp};
use crate::shape::Shape;
use crate::value::Value;

/// A single node of a [`Graph`].
#[derive(Debug, Clone)]
pub struct Node {
    op: Op,
    name: String,
    shape: Shape,
    binding: Option<Value>,
}

impl Node {
    pub fn op(&self) -> &Op {
        &self.op
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// The bound value of a leaf (`None` for operation nodes).
    pub fn binding(&self) -> Option<&Value> {
        self.binding.as_ref()
    }
}

/// A directed acyclic expression graph.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node, failing if the id was not issued by this graph.
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id.0).ok_or(Error::UnknownNode {
            id,
            len: self.nodes.len(),
        })
    }

    /// All nodes in arena (topological) order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Rename a node. Names are for diagnostics only.
    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) -> Result<()> {
        self.node(id)?;
        self.nodes[id.0].name = name.into();
        Ok(())
    }

    fn push(&mut self, op: Op, name: String, shape: Shape, binding: Option<Value>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            op,
            name,
            shape,
            binding,
        });
        id
    }

    // Leaves

    /// Add a trainable scalar leaf with an initial value.
    pub fn parameter(&mut self, name: impl Into<String>, init: f64) -> NodeId {
        self.push(
            Op::Parameter,
            name.into(),
            Shape::Scalar,
            Some(Value::Scalar(init)),
        )
    }

    /// Add a read-only vector leaf bound to `values`.
    pub fn data(&mut self, name: impl Into<String>, values: impl Into<Arc<[f64]>>) -> Result<NodeId> {
        let values: Arc<[f64]> = values.into();
        if values.is_empty() {
            return Err(Error::Empty("data column"));
        }
        let shape = Shape::Vector(values.len());
        Ok(self.push(Op::Data, name.into(), shape, Some(Value::Vector(values))))
    }

    /// Add a scalar constant.
    pub fn constant(&mut self, value: f64) -> NodeId {
        self.push(Op::Const(value), format!("{value}"), Shape::Scalar, None)
    }

    // Operations

    pub fn binary(&mut self, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> Result<NodeId> {
        let lhs_shape = self.node(lhs)?.shape;
        let rhs_shape = self.node(rhs)?.shape;
        let shape = lhs_shape.broadcast(&rhs_shape)?;
        let name = format!(
            "({} {} {})",
            self.nodes[lhs.0].name,
            op.symbol(),
            self.nodes[rhs.0].name
        );
        Ok(self.push(Op::Binary { lhs, rhs, op }, name, shape, None))
    }

    pub fn unary(&mut self, op: UnaryOp, input: NodeId) -> Result<NodeId> {
        let shape = self.node(input)?.shape;
        let name = format!("{}({})", op.name(), self.nodes[input.0].name);
        Ok(self.push(Op::Unary { input, op }, name, shape, None))
    }

    pub fn add(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId> {
        self.binary(BinaryOp::Add, lhs, rhs)
    }

    pub fn sub(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId> {
        self.binary(BinaryOp::Sub, lhs, rhs)
    }

    pub fn mul(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId> {
        self.binary(BinaryOp::Mul, lhs, rhs)
    }

    pub fn div(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId> {
        self.binary(BinaryOp::Div, lhs, rhs)
    }

    pub fn exp(&mut self, input: NodeId) -> Result<NodeId> {
        self.unary(UnaryOp::Exp, input)
    }

    pub fn neg(&mut self, input: NodeId) -> Result<NodeId> {
        self.unary(UnaryOp::Neg, input)
    }

    pub fn square(&mut self, input: NodeId) -> Result<NodeId> {
        self.unary(UnaryOp::Square, input)
    }

    /// Mean over every element of `input`, producing a scalar.
    pub fn mean(&mut self, input: NodeId) -> Result<NodeId> {
        let name = format!("mean({})", self.node(input)?.name);
        Ok(self.push(Op::Mean { input }, name, Shape::Scalar, None))
    }

    // Parameters

    /// Parameter leaves in creation order.
    pub fn parameters(&self) -> Vec<NodeId> {
        self.nodes()
            .filter(|(_, n)| matches!(n.op, Op::Parameter))
            .map(|(id, _)| id)
            .collect()
    }

    fn parameter_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        let node = self.node(id)?;
        if !matches!(node.op, Op::Parameter) {
            return Err(Error::msg(format!(
                "node {id} ({}) is not a parameter",
                node.name
            )));
        }
        Ok(&mut self.nodes[id.0])
    }

    /// Current value of a parameter leaf.
    pub fn parameter_value(&self, id: NodeId) -> Result<f64> {
        let node = self.node(id)?;
        match (&node.op, &node.binding) {
            (Op::Parameter, Some(v)) => v.to_scalar(),
            _ => Err(Error::msg(format!(
                "node {id} ({}) is not a parameter",
                node.name
            ))),
        }
    }

    /// Overwrite the value of a parameter leaf.
    pub fn set_parameter(&mut self, id: NodeId, value: f64) -> Result<()> {
        self.parameter_mut(id)?.binding = Some(Value::Scalar(value));
        Ok(())
    }

    // Traversal

    /// Every node `root` depends on (including itself), in topological order.
    ///
    /// Operands always precede their users in the arena, so a single
    /// backwards sweep from `root` marks everything reachable.
    pub fn topo_order(&self, root: NodeId) -> Result<Vec<NodeId>> {
        self.node(root)?;
        let mut reachable = vec![false; root.0 + 1];
        reachable[root.0] = true;
        for i in (0..=root.0).rev() {
            if !reachable[i] {
                continue;
            }
            for input in self.nodes[i].op.inputs() {
                reachable[input.0] = true;
            }
        }
        Ok(reachable
            .iter()
            .enumerate()
            .filter(|(_, r)| **r)
            .map(|(i, _)| NodeId(i))
            .collect())
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, node) in self.nodes() {
            let kind = match &node.op {
                Op::Parameter => "param".to_string(),
                Op::Data => "data".to_string(),
                Op::Const(v) => format!("const {v}"),
                Op::Binary { lhs, rhs, op } => format!("{lhs} {} {rhs}", op.symbol()),
                Op::Unary { input, op } => format!("{}({input})", op.name()),
                Op::Mean { input } => format!("mean({input})"),
            };
            writeln!(f, "{id:>5} {:<8} {kind:<20} {}", node.shape, node.name)?;
        }
        Ok(())
    }
}
