// Backpropagation: reverse-mode automatic differentiation
//
// Computes the gradient of a scalar root (the cost) with respect to every
// node it depends on, given the values of a completed forward pass.
//
// HOW IT WORKS:
//
//   1. topo_order(root) lists the nodes the root depends on, operands first.
//   2. grad(root) = 1.0 (dL/dL = 1).
//   3. Walk the order in reverse. For each node that received a gradient,
//      apply the chain rule for its operation and accumulate the result
//      into its operands.
//
// GRADIENT RULES:
//
//   Add:     grad_a += g,        grad_b += g
//   Sub:     grad_a += g,        grad_b += -g
//   Mul:     grad_a += g * b,    grad_b += g * a
//   Div:     grad_a += g / b,    grad_b += -g * out / b
//   Neg:     grad_x += -g
//   Exp:     grad_x += g * out   (0 wherever g is 0, even if out overflowed)
//   Square:  grad_x += 2 * x * g
//   Mean:    grad_x += g / n     (repeated for each of the n elements)
//
// A scalar operand that was broadcast against a vector gets the SUM of the
// per-element contributions (see Value::sum_to).
//
// ACCUMULATION: a node used by several operations receives the sum of all
// contributions. With c = a * a, grad_a = g * a + g * a.
//
// The per-operation rules are public so that an engine with its own value
// storage (the tape machine) can replay them in the same order and get
// bit-identical results.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::op::{BinaryOp, NodeId, Op, UnaryOp};
use crate::shape::Shape;
use crate::value::Value;

/// Gradients produced by one backward pass, keyed by node.
#[derive(Debug, Clone, Default)]
pub struct GradStore {
    grads: HashMap<NodeId, Value>,
}

impl GradStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gradient of a node, if any gradient flowed to it.
    pub fn get(&self, id: NodeId) -> Option<&Value> {
        self.grads.get(&id)
    }

    /// Accumulate a gradient contribution. If the node already has a
    /// gradient, the new one is added to it.
    pub fn accumulate(&mut self, id: NodeId, grad: Value) -> Result<()> {
        let merged = match self.grads.get(&id) {
            Some(existing) => existing.add(&grad)?,
            None => grad,
        };
        self.grads.insert(id, merged);
        Ok(())
    }

    /// Scalar gradient of a parameter. Nodes the root does not depend on
    /// have gradient 0.
    pub fn scalar(&self, id: NodeId) -> Result<f64> {
        match self.grads.get(&id) {
            Some(g) => g.to_scalar(),
            None => Ok(0.0),
        }
    }

    /// Scalar gradients for `ids`, in the same order.
    pub fn gather(&self, ids: &[NodeId]) -> Result<Vec<f64>> {
        ids.iter().map(|&id| self.scalar(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.grads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grads.is_empty()
    }
}

/// Contributions of a binary operation to its (lhs, rhs) operands.
pub fn binary_grads(
    op: BinaryOp,
    grad: &Value,
    lhs: &Value,
    rhs: &Value,
    out: &Value,
) -> Result<(Value, Value)> {
    let (raw_lhs, raw_rhs) = match op {
        BinaryOp::Add => (grad.clone(), grad.clone()),
        BinaryOp::Sub => (grad.clone(), grad.neg()),
        BinaryOp::Mul => (grad.mul(rhs)?, grad.mul(lhs)?),
        BinaryOp::Div => (grad.div(rhs)?, grad.neg().mul(out)?.div(rhs)?),
    };
    Ok((
        raw_lhs.sum_to(lhs.shape())?,
        raw_rhs.sum_to(rhs.shape())?,
    ))
}

/// Contribution of a unary operation to its operand.
pub fn unary_grad(op: UnaryOp, grad: &Value, input: &Value, out: &Value) -> Result<Value> {
    match op {
        UnaryOp::Neg => Ok(grad.neg()),
        // exp(x) = inf with a zero upstream gradient must not become NaN
        UnaryOp::Exp => grad.zip_map(out, |g, o| if g == 0.0 { 0.0 } else { g * o }),
        UnaryOp::Square => input.map(|x| 2.0 * x).mul(grad),
    }
}

/// Contribution of a mean reduction to its operand of shape `input`.
pub fn mean_grad(grad: &Value, input: Shape) -> Result<Value> {
    let n = input.elem_count() as f64;
    Value::Scalar(grad.to_scalar()? / n).broadcast_to(input)
}

/// Compute gradients of `root` with respect to every node it depends on.
///
/// `value_of` returns the forward value of a node; every node reachable
/// from `root` must have one. `root` must be scalar.
pub fn backward<'a, F>(graph: &Graph, root: NodeId, value_of: F) -> Result<GradStore>
where
    F: Fn(NodeId) -> Option<&'a Value>,
{
    let root_node = graph.node(root)?;
    if !root_node.shape().is_scalar() {
        return Err(Error::msg(format!(
            "backward() requires a scalar root, but {} has shape {}",
            root_node.name(),
            root_node.shape()
        )));
    }

    let value = |id: NodeId| -> Result<&'a Value> {
        value_of(id).ok_or_else(|| Error::MissingValue {
            id,
            name: graph
                .node(id)
                .map(|n| n.name().to_string())
                .unwrap_or_default(),
        })
    };

    let order = graph.topo_order(root)?;
    let mut grads = GradStore::new();
    grads.grads.insert(root, Value::Scalar(1.0));

    for &id in order.iter().rev() {
        let grad = match grads.get(id) {
            Some(g) => g.clone(),
            None => continue,
        };

        match graph.node(id)?.op() {
            Op::Parameter | Op::Data | Op::Const(_) => {}

            Op::Binary { lhs, rhs, op } => {
                let (grad_lhs, grad_rhs) =
                    binary_grads(*op, &grad, value(*lhs)?, value(*rhs)?, value(id)?)?;
                grads.accumulate(*lhs, grad_lhs)?;
                grads.accumulate(*rhs, grad_rhs)?;
            }

            Op::Unary { input, op } => {
                let grad_input = unary_grad(*op, &grad, value(*input)?, value(id)?)?;
                grads.accumulate(*input, grad_input)?;
            }

            Op::Mean { input } => {
                let grad_input = mean_grad(&grad, graph.node(*input)?.shape())?;
                grads.accumulate(*input, grad_input)?;
            }
        }
    }

    Ok(grads)
}
