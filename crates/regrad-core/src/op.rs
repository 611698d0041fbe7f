// Op: how a graph node was produced
//
// Every node in a Graph records its operation together with the ids of its
// operands. backward() reads these records in reverse topological order to
// apply the chain rule.
//
// Example: c = a + b
//   a.op = Op::Parameter
//   b.op = Op::Data
//   c.op = Op::Binary { lhs: a, rhs: b, op: BinaryOp::Add }
//
// Operands are stored as NodeIds (arena indices) rather than references.
// An operand always has a smaller id than the node that uses it, so the
// arena order is already a valid topological order.

use std::fmt;

/// Identifier of a node inside one [`Graph`](crate::Graph).
///
/// Ids are arena indices; they are only meaningful for the graph that
/// issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position of the node in its graph's arena.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Element-wise binary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }
}

/// Element-wise unary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Exp,
    Square,
}

impl UnaryOp {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            UnaryOp::Neg => -x,
            UnaryOp::Exp => x.exp(),
            UnaryOp::Square => x * x,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            UnaryOp::Neg => "neg",
            UnaryOp::Exp => "exp",
            UnaryOp::Square => "square",
        }
    }
}

/// Records the operation that produced a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Trainable scalar leaf. Its value lives in the node's binding.
    Parameter,

    /// Read-only leaf bound to a data column.
    Data,

    /// Scalar constant.
    Const(f64),

    /// Element-wise binary: result = op(lhs, rhs), with scalar broadcasting.
    Binary {
        lhs: NodeId,
        rhs: NodeId,
        op: BinaryOp,
    },

    /// Element-wise unary: result = op(input)
    Unary { input: NodeId, op: UnaryOp },

    /// Mean over every element, producing a scalar.
    Mean { input: NodeId },
}

impl Op {
    /// Operand ids in order (lhs before rhs).
    pub fn inputs(&self) -> Vec<NodeId> {
        match self {
            Op::Parameter | Op::Data | Op::Const(_) => vec![],
            Op::Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
            Op::Unary { input, .. } | Op::Mean { input } => vec![*input],
        }
    }

    /// Leaves carry a bound value instead of operands.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Op::Parameter | Op::Data)
    }
}
