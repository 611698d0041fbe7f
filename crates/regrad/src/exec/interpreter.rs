// Interpreter: evaluate the graph by walking it
//
// Every forward pass recomputes the topological order from the root, then
// dispatches each node's Op to the matching Value kernel and stores the
// result in a HashMap keyed by NodeId. Backward hands that map to the
// generic reverse-mode pass in regrad-core.
//
// Nothing is cached between passes, so the graph may be inspected or
// modified (new nodes, new parameter values) freely in between.

use std::collections::HashMap;

use regrad_core::{backward, Error, GradStore, Graph, NodeId, Op, Result, Value};

use super::{backward_before_forward, check_scalar_root, leaf_value, Engine};
use crate::config::ExecutionMode;

/// Engine that re-interprets the graph on every pass.
#[derive(Debug, Clone)]
pub struct Interpreter {
    root: NodeId,
    values: HashMap<NodeId, Value>,
    evaluated: bool,
}

impl Interpreter {
    pub fn new(graph: &Graph, root: NodeId) -> Result<Self> {
        check_scalar_root(graph, root)?;
        Ok(Self {
            root,
            values: HashMap::new(),
            evaluated: false,
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn operand<'a>(&'a self, graph: &Graph, id: NodeId) -> Result<&'a Value> {
        self.values.get(&id).ok_or_else(|| Error::MissingValue {
            id,
            name: graph
                .node(id)
                .map(|n| n.name().to_string())
                .unwrap_or_default(),
        })
    }

    fn execute_node(&self, graph: &Graph, id: NodeId) -> Result<Value> {
        match graph.node(id)?.op() {
            Op::Parameter | Op::Data => leaf_value(graph, id),
            Op::Const(c) => Ok(Value::Scalar(*c)),
            Op::Binary { lhs, rhs, op } => self
                .operand(graph, *lhs)?
                .binary(self.operand(graph, *rhs)?, *op),
            Op::Unary { input, op } => Ok(self.operand(graph, *input)?.unary(*op)),
            Op::Mean { input } => Ok(self.operand(graph, *input)?.mean_all()),
        }
    }
}

impl Engine for Interpreter {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Interpreted
    }

    fn forward(&mut self, graph: &Graph) -> Result<f64> {
        self.values.clear();
        self.evaluated = false;

        for id in graph.topo_order(self.root)? {
            let value = self.execute_node(graph, id)?;
            self.values.insert(id, value);
        }

        self.evaluated = true;
        self.operand(graph, self.root)?.to_scalar()
    }

    fn backward(&mut self, graph: &Graph) -> Result<GradStore> {
        if !self.evaluated {
            return Err(backward_before_forward());
        }
        backward(graph, self.root, |id| self.values.get(&id))
    }

    fn reset(&mut self) {
        self.values.clear();
        self.evaluated = false;
    }

    fn value(&self, id: NodeId) -> Option<&Value> {
        self.values.get(&id)
    }
}
