// Execution engines: evaluate a graph and its gradients
//
// An engine is bound to one root node (the cost) of one graph. Each training
// iteration calls:
//
//   forward(&graph)   → cost
//   backward(&graph)  → gradients of the cost
//   reset()           → drop intermediates before parameters change
//
// Two strategies implement the same contract:
//
//   Interpreter   walks the topological order on every pass and keeps
//                 values in a map keyed by NodeId
//   TapeMachine   compiles the reachable subgraph once into a flat
//                 instruction tape with pre-resolved buffer slots
//
// Both evaluate with the same Value kernels, differentiate with the same
// rules and visit nodes in the same order, so their results are identical
// to the last bit.

mod interpreter;
pub mod tape;
mod train;

pub use interpreter::Interpreter;
pub use tape::{CompileStats, Instruction, TapeMachine};
pub use train::{CostLog, TrainResult, Trainer};

use std::fmt;

use regrad_core::{bail, Error, GradStore, Graph, NodeId, Result, Value};

use crate::config::ExecutionMode;

/// A strategy for running forward and backward passes over a graph.
pub trait Engine: fmt::Debug {
    fn mode(&self) -> ExecutionMode;

    /// Evaluate every node the root depends on and return the root's value.
    fn forward(&mut self, graph: &Graph) -> Result<f64>;

    /// Gradients of the root with respect to every node it depends on.
    ///
    /// Fails if no forward pass has run since construction or the last
    /// [`reset`](Engine::reset).
    fn backward(&mut self, graph: &Graph) -> Result<GradStore>;

    /// Drop every intermediate value. Leaves are reloaded on the next forward.
    fn reset(&mut self);

    /// Value of a node from the most recent forward pass.
    fn value(&self, id: NodeId) -> Option<&Value>;
}

/// Create the engine for `mode`, bound to `root` of `graph`.
pub fn engine_for(mode: ExecutionMode, graph: &Graph, root: NodeId) -> Result<Box<dyn Engine>> {
    Ok(match mode {
        ExecutionMode::Tape => Box::new(TapeMachine::compile(graph, root)?),
        ExecutionMode::Interpreted => Box::new(Interpreter::new(graph, root)?),
    })
}

/// The root of a training graph must reduce to a single number.
fn check_scalar_root(graph: &Graph, root: NodeId) -> Result<()> {
    let node = graph.node(root)?;
    if !node.shape().is_scalar() {
        bail!(
            "root {} ({}) must be scalar, got shape {}",
            root,
            node.name(),
            node.shape()
        );
    }
    Ok(())
}

/// Value bound to a leaf node.
fn leaf_value(graph: &Graph, id: NodeId) -> Result<Value> {
    let node = graph.node(id)?;
    node.binding().cloned().ok_or_else(|| Error::MissingValue {
        id,
        name: node.name().to_string(),
    })
}

fn backward_before_forward() -> Error {
    Error::msg("backward() called before forward(); run a forward pass first")
}
