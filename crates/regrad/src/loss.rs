// Loss: graph-level cost functions

use regrad_core::{Graph, NodeId, Result};

/// Mean Squared Error: `mean((hypothesis − target)²)`
///
/// Appends the cost nodes to `graph` and returns the scalar cost node.
/// Both operands must have the same shape (or one of them be scalar).
///
/// # Example
/// ```ignore
/// let cost = mse(&mut graph, hypothesis, y)?;
/// let grads = backward(&graph, cost, |id| values.get(&id))?;
/// ```
pub fn mse(graph: &mut Graph, hypothesis: NodeId, target: NodeId) -> Result<NodeId> {
    let diff = graph.sub(hypothesis, target)?;
    let sq = graph.square(diff)?;
    graph.mean(sq)
}
