// Tape compilation: turn a graph into a flat instruction list
//
// The Interpreter re-derives everything on every pass:
//   - recomputes the topological order
//   - looks up each node and its operands in a HashMap
//   - matches on the node's Op
//
// The TapeMachine does that work once, at compile time:
//
//   compile(graph, root)
//     1. topological order of the nodes the root depends on
//     2. one buffer slot per node, in that order
//     3. one instruction per node, operands pre-resolved to slots
//
//   forward   run the tape front to back, filling slots
//   backward  run the tape back to front, applying the gradient rule of
//             each instruction and accumulating into operand slots
//
// Leaves are loaded from the graph on every forward pass, so parameter
// updates are picked up without recompiling. Adding nodes to the graph does
// require a recompile; the machine refuses to run on a graph whose node
// count changed.
//
// The backward replay visits slots in exactly the order backprop::backward
// visits nodes and calls the same rule functions, which is what makes the
// two engines agree bit for bit.

use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use regrad_core::backprop::{binary_grads, mean_grad, unary_grad};
use regrad_core::{
    bail, BinaryOp, Error, GradStore, Graph, NodeId, Op, Result, UnaryOp, Value,
};

use super::{backward_before_forward, check_scalar_root, leaf_value, Engine};
use crate::config::ExecutionMode;

/// A single operation of the compiled tape.
///
/// Operands and destinations are buffer slot indices; nothing is looked up
/// by node id while the tape runs, except the leaf being loaded.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Copy the bound value of a parameter or data leaf into `dst`.
    LoadLeaf { node: NodeId, dst: usize },
    Constant { value: f64, dst: usize },
    Unary { op: UnaryOp, src: usize, dst: usize },
    Binary {
        op: BinaryOp,
        lhs: usize,
        rhs: usize,
        dst: usize,
    },
    Mean { src: usize, dst: usize },
}

impl Instruction {
    pub fn dst(&self) -> usize {
        match *self {
            Instruction::LoadLeaf { dst, .. }
            | Instruction::Constant { dst, .. }
            | Instruction::Unary { dst, .. }
            | Instruction::Binary { dst, .. }
            | Instruction::Mean { dst, .. } => dst,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::LoadLeaf { node, dst } => write!(f, "s{dst} = load {node}"),
            Instruction::Constant { value, dst } => write!(f, "s{dst} = const {value}"),
            Instruction::Unary { op, src, dst } => write!(f, "s{dst} = {}(s{src})", op.name()),
            Instruction::Binary { op, lhs, rhs, dst } => {
                write!(f, "s{dst} = s{lhs} {} s{rhs}", op.symbol())
            }
            Instruction::Mean { src, dst } => write!(f, "s{dst} = mean(s{src})"),
        }
    }
}

/// Statistics from compiling a tape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileStats {
    /// Number of instructions on the tape.
    pub num_instructions: usize,
    /// Number of nodes in the source graph.
    pub num_source_nodes: usize,
    /// Number of buffer slots allocated.
    pub num_slots: usize,
    /// Number of leaf loads per pass.
    pub num_leaves: usize,
    /// Compilation time in microseconds.
    pub compile_time_us: u64,
}

impl fmt::Display for CompileStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tape: {} instructions ({} source nodes), {} slots, {} leaves, compiled in {}μs",
            self.num_instructions,
            self.num_source_nodes,
            self.num_slots,
            self.num_leaves,
            self.compile_time_us,
        )
    }
}

/// Engine that replays a pre-compiled instruction tape.
#[derive(Debug, Clone)]
pub struct TapeMachine {
    root: NodeId,
    root_slot: usize,
    instructions: Vec<Instruction>,
    /// Slot → node it holds.
    slot_nodes: Vec<NodeId>,
    node_to_slot: HashMap<NodeId, usize>,
    slots: Vec<Option<Value>>,
    evaluated: bool,
    stats: CompileStats,
}

impl TapeMachine {
    /// Compile the part of `graph` that `root` depends on.
    pub fn compile(graph: &Graph, root: NodeId) -> Result<Self> {
        let start = Instant::now();
        check_scalar_root(graph, root)?;

        // 1. Topological order, computed once
        let order = graph.topo_order(root)?;

        // 2. One slot per node
        let node_to_slot: HashMap<NodeId, usize> =
            order.iter().enumerate().map(|(slot, &id)| (id, slot)).collect();
        let slot_of = |id: NodeId| -> Result<usize> {
            node_to_slot.get(&id).copied().ok_or_else(|| {
                Error::msg(format!("operand {id} was not scheduled before its user"))
            })
        };

        // 3. Instruction tape
        let mut instructions = Vec::with_capacity(order.len());
        let mut num_leaves = 0;
        for (dst, &id) in order.iter().enumerate() {
            let instr = match graph.node(id)?.op() {
                Op::Parameter | Op::Data => {
                    num_leaves += 1;
                    Instruction::LoadLeaf { node: id, dst }
                }
                Op::Const(value) => Instruction::Constant { value: *value, dst },
                Op::Unary { input, op } => Instruction::Unary {
                    op: *op,
                    src: slot_of(*input)?,
                    dst,
                },
                Op::Binary { lhs, rhs, op } => Instruction::Binary {
                    op: *op,
                    lhs: slot_of(*lhs)?,
                    rhs: slot_of(*rhs)?,
                    dst,
                },
                Op::Mean { input } => Instruction::Mean {
                    src: slot_of(*input)?,
                    dst,
                },
            };
            instructions.push(instr);
        }

        let root_slot = slot_of(root)?;
        let stats = CompileStats {
            num_instructions: instructions.len(),
            num_source_nodes: graph.len(),
            num_slots: order.len(),
            num_leaves,
            compile_time_us: start.elapsed().as_micros() as u64,
        };
        log::debug!("{stats}");

        Ok(Self {
            root,
            root_slot,
            instructions,
            slots: vec![None; order.len()],
            slot_nodes: order,
            node_to_slot,
            evaluated: false,
            stats,
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn stats(&self) -> &CompileStats {
        &self.stats
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Human-readable listing of the tape.
    pub fn dump(&self) -> String {
        let mut out = format!("=== Tape for root {} ===\n", self.root);
        out.push_str(&format!("{}\n\n", self.stats));
        for (i, instr) in self.instructions.iter().enumerate() {
            out.push_str(&format!("  [{i:>3}] {instr}\n"));
        }
        out.push_str(&format!("\nOutput: s{}\n", self.root_slot));
        out
    }

    fn slot(&self, idx: usize) -> Result<&Value> {
        self.slots.get(idx).and_then(|s| s.as_ref()).ok_or_else(|| {
            Error::msg(format!(
                "buffer slot {idx} is empty (value was reset or never produced)"
            ))
        })
    }

    fn check_graph(&self, graph: &Graph) -> Result<()> {
        if graph.len() != self.stats.num_source_nodes {
            bail!(
                "graph has {} nodes but the tape was compiled for {}; recompile",
                graph.len(),
                self.stats.num_source_nodes
            );
        }
        Ok(())
    }
}

/// Add `grad` into the gradient slot `idx`.
fn accumulate(grads: &mut [Option<Value>], idx: usize, grad: Value) -> Result<()> {
    let merged = match grads[idx].take() {
        Some(existing) => existing.add(&grad)?,
        None => grad,
    };
    grads[idx] = Some(merged);
    Ok(())
}

impl Engine for TapeMachine {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Tape
    }

    fn forward(&mut self, graph: &Graph) -> Result<f64> {
        self.check_graph(graph)?;
        self.evaluated = false;

        for i in 0..self.instructions.len() {
            let value = match &self.instructions[i] {
                Instruction::LoadLeaf { node, .. } => leaf_value(graph, *node)?,
                Instruction::Constant { value, .. } => Value::Scalar(*value),
                Instruction::Unary { op, src, .. } => self.slot(*src)?.unary(*op),
                Instruction::Binary { op, lhs, rhs, .. } => {
                    self.slot(*lhs)?.binary(self.slot(*rhs)?, *op)?
                }
                Instruction::Mean { src, .. } => self.slot(*src)?.mean_all(),
            };
            let dst = self.instructions[i].dst();
            self.slots[dst] = Some(value);
        }

        self.evaluated = true;
        self.slot(self.root_slot)?.to_scalar()
    }

    fn backward(&mut self, graph: &Graph) -> Result<GradStore> {
        self.check_graph(graph)?;
        if !self.evaluated {
            return Err(backward_before_forward());
        }

        let mut grads: Vec<Option<Value>> = vec![None; self.slots.len()];
        grads[self.root_slot] = Some(Value::Scalar(1.0));

        for instr in self.instructions.iter().rev() {
            let dst = instr.dst();
            let grad = match &grads[dst] {
                Some(g) => g.clone(),
                None => continue,
            };
            match instr {
                Instruction::LoadLeaf { .. } | Instruction::Constant { .. } => {}
                Instruction::Binary { op, lhs, rhs, .. } => {
                    let (grad_lhs, grad_rhs) = binary_grads(
                        *op,
                        &grad,
                        self.slot(*lhs)?,
                        self.slot(*rhs)?,
                        self.slot(dst)?,
                    )?;
                    accumulate(&mut grads, *lhs, grad_lhs)?;
                    accumulate(&mut grads, *rhs, grad_rhs)?;
                }
                Instruction::Unary { op, src, .. } => {
                    let grad_src = unary_grad(*op, &grad, self.slot(*src)?, self.slot(dst)?)?;
                    accumulate(&mut grads, *src, grad_src)?;
                }
                Instruction::Mean { src, .. } => {
                    let grad_src = mean_grad(&grad, self.slot(*src)?.shape())?;
                    accumulate(&mut grads, *src, grad_src)?;
                }
            }
        }

        let mut store = GradStore::new();
        for (slot, grad) in grads.into_iter().enumerate() {
            if let Some(grad) = grad {
                store.accumulate(self.slot_nodes[slot], grad)?;
            }
        }
        Ok(store)
    }

    fn reset(&mut self) {
        for instr in &self.instructions {
            if !matches!(instr, Instruction::LoadLeaf { .. }) {
                self.slots[instr.dst()] = None;
            }
        }
        self.evaluated = false;
    }

    fn value(&self, id: NodeId) -> Option<&Value> {
        let slot = *self.node_to_slot.get(&id)?;
        self.slots.get(slot)?.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tape_has_one_instruction_per_reachable_node() {
        let mut g = Graph::new();
        let a = g.parameter("a", 3.0);
        let _unused = g.parameter("unused", 0.0);
        let x = g.data("x", vec![1.0, 2.0]).unwrap();
        let ax = g.mul(a, x).unwrap();
        let m = g.mean(ax).unwrap();

        let tape = TapeMachine::compile(&g, m).unwrap();
        assert_eq!(tape.stats().num_instructions, 4);
        assert_eq!(tape.stats().num_source_nodes, 5);
        assert_eq!(tape.stats().num_leaves, 2);
        assert_eq!(
            tape.instructions()[2],
            Instruction::Binary {
                op: BinaryOp::Mul,
                lhs: 0,
                rhs: 1,
                dst: 2
            }
        );
        assert!(tape.dump().contains("s3 = mean(s2)"));
    }

    #[test]
    fn forward_backward_and_reset() {
        let mut g = Graph::new();
        let a = g.parameter("a", 3.0);
        let x = g.data("x", vec![1.0, 2.0]).unwrap();
        let ax = g.mul(a, x).unwrap();
        let m = g.mean(ax).unwrap();

        let mut tape = TapeMachine::compile(&g, m).unwrap();
        assert!(tape.backward(&g).is_err());
        assert_eq!(tape.forward(&g).unwrap(), 4.5);
        let grads = tape.backward(&g).unwrap();
        assert_eq!(grads.scalar(a).unwrap(), 1.5);

        tape.reset();
        assert!(tape.value(m).is_none());
        assert!(tape.value(a).is_some());
        assert!(tape.backward(&g).is_err());
    }

    #[test]
    fn refuses_a_grown_graph() {
        let mut g = Graph::new();
        let a = g.parameter("a", 1.0);
        let sq = g.square(a).unwrap();
        let mut tape = TapeMachine::compile(&g, sq).unwrap();
        g.constant(5.0);
        assert!(tape.forward(&g).is_err());
    }
}
