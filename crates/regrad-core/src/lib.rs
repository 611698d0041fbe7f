//! # regrad-core
//!
//! Expression graph, values and reverse-mode autodiff for regrad.
//!
//! This crate provides:
//! - [`Graph`]: arena of expression nodes addressed by [`NodeId`]
//! - [`Op`]: the operation recorded on each node
//! - [`Value`] / [`Shape`]: scalar and vector runtime values
//! - [`backward`] / [`GradStore`]: reverse-mode differentiation
//! - [`Error`]: the error type shared by every regrad crate

pub mod backprop;
pub mod error;
pub mod graph;
pub mod op;
pub mod shape;
pub mod value;

pub use backprop::{backward, GradStore};
pub use error::{Context, Error, ErrorKind, Result};
pub use graph::{Graph, Node};
pub use op::{BinaryOp, NodeId, Op, UnaryOp};
pub use shape::Shape;
pub use value::Value;
