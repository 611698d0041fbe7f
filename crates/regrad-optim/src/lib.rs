//! # regrad-optim
//!
//! Step rules that update regrad parameters from their gradients.
//!
//! - [`Sgd`]: vanilla gradient descent, optionally with momentum
//! - [`Adam`]: bias-corrected adaptive moments
//! - [`AdaGrad`]: accumulated squared-gradient scaling
//!
//! Every solver works on flat `f64` slices and is selected at runtime through
//! [`SolverKind`].

pub mod adagrad;
pub mod adam;
pub mod optimizer;
pub mod sgd;

pub use adagrad::AdaGrad;
pub use adam::Adam;
pub use optimizer::{
    validate_learning_rate, validate_momentum, Optimizer, OptimizerState, SolverKind,
};
pub use sgd::Sgd;
