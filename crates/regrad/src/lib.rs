//! # regrad
//!
//! Linear and logistic regression fitted by reverse-mode automatic
//! differentiation over an expression graph.
//!
//! This is the top-level facade crate that re-exports everything you need.
//!
//! ## Usage
//!
//! ```ignore
//! use regrad::prelude::*;
//!
//! let hours = [0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0, 4.5, 5.0];
//! let passed = [0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 1.0, 1.0];
//! let thetas = fit_logistic(&[hours], &passed, &FitOptions::default())?;
//! ```
//!
//! ## Architecture
//!
//! | Crate | Purpose |
//! |-------|----------|
//! | `regrad-core` | Error, Shape, Value, expression Graph, backpropagation |
//! | `regrad-optim` | Optimizer trait, vanilla / Adam / AdaGrad solvers |
//! | `regrad-data` | CSV column loading by header name |
//!
//! ## Modules
//!
//! - [`config`]: fit options and execution mode
//! - [`context`]: execution context and its scoped guard
//! - [`model`]: regression graphs and fitted models
//! - [`loss`]: graph-level cost functions
//! - [`exec`]: tape and interpreted engines, the training loop
//! - [`regression`]: `fit`, `fit_linear`, `fit_logistic`

/// Re-export core types.
pub use regrad_core::{
    backward, bail, Context, Error, ErrorKind, GradStore, Graph, NodeId, Result, Shape, Value,
};

/// Re-export optimizers.
pub mod optim {
    pub use regrad_optim::*;
}

/// Re-export the data loader.
pub mod data {
    pub use regrad_data::*;
}

pub mod config;
pub mod context;
pub mod exec;
pub mod loss;
pub mod model;
pub mod regression;

pub use config::{ExecutionMode, FitOptions};
pub use context::{ContextGuard, ExecutionContext, MAX_ACCELERATORS};
pub use model::{FittedModel, LogisticLink, ModelKind, RegressionGraph};
pub use regression::{fit, fit_linear, fit_logistic, FitReport};

/// Convenient imports for fitting models.
pub mod prelude {
    pub use crate::config::{ExecutionMode, FitOptions};
    pub use crate::context::ExecutionContext;
    pub use crate::exec::{Engine, TrainResult, Trainer};
    pub use crate::model::{FittedModel, LogisticLink, ModelKind, RegressionGraph};
    pub use crate::regression::{fit, fit_linear, fit_logistic, FitReport};
    pub use crate::{Error, ErrorKind, Result};
    pub use regrad_data::{read_columns, ColumnSpec};
    pub use regrad_optim::{Optimizer, SolverKind};
}
