use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use regrad_core::{Error, Result};

use crate::{AdaGrad, Adam, Sgd};

/// A step rule that turns gradients into parameter updates.
///
/// Implementations own whatever per-parameter state they need. That state is
/// sized once, at construction, to the number of parameters, and every call to
/// [`step`](Optimizer::step) must pass slices of exactly that length.
pub trait Optimizer {
    /// Update `params` in place from `grads`.
    ///
    /// # Returns
    /// A shape error, with `params` untouched, if the slice lengths do not
    /// match each other or the optimizer state.
    fn step(&mut self, params: &mut [f64], grads: &[f64]) -> Result<()>;

    /// The learning rate used by every step.
    fn learning_rate(&self) -> f64;

    /// Number of parameters the state was allocated for.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short solver name, used in logs.
    fn name(&self) -> &'static str;

    /// Snapshot of the internal state.
    fn state(&self) -> OptimizerState;
}

/// Reject a step whose slices disagree with each other or with the state.
pub(crate) fn check_lengths(state_len: usize, params: &[f64], grads: &[f64]) -> Result<()> {
    if params.len() != state_len {
        return Err(Error::LengthMismatch {
            what: "parameters",
            expected: state_len,
            got: params.len(),
        });
    }
    if grads.len() != state_len {
        return Err(Error::LengthMismatch {
            what: "gradients",
            expected: state_len,
            got: grads.len(),
        });
    }
    Ok(())
}

/// Inspectable copy of an optimizer's internal state.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerState {
    /// Solver name, e.g. "adam".
    pub optimizer_type: String,
    /// Scalar hyperparameters and counters ("lr", "t", ...).
    pub scalars: HashMap<String, f64>,
    /// Per-parameter buffers ("m", "v", ...).
    pub buffers: HashMap<String, Vec<f64>>,
}

impl OptimizerState {
    pub fn new(optimizer_type: impl Into<String>) -> Self {
        Self {
            optimizer_type: optimizer_type.into(),
            scalars: HashMap::new(),
            buffers: HashMap::new(),
        }
    }

    pub fn set_scalar(&mut self, key: impl Into<String>, value: f64) {
        self.scalars.insert(key.into(), value);
    }

    pub fn set_buffer(&mut self, key: impl Into<String>, data: Vec<f64>) {
        self.buffers.insert(key.into(), data);
    }

    pub fn scalar(&self, key: &str) -> Option<f64> {
        self.scalars.get(key).copied()
    }

    pub fn buffer(&self, key: &str) -> Option<&[f64]> {
        self.buffers.get(key).map(Vec::as_slice)
    }
}

/// The built-in solvers, selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolverKind {
    /// `θ ← θ − rate · grad` (optionally with momentum).
    Vanilla,
    /// Bias-corrected adaptive moment estimation.
    Adam,
    /// Per-parameter rate scaled by accumulated squared gradients.
    AdaGrad,
}

impl SolverKind {
    pub const ALL: [SolverKind; 3] = [SolverKind::Vanilla, SolverKind::Adam, SolverKind::AdaGrad];

    pub fn name(self) -> &'static str {
        match self {
            SolverKind::Vanilla => "vanilla",
            SolverKind::Adam => "adam",
            SolverKind::AdaGrad => "adagrad",
        }
    }

    /// Allocate a solver for `len` parameters.
    ///
    /// `momentum` is only meaningful for [`SolverKind::Vanilla`]; passing it
    /// to another solver is a configuration error.
    pub fn build(
        self,
        len: usize,
        learning_rate: f64,
        momentum: Option<f64>,
    ) -> Result<Box<dyn Optimizer>> {
        validate_learning_rate(learning_rate)?;
        let optimizer: Box<dyn Optimizer> = match (self, momentum) {
            (SolverKind::Vanilla, None) => Box::new(Sgd::new(len, learning_rate)),
            (SolverKind::Vanilla, Some(m)) => {
                validate_momentum(m)?;
                Box::new(Sgd::new(len, learning_rate).momentum(m))
            }
            (SolverKind::Adam, None) => Box::new(Adam::new(len, learning_rate)),
            (SolverKind::AdaGrad, None) => Box::new(AdaGrad::new(len, learning_rate)),
            (other, Some(_)) => {
                return Err(Error::config(format!(
                    "momentum only applies to the vanilla solver, not '{other}'"
                )))
            }
        };
        log::debug!(
            "built {} solver for {len} parameters (lr = {learning_rate})",
            optimizer.name()
        );
        Ok(optimizer)
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SolverKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vanilla" | "sgd" => Ok(SolverKind::Vanilla),
            "adam" => Ok(SolverKind::Adam),
            "adagrad" => Ok(SolverKind::AdaGrad),
            other => Err(Error::config(format!(
                "unknown solver '{other}'. Supported: vanilla, adam, adagrad"
            ))),
        }
    }
}

/// The learning rate must be a positive finite number.
pub fn validate_learning_rate(rate: f64) -> Result<()> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(Error::config(format!(
            "learning rate must be positive and finite, got {rate}"
        )));
    }
    Ok(())
}

/// Momentum must lie in [0, 1).
pub fn validate_momentum(momentum: f64) -> Result<()> {
    if !(0.0..1.0).contains(&momentum) {
        return Err(Error::config(format!(
            "momentum must be in [0, 1), got {momentum}"
        )));
    }
    Ok(())
}
