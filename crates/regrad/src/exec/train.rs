// Trainer: fixed-budget gradient descent over a regression graph
//
// Each iteration runs, strictly in order:
//   1. forward pass          → cost
//   2. backward pass         → gradient of every parameter
//   3. finite checks         (a NaN or infinite cost/gradient stops the run)
//   4. optimizer step        → new parameter values
//   5. write the values back into the parameter leaves
//   6. reset the engine's intermediates
//
// There is no convergence test; exactly `iterations` iterations run. Any
// failure stops the loop at once, wrapped with the iteration index and the
// stage that failed, and no parameters are returned.

use std::fmt;

use log::{debug, info, trace};
use regrad_core::{Context, Error, Result};
use regrad_optim::Optimizer;

use super::Engine;
use crate::model::RegressionGraph;

/// Cost observed at one recorded iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostLog {
    /// Iteration number (0-indexed).
    pub iteration: usize,
    /// Cost computed by that iteration's forward pass.
    pub cost: f64,
}

/// Summary of a full training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainResult {
    /// Final parameter values, bias first.
    pub parameters: Vec<f64>,
    /// Cost from the last forward pass (`None` when no iteration ran).
    pub final_cost: Option<f64>,
    /// Costs recorded every `record_every` iterations.
    pub history: Vec<CostLog>,
    /// Iterations actually run.
    pub iterations: usize,
}

impl fmt::Display for TrainResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Training complete: {} iterations", self.iterations)?;
        for log in &self.history {
            writeln!(f, "  iteration {}: cost = {:.6}", log.iteration, log.cost)?;
        }
        if let Some(cost) = self.final_cost {
            writeln!(f, "  final cost: {cost:.6}")?;
        }
        let thetas: Vec<String> = self
            .parameters
            .iter()
            .enumerate()
            .map(|(i, p)| format!("theta_{i} = {p:.4}"))
            .collect();
        write!(f, "  {}", thetas.join(", "))
    }
}

/// Runs the training loop for one [`RegressionGraph`].
pub struct Trainer {
    engine: Box<dyn Engine>,
    optimizer: Box<dyn Optimizer>,
    iterations: usize,
    record_every: usize,
}

impl Trainer {
    pub fn new(engine: Box<dyn Engine>, optimizer: Box<dyn Optimizer>, iterations: usize) -> Self {
        Self {
            engine,
            optimizer,
            iterations,
            record_every: 0,
        }
    }

    /// Record (and log at debug level) the cost every `every` iterations.
    pub fn record_every(mut self, every: usize) -> Self {
        self.record_every = every;
        self
    }

    /// Replace the optimizer. Its state must be sized like the current one.
    pub fn with_optimizer(mut self, optimizer: Box<dyn Optimizer>) -> Result<Self> {
        if optimizer.len() != self.optimizer.len() {
            return Err(Error::config(format!(
                "optimizer '{}' holds state for {} parameters, the model has {}",
                optimizer.name(),
                optimizer.len(),
                self.optimizer.len()
            )));
        }
        self.optimizer = optimizer;
        Ok(self)
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn optimizer(&self) -> &dyn Optimizer {
        self.optimizer.as_ref()
    }

    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    /// Run every iteration against `model`, updating its parameters in place.
    pub fn train(&mut self, model: &mut RegressionGraph) -> Result<TrainResult> {
        let params = model.parameters().to_vec();
        if self.optimizer.len() != params.len() {
            return Err(Error::config(format!(
                "optimizer '{}' holds state for {} parameters, the model has {}",
                self.optimizer.name(),
                self.optimizer.len(),
                params.len()
            )));
        }
        let mut values = model.parameter_values()?;

        info!(
            "training {} model: {} parameters, {} iterations, {} solver (lr = {}), {} engine",
            model.kind(),
            params.len(),
            self.iterations,
            self.optimizer.name(),
            self.optimizer.learning_rate(),
            self.engine.mode(),
        );

        let mut history = Vec::new();
        let mut final_cost = None;

        for i in 0..self.iterations {
            let cost = self
                .engine
                .forward(model.graph())
                .with_context(|| format!("iteration {i}: forward pass"))?;
            if !cost.is_finite() {
                return Err(Error::NonFinite {
                    what: "cost".to_string(),
                    value: cost,
                }
                .context(format!("iteration {i}: forward pass")));
            }

            let grads = self
                .engine
                .backward(model.graph())
                .and_then(|g| g.gather(&params))
                .with_context(|| format!("iteration {i}: backward pass"))?;
            if let Some((j, &g)) = grads.iter().enumerate().find(|(_, g)| !g.is_finite()) {
                return Err(Error::NonFinite {
                    what: format!("gradient of theta_{j}"),
                    value: g,
                }
                .context(format!("iteration {i}: backward pass")));
            }

            self.optimizer
                .step(&mut values, &grads)
                .with_context(|| format!("iteration {i}: optimizer step"))?;

            let graph = model.graph_mut();
            for (&id, &v) in params.iter().zip(&values) {
                graph
                    .set_parameter(id, v)
                    .with_context(|| format!("iteration {i}: parameter update"))?;
            }
            self.engine.reset();

            final_cost = Some(cost);
            if self.record_every > 0 && i % self.record_every == 0 {
                history.push(CostLog { iteration: i, cost });
                debug!("iteration {i}: cost = {cost:.6}");
            }
            trace!("iteration {i}: cost = {cost:.6}, parameters = {values:?}");
        }

        info!(
            "training finished after {} iterations, final cost {}",
            self.iterations,
            final_cost.map_or_else(|| "n/a".to_string(), |c| format!("{c:.6}"))
        );

        Ok(TrainResult {
            parameters: values,
            final_cost,
            history,
            iterations: self.iterations,
        })
    }
}

impl fmt::Debug for Trainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trainer")
            .field("engine", &self.engine.mode())
            .field("optimizer", &self.optimizer.name())
            .field("iterations", &self.iterations)
            .field("record_every", &self.record_every)
            .finish()
    }
}
