// Regression entry points
//
// fit() runs one complete training call:
//
//   validate options → build optimizer → enter execution context →
//   build graph + cost → pick engine → train → snapshot model
//
// Every configuration problem is caught before the graph exists. The
// execution context guard is held for the whole call and released on every
// exit path. Each call owns its graph, engine and optimizer, so concurrent
// calls from different threads never share state.

use regrad_core::Result;

use crate::config::FitOptions;
use crate::exec::{engine_for, TrainResult, Trainer};
use crate::model::{check_columns, FittedModel, ModelKind, RegressionGraph};

/// Everything a fit produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    pub model: FittedModel,
    pub training: TrainResult,
}

impl FitReport {
    /// Fitted parameters, bias first.
    pub fn parameters(&self) -> &[f64] {
        &self.model.parameters
    }
}

/// Fit a model of `kind` to column-major `features` and `target`.
///
/// `features` holds one slice per input feature, each as long as `target`.
pub fn fit<F: AsRef<[f64]>>(
    kind: ModelKind,
    features: &[F],
    target: &[f64],
    options: &FitOptions,
) -> Result<FitReport> {
    options.validate()?;
    let solver = options.solver_for(kind);
    let optimizer = solver.build(features.len() + 1, options.learning_rate, options.momentum)?;
    check_columns(features, target)?;

    let _guard = options.context.acquire()?;

    let mut model = RegressionGraph::build(kind, features, target, options.link)?;
    let engine = engine_for(options.execution_mode, model.graph(), model.cost())?;
    let mut trainer =
        Trainer::new(engine, optimizer, options.iterations).record_every(options.record_every);

    let training = trainer.train(&mut model).map_err(|e| {
        log::warn!("{kind} fit failed: {e}");
        e
    })?;
    let model = model.to_fitted()?;

    Ok(FitReport { model, training })
}

/// Fit `θ₀ + Σ θᵢ·xᵢ` and return `[θ₀, θ₁, …, θₙ]`.
///
/// Uses Adam unless `options` names another solver.
///
/// # Example
/// ```ignore
/// let x = [1.0, 2.0, 3.0, 4.0, 5.0];
/// let y = [5.0, 8.0, 11.0, 14.0, 17.0];
/// let thetas = fit_linear(&[x], &y, &FitOptions::default())?;
/// ```
pub fn fit_linear<F: AsRef<[f64]>>(
    features: &[F],
    target: &[f64],
    options: &FitOptions,
) -> Result<Vec<f64>> {
    Ok(fit(ModelKind::Linear, features, target, options)?
        .model
        .parameters)
}

/// Fit the logistic model and return `[θ₀, θ₁, …, θₙ]`.
///
/// Uses vanilla gradient descent unless `options` names another solver.
pub fn fit_logistic<F: AsRef<[f64]>>(
    features: &[F],
    target: &[f64],
    options: &FitOptions,
) -> Result<Vec<f64>> {
    Ok(fit(ModelKind::Logistic, features, target, options)?
        .model
        .parameters)
}
