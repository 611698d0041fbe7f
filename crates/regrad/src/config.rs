// FitOptions: everything a training call can be told
//
// Options are a plain struct with documented defaults and consuming builder
// methods. They can also be set from string key/value pairs (for demos,
// command lines and config files), in which case unknown keys and values
// that do not parse are configuration errors. validate() checks the whole
// set eagerly so that a bad option never reaches graph construction.

use std::fmt;
use std::str::FromStr;

use regrad_core::{Error, Result};
use regrad_optim::{validate_learning_rate, validate_momentum, SolverKind};

use crate::context::ExecutionContext;
use crate::model::{LogisticLink, ModelKind};

/// How the graph is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExecutionMode {
    /// Compile once into a flat instruction tape, replay every iteration.
    #[default]
    Tape,
    /// Walk the graph afresh on every pass.
    Interpreted,
}

impl ExecutionMode {
    pub fn name(self) -> &'static str {
        match self {
            ExecutionMode::Tape => "tape",
            ExecutionMode::Interpreted => "interpreted",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExecutionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tape" | "compiled" => Ok(ExecutionMode::Tape),
            "interpreted" | "interpreter" => Ok(ExecutionMode::Interpreted),
            other => Err(Error::config(format!(
                "unknown execution mode '{other}'. Supported: tape, interpreted"
            ))),
        }
    }
}

/// Options for a single fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    /// Training iterations to run; there is no early stop (default: 10000).
    pub iterations: usize,
    /// Step rule. `None` picks the model's default: Adam for linear,
    /// vanilla for logistic.
    pub solver: Option<SolverKind>,
    /// Learning rate of the solver (default: 0.1).
    pub learning_rate: f64,
    /// Momentum for the vanilla solver, in `[0, 1)` (default: none).
    pub momentum: Option<f64>,
    pub execution_mode: ExecutionMode,
    pub context: ExecutionContext,
    /// Link of logistic models; ignored by linear ones.
    pub link: LogisticLink,
    /// Record the cost every this many iterations (0 = never).
    pub record_every: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            iterations: Self::DEFAULT_ITERATIONS,
            solver: None,
            learning_rate: Self::DEFAULT_LEARNING_RATE,
            momentum: None,
            execution_mode: ExecutionMode::default(),
            context: ExecutionContext::default(),
            link: LogisticLink::default(),
            record_every: 0,
        }
    }
}

impl FitOptions {
    pub const DEFAULT_ITERATIONS: usize = 10_000;
    pub const DEFAULT_LEARNING_RATE: f64 = 0.1;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_solver(mut self, solver: SolverKind) -> Self {
        self.solver = Some(solver);
        self
    }

    pub fn with_learning_rate(mut self, rate: f64) -> Self {
        self.learning_rate = rate;
        self
    }

    /// Vanilla gradient descent at `rate`.
    pub fn with_vanilla(self, rate: f64) -> Self {
        self.with_solver(SolverKind::Vanilla).with_learning_rate(rate)
    }

    /// Adam at `rate`.
    pub fn with_adam(self, rate: f64) -> Self {
        self.with_solver(SolverKind::Adam).with_learning_rate(rate)
    }

    /// AdaGrad at `rate`.
    pub fn with_adagrad(self, rate: f64) -> Self {
        self.with_solver(SolverKind::AdaGrad).with_learning_rate(rate)
    }

    pub fn with_momentum(mut self, momentum: f64) -> Self {
        self.momentum = Some(momentum);
        self
    }

    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_link(mut self, link: LogisticLink) -> Self {
        self.link = link;
        self
    }

    pub fn with_record_every(mut self, every: usize) -> Self {
        self.record_every = every;
        self
    }

    /// The solver a fit of `kind` will use.
    pub fn solver_for(&self, kind: ModelKind) -> SolverKind {
        self.solver.unwrap_or_else(|| kind.default_solver())
    }

    /// Set one option from its string form.
    ///
    /// Keys: `iterations`, `solver`, `learning_rate`, `momentum`,
    /// `execution_mode`, `link`, `record_every`, `accelerator`.
    /// `momentum` and `accelerator` also accept `none` to clear them.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key.trim() {
            "iterations" => self.iterations = parse_value(key, value)?,
            "solver" => self.solver = Some(value.parse()?),
            "learning_rate" => self.learning_rate = parse_value(key, value)?,
            "momentum" => {
                self.momentum = if is_none(value) {
                    None
                } else {
                    Some(parse_value(key, value)?)
                }
            }
            "execution_mode" => self.execution_mode = value.parse()?,
            "link" => self.link = value.parse()?,
            "record_every" => self.record_every = parse_value(key, value)?,
            "accelerator" => {
                self.context = match value.trim().to_ascii_lowercase().as_str() {
                    v if is_none(v) || v == "false" => ExecutionContext::Host,
                    "true" => ExecutionContext::accelerator(0),
                    _ => value.parse()?,
                }
            }
            other => {
                return Err(Error::config(format!(
                    "unknown option '{other}'. Supported: iterations, solver, learning_rate, \
                     momentum, execution_mode, link, record_every, accelerator"
                )))
            }
        }
        Ok(())
    }

    /// Build options from key/value pairs applied over the defaults, then
    /// validate them.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut options = Self::default();
        for (key, value) in pairs {
            options.set(key.as_ref(), value.as_ref())?;
        }
        options.validate()?;
        Ok(options)
    }

    /// Check every option and every combination of options.
    pub fn validate(&self) -> Result<()> {
        validate_learning_rate(self.learning_rate)?;
        if let Some(momentum) = self.momentum {
            validate_momentum(momentum)?;
            if let Some(solver) = self.solver.filter(|s| *s != SolverKind::Vanilla) {
                return Err(Error::config(format!(
                    "momentum only applies to the vanilla solver, not '{solver}'"
                )));
            }
        }
        self.context.validate()
    }
}

fn is_none(value: &str) -> bool {
    value.eq_ignore_ascii_case("none")
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::config(format!("option '{key}': cannot parse '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use regrad_core::ErrorKind;

    #[test]
    fn defaults() {
        let o = FitOptions::default();
        assert_eq!(o.iterations, 10_000);
        assert_eq!(o.learning_rate, 0.1);
        assert_eq!(o.execution_mode, ExecutionMode::Tape);
        assert_eq!(o.context, ExecutionContext::Host);
        assert_eq!(o.solver_for(ModelKind::Linear), SolverKind::Adam);
        assert_eq!(o.solver_for(ModelKind::Logistic), SolverKind::Vanilla);
        assert!(o.validate().is_ok());
    }

    #[test]
    fn builder_methods() {
        let o = FitOptions::new()
            .with_adagrad(0.5)
            .with_iterations(20)
            .with_execution_mode(ExecutionMode::Interpreted)
            .with_record_every(5);
        assert_eq!(o.solver, Some(SolverKind::AdaGrad));
        assert_eq!(o.learning_rate, 0.5);
        assert_eq!(o.solver_for(ModelKind::Logistic), SolverKind::AdaGrad);
        assert_eq!(o.iterations, 20);
        assert_eq!(o.record_every, 5);
    }

    #[test]
    fn from_pairs_parses_every_key() {
        let o = FitOptions::from_pairs([
            ("iterations", "500"),
            ("solver", "vanilla"),
            ("learning_rate", "0.05"),
            ("momentum", "0.5"),
            ("execution_mode", "interpreted"),
            ("link", "complement"),
            ("record_every", "50"),
            ("accelerator", "2"),
        ])
        .unwrap();
        assert_eq!(o.iterations, 500);
        assert_eq!(o.solver, Some(SolverKind::Vanilla));
        assert_eq!(o.learning_rate, 0.05);
        assert_eq!(o.momentum, Some(0.5));
        assert_eq!(o.execution_mode, ExecutionMode::Interpreted);
        assert_eq!(o.link, LogisticLink::Complement);
        assert_eq!(o.record_every, 50);
        assert_eq!(o.context, ExecutionContext::accelerator(2));
    }

    #[test]
    fn accelerator_accepts_every_context_spelling() {
        let cases = [
            ("none", ExecutionContext::Host),
            ("false", ExecutionContext::Host),
            ("host", ExecutionContext::Host),
            ("true", ExecutionContext::accelerator(0)),
            ("3", ExecutionContext::accelerator(3)),
            ("accelerator:2", ExecutionContext::accelerator(2)),
            (" Accelerator:5 ", ExecutionContext::accelerator(5)),
        ];
        for (value, expected) in cases {
            let o = FitOptions::from_pairs([("accelerator", value)]).unwrap();
            assert_eq!(o.context, expected, "accelerator={value}");
        }
        let err = FitOptions::from_pairs([("accelerator", "accelerator:9")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn bad_options_are_config_errors() {
        let cases: &[(&str, &str)] = &[
            ("solver", "lbfgs"),
            ("iterations", "-3"),
            ("iterations", "many"),
            ("learning_rate", "0"),
            ("momentum", "1.5"),
            ("accelerator", "64"),
            ("execution_mode", "gpu"),
            ("colour", "blue"),
        ];
        for (key, value) in cases {
            let err = FitOptions::from_pairs([(*key, *value)]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Config, "{key}={value}");
        }
    }

    #[test]
    fn momentum_conflicts_with_adaptive_solvers() {
        let o = FitOptions::new().with_adam(0.1).with_momentum(0.9);
        assert_eq!(o.validate().unwrap_err().kind(), ErrorKind::Config);
        let o = FitOptions::new().with_vanilla(0.1).with_momentum(0.9);
        assert!(o.validate().is_ok());
    }
}
