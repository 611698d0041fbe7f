// Regression models: hypothesis graphs and fitted parameter vectors
//
// A RegressionGraph owns one expression graph per training run:
//
//   theta_0 ── + ── + ── ... ── hypothesis ── (− y)² ── mean ── cost
//              │    │
//     x_1·theta_1  x_2·theta_2 ...
//
// For the logistic model the affine sum z is passed through the link before
// the cost is taken. Parameters start at 1.0 and are listed bias first.

use std::fmt;
use std::str::FromStr;

use regrad_core::{Context, Error, Graph, NodeId, Result};
use regrad_optim::SolverKind;

use crate::loss::mse;

/// Initial value of every parameter.
pub const INITIAL_THETA: f64 = 1.0;

/// Which hypothesis to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    /// `θ₀ + Σ θᵢ·xᵢ`
    Linear,
    /// The affine sum passed through a [`LogisticLink`].
    Logistic,
}

impl ModelKind {
    /// Solver used when the options leave it unset.
    pub fn default_solver(self) -> SolverKind {
        match self {
            ModelKind::Linear => SolverKind::Adam,
            ModelKind::Logistic => SolverKind::Vanilla,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ModelKind::Linear => "linear",
            ModelKind::Logistic => "logistic",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Squashing function of the logistic model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LogisticLink {
    /// `1 / (1 + exp(−z))`: predictions increase with `z`.
    #[default]
    Sigmoid,
    /// `1 / (1 + exp(z))`: predictions decrease with `z`, so fitted
    /// weights come out with the opposite sign.
    Complement,
}

impl LogisticLink {
    /// Evaluate the link for one value.
    pub fn apply(self, z: f64) -> f64 {
        match self {
            LogisticLink::Sigmoid => 1.0 / (1.0 + (-z).exp()),
            LogisticLink::Complement => 1.0 / (1.0 + z.exp()),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LogisticLink::Sigmoid => "sigmoid",
            LogisticLink::Complement => "complement",
        }
    }
}

impl fmt::Display for LogisticLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LogisticLink {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sigmoid" => Ok(LogisticLink::Sigmoid),
            "complement" => Ok(LogisticLink::Complement),
            other => Err(Error::config(format!(
                "unknown logistic link '{other}'. Supported: sigmoid, complement"
            ))),
        }
    }
}

/// Check that there is something to fit and every column lines up with the
/// target.
pub fn check_columns<F: AsRef<[f64]>>(features: &[F], target: &[f64]) -> Result<()> {
    if features.is_empty() {
        return Err(Error::Empty("feature list"));
    }
    if target.is_empty() {
        return Err(Error::Empty("target"));
    }
    for (i, column) in features.iter().enumerate() {
        let got = column.as_ref().len();
        if got != target.len() {
            return Err(Error::SampleCountMismatch {
                feature: i,
                expected: target.len(),
                got,
            });
        }
    }
    Ok(())
}

/// The expression graph of one regression problem, with its cost attached.
#[derive(Debug, Clone)]
pub struct RegressionGraph {
    graph: Graph,
    kind: ModelKind,
    link: LogisticLink,
    parameters: Vec<NodeId>,
    hypothesis: NodeId,
    target: NodeId,
    cost: NodeId,
}

impl RegressionGraph {
    /// Build the graph for `kind`. Columns are validated before any node is
    /// created.
    pub fn build<F: AsRef<[f64]>>(
        kind: ModelKind,
        features: &[F],
        target: &[f64],
        link: LogisticLink,
    ) -> Result<Self> {
        check_columns(features, target)?;

        let mut graph = Graph::new();
        let (parameters, affine) =
            affine_combination(&mut graph, features).context("building graph")?;
        let hypothesis = match kind {
            ModelKind::Linear => affine,
            ModelKind::Logistic => {
                apply_link(&mut graph, affine, link).context("building graph")?
            }
        };
        graph
            .set_name(hypothesis, "hypothesis")
            .context("building graph")?;
        let target = graph.data("y", target).context("building graph")?;
        let cost = mse(&mut graph, hypothesis, target).context("building cost")?;
        graph.set_name(cost, "cost").context("building cost")?;

        log::debug!(
            "built {kind} graph: {} nodes, {} parameters",
            graph.len(),
            parameters.len()
        );

        Ok(Self {
            graph,
            kind,
            link,
            parameters,
            hypothesis,
            target,
            cost,
        })
    }

    pub fn build_linear<F: AsRef<[f64]>>(features: &[F], target: &[f64]) -> Result<Self> {
        Self::build(ModelKind::Linear, features, target, LogisticLink::default())
    }

    pub fn build_logistic<F: AsRef<[f64]>>(
        features: &[F],
        target: &[f64],
        link: LogisticLink,
    ) -> Result<Self> {
        Self::build(ModelKind::Logistic, features, target, link)
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn link(&self) -> LogisticLink {
        self.link
    }

    /// Parameter leaves: bias first, then one per feature in input order.
    pub fn parameters(&self) -> &[NodeId] {
        &self.parameters
    }

    pub fn hypothesis(&self) -> NodeId {
        self.hypothesis
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn cost(&self) -> NodeId {
        self.cost
    }

    /// Current parameter values, in [`parameters`](Self::parameters) order.
    pub fn parameter_values(&self) -> Result<Vec<f64>> {
        self.parameters
            .iter()
            .map(|&id| self.graph.parameter_value(id))
            .collect()
    }

    /// Snapshot the current parameters as a model that can predict.
    pub fn to_fitted(&self) -> Result<FittedModel> {
        Ok(FittedModel {
            kind: self.kind,
            link: self.link,
            parameters: self.parameter_values()?,
        })
    }
}

// theta_0 + x_1*theta_1 + x_2*theta_2 + ...
fn affine_combination<F: AsRef<[f64]>>(
    graph: &mut Graph,
    features: &[F],
) -> Result<(Vec<NodeId>, NodeId)> {
    let bias = graph.parameter("theta_0", INITIAL_THETA);
    let mut parameters = vec![bias];
    let mut sum = bias;
    for (i, column) in features.iter().enumerate() {
        let x = graph.data(format!("x_{}", i + 1), column.as_ref())?;
        let theta = graph.parameter(format!("theta_{}", i + 1), INITIAL_THETA);
        parameters.push(theta);
        let term = graph.mul(x, theta)?;
        sum = graph.add(sum, term)?;
    }
    Ok((parameters, sum))
}

// 1 / (1 + exp(±z))
fn apply_link(graph: &mut Graph, z: NodeId, link: LogisticLink) -> Result<NodeId> {
    let exponent = match link {
        LogisticLink::Sigmoid => graph.neg(z)?,
        LogisticLink::Complement => z,
    };
    let e = graph.exp(exponent)?;
    let one = graph.constant(1.0);
    let denom = graph.add(one, e)?;
    let numerator = graph.constant(1.0);
    graph.div(numerator, denom)
}

/// Parameters produced by a training run, ready for prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedModel {
    pub kind: ModelKind,
    /// Only used by logistic models.
    pub link: LogisticLink,
    /// `[θ₀, θ₁, …, θₙ]`, bias first.
    pub parameters: Vec<f64>,
}

impl FittedModel {
    pub fn bias(&self) -> f64 {
        self.parameters.first().copied().unwrap_or_default()
    }

    /// Per-feature weights (everything after the bias).
    pub fn weights(&self) -> &[f64] {
        self.parameters.get(1..).unwrap_or_default()
    }

    /// Number of features the model expects per sample.
    pub fn num_features(&self) -> usize {
        self.weights().len()
    }

    /// Predict one sample given its feature values.
    pub fn predict(&self, sample: &[f64]) -> Result<f64> {
        if sample.len() != self.num_features() {
            return Err(Error::LengthMismatch {
                what: "sample",
                expected: self.num_features(),
                got: sample.len(),
            });
        }
        let z = self.bias()
            + sample
                .iter()
                .zip(self.weights())
                .map(|(x, theta)| x * theta)
                .sum::<f64>();
        Ok(match self.kind {
            ModelKind::Linear => z,
            ModelKind::Logistic => self.link.apply(z),
        })
    }

    /// Predict every sample of column-major input (one slice per feature).
    pub fn predict_columns<F: AsRef<[f64]>>(&self, features: &[F]) -> Result<Vec<f64>> {
        if features.len() != self.num_features() {
            return Err(Error::LengthMismatch {
                what: "feature columns",
                expected: self.num_features(),
                got: features.len(),
            });
        }
        let rows = features.first().map_or(0, |c| c.as_ref().len());
        for (i, column) in features.iter().enumerate() {
            if column.as_ref().len() != rows {
                return Err(Error::SampleCountMismatch {
                    feature: i,
                    expected: rows,
                    got: column.as_ref().len(),
                });
            }
        }
        let mut sample = vec![0.0; features.len()];
        (0..rows)
            .map(|r| {
                for (slot, column) in sample.iter_mut().zip(features) {
                    *slot = column.as_ref()[r];
                }
                self.predict(&sample)
            })
            .collect()
    }
}
