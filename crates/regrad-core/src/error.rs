use std::fmt;
use std::path::PathBuf;

use crate::op::NodeId;
use crate::shape::Shape;

/// All errors that can occur within regrad.
///
/// One enum is shared by every crate in the workspace (graph construction,
/// execution, optimizers, data loading, configuration) so that a failure can
/// travel from the innermost kernel up to `fit_*` with `?` alone.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An option was invalid or two options conflict.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Shapes of two operands (or of a buffer and its expected size) disagree.
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: Shape, got: Shape },

    /// A feature column does not have as many samples as the target.
    #[error("feature {feature} has {got} samples, but the target has {expected}")]
    SampleCountMismatch {
        feature: usize,
        expected: usize,
        got: usize,
    },

    /// The model has nothing to fit.
    #[error("empty input: {0}")]
    Empty(&'static str),

    /// Parameter, gradient and optimizer state lengths disagree.
    #[error("length mismatch: {what} has {got} entries, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// An operation referenced a node that is not part of the graph.
    #[error("node {id} does not exist (graph has {len} nodes)")]
    UnknownNode { id: NodeId, len: usize },

    /// A node's runtime value was requested before it was computed.
    #[error("node {id} ({name}) has no value; run a forward pass first")]
    MissingValue { id: NodeId, name: String },

    /// A computation produced NaN or infinity where a finite value is required.
    #[error("{what} is not finite ({value})")]
    NonFinite { what: String, value: f64 },

    /// Could not read an input file.
    #[error("could not read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A requested column is missing from the header row.
    #[error("column '{0}' not found in header row")]
    MissingColumn(String),

    /// A data cell is not a number.
    #[error("line {line}, column '{column}': cannot parse '{value}' as a number")]
    ParseFloat {
        line: usize,
        column: String,
        value: String,
    },

    /// Malformed tabular input (ragged rows, no data rows, ...).
    #[error("malformed data: {0}")]
    Data(String),

    /// An inner error annotated with the stage that was running.
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },

    /// Generic execution failure not covered above.
    #[error("{0}")]
    Msg(String),
}

/// Coarse classification of an [`Error`], used by callers that only care
/// which stage rejected the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    Shape,
    Graph,
    Execution,
    Data,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Config => "configuration",
            ErrorKind::Shape => "shape",
            ErrorKind::Graph => "graph construction",
            ErrorKind::Execution => "execution",
            ErrorKind::Data => "data",
        };
        f.write_str(s)
    }
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }

    /// Create a configuration error.
    pub fn config(s: impl Into<String>) -> Self {
        Error::Config(s.into())
    }

    /// Which stage this error belongs to. Context wrappers are looked through.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Config,
            Error::ShapeMismatch { .. }
            | Error::SampleCountMismatch { .. }
            | Error::Empty(_)
            | Error::LengthMismatch { .. } => ErrorKind::Shape,
            Error::UnknownNode { .. } => ErrorKind::Graph,
            Error::MissingValue { .. } | Error::NonFinite { .. } | Error::Msg(_) => {
                ErrorKind::Execution
            }
            Error::Io { .. }
            | Error::MissingColumn(_)
            | Error::ParseFloat { .. }
            | Error::Data(_) => ErrorKind::Data,
            Error::Context { source, .. } => source.kind(),
        }
    }

    /// The innermost error, with every context layer removed.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Wrap this error with a description of the failing stage.
    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Convenience Result type used throughout regrad.
pub type Result<T> = std::result::Result<T, Error>;

/// Adds stage context to a failing [`Result`].
pub trait Context<T> {
    /// Wrap the error (if any) with a fixed description.
    fn context(self, context: &str) -> Result<T>;

    /// Wrap the error (if any) with a lazily built description.
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> Context<T> for Result<T> {
    fn context(self, context: &str) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.context(f()))
    }
}

/// Macro for early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}
