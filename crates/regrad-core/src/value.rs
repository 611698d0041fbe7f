// Value: the runtime contents of a node
//
// Vectors are stored behind an Arc so that binding a data column to a leaf,
// loading it into an engine slot, or handing it to the backward pass never
// copies the samples. Every kernel allocates a fresh buffer for its result.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::op::{BinaryOp, UnaryOp};
use crate::shape::Shape;

/// A scalar or a vector of `f64`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f64),
    Vector(Arc<[f64]>),
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::Vector(v.into())
    }
}

impl From<&[f64]> for Value {
    fn from(v: &[f64]) -> Self {
        Value::Vector(v.into())
    }
}

impl Value {
    pub fn shape(&self) -> Shape {
        match self {
            Value::Scalar(_) => Shape::Scalar,
            Value::Vector(v) => Shape::Vector(v.len()),
        }
    }

    /// Extract the scalar, failing for vectors.
    pub fn to_scalar(&self) -> Result<f64> {
        match self {
            Value::Scalar(v) => Ok(*v),
            Value::Vector(_) => Err(Error::ShapeMismatch {
                expected: Shape::Scalar,
                got: self.shape(),
            }),
        }
    }

    /// Copy the elements out. A scalar yields a one-element vec.
    pub fn to_vec(&self) -> Vec<f64> {
        match self {
            Value::Scalar(v) => vec![*v],
            Value::Vector(v) => v.to_vec(),
        }
    }

    /// True when no element is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        match self {
            Value::Scalar(v) => v.is_finite(),
            Value::Vector(v) => v.iter().all(|x| x.is_finite()),
        }
    }

    /// Apply `f` to every element.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Value {
        match self {
            Value::Scalar(v) => Value::Scalar(f(*v)),
            Value::Vector(v) => Value::Vector(v.iter().map(|&x| f(x)).collect()),
        }
    }

    pub fn unary(&self, op: UnaryOp) -> Value {
        self.map(|x| op.apply(x))
    }

    /// Element-wise binary operation with scalar broadcasting.
    pub fn binary(&self, rhs: &Value, op: BinaryOp) -> Result<Value> {
        self.zip_map(rhs, |x, y| op.apply(x, y))
    }

    /// Combine two values element by element, broadcasting a scalar side.
    pub fn zip_map(&self, rhs: &Value, f: impl Fn(f64, f64) -> f64) -> Result<Value> {
        match (self, rhs) {
            (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(f(*a, *b))),
            (Value::Scalar(a), Value::Vector(b)) => {
                Ok(Value::Vector(b.iter().map(|&y| f(*a, y)).collect()))
            }
            (Value::Vector(a), Value::Scalar(b)) => {
                Ok(Value::Vector(a.iter().map(|&x| f(x, *b)).collect()))
            }
            (Value::Vector(a), Value::Vector(b)) => {
                if a.len() != b.len() {
                    return Err(Error::ShapeMismatch {
                        expected: self.shape(),
                        got: rhs.shape(),
                    });
                }
                Ok(Value::Vector(
                    a.iter()
                        .zip(b.iter())
                        .map(|(&x, &y)| f(x, y))
                        .collect(),
                ))
            }
        }
    }

    pub fn add(&self, rhs: &Value) -> Result<Value> {
        self.binary(rhs, BinaryOp::Add)
    }

    pub fn sub(&self, rhs: &Value) -> Result<Value> {
        self.binary(rhs, BinaryOp::Sub)
    }

    pub fn mul(&self, rhs: &Value) -> Result<Value> {
        self.binary(rhs, BinaryOp::Mul)
    }

    pub fn div(&self, rhs: &Value) -> Result<Value> {
        self.binary(rhs, BinaryOp::Div)
    }

    pub fn neg(&self) -> Value {
        self.unary(UnaryOp::Neg)
    }

    /// Sum of all elements, accumulated left to right.
    pub fn sum_all(&self) -> f64 {
        match self {
            Value::Scalar(v) => *v,
            Value::Vector(v) => v.iter().sum(),
        }
    }

    /// Arithmetic mean of all elements, as a scalar.
    pub fn mean_all(&self) -> Value {
        let n = self.shape().elem_count();
        Value::Scalar(self.sum_all() / n as f64)
    }

    /// Reduce a gradient back to the shape of the operand it belongs to.
    ///
    /// When a scalar was broadcast against a vector in the forward pass, each
    /// element contributed to the result, so the gradient is the sum.
    pub fn sum_to(&self, shape: Shape) -> Result<Value> {
        match (self.shape(), shape) {
            (got, want) if got == want => Ok(self.clone()),
            (Shape::Vector(_), Shape::Scalar) => Ok(Value::Scalar(self.sum_all())),
            (got, want) => Err(Error::ShapeMismatch {
                expected: want,
                got,
            }),
        }
    }

    /// Expand a scalar to `shape` by repetition.
    pub fn broadcast_to(&self, shape: Shape) -> Result<Value> {
        match (self, shape) {
            (_, want) if self.shape() == want => Ok(self.clone()),
            (Value::Scalar(v), Shape::Vector(n)) => Ok(Value::Vector(vec![*v; n].into())),
            (_, want) => Err(Error::ShapeMismatch {
                expected: want,
                got: self.shape(),
            }),
        }
    }
}
