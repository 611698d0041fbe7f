use std::fmt;

use crate::error::{Error, Result};

// Shape: the size of a node's value
//
// Regression graphs only ever hold two kinds of values:
//   - Scalar:     Shape::Scalar      (parameters, constants, the cost)
//   - Vector:     Shape::Vector(m)   (one entry per sample)
//
// Binary operations broadcast a scalar against a vector. Two vectors must
// have the same length; anything else is a shape error raised when the node
// is created, never at run time.

/// Shape of a node's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Scalar,
    Vector(usize),
}

impl Shape {
    /// Total number of elements. A scalar has 1 element.
    pub fn elem_count(&self) -> usize {
        match self {
            Shape::Scalar => 1,
            Shape::Vector(n) => *n,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Shape::Scalar)
    }

    /// Shape produced by an element-wise binary operation on `self` and `rhs`.
    pub fn broadcast(&self, rhs: &Shape) -> Result<Shape> {
        match (self, rhs) {
            (Shape::Scalar, other) | (other, Shape::Scalar) => Ok(*other),
            (Shape::Vector(a), Shape::Vector(b)) if a == b => Ok(*self),
            _ => Err(Error::ShapeMismatch {
                expected: *self,
                got: *rhs,
            }),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Scalar => write!(f, "[]"),
            Shape::Vector(n) => write!(f, "[{n}]"),
        }
    }
}
