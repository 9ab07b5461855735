//! Stored vector token codec.
//!
//! A vector is persisted as a JSON array of numbers in index order. Decoding
//! never fails: anything that is not a well-formed vector of the expected
//! dimension comes back as [`Vector::Malformed`] with the reason.

use serde_json::Value;
use thiserror::Error;

use crate::errors::{EmbeddingError, Result};

/// Why a stored or computed vector was rejected.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum VectorFault {
    /// No token stored.
    #[error("vector is absent")]
    Absent,
    /// Token is not a JSON array.
    #[error("token is not a JSON array: {0}")]
    NotArray(String),
    /// An element is not a number.
    #[error("element {index} is not a number")]
    NonNumeric {
        /// Position of the offending element.
        index: usize,
    },
    /// An element is NaN, infinite, or outside the `f32` range.
    #[error("element {index} is not finite")]
    NonFinite {
        /// Position of the offending element.
        index: usize,
    },
    /// Length differs from the embedding dimension.
    #[error("expected {expected} dimensions, got {actual}")]
    WrongLength {
        /// Embedding dimension.
        expected: usize,
        /// Observed length.
        actual: usize,
    },
}

/// A decoded vector: either usable or carrying the reason it is not.
#[derive(Clone, Debug, PartialEq)]
pub enum Vector {
    /// Finite values of the expected dimension.
    Valid(Vec<f32>),
    /// Rejected token.
    Malformed(VectorFault),
}

impl Vector {
    /// Validate an in-memory vector against `dims`.
    pub fn check(values: Vec<f32>, dims: usize) -> Self {
        if values.len() != dims {
            return Self::Malformed(VectorFault::WrongLength {
                expected: dims,
                actual: values.len(),
            });
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Self::Malformed(VectorFault::NonFinite { index });
        }
        Self::Valid(values)
    }

    /// Whether this is a usable vector.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// Borrow the values of a valid vector.
    pub fn as_valid(&self) -> Option<&[f32]> {
        match self {
            Self::Valid(v) => Some(v),
            Self::Malformed(_) => None,
        }
    }

    /// Convert into a result, surfacing the fault.
    pub fn into_result(self) -> Result<Vec<f32>> {
        match self {
            Self::Valid(v) => Ok(v),
            Self::Malformed(fault) => Err(EmbeddingError::MalformedVector(fault)),
        }
    }
}

/// Serialize a vector to its stored token.
///
/// Non-finite values are rejected; JSON has no representation for them.
pub fn encode_token(values: &[f32]) -> Result<String> {
    if let Some(index) = values.iter().position(|v| !v.is_finite()) {
        return Err(VectorFault::NonFinite { index }.into());
    }
    serde_json::to_string(values).map_err(|e| EmbeddingError::Internal(format!("encode vector: {e}")))
}

/// Parse a stored token against the expected dimension.
///
/// `None` and blank tokens are [`VectorFault::Absent`].
pub fn decode_token(token: Option<&str>, dims: usize) -> Vector {
    let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
        return Vector::Malformed(VectorFault::Absent);
    };

    let items = match serde_json::from_str::<Value>(token) {
        Ok(Value::Array(items)) => items,
        Ok(other) => return Vector::Malformed(VectorFault::NotArray(type_name(&other).into())),
        Err(e) => return Vector::Malformed(VectorFault::NotArray(e.to_string())),
    };

    if items.len() != dims {
        return Vector::Malformed(VectorFault::WrongLength {
            expected: dims,
            actual: items.len(),
        });
    }

    let mut values = Vec::with_capacity(dims);
    for (index, item) in items.iter().enumerate() {
        let Some(n) = item.as_f64() else {
            return Vector::Malformed(VectorFault::NonNumeric { index });
        };
        let v = n as f32;
        if !v.is_finite() {
            return Vector::Malformed(VectorFault::NonFinite { index });
        }
        values.push(v);
    }
    Vector::Valid(values)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
