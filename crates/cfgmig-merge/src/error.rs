//! Error types for the merge crate.

use std::fmt;

use serde_json::Value;

/// The structural kind of a JSON value, as far as merging is concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    Mapping,
    Sequence,
    Scalar,
}

impl Shape {
    /// Classify a value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Object(_) => Self::Mapping,
            Value::Array(_) => Self::Sequence,
            _ => Self::Scalar,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mapping => f.write_str("mapping"),
            Self::Sequence => f.write_str("sequence"),
            Self::Scalar => f.write_str("scalar"),
        }
    }
}

/// Errors that can occur while merging documents.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// The two documents hold incompatible kinds of value at the same key.
    #[error("shape mismatch at {path}: expected {expected}, found {found}")]
    ShapeMismatch {
        /// JSON-pointer style location (`/` is the document root).
        path: String,
        expected: Shape,
        found: Shape,
    },
}

/// Convenience alias for merge results.
pub type MergeResult<T> = Result<T, MergeError>;

/// Errors raised when building a unique-key registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A key-set with no fields would match every element.
    #[error("collection {collection} declares an empty key-set")]
    EmptyKeySet { collection: String },
}

/// Convenience alias for registry results.
pub type RegistryResult<T> = Result<T, RegistryError>;
