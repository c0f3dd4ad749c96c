//! Error types for path parsing and record mutation.

use crate::Path;
use thiserror::Error;

/// Result type alias for path operations.
pub type PathResult<T> = Result<T, PathError>;

/// Errors raised while parsing a field path or walking a record with it.
///
/// Every variant except [`PathError::Parse`] is a form of invalid path: the
/// record cannot be traversed along the requested location.
#[derive(Debug, Error)]
pub enum PathError {
    /// The path has no segments.
    #[error("empty path")]
    EmptyPath,

    /// The path string is malformed.
    #[error("cannot parse path '{input}': {reason}")]
    Parse {
        /// The rejected input.
        input: String,
        /// What was wrong with it.
        reason: String,
    },

    /// An intermediate value cannot be traversed into.
    #[error("type mismatch at {path}: expected {expected}, found {found}")]
    TypeMismatch {
        /// The path up to and including the offending segment.
        path: Path,
        /// The expected container type.
        expected: &'static str,
        /// The type actually found.
        found: &'static str,
    },

    /// Sequence index does not exist.
    #[error("index {index} out of bounds (len: {len}) at path {path}")]
    IndexOutOfBounds {
        /// The path up to and including the index segment.
        path: Path,
        /// The index that was accessed.
        index: usize,
        /// The length of the sequence.
        len: usize,
    },

    /// A non-numeric key was used against a sequence.
    #[error("sequence at {path} cannot be addressed by key '{key}'")]
    KeyOnSequence {
        /// The path up to and including the key segment.
        path: Path,
        /// The key that was used.
        key: String,
    },
}

impl PathError {
    #[inline]
    pub fn parse(input: &str, reason: impl Into<String>) -> Self {
        PathError::Parse {
            input: input.to_owned(),
            reason: reason.into(),
        }
    }

    #[inline]
    pub fn type_mismatch(path: Path, expected: &'static str, found: &'static str) -> Self {
        PathError::TypeMismatch {
            path,
            expected,
            found,
        }
    }

    #[inline]
    pub fn index_out_of_bounds(path: Path, index: usize, len: usize) -> Self {
        PathError::IndexOutOfBounds { path, index, len }
    }

    #[inline]
    pub fn key_on_sequence(path: Path, key: impl Into<String>) -> Self {
        PathError::KeyOnSequence {
            path,
            key: key.into(),
        }
    }

    /// True for errors raised while walking a record (as opposed to parsing).
    pub fn is_invalid_path(&self) -> bool {
        !matches!(self, PathError::Parse { .. })
    }
}

/// Get the type name of a JSON value.
#[inline]
pub fn value_type_name(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;
    use serde_json::json;

    #[test]
    fn test_error_display() {
        let err = PathError::type_mismatch(path!("sukunimi", "x"), "object", "string");
        assert_eq!(
            err.to_string(),
            "type mismatch at $.sukunimi.x: expected object, found string"
        );
        assert!(err.is_invalid_path());
        assert!(!PathError::parse("a..b", "empty segment").is_invalid_path());
    }

    #[test]
    fn test_value_type_name() {
        assert_eq!(value_type_name(&json!(null)), "null");
        assert_eq!(value_type_name(&json!(true)), "boolean");
        assert_eq!(value_type_name(&json!(42)), "number");
        assert_eq!(value_type_name(&json!("hello")), "string");
        assert_eq!(value_type_name(&json!([1, 2, 3])), "array");
        assert_eq!(value_type_name(&json!({"a": 1})), "object");
    }
}
