//! Type registry errors

use thiserror::Error;

/// Result type for registry operations
pub type TypeResult<T> = Result<T, TypeError>;

/// Errors raised while registering types or parsing signatures
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TypeError {
    /// Two fields of one layout hash to the same id
    #[error("Duplicate field in {type_name}: '{field}' collides with '{other}'")]
    DuplicateField {
        /// Type being registered
        type_name: String,
        /// Field that was rejected
        field: String,
        /// Field already holding the id
        other: String,
    },

    /// Binding targets a missing or non-function field
    #[error("Invalid virtual binding on {type_name}.{field}: field must exist and be a function")]
    InvalidBinding {
        /// Type being registered
        type_name: String,
        /// Target field name
        field: String,
    },

    /// Wrong kind passed to a registration helper
    #[error("Cannot register {kind} as {expected}")]
    WrongKind {
        /// Kind that was supplied
        kind: String,
        /// What the helper expected
        expected: &'static str,
    },

    /// Malformed primitive signature string
    #[error("Invalid signature '{signature}': {reason}")]
    InvalidSignature {
        /// Offending signature
        signature: String,
        /// What went wrong
        reason: String,
    },
}
