//! Kestrel Native Support Layer
//!
//! This crate bridges fixed-layout VM data and the dynamic runtime model:
//! - Tagged dynamic values and stringification
//! - Element-typed and inline struct array allocation
//! - Closures, including receiver-bound method closures
//! - Dynamic field access by hashed field id
//! - The primitive table exposed to the bytecode dispatcher

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod array;
pub mod closure;
pub mod field;
pub mod function;
pub mod gc;
pub mod options;
pub mod primitives;
pub mod runtime;
pub mod stringify;
pub mod value;

pub use array::ArrayData;
pub use closure::Closure;
pub use function::{FunctionEntry, FunctionTable, NativeFn};
pub use gc::{AllocError, AllocKind, GcRef, Heap, HeapStats};
pub use options::RuntimeOptions;
pub use primitives::{BindError, PrimitiveId, PrimitiveTable};
pub use runtime::Runtime;
pub use stringify::format_float;
pub use value::{Payload, Value};

/// Errors surfaced to callers as values
///
/// Programmer errors (arity mismatch, unresolvable field, receiver of the
/// wrong kind) are not represented here; they panic.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NativeError {
    /// Negative length, wrong kind for the operation, bad range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Element index outside the array
    #[error("Array index {index} out of bounds (length: {length})")]
    IndexOutOfBounds {
        /// Requested index
        index: i64,
        /// Array length
        length: usize,
    },

    /// Operation on a null receiver
    #[error("Null access")]
    NullAccess,

    /// Reflective operation a fixed layout cannot express
    #[error("{operation} is not supported on fixed-layout objects")]
    Unsupported {
        /// Name of the rejected operation
        operation: &'static str,
    },

    /// Allocation failure, propagated unchanged
    #[error(transparent)]
    Alloc(#[from] AllocError),

    /// Error raised by a host function
    #[error("{0}")]
    Host(String),
}

/// Result type for native operations
pub type NativeResult<T> = Result<T, NativeError>;
