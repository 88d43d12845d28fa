//! Kestrel Type Descriptors
//!
//! Runtime type metadata consumed by the native support layer:
//! - Kind tags and slot sizes
//! - Type descriptors (functions, object layouts, wrappers)
//! - The type registry, including memoized closure types
//! - Primitive signature strings

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod kind;
pub mod layout;
pub mod registry;
pub mod signature;
pub mod ty;

pub use error::{TypeError, TypeResult};
pub use kind::{TypeKind, POINTER_SIZE};
pub use layout::{FieldDescriptor, FieldId, ObjectDef, ObjectLayout, VirtualBinding, OBJECT_HEADER_SIZE};
pub use registry::TypeRegistry;
pub use signature::{SigKind, Signature};
pub use ty::{FunctionIndex, FunctionType, TypeDescriptor, TypeDetail, TypeIndex, TypeRef};
