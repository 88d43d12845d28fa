//! Type descriptors
//!
//! A [`TypeDescriptor`] is immutable once the registry hands it out. Identity
//! is the registry-assigned [`TypeIndex`]; two descriptors with the same
//! shape registered twice are still two distinct types.

use crate::kind::TypeKind;
use crate::layout::ObjectLayout;
use std::fmt;
use std::sync::Arc;

/// Shared handle to a registered type descriptor
pub type TypeRef = Arc<TypeDescriptor>;

/// Registry-assigned type identity
///
/// Also used as the runtime type tag written into object headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeIndex(u32);

impl TypeIndex {
    /// Wrap a raw index
    pub const fn new(raw: u32) -> Self {
        TypeIndex(raw)
    }

    /// Raw index value
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Index as usize (for table lookups)
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Index into the runtime function table (a "raw function pointer")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionIndex(u32);

impl FunctionIndex {
    /// Wrap a raw index
    pub const fn new(raw: u32) -> Self {
        FunctionIndex(raw)
    }

    /// Raw index value
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Index as usize (for table lookups)
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Function signature metadata
#[derive(Debug, Clone)]
pub struct FunctionType {
    params: Vec<TypeRef>,
    ret: TypeRef,
    /// Full type this one was derived from by dropping the first parameter
    parent: Option<TypeRef>,
}

impl FunctionType {
    pub(crate) fn new(params: Vec<TypeRef>, ret: TypeRef, parent: Option<TypeRef>) -> Self {
        Self { params, ret, parent }
    }

    /// Parameter types
    pub fn params(&self) -> &[TypeRef] {
        &self.params
    }

    /// Return type
    pub fn ret(&self) -> &TypeRef {
        &self.ret
    }

    /// Number of parameters
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// The full (pre-binding) type, set only on derived closure types
    pub fn parent(&self) -> Option<&TypeRef> {
        self.parent.as_ref()
    }
}

/// Kind-specific metadata
#[derive(Debug, Clone)]
pub enum TypeDetail {
    /// Scalars, `Dyn`, `Bytes`, `Array`, `Guid`, `Void`
    None,
    /// `Fun`
    Function(FunctionType),
    /// `Obj` and `Struct`
    Object(ObjectLayout),
    /// `Ref` and `Null`
    Inner(TypeRef),
    /// `Abstract`
    Abstract(String),
}

/// Runtime metadata describing a value's shape, size and kind
#[derive(Debug)]
pub struct TypeDescriptor {
    index: TypeIndex,
    kind: TypeKind,
    detail: TypeDetail,
}

impl TypeDescriptor {
    pub(crate) fn new(index: TypeIndex, kind: TypeKind, detail: TypeDetail) -> Self {
        Self { index, kind, detail }
    }

    /// Registry identity
    #[inline]
    pub fn index(&self) -> TypeIndex {
        self.index
    }

    /// Kind tag
    #[inline]
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Kind-specific metadata
    pub fn detail(&self) -> &TypeDetail {
        &self.detail
    }

    /// Function metadata, if this is a `Fun` type
    pub fn as_function(&self) -> Option<&FunctionType> {
        match &self.detail {
            TypeDetail::Function(fun) => Some(fun),
            _ => None,
        }
    }

    /// Field layout, if this is an `Obj` or `Struct` type
    pub fn as_object(&self) -> Option<&ObjectLayout> {
        match &self.detail {
            TypeDetail::Object(layout) => Some(layout),
            _ => None,
        }
    }

    /// Wrapped type of a `Ref` or `Null` type
    pub fn inner(&self) -> Option<&TypeRef> {
        match &self.detail {
            TypeDetail::Inner(inner) => Some(inner),
            _ => None,
        }
    }

    /// Name of an `Abstract` type
    pub fn abstract_name(&self) -> Option<&str> {
        match &self.detail {
            TypeDetail::Abstract(name) => Some(name),
            _ => None,
        }
    }

    /// Whether the type describes a field layout
    pub fn is_object_like(&self) -> bool {
        self.kind.is_object_like()
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for TypeDescriptor {}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            TypeDetail::None => write!(f, "{}", self.kind),
            TypeDetail::Function(fun) => {
                write!(f, "(")?;
                for (i, param) in fun.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ") -> {}", fun.ret)
            }
            TypeDetail::Object(layout) => f.write_str(layout.name()),
            TypeDetail::Inner(inner) => write!(f, "{}<{}>", self.kind, inner),
            TypeDetail::Abstract(name) => write!(f, "abstract<{}>", name),
        }
    }
}
