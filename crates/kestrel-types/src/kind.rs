//! Kind tags
//!
//! Every type descriptor and every dynamic value carries one of these tags.
//! The set is closed: dispatch over kinds is always an exhaustive `match`.

use std::fmt;

/// Size of a pointer-like slot (object, array, closure, bytes, ...)
pub const POINTER_SIZE: usize = 8;

/// Discriminant identifying the shape of a type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum TypeKind {
    /// No value
    Void = 0,
    /// 8-bit integer
    I8,
    /// 16-bit integer
    I16,
    /// 32-bit integer
    I32,
    /// 64-bit integer
    I64,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// Boolean
    Bool,
    /// Raw byte buffer
    Bytes,
    /// Fully dynamic value
    Dyn,
    /// Function / closure
    Fun,
    /// Class instance with a runtime type header
    Obj,
    /// Dynamic array
    Array,
    /// Opaque host handle
    Abstract,
    /// Reference to a typed slot
    Ref,
    /// Fixed layout value without a type header
    Struct,
    /// Nullable wrapper around a scalar
    Null,
    /// 64-bit globally unique id
    Guid,
}

impl TypeKind {
    /// All kinds, in tag order
    pub const ALL: [TypeKind; 18] = [
        TypeKind::Void,
        TypeKind::I8,
        TypeKind::I16,
        TypeKind::I32,
        TypeKind::I64,
        TypeKind::F32,
        TypeKind::F64,
        TypeKind::Bool,
        TypeKind::Bytes,
        TypeKind::Dyn,
        TypeKind::Fun,
        TypeKind::Obj,
        TypeKind::Array,
        TypeKind::Abstract,
        TypeKind::Ref,
        TypeKind::Struct,
        TypeKind::Null,
        TypeKind::Guid,
    ];

    /// Number of bytes a value of this kind occupies in a field or array slot
    pub const fn slot_size(self) -> usize {
        match self {
            TypeKind::Void => 0,
            TypeKind::I8 | TypeKind::Bool => 1,
            TypeKind::I16 => 2,
            TypeKind::I32 | TypeKind::F32 => 4,
            TypeKind::I64 | TypeKind::F64 | TypeKind::Guid => 8,
            TypeKind::Bytes
            | TypeKind::Dyn
            | TypeKind::Fun
            | TypeKind::Obj
            | TypeKind::Array
            | TypeKind::Abstract
            | TypeKind::Ref
            | TypeKind::Struct
            | TypeKind::Null => POINTER_SIZE,
        }
    }

    /// Whether a slot of this kind holds a traceable heap pointer
    pub const fn is_pointer(self) -> bool {
        match self {
            TypeKind::Void
            | TypeKind::I8
            | TypeKind::I16
            | TypeKind::I32
            | TypeKind::I64
            | TypeKind::F32
            | TypeKind::F64
            | TypeKind::Bool
            | TypeKind::Guid => false,
            TypeKind::Bytes
            | TypeKind::Dyn
            | TypeKind::Fun
            | TypeKind::Obj
            | TypeKind::Array
            | TypeKind::Abstract
            | TypeKind::Ref
            | TypeKind::Struct
            | TypeKind::Null => true,
        }
    }

    /// Integer kinds (guids are rendered as integers too)
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            TypeKind::I8 | TypeKind::I16 | TypeKind::I32 | TypeKind::I64 | TypeKind::Guid
        )
    }

    /// Floating point kinds
    pub const fn is_float(self) -> bool {
        matches!(self, TypeKind::F32 | TypeKind::F64)
    }

    /// Kinds that describe a field layout (`Obj`, `Struct`)
    pub const fn is_object_like(self) -> bool {
        matches!(self, TypeKind::Obj | TypeKind::Struct)
    }

    /// Signature code for this kind
    ///
    /// Composite kinds (`X<name>_`, `R<code>`, `?<code>`) only contribute
    /// their leading character here.
    pub const fn code(self) -> char {
        match self {
            TypeKind::Void => 'v',
            TypeKind::I8 => 'c',
            TypeKind::I16 => 's',
            TypeKind::I32 => 'i',
            TypeKind::I64 => 'l',
            TypeKind::F32 => 'f',
            TypeKind::F64 => 'd',
            TypeKind::Bool => 'b',
            TypeKind::Bytes => 'B',
            TypeKind::Dyn => 'D',
            TypeKind::Fun => 'F',
            TypeKind::Obj => 'O',
            TypeKind::Array => 'A',
            TypeKind::Abstract => 'X',
            TypeKind::Ref => 'R',
            TypeKind::Struct => 'S',
            TypeKind::Null => '?',
            TypeKind::Guid => 'g',
        }
    }

    /// Inverse of [`TypeKind::code`]
    pub fn from_code(code: char) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// Lower-case name used in diagnostics and pointer renderings
    pub const fn name(self) -> &'static str {
        match self {
            TypeKind::Void => "void",
            TypeKind::I8 => "i8",
            TypeKind::I16 => "i16",
            TypeKind::I32 => "i32",
            TypeKind::I64 => "i64",
            TypeKind::F32 => "f32",
            TypeKind::F64 => "f64",
            TypeKind::Bool => "bool",
            TypeKind::Bytes => "bytes",
            TypeKind::Dyn => "dynamic",
            TypeKind::Fun => "fun",
            TypeKind::Obj => "obj",
            TypeKind::Array => "array",
            TypeKind::Abstract => "abstract",
            TypeKind::Ref => "ref",
            TypeKind::Struct => "struct",
            TypeKind::Null => "null",
            TypeKind::Guid => "guid",
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_sizes() {
        assert_eq!(TypeKind::Void.slot_size(), 0);
        assert_eq!(TypeKind::Bool.slot_size(), 1);
        assert_eq!(TypeKind::I16.slot_size(), 2);
        assert_eq!(TypeKind::F32.slot_size(), 4);
        assert_eq!(TypeKind::Guid.slot_size(), 8);
        assert_eq!(TypeKind::Obj.slot_size(), POINTER_SIZE);
    }

    #[test]
    fn test_pointer_kinds() {
        for kind in TypeKind::ALL {
            let expected = !matches!(
                kind,
                TypeKind::Void
                    | TypeKind::I8
                    | TypeKind::I16
                    | TypeKind::I32
                    | TypeKind::I64
                    | TypeKind::F32
                    | TypeKind::F64
                    | TypeKind::Bool
                    | TypeKind::Guid
            );
            assert_eq!(kind.is_pointer(), expected, "{}", kind);
        }
    }

    #[test]
    fn test_codes_are_unique() {
        for kind in TypeKind::ALL {
            assert_eq!(TypeKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(TypeKind::from_code('z'), None);
    }
}
