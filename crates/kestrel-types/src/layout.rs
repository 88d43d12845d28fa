//! Fixed object layouts
//!
//! Objects are byte arenas: every field is an `(offset, type)` pair resolved
//! once, when the layout is registered.
//!
//! ```text
//! Obj kind                          Struct kind
//! ┌──────────────────────────┐      ┌──────────────────────────┐
//! │ type tag (8 bytes)       │      │ field 0                  │
//! ├──────────────────────────┤      ├──────────────────────────┤
//! │ field 0 (naturally       │      │ field 1 ...              │
//! │ aligned to slot size)    │      └──────────────────────────┘
//! ├──────────────────────────┤
//! │ field 1 ...              │
//! └──────────────────────────┘
//! ```
//!
//! Element size is rounded up to 8 so that struct arrays keep every element
//! aligned.

use crate::error::{TypeError, TypeResult};
use crate::kind::TypeKind;
use crate::ty::{FunctionIndex, TypeRef};
use rustc_hash::FxHashMap;
use std::fmt;

/// Size of the runtime type header at the start of every `Obj` instance
pub const OBJECT_HEADER_SIZE: usize = 8;

const LAYOUT_ALIGN: usize = 8;
const FIELD_HASH_MODULUS: i64 = 0x1FFF_FF7B;

/// Hashed field identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(i32);

impl FieldId {
    /// Hash a field name
    ///
    /// Deterministic across runs and platforms: `h = 223 * h + byte`,
    /// reduced into `[0, 0x1FFFFF7B)`.
    pub fn hash(name: &str) -> Self {
        let mut h: i64 = 0;
        for byte in name.bytes() {
            h = (h * 223 + i64::from(byte)) % FIELD_HASH_MODULUS;
        }
        FieldId(h as i32)
    }

    /// Wrap a precomputed id
    pub const fn from_raw(raw: i32) -> Self {
        FieldId(raw)
    }

    /// Raw id value
    pub const fn as_i32(self) -> i32 {
        self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field#{}", self.0)
    }
}

/// One resolved field
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Source name
    pub name: String,
    /// Hashed id
    pub id: FieldId,
    /// Declared type
    pub ty: TypeRef,
    /// Byte offset from the start of the instance
    pub offset: usize,
}

/// Function installed into a field when an instance is allocated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualBinding {
    /// Target field
    pub field: FieldId,
    /// Implementation
    pub function: FunctionIndex,
    /// Install a closure bound to the instance instead of the raw pointer
    pub bind_receiver: bool,
}

/// Resolved layout of an `Obj` or `Struct` type
#[derive(Debug, Clone)]
pub struct ObjectLayout {
    name: String,
    fields: Vec<FieldDescriptor>,
    by_id: FxHashMap<FieldId, usize>,
    size: usize,
    has_pointers: bool,
    bindings: Vec<VirtualBinding>,
    to_string: Option<FunctionIndex>,
}

impl ObjectLayout {
    /// Type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Look up a field by hashed id
    pub fn field(&self, id: FieldId) -> Option<&FieldDescriptor> {
        self.by_id.get(&id).map(|&i| &self.fields[i])
    }

    /// Full instance size in bytes (header included)
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether any field holds a traceable pointer
    pub fn has_pointers(&self) -> bool {
        self.has_pointers
    }

    /// Virtual bindings, resolved against the field table
    pub fn bindings(&self) -> &[VirtualBinding] {
        &self.bindings
    }

    /// User-defined string conversion method, if any
    pub fn to_string_method(&self) -> Option<FunctionIndex> {
        self.to_string
    }
}

/// Unresolved description of an object or struct type
///
/// Handed to [`TypeRegistry::register_object`](crate::TypeRegistry::register_object),
/// which computes offsets and validates bindings.
#[derive(Debug, Clone)]
pub struct ObjectDef {
    name: String,
    kind: TypeKind,
    fields: Vec<(String, TypeRef)>,
    bindings: Vec<(String, FunctionIndex, bool)>,
    to_string: Option<FunctionIndex>,
}

impl ObjectDef {
    /// Class instance type (carries a runtime type header)
    pub fn class(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Obj)
    }

    /// Headerless fixed layout type
    pub fn structure(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Struct)
    }

    fn with_kind(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            fields: Vec::new(),
            bindings: Vec::new(),
            to_string: None,
        }
    }

    /// Append a field
    pub fn field(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.fields.push((name.into(), ty));
        self
    }

    /// Install a closure bound to each instance into `field`
    pub fn method_binding(mut self, field: impl Into<String>, function: FunctionIndex) -> Self {
        self.bindings.push((field.into(), function, true));
        self
    }

    /// Install the raw function pointer into `field`
    pub fn static_binding(mut self, field: impl Into<String>, function: FunctionIndex) -> Self {
        self.bindings.push((field.into(), function, false));
        self
    }

    /// Declare the string conversion method used by stringification
    pub fn to_string_method(mut self, function: FunctionIndex) -> Self {
        self.to_string = Some(function);
        self
    }

    /// Kind the registered type will have
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Compute offsets and resolve bindings
    pub(crate) fn resolve(self) -> TypeResult<ObjectLayout> {
        let mut offset = if self.kind == TypeKind::Obj {
            OBJECT_HEADER_SIZE
        } else {
            0
        };
        let mut fields = Vec::with_capacity(self.fields.len());
        let mut by_id = FxHashMap::default();
        let mut has_pointers = false;

        for (name, ty) in self.fields {
            let id = FieldId::hash(&name);
            if let Some(&existing) = by_id.get(&id) {
                let existing: &FieldDescriptor = &fields[existing];
                return Err(TypeError::DuplicateField {
                    type_name: self.name,
                    field: name,
                    other: existing.name.clone(),
                });
            }

            let size = ty.kind().slot_size();
            offset = align_up(offset, size.max(1));
            has_pointers |= ty.kind().is_pointer();
            by_id.insert(id, fields.len());
            fields.push(FieldDescriptor {
                name,
                id,
                ty,
                offset,
            });
            offset += size;
        }

        let mut bindings = Vec::with_capacity(self.bindings.len());
        for (field_name, function, bind_receiver) in self.bindings {
            let id = FieldId::hash(&field_name);
            let field = by_id.get(&id).map(|&i| &fields[i]);
            match field {
                Some(field) if field.ty.kind() == TypeKind::Fun => bindings.push(VirtualBinding {
                    field: id,
                    function,
                    bind_receiver,
                }),
                _ => {
                    return Err(TypeError::InvalidBinding {
                        type_name: self.name,
                        field: field_name,
                    })
                }
            }
        }

        Ok(ObjectLayout {
            name: self.name,
            fields,
            by_id,
            size: align_up(offset, LAYOUT_ALIGN),
            has_pointers,
            bindings,
            to_string: self.to_string,
        })
    }
}

fn align_up(offset: usize, align: usize) -> usize {
    offset.div_ceil(align) * align
}
