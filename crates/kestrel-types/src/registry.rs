//! Type descriptor registry
//!
//! The registry owns every descriptor of a runtime and answers the layout
//! questions the native layer asks: slot size, pointer-containing predicate,
//! field offsets and object-likeness. It also memoizes derived closure types.

use crate::error::{TypeError, TypeResult};
use crate::kind::TypeKind;
use crate::layout::{FieldId, ObjectDef};
use crate::ty::{FunctionType, TypeDescriptor, TypeDetail, TypeIndex, TypeRef};
use dashmap::DashMap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Kinds that need no metadata and are registered once per registry
const SCALAR_KINDS: [TypeKind; 12] = [
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
    TypeKind::Array,
    TypeKind::Guid,
];

/// Registry of type descriptors
///
/// Registration takes a write lock; lookups that only need an existing
/// `TypeRef` never touch the lock. Closure types are cached per registry,
/// keyed by the full type's index.
#[derive(Debug)]
pub struct TypeRegistry {
    types: RwLock<Vec<TypeRef>>,
    scalars: FxHashMap<TypeKind, TypeRef>,
    abstracts: RwLock<FxHashMap<String, TypeRef>>,
    closure_types: DashMap<TypeIndex, TypeRef>,
}

impl TypeRegistry {
    /// Create a registry with every scalar kind pre-registered
    pub fn new() -> Self {
        let mut registry = Self {
            types: RwLock::new(Vec::new()),
            scalars: FxHashMap::default(),
            abstracts: RwLock::new(FxHashMap::default()),
            closure_types: DashMap::new(),
        };
        for kind in SCALAR_KINDS {
            let ty = registry.insert(kind, TypeDetail::None);
            registry.scalars.insert(kind, ty);
        }
        registry
    }

    fn insert(&self, kind: TypeKind, detail: TypeDetail) -> TypeRef {
        let mut types = self.types.write();
        let index = TypeIndex::new(types.len() as u32);
        let ty = Arc::new(TypeDescriptor::new(index, kind, detail));
        types.push(Arc::clone(&ty));
        ty
    }

    /// The shared descriptor of a metadata-free kind
    ///
    /// Returns `None` for kinds that need metadata (`Fun`, `Obj`, `Struct`,
    /// `Ref`, `Null`, `Abstract`).
    pub fn scalar(&self, kind: TypeKind) -> Option<TypeRef> {
        self.scalars.get(&kind).cloned()
    }

    fn builtin(&self, kind: TypeKind) -> TypeRef {
        match self.scalars.get(&kind) {
            Some(ty) => Arc::clone(ty),
            None => unreachable!("{} is pre-registered", kind),
        }
    }

    /// `void`
    pub fn void(&self) -> TypeRef {
        self.builtin(TypeKind::Void)
    }

    /// `i32`
    pub fn i32(&self) -> TypeRef {
        self.builtin(TypeKind::I32)
    }

    /// `i64`
    pub fn i64(&self) -> TypeRef {
        self.builtin(TypeKind::I64)
    }

    /// `f64`
    pub fn f64(&self) -> TypeRef {
        self.builtin(TypeKind::F64)
    }

    /// `bool`
    pub fn bool(&self) -> TypeRef {
        self.builtin(TypeKind::Bool)
    }

    /// `bytes`
    pub fn bytes(&self) -> TypeRef {
        self.builtin(TypeKind::Bytes)
    }

    /// `dynamic`
    pub fn dynamic(&self) -> TypeRef {
        self.builtin(TypeKind::Dyn)
    }

    /// `array`
    pub fn array(&self) -> TypeRef {
        self.builtin(TypeKind::Array)
    }

    /// Register a function type
    pub fn function(&self, params: Vec<TypeRef>, ret: TypeRef) -> TypeRef {
        self.insert(
            TypeKind::Fun,
            TypeDetail::Function(FunctionType::new(params, ret, None)),
        )
    }

    /// Register an `Obj` or `Struct` type
    pub fn register_object(&self, def: ObjectDef) -> TypeResult<TypeRef> {
        let kind = def.kind();
        let layout = def.resolve()?;
        tracing::debug!(
            name = layout.name(),
            %kind,
            size = layout.size(),
            fields = layout.fields().len(),
            bindings = layout.bindings().len(),
            "registered object layout"
        );
        Ok(self.insert(kind, TypeDetail::Object(layout)))
    }

    /// Register a `Ref` or `Null` wrapper
    pub fn wrapper(&self, kind: TypeKind, inner: TypeRef) -> TypeResult<TypeRef> {
        match kind {
            TypeKind::Ref | TypeKind::Null => Ok(self.insert(kind, TypeDetail::Inner(inner))),
            other => Err(TypeError::WrongKind {
                kind: other.to_string(),
                expected: "ref or null wrapper",
            }),
        }
    }

    /// Intern an abstract (opaque host) type by name
    pub fn abstract_type(&self, name: &str) -> TypeRef {
        if let Some(ty) = self.abstracts.read().get(name) {
            return Arc::clone(ty);
        }
        let mut abstracts = self.abstracts.write();
        if let Some(ty) = abstracts.get(name) {
            return Arc::clone(ty);
        }
        let ty = self.insert(TypeKind::Abstract, TypeDetail::Abstract(name.to_string()));
        abstracts.insert(name.to_string(), Arc::clone(&ty));
        ty
    }

    /// Look up a descriptor by index (runtime type tags)
    pub fn get(&self, index: TypeIndex) -> Option<TypeRef> {
        self.types.read().get(index.as_usize()).cloned()
    }

    /// Number of registered descriptors
    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }

    /// Bytes a value of this type occupies in a field or array slot
    pub fn size_of(&self, ty: &TypeDescriptor) -> usize {
        ty.kind().slot_size()
    }

    /// Bytes of one inline instance (struct-array element, standalone object)
    ///
    /// Falls back to the slot size for types without a layout.
    pub fn instance_size(&self, ty: &TypeDescriptor) -> usize {
        match ty.as_object() {
            Some(layout) => layout.size(),
            None => self.size_of(ty),
        }
    }

    /// Whether a slot of this type may hold a traceable pointer
    ///
    /// This decides the collector allocation kind of element arrays and must
    /// never answer `false` for a pointer slot.
    pub fn may_contain_pointers(&self, ty: &TypeDescriptor) -> bool {
        ty.kind().is_pointer()
    }

    /// Whether an inline instance of this type may hold a traceable pointer
    pub fn instance_may_contain_pointers(&self, ty: &TypeDescriptor) -> bool {
        match ty.as_object() {
            Some(layout) => layout.has_pointers(),
            None => self.may_contain_pointers(ty),
        }
    }

    /// Resolve a hashed field to `(byte offset, declared type)`
    pub fn field_offset(&self, ty: &TypeDescriptor, field: FieldId) -> Option<(usize, TypeRef)> {
        let descriptor = ty.as_object()?.field(field)?;
        Some((descriptor.offset, Arc::clone(&descriptor.ty)))
    }

    /// Whether the type has a field layout
    pub fn is_object_like(&self, ty: &TypeDescriptor) -> bool {
        ty.is_object_like()
    }

    /// The type of a closure over `full` with its first parameter bound
    ///
    /// Derived once per registry and memoized; the derived type's parent link
    /// points back at `full`. Returns `None` if `full` is not a function or
    /// has no parameter to drop.
    pub fn closure_type(&self, full: &TypeRef) -> Option<TypeRef> {
        let fun = full.as_function()?;
        if fun.arity() == 0 {
            return None;
        }
        if let Some(cached) = self.closure_types.get(&full.index()) {
            return Some(Arc::clone(cached.value()));
        }

        let entry = self.closure_types.entry(full.index()).or_insert_with(|| {
            tracing::debug!(full = %full, "deriving closure type");
            self.insert(
                TypeKind::Fun,
                TypeDetail::Function(FunctionType::new(
                    fun.params()[1..].to_vec(),
                    Arc::clone(fun.ret()),
                    Some(Arc::clone(full)),
                )),
            )
        });
        Some(Arc::clone(entry.value()))
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
