//! Runtime instance
//!
//! A [`Runtime`] owns the heap and function table of one mutator and shares
//! the type registry. Native operations are implemented as `impl Runtime`
//! blocks in their own modules (`array.rs`, `closure.rs`, `field.rs`,
//! `stringify.rs`).

use crate::function::FunctionTable;
use crate::gc::{GcRef, Heap};
use crate::options::RuntimeOptions;
use crate::value::{Payload, Value};
use crate::{NativeError, NativeResult};
use kestrel_types::{FunctionIndex, TypeIndex, TypeKind, TypeRef, TypeRegistry};
use once_cell::unsync::OnceCell;
use std::sync::Arc;

/// Name of the abstract type used to pass type descriptors to primitives
pub const TYPE_HANDLE_NAME: &str = "type";

/// Native support layer state for one mutator
#[derive(Debug)]
pub struct Runtime {
    registry: Arc<TypeRegistry>,
    heap: Heap,
    functions: FunctionTable,
    /// Shared zero-length dynamic array, allocated on first request
    pub(crate) empty_dynamic_array: OnceCell<GcRef>,
    type_handle: TypeRef,
    options: RuntimeOptions,
}

impl Runtime {
    /// Create a runtime over a shared registry
    pub fn new(registry: Arc<TypeRegistry>, options: RuntimeOptions) -> Self {
        let type_handle = registry.abstract_type(TYPE_HANDLE_NAME);
        Self {
            heap: Heap::new(options.max_heap_bytes),
            registry,
            functions: FunctionTable::new(),
            empty_dynamic_array: OnceCell::new(),
            type_handle,
            options,
        }
    }

    /// Create a runtime with its own registry
    pub fn with_options(options: RuntimeOptions) -> Self {
        Self::new(Arc::new(TypeRegistry::new()), options)
    }

    /// Type registry
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Heap
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Mutable heap
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Function table
    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    /// Options this runtime was created with
    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// Register a host function under its full type
    pub fn register_function<F>(&mut self, name: &str, ty: TypeRef, func: F) -> FunctionIndex
    where
        F: Fn(&mut Runtime, &[Value]) -> NativeResult<Value> + Send + Sync + 'static,
    {
        self.functions.register(name, ty, func)
    }

    /// Wrap a type descriptor so it can be passed to a primitive
    pub fn type_value(&self, ty: &TypeRef) -> Value {
        Value::new(
            Arc::clone(&self.type_handle),
            Payload::Int(i64::from(ty.index().as_u32())),
        )
    }

    /// Recover a type descriptor passed to a primitive
    pub fn type_from_value(&self, value: &Value) -> NativeResult<TypeRef> {
        let index = match (value.ty() == &self.type_handle, value.payload()) {
            (true, Payload::Int(index)) => u32::try_from(*index).ok(),
            _ => None,
        };
        index
            .and_then(|index| self.registry.get(TypeIndex::new(index)))
            .ok_or_else(|| NativeError::InvalidArgument(format!("expected a type handle, got {:?}", value)))
    }

    /// Invoke a raw function pointer
    ///
    /// # Panics
    ///
    /// Panics if `function` was never registered.
    pub fn call_function(&mut self, function: FunctionIndex, args: &[Value]) -> NativeResult<Value> {
        let func = match self.functions.get(function) {
            Some(entry) => Arc::clone(entry.func()),
            None => panic!("call through unregistered function pointer {}", function.as_u32()),
        };
        func(self, args)
    }

    /// Runtime type of an object-like receiver
    ///
    /// `Obj` instances carry their own type tag, which may name a more
    /// specific type than the static one; `Struct` values are taken as
    /// declared.
    pub(crate) fn receiver_type(&self, ty: &TypeRef, target: GcRef) -> TypeRef {
        if ty.kind() != TypeKind::Obj {
            return Arc::clone(ty);
        }
        let tag = self
            .heap
            .bytes(target)
            .and_then(|bytes| bytes.get(..8))
            .map(|bytes| {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(bytes);
                u64::from_le_bytes(raw)
            });
        match tag.and_then(|tag| self.registry.get(TypeIndex::new(tag as u32))) {
            Some(runtime) if runtime.is_object_like() => runtime,
            _ => panic!("object at {} has no valid runtime type tag", target),
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::with_options(RuntimeOptions::default())
    }
}
