//! Function table
//!
//! Raw function pointers are indices into this table. Each entry records the
//! full declared type of the function, which is what a receiver-bound
//! closure over it is derived from.

use crate::runtime::Runtime;
use crate::value::Value;
use crate::NativeResult;
use kestrel_types::{FunctionIndex, TypeKind, TypeRef};
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// Host implementation of a function
pub type NativeFn = Arc<dyn Fn(&mut Runtime, &[Value]) -> NativeResult<Value> + Send + Sync>;

/// One registered function
#[derive(Clone)]
pub struct FunctionEntry {
    name: String,
    ty: TypeRef,
    func: NativeFn,
}

impl FunctionEntry {
    /// Function name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full declared type
    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    /// Implementation
    pub fn func(&self) -> &NativeFn {
        &self.func
    }
}

impl fmt::Debug for FunctionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionEntry")
            .field("name", &self.name)
            .field("ty", &self.ty.to_string())
            .finish()
    }
}

/// Registry of callable functions
#[derive(Debug, Default)]
pub struct FunctionTable {
    entries: Vec<FunctionEntry>,
    by_name: FxHashMap<String, FunctionIndex>,
}

impl FunctionTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under its full type
    ///
    /// # Panics
    ///
    /// Panics if `ty` is not a function type.
    pub fn register<F>(&mut self, name: impl Into<String>, ty: TypeRef, func: F) -> FunctionIndex
    where
        F: Fn(&mut Runtime, &[Value]) -> NativeResult<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        assert_eq!(
            ty.kind(),
            TypeKind::Fun,
            "function '{}' registered with non-function type {}",
            name,
            ty
        );
        let index = FunctionIndex::new(self.entries.len() as u32);
        tracing::debug!(%name, index = index.as_u32(), ty = %ty, "register function");
        self.by_name.insert(name.clone(), index);
        self.entries.push(FunctionEntry {
            name,
            ty,
            func: Arc::new(func),
        });
        index
    }

    /// Entry for a function pointer
    pub fn get(&self, index: FunctionIndex) -> Option<&FunctionEntry> {
        self.entries.get(index.as_usize())
    }

    /// Find a function by name (last registration wins)
    pub fn lookup(&self, name: &str) -> Option<FunctionIndex> {
        self.by_name.get(name).copied()
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
