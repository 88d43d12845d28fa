//! Closures and method binding
//!
//! A closure pairs a function pointer with an optional bound first argument.
//! When a value is bound, the closure's own type is the function's full type
//! with the first parameter dropped; the registry memoizes that derived type
//! and links it back to the full type so [`Runtime::unbind`] can recover it.

use crate::runtime::Runtime;
use crate::value::{Payload, Value};
use crate::{NativeError, NativeResult};
use kestrel_types::{FunctionIndex, TypeKind, TypeRef};
use std::sync::Arc;

/// Heap-resident closure
///
/// The declared type, `has_bound_value` and the function's real arity must
/// agree; there is no way to inspect a function pointer's arity, so the
/// agreement is a precondition of construction.
#[derive(Debug, Clone)]
pub struct Closure {
    ty: TypeRef,
    function: FunctionIndex,
    bound: Option<Value>,
}

impl Closure {
    /// Calling type of the closure
    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    /// Function pointer
    pub fn function(&self) -> FunctionIndex {
        self.function
    }

    /// Implicit first argument, if any
    pub fn bound(&self) -> Option<&Value> {
        self.bound.as_ref()
    }

    /// Whether a first argument is bound
    pub fn has_bound_value(&self) -> bool {
        self.bound.is_some()
    }

    /// Number of arguments a caller supplies
    pub fn arity(&self) -> usize {
        self.ty.as_function().map_or(0, |fun| fun.arity())
    }
}

impl Runtime {
    /// Allocate an unbound closure over `function` with calling type `ty`
    pub fn make_closure(&mut self, ty: &TypeRef, function: FunctionIndex) -> NativeResult<Value> {
        require_function_type(ty)?;
        let closure = Closure {
            ty: Arc::clone(ty),
            function,
            bound: None,
        };
        let block = self.heap_mut().allocate_closure(closure)?;
        Ok(Value::new(Arc::clone(ty), Payload::Ptr(Some(block))))
    }

    /// Allocate a closure that supplies `bound` as the first argument
    ///
    /// # Panics
    ///
    /// Panics if `full` is a function type without parameters.
    pub fn make_bound_closure(
        &mut self,
        full: &TypeRef,
        function: FunctionIndex,
        bound: Value,
    ) -> NativeResult<Value> {
        require_function_type(full)?;
        let ty = match self.registry().closure_type(full) {
            Some(ty) => ty,
            None => panic!("cannot bind a value to {}: it has no first parameter", full),
        };
        let closure = Closure {
            ty: Arc::clone(&ty),
            function,
            bound: Some(bound),
        };
        let block = self.heap_mut().allocate_closure(closure)?;
        Ok(Value::new(ty, Payload::Ptr(Some(block))))
    }

    /// The closure a value points at, if any
    pub fn closure(&self, value: &Value) -> Option<&Closure> {
        let r = value.as_gc_ref()?;
        if r.offset() != 0 {
            return None;
        }
        self.heap().closure(r)
    }

    /// Strip the bound value, recovering the original full type
    ///
    /// Unbound closures and raw function pointers are returned as is.
    ///
    /// # Panics
    ///
    /// Panics if a bound closure's type has no parent link.
    pub fn unbind(&mut self, callee: &Value) -> NativeResult<Value> {
        match callee.payload() {
            Payload::Code(_) => return Ok(callee.clone()),
            Payload::Ptr(None) => return Err(NativeError::NullAccess),
            _ => {}
        }
        let closure = self
            .closure(callee)
            .ok_or_else(|| NativeError::InvalidArgument(format!("{:?} is not a closure", callee)))?;
        if !closure.has_bound_value() {
            return Ok(callee.clone());
        }

        let function = closure.function;
        let original = match closure.ty.as_function().and_then(|fun| fun.parent()) {
            Some(parent) => Arc::clone(parent),
            None => panic!("bound closure of type {} has no original type", closure.ty),
        };
        self.make_closure(&original, function)
    }

    /// Call a closure or raw function pointer
    ///
    /// A bound value is passed ahead of `args`.
    pub fn call(&mut self, callee: &Value, args: &[Value]) -> NativeResult<Value> {
        match callee.payload() {
            Payload::Code(function) => return self.call_function(*function, args),
            Payload::Ptr(None) => return Err(NativeError::NullAccess),
            _ => {}
        }
        let closure = self
            .closure(callee)
            .ok_or_else(|| NativeError::InvalidArgument(format!("{:?} is not callable", callee)))?;
        debug_assert_eq!(
            args.len(),
            closure.arity(),
            "closure of type {} called with {} arguments",
            closure.ty,
            args.len()
        );

        let function = closure.function;
        match closure.bound.clone() {
            None => self.call_function(function, args),
            Some(bound) => {
                let mut full = Vec::with_capacity(args.len() + 1);
                full.push(bound);
                full.extend_from_slice(args);
                self.call_function(function, &full)
            }
        }
    }
}

fn require_function_type(ty: &TypeRef) -> NativeResult<()> {
    if ty.kind() == TypeKind::Fun {
        Ok(())
    } else {
        Err(NativeError::InvalidArgument(format!(
            "closure type must be a function, got {}",
            ty
        )))
    }
}
