//! Integration tests for closures and virtual bindings
//!
//! Tests cover:
//! - Bound closure arity and type derivation
//! - unbind recovering the original closure shape
//! - Receiver-bound bindings installed into every struct-array element
//! - Raw function pointer bindings
//! - Runtime type tags on object arrays

use kestrel_core::{NativeError, Runtime, Value};
use kestrel_types::{FieldId, FunctionIndex, ObjectDef, TypeKind, TypeRef, TypeRegistry};
use std::sync::Arc;

fn runtime() -> (Runtime, Arc<TypeRegistry>) {
    let rt = Runtime::default();
    let registry = Arc::clone(rt.registry());
    (rt, registry)
}

/// Register `(receiver) -> i32` reading field `id` and scaling it
fn register_reader(rt: &mut Runtime, name: &str, scale: i64) -> (FunctionIndex, TypeRef) {
    let registry = Arc::clone(rt.registry());
    let full = registry.function(vec![registry.dynamic()], registry.i32());
    let function = rt.register_function(name, full.clone(), move |rt, args| {
        let id = rt.get_field(&args[0], FieldId::hash("id"))?;
        let id = id.as_i64().unwrap_or_default();
        Ok(Value::i32(rt.registry(), (id * scale) as i32))
    });
    (function, full)
}

#[test]
fn test_bound_arity_is_one_less() {
    let (mut rt, registry) = runtime();
    for arity in 1..5 {
        let full = registry.function(vec![registry.i64(); arity], registry.void());
        let f = rt.register_function("sink", full.clone(), |rt, _| Ok(Value::void(rt.registry())));

        let bound = rt
            .make_bound_closure(&full, f, Value::i64(&registry, 0))
            .unwrap();
        let closure = rt.closure(&bound).unwrap();
        assert_eq!(closure.arity(), arity - 1);
        assert_eq!(bound.ty().as_function().unwrap().arity(), arity - 1);
    }
}

#[test]
fn test_unbind_matches_make_closure() {
    let (mut rt, registry) = runtime();
    let full = registry.function(vec![registry.dynamic(), registry.i32()], registry.i32());
    let f = rt.register_function("second", full.clone(), |_, args| Ok(args[1].clone()));

    let bound = rt
        .make_bound_closure(&full, f, Value::null(&registry))
        .unwrap();
    let unbound = rt.unbind(&bound).unwrap();
    let fresh = rt.make_closure(&full, f).unwrap();

    assert_eq!(unbound.ty(), fresh.ty());
    let (a, b) = (rt.closure(&unbound).unwrap(), rt.closure(&fresh).unwrap());
    assert_eq!(a.function(), b.function());
    assert_eq!(a.has_bound_value(), b.has_bound_value());
    assert_eq!(a.arity(), 2);

    let args = [Value::null(&registry), Value::i32(&registry, 9)];
    assert_eq!(rt.call(&unbound, &args).unwrap(), Value::i32(&registry, 9));
}

#[test]
fn test_closure_type_memoized_per_registry() {
    let (_, registry) = runtime();
    let full = registry.function(vec![registry.i32(), registry.f64()], registry.bool());
    let before = registry.len();

    let derived = registry.closure_type(&full).unwrap();
    assert_eq!(registry.len(), before + 1);
    assert!(Arc::ptr_eq(&derived, &registry.closure_type(&full).unwrap()));
    assert_eq!(registry.len(), before + 1);

    let other = TypeRegistry::new();
    let other_full = other.function(vec![other.i32(), other.f64()], other.bool());
    let other_derived = other.closure_type(&other_full).unwrap();
    assert_eq!(other_derived.to_string(), derived.to_string());
}

#[test]
fn test_struct_array_installs_two_receiver_bindings() {
    let (mut rt, registry) = runtime();
    let (get_id, _) = register_reader(&mut rt, "Counter.getId", 1);
    let (twice, _) = register_reader(&mut rt, "Counter.twice", 2);
    let method = registry.function(vec![], registry.i32());
    let counter = registry
        .register_object(
            ObjectDef::structure("Counter")
                .field("id", registry.i32())
                .field("getId", method.clone())
                .field("twice", method)
                .method_binding("getId", get_id)
                .method_binding("twice", twice),
        )
        .unwrap();

    let array = rt.alloc_struct_array(&counter, 3).unwrap();
    let elements: Vec<_> = (0..3).map(|i| rt.array_get(&array, i).unwrap()).collect();
    for (i, element) in elements.iter().enumerate() {
        rt.set_field(element, FieldId::hash("id"), &Value::i32(&registry, 10 * i as i32 + 1))
            .unwrap();
    }

    for (i, element) in elements.iter().enumerate() {
        let expected = 10 * i as i32 + 1;
        let get = rt.get_field(element, FieldId::hash("getId")).unwrap();
        let dbl = rt.get_field(element, FieldId::hash("twice")).unwrap();
        assert_eq!(get.kind(), TypeKind::Fun);
        assert!(rt.closure(&get).unwrap().has_bound_value());
        assert_eq!(rt.closure(&get).unwrap().bound(), Some(element));

        assert_eq!(rt.call(&get, &[]).unwrap(), Value::i32(&registry, expected));
        assert_eq!(rt.call(&dbl, &[]).unwrap(), Value::i32(&registry, 2 * expected));
    }

    // One closure per binding per element
    assert_eq!(rt.heap().allocation_count(), 1 + 2 * 3);
}

#[test]
fn test_static_binding_installs_raw_pointer() {
    let (mut rt, registry) = runtime();
    let (reader, full) = register_reader(&mut rt, "Box.read", 3);
    let boxed = registry
        .register_object(
            ObjectDef::class("Box")
                .field("id", registry.i32())
                .field("read", full)
                .static_binding("read", reader),
        )
        .unwrap();

    let object = rt.alloc_object(&boxed).unwrap();
    rt.set_field(&object, FieldId::hash("id"), &Value::i32(&registry, 5))
        .unwrap();
    let read = rt.get_field(&object, FieldId::hash("read")).unwrap();
    assert_eq!(read.as_function(), Some(reader));
    assert!(rt.closure(&read).is_none());

    let result = rt.call(&read, std::slice::from_ref(&object)).unwrap();
    assert_eq!(result, Value::i32(&registry, 15));
}

#[test]
fn test_object_array_elements_carry_type_tag() {
    let (mut rt, registry) = runtime();
    let (get_id, _) = register_reader(&mut rt, "Item.getId", 1);
    let method = registry.function(vec![], registry.i32());
    let item = registry
        .register_object(
            ObjectDef::class("Item")
                .field("id", registry.i32())
                .field("getId", method)
                .method_binding("getId", get_id),
        )
        .unwrap();

    let array = rt.alloc_struct_array(&item, 2).unwrap();
    let size = registry.instance_size(&item);
    let block = array.as_gc_ref().unwrap();
    let bytes = rt.heap().bytes(block).unwrap();
    for i in 0..2 {
        let tag = &bytes[i * size..i * size + 8];
        assert_eq!(tag, &u64::from(item.index().as_u32()).to_le_bytes());
    }

    let second = rt.array_get(&array, 1).unwrap();
    rt.set_field(&second, FieldId::hash("id"), &Value::i32(&registry, 77))
        .unwrap();
    let get = rt.get_field(&second, FieldId::hash("getId")).unwrap();
    assert_eq!(rt.call(&get, &[]).unwrap(), Value::i32(&registry, 77));
}

#[test]
fn test_call_errors_propagate() {
    let (mut rt, registry) = runtime();
    let full = registry.function(vec![registry.i32()], registry.i32());
    let f = rt.register_function("fails", full.clone(), |_, _| {
        Err(NativeError::Host("nope".to_string()))
    });
    let bound = rt
        .make_bound_closure(&full, f, Value::i32(&registry, 1))
        .unwrap();
    assert_eq!(
        rt.call(&bound, &[]).unwrap_err(),
        NativeError::Host("nope".to_string())
    );
    assert!(matches!(
        rt.call(&Value::i32(&registry, 3), &[]),
        Err(NativeError::InvalidArgument(_))
    ));
}
