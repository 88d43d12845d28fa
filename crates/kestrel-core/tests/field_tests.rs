//! Integration tests for dynamic field access
//!
//! Tests cover:
//! - get_field/set_field round trip on fresh objects for every field kind
//! - Field access through inline struct-array elements
//! - Null receivers and unsupported reflective operations

use kestrel_core::{NativeError, Payload, Runtime, Value};
use kestrel_types::{FieldId, ObjectDef, TypeKind, TypeRef, TypeRegistry};
use std::sync::Arc;

fn everything(registry: &TypeRegistry) -> TypeRef {
    let fun = registry.function(vec![registry.i32()], registry.void());
    let nullable = registry.wrapper(TypeKind::Null, registry.i32()).unwrap();
    let mut def = ObjectDef::class("Everything");
    for kind in [
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
    ] {
        def = def.field(format!("f_{}", kind), registry.scalar(kind).unwrap());
    }
    def = def.field("f_fun", fun).field("f_nullable", nullable);
    registry.register_object(def).unwrap()
}

fn field_bytes(rt: &Runtime, object: &Value) -> Vec<u8> {
    rt.heap().bytes(object.as_gc_ref().unwrap()).unwrap().to_vec()
}

#[test]
fn test_get_then_set_is_noop_on_fresh_object() {
    let mut rt = Runtime::default();
    let registry = Arc::clone(rt.registry());
    let ty = everything(&registry);
    let object = rt.alloc_object(&ty).unwrap();
    let before = field_bytes(&rt, &object);
    let allocations = rt.heap().allocation_count();

    for field in ty.as_object().unwrap().fields() {
        let value = rt.get_field(&object, field.id).unwrap();
        assert_eq!(*value.ty(), field.ty, "field {}", field.name);
        rt.set_field(&object, field.id, &value).unwrap();
    }

    assert_eq!(field_bytes(&rt, &object), before);
    assert_eq!(rt.heap().allocation_count(), allocations);
}

#[test]
fn test_written_values_read_back() {
    let mut rt = Runtime::default();
    let registry = Arc::clone(rt.registry());
    let ty = everything(&registry);
    let object = rt.alloc_object(&ty).unwrap();
    let i8_ty = registry.scalar(TypeKind::I8).unwrap();
    let f32_ty = registry.scalar(TypeKind::F32).unwrap();

    let cases = [
        ("f_i8", Value::new(i8_ty, Payload::Int(-12))),
        ("f_i64", Value::i64(&registry, i64::MIN)),
        ("f_f32", Value::new(f32_ty, Payload::Float(0.75))),
        ("f_bool", Value::bool(&registry, true)),
        ("f_dynamic", Value::f64(&registry, 6.5)),
    ];
    for (name, value) in &cases {
        rt.set_field(&object, FieldId::hash(name), value).unwrap();
    }
    for (name, value) in &cases {
        assert_eq!(&rt.get_field(&object, FieldId::hash(name)).unwrap(), value, "{}", name);
    }
}

#[test]
fn test_nullable_field_boxes_value() {
    let mut rt = Runtime::default();
    let registry = Arc::clone(rt.registry());
    let ty = everything(&registry);
    let object = rt.alloc_object(&ty).unwrap();
    let field = FieldId::hash("f_nullable");

    assert!(rt.get_field(&object, field).unwrap().is_null());
    rt.set_field(&object, field, &Value::i32(&registry, 4)).unwrap();
    assert_eq!(rt.get_field(&object, field).unwrap(), Value::i32(&registry, 4));
}

#[test]
fn test_array_field_holds_array() {
    let mut rt = Runtime::default();
    let registry = Arc::clone(rt.registry());
    let ty = everything(&registry);
    let object = rt.alloc_object(&ty).unwrap();
    let array = rt.alloc_array(&registry.i32(), 2).unwrap();
    let field = FieldId::hash("f_array");

    rt.set_field(&object, field, &array).unwrap();
    let read = rt.get_field(&object, field).unwrap();
    assert_eq!(read, array);
    assert_eq!(rt.array_len(&read).unwrap(), 2);
}

#[test]
fn test_struct_array_element_fields_are_independent() {
    let mut rt = Runtime::default();
    let registry = Arc::clone(rt.registry());
    let pair = registry
        .register_object(
            ObjectDef::structure("Pair")
                .field("left", registry.i32())
                .field("right", registry.f64()),
        )
        .unwrap();
    let array = rt.alloc_struct_array(&pair, 4).unwrap();

    for i in 0..4 {
        let element = rt.array_get(&array, i).unwrap();
        rt.set_field(&element, FieldId::hash("left"), &Value::i32(&registry, i as i32))
            .unwrap();
        rt.set_field(&element, FieldId::hash("right"), &Value::f64(&registry, i as f64 / 2.0))
            .unwrap();
    }
    for i in 0..4 {
        let element = rt.array_get(&array, i).unwrap();
        let left = rt.get_field(&element, FieldId::hash("left")).unwrap();
        let right = rt.get_field(&element, FieldId::hash("right")).unwrap();
        assert_eq!(left.as_i64(), Some(i));
        assert_eq!(right.as_f64(), Some(i as f64 / 2.0));
    }
}

#[test]
fn test_null_receiver_and_unsupported() {
    let mut rt = Runtime::default();
    let registry = Arc::clone(rt.registry());
    let ty = everything(&registry);
    let null = Value::new(Arc::clone(&ty), Payload::Ptr(None));
    assert_eq!(
        rt.get_field(&null, FieldId::hash("f_i32")).unwrap_err(),
        NativeError::NullAccess
    );

    let object = rt.alloc_object(&ty).unwrap();
    for err in [
        rt.has_field(&object, FieldId::hash("f_i32")).unwrap_err(),
        rt.delete_field(&object, FieldId::hash("f_i32")).unwrap_err(),
        rt.list_fields(&object).unwrap_err(),
    ] {
        assert!(matches!(err, NativeError::Unsupported { .. }));
        assert!(err.to_string().contains("not supported"));
    }
}
