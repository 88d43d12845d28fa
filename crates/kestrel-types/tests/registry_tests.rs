//! Integration tests for the shared type registry
//!
//! Tests cover:
//! - Concurrent closure-type derivation converging on one descriptor
//! - Concurrent registration from several threads
//! - Signatures built from registered types
//! - Runtime type tags resolving back to layouts

use kestrel_types::{
    FieldId, ObjectDef, SigKind, Signature, TypeError, TypeIndex, TypeKind, TypeRegistry,
};
use std::sync::Arc;
use std::thread;

#[test]
fn test_concurrent_closure_type_derivation() {
    let registry = Arc::new(TypeRegistry::new());
    let full = registry.function(
        vec![registry.dynamic(), registry.i32(), registry.f64()],
        registry.bool(),
    );

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let full = Arc::clone(&full);
            thread::spawn(move || registry.closure_type(&full).unwrap())
        })
        .collect();
    let derived: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let first = &derived[0];
    for other in &derived[1..] {
        assert!(Arc::ptr_eq(first, other));
    }
    let fun = first.as_function().unwrap();
    assert_eq!(fun.arity(), 2);
    assert_eq!(*fun.parent().unwrap(), full);
    assert_eq!(first.to_string(), "(i32, f64) -> bool");
}

#[test]
fn test_concurrent_registration_assigns_distinct_indices() {
    let registry = Arc::new(TypeRegistry::new());
    let base = registry.len();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                (0..25)
                    .map(|i| {
                        let def = ObjectDef::structure(format!("S{}_{}", t, i))
                            .field("v", registry.i64());
                        registry.register_object(def).unwrap().index()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut indices: Vec<TypeIndex> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    indices.sort();
    indices.dedup();
    assert_eq!(indices.len(), 100);
    assert_eq!(registry.len(), base + 100);
}

#[test]
fn test_type_tags_resolve_to_layouts() {
    let registry = TypeRegistry::new();
    let shape = registry
        .register_object(
            ObjectDef::class("Shape")
                .field("sides", registry.i32())
                .field("area", registry.f64()),
        )
        .unwrap();

    let resolved = registry.get(shape.index()).unwrap();
    assert!(Arc::ptr_eq(&resolved, &shape));
    let (offset, ty) = registry
        .field_offset(&resolved, FieldId::hash("area"))
        .unwrap();
    assert_eq!(offset, 16);
    assert_eq!(ty.kind(), TypeKind::F64);
    assert!(registry.field_offset(&resolved, FieldId::hash("perimeter")).is_none());
    assert!(registry.field_offset(&registry.i32(), FieldId::hash("sides")).is_none());
}

#[test]
fn test_signature_of_registered_function() {
    let registry = TypeRegistry::new();
    let handle = registry.abstract_type("type");
    let nullable = registry
        .wrapper(TypeKind::Null, registry.i32())
        .unwrap();
    let reference = registry.wrapper(TypeKind::Ref, nullable).unwrap();
    let fun = registry.function(vec![handle, registry.array()], reference);

    let f = fun.as_function().unwrap();
    let signature = Signature::new(
        f.params().iter().map(|p| SigKind::of(p)).collect(),
        SigKind::of(f.ret()),
    );
    assert_eq!(signature.to_string(), "Xtype_A_R?i");
    assert_eq!(signature, "Xtype_A_R?i".parse::<Signature>().unwrap());
}

#[test]
fn test_wrapper_rejects_other_kinds() {
    let registry = TypeRegistry::new();
    let err = registry
        .wrapper(TypeKind::Array, registry.i32())
        .unwrap_err();
    assert!(matches!(err, TypeError::WrongKind { .. }));
}
