//! Dynamic field access
//!
//! Fields are addressed by [`FieldId`]; the registry resolves an id to a byte
//! offset and declared type within the receiver's layout. Reads box the slot
//! into a [`Value`] carrying the declared type, writes store the payload back
//! in the slot's encoding.
//!
//! Dynamic and nullable slots point at a boxed copy of the stored value so
//! the value's own type survives the round trip. Host bytes written into a
//! `bytes` slot are copied into a heap block first.

use crate::gc::{AllocKind, GcRef};
use crate::runtime::Runtime;
use crate::value::{decode_slot, encode_slot, is_assignable, Payload, Value};
use crate::{NativeError, NativeResult};
use kestrel_types::{FieldId, TypeKind, TypeRef};
use std::sync::Arc;

impl Runtime {
    /// Read a field
    ///
    /// # Panics
    ///
    /// Panics if the receiver is not an object or struct, or if its layout
    /// has no such field.
    pub fn get_field(&self, object: &Value, field: FieldId) -> NativeResult<Value> {
        let at = receiver(object)?;
        let (offset, field_ty) = self.resolve_field(object, at, field);
        Ok(self.read_slot(at, offset, &field_ty))
    }

    /// Overwrite a field
    ///
    /// The value must be assignable to the field's declared type; this is
    /// only checked in debug builds.
    ///
    /// # Panics
    ///
    /// Panics if the receiver is not an object or struct, or if its layout
    /// has no such field.
    pub fn set_field(&mut self, object: &Value, field: FieldId, value: &Value) -> NativeResult<()> {
        let at = receiver(object)?;
        let (offset, field_ty) = self.resolve_field(object, at, field);
        self.write_slot(at, offset, &field_ty, value)
    }

    /// Field presence test (not available on fixed layouts)
    pub fn has_field(&self, _object: &Value, _field: FieldId) -> NativeResult<bool> {
        Err(NativeError::Unsupported {
            operation: "has_field",
        })
    }

    /// Field removal (not available on fixed layouts)
    pub fn delete_field(&mut self, _object: &Value, _field: FieldId) -> NativeResult<bool> {
        Err(NativeError::Unsupported {
            operation: "delete_field",
        })
    }

    /// Field enumeration (not available on fixed layouts)
    pub fn list_fields(&mut self, _object: &Value) -> NativeResult<Value> {
        Err(NativeError::Unsupported {
            operation: "list_fields",
        })
    }

    fn resolve_field(&self, object: &Value, at: GcRef, field: FieldId) -> (usize, TypeRef) {
        if !object.ty().is_object_like() {
            panic!("field access on non-object receiver of type {}", object.ty());
        }
        let ty = self.receiver_type(object.ty(), at);
        match self.registry().field_offset(&ty, field) {
            Some(resolved) => resolved,
            None => panic!("type {} has no {}", ty, field),
        }
    }

    /// Box the slot at `at + offset` as a value of type `ty`
    pub(crate) fn read_slot(&self, at: GcRef, offset: usize, ty: &TypeRef) -> Value {
        let kind = ty.kind();
        let size = kind.slot_size();
        let slot = self
            .heap()
            .bytes(at)
            .and_then(|bytes| bytes.get(offset..offset + size));
        let payload = match slot {
            Some(slot) => decode_slot(slot, kind),
            None => panic!("slot {}+{} lies outside its block", at, offset),
        };

        if let (TypeKind::Dyn | TypeKind::Null, Payload::Ptr(Some(boxed))) = (kind, &payload) {
            if let Some(value) = self.heap().boxed(*boxed) {
                return value.clone();
            }
        }
        Value::new(Arc::clone(ty), payload)
    }

    /// Store `value` into the slot at `at + offset` declared as `ty`
    pub(crate) fn write_slot(
        &mut self,
        at: GcRef,
        offset: usize,
        ty: &TypeRef,
        value: &Value,
    ) -> NativeResult<()> {
        let kind = ty.kind();
        debug_assert!(
            is_assignable(kind, value.payload()),
            "{:?} is not assignable to {}",
            value,
            ty
        );

        let payload = match (kind, value.payload()) {
            (TypeKind::Dyn | TypeKind::Null, Payload::Ptr(None)) => Payload::Ptr(None),
            (TypeKind::Dyn | TypeKind::Null, _) => {
                Payload::Ptr(Some(self.heap_mut().allocate_boxed(value.clone())?))
            }
            (TypeKind::Bytes, Payload::Raw(bytes)) => {
                let block = self.heap_mut().allocate(bytes.len(), AllocKind::NoPointers, false)?;
                if let Some(storage) = self.heap_mut().bytes_mut(block) {
                    storage.copy_from_slice(bytes);
                }
                Payload::Ptr(Some(block))
            }
            (_, payload) => payload.clone(),
        };

        let size = kind.slot_size();
        let slot = self
            .heap_mut()
            .bytes_mut(at)
            .and_then(|bytes| bytes.get_mut(offset..offset + size));
        match slot {
            Some(slot) => encode_slot(slot, kind, &payload),
            None => panic!("slot {}+{} lies outside its block", at, offset),
        }
        Ok(())
    }
}

fn receiver(object: &Value) -> NativeResult<GcRef> {
    match object.payload() {
        Payload::Ptr(Some(at)) => Ok(*at),
        Payload::Ptr(None) => Err(NativeError::NullAccess),
        _ => panic!("field access on non-pointer receiver {:?}", object),
    }
}
