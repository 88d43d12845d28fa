//! Array allocation and element access
//!
//! Two array shapes share one block representation:
//!
//! - **Slot arrays**: `length` slots of the element type's slot size
//!   (`alloc_array`)
//! - **Inline arrays**: `length` full instances of an `Obj`/`Struct` layout
//!   stored back to back (`alloc_struct_array`); element pointers are the
//!   array's block with the element's byte offset
//!
//! Every freshly allocated instance, standalone or inline, is initialized the
//! same way: `Obj` instances get their runtime type tag in the header, then
//! every virtual binding field receives either the raw function pointer or a
//! closure bound to the instance.

use crate::gc::{AllocKind, GcRef};
use crate::runtime::Runtime;
use crate::value::{encode_slot, Payload, Value};
use crate::{NativeError, NativeResult};
use kestrel_types::{TypeKind, TypeRef};
use std::ops::Range;
use std::sync::Arc;

/// Array header plus element payload
#[derive(Debug, Clone)]
pub struct ArrayData {
    element: TypeRef,
    length: usize,
    element_size: usize,
    inline: bool,
    bytes: Vec<u8>,
}

impl ArrayData {
    pub(crate) fn zeroed(element: TypeRef, length: usize, element_size: usize, inline: bool) -> Self {
        Self {
            element,
            length,
            element_size,
            inline,
            bytes: vec![0; length * element_size],
        }
    }

    /// Element type
    pub fn element(&self) -> &TypeRef {
        &self.element
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.length
    }

    /// Check if the array has no elements
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Bytes per element
    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Whether elements are inline instances rather than slots
    pub fn is_inline(&self) -> bool {
        self.inline
    }

    /// Element payload
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Byte range of `count` elements starting at `start`, if in bounds
    fn window(&self, start: usize, count: usize) -> Option<Range<usize>> {
        let end = start.checked_add(count)?;
        (end <= self.length).then(|| start * self.element_size..end * self.element_size)
    }
}

fn checked_length(length: i64) -> NativeResult<usize> {
    usize::try_from(length)
        .map_err(|_| NativeError::InvalidArgument(format!("negative array length {}", length)))
}

fn checked_position(what: &str, value: i64) -> NativeResult<usize> {
    usize::try_from(value)
        .map_err(|_| NativeError::InvalidArgument(format!("negative blit {} {}", what, value)))
}

impl Runtime {
    /// Allocate a zero-filled array of `length` slots of `element`
    ///
    /// Zero-length dynamic arrays are a shared singleton.
    pub fn alloc_array(&mut self, element: &TypeRef, length: i64) -> NativeResult<Value> {
        let length = checked_length(length)?;
        let array_ty = self.registry().array();

        if element.kind() == TypeKind::Dyn && length == 0 {
            if let Some(empty) = self.empty_dynamic_array.get() {
                return Ok(Value::new(array_ty, Payload::Ptr(Some(*empty))));
            }
            let empty = self.heap_mut().allocate_array(
                Arc::clone(element),
                0,
                element.kind().slot_size(),
                false,
                AllocKind::MayContainPointers,
            )?;
            tracing::debug!(array = %empty, "allocated shared empty dynamic array");
            let _ = self.empty_dynamic_array.set(empty);
            return Ok(Value::new(array_ty, Payload::Ptr(Some(empty))));
        }

        let element_size = self.registry().size_of(element);
        let kind = AllocKind::for_pointers(self.registry().may_contain_pointers(element));
        let array = self
            .heap_mut()
            .allocate_array(Arc::clone(element), length, element_size, false, kind)?;
        Ok(Value::new(array_ty, Payload::Ptr(Some(array))))
    }

    /// Allocate `length` inline instances of an `Obj` or `Struct` type
    ///
    /// Every element is initialized like a standalone [`alloc_object`](Self::alloc_object).
    pub fn alloc_struct_array(&mut self, ty: &TypeRef, length: i64) -> NativeResult<Value> {
        if !self.registry().is_object_like(ty) {
            return Err(NativeError::InvalidArgument(format!(
                "struct arrays need an object or struct type, got {}",
                ty
            )));
        }
        let length = checked_length(length)?;
        let element_size = self.registry().instance_size(ty);
        let kind = AllocKind::for_pointers(self.registry().instance_may_contain_pointers(ty));
        let array = self
            .heap_mut()
            .allocate_array(Arc::clone(ty), length, element_size, true, kind)?;

        for index in 0..length {
            self.init_instance(array.with_offset(index * element_size), ty)?;
        }
        Ok(Value::new(self.registry().array(), Payload::Ptr(Some(array))))
    }

    /// Allocate one initialized `Obj` or `Struct` instance
    pub fn alloc_object(&mut self, ty: &TypeRef) -> NativeResult<Value> {
        if !self.registry().is_object_like(ty) {
            return Err(NativeError::InvalidArgument(format!(
                "{} is not an object or struct type",
                ty
            )));
        }
        let size = self.registry().instance_size(ty);
        let kind = AllocKind::for_pointers(self.registry().instance_may_contain_pointers(ty));
        let object = self.heap_mut().allocate(size, kind, true)?;
        self.init_instance(object, ty)?;
        Ok(Value::new(Arc::clone(ty), Payload::Ptr(Some(object))))
    }

    /// Write the type tag and install virtual bindings into a zeroed instance
    fn init_instance(&mut self, at: GcRef, ty: &TypeRef) -> NativeResult<()> {
        let layout = match ty.as_object() {
            Some(layout) => layout,
            None => panic!("cannot initialize an instance of non-object type {}", ty),
        };

        if ty.kind() == TypeKind::Obj {
            let tag = u64::from(ty.index().as_u32()).to_le_bytes();
            self.instance_bytes_mut(at)[..tag.len()].copy_from_slice(&tag);
        }

        for binding in layout.bindings() {
            let field = match layout.field(binding.field) {
                Some(field) => field,
                None => panic!("binding on {} targets unknown {}", layout.name(), binding.field),
            };
            let payload = if binding.bind_receiver {
                let full = match self.functions().get(binding.function) {
                    Some(entry) => Arc::clone(entry.ty()),
                    None => panic!(
                        "binding {}.{} uses unregistered function {}",
                        layout.name(),
                        field.name,
                        binding.function.as_u32()
                    ),
                };
                let receiver = Value::new(Arc::clone(ty), Payload::Ptr(Some(at)));
                let closure = self.make_bound_closure(&full, binding.function, receiver)?;
                closure.payload().clone()
            } else {
                Payload::Code(binding.function)
            };
            tracing::trace!(
                instance = %at,
                field = %field.name,
                bound = binding.bind_receiver,
                "install binding"
            );
            let slot = &mut self.instance_bytes_mut(at)[field.offset..];
            encode_slot(slot, field.ty.kind(), &payload);
        }
        Ok(())
    }

    fn instance_bytes_mut(&mut self, at: GcRef) -> &mut [u8] {
        match self.heap_mut().bytes_mut(at) {
            Some(bytes) => bytes,
            None => panic!("instance at {} is not byte storage", at),
        }
    }

    /// Resolve an array operand to its block
    fn array_ref(&self, array: &Value) -> NativeResult<GcRef> {
        match array.payload() {
            Payload::Ptr(None) => return Err(NativeError::NullAccess),
            Payload::Ptr(Some(r)) if r.offset() == 0 && self.heap().array(*r).is_some() => {
                return Ok(*r)
            }
            _ => {}
        }
        Err(NativeError::InvalidArgument(format!("{:?} is not an array", array)))
    }

    fn array_data(&self, array: &Value) -> NativeResult<(GcRef, &ArrayData)> {
        let r = self.array_ref(array)?;
        match self.heap().array(r) {
            Some(data) => Ok((r, data)),
            None => Err(NativeError::InvalidArgument(format!("{:?} is not an array", array))),
        }
    }

    /// Copy `length` elements from `src[src_pos..]` to `dst[dst_pos..]`
    ///
    /// Overlapping ranges within one array behave as a memmove. Both arrays
    /// must have the same element type and shape.
    pub fn blit(
        &mut self,
        dst: &Value,
        dst_pos: i64,
        src: &Value,
        src_pos: i64,
        length: i64,
    ) -> NativeResult<()> {
        let dst_ref = self.array_ref(dst)?;
        let src_ref = self.array_ref(src)?;
        let dst_pos = checked_position("destination", dst_pos)?;
        let src_pos = checked_position("source", src_pos)?;
        let length = checked_position("length", length)?;
        let out_of_range = || {
            NativeError::InvalidArgument(format!(
                "blit of {} elements from {} to {} is out of range",
                length, src_pos, dst_pos
            ))
        };

        if dst_ref.block() == src_ref.block() {
            let array = self
                .heap_mut()
                .array_mut(dst_ref)
                .ok_or_else(|| NativeError::InvalidArgument("blit target vanished".to_string()))?;
            let from = array.window(src_pos, length).ok_or_else(out_of_range)?;
            let to = array.window(dst_pos, length).ok_or_else(out_of_range)?;
            array.bytes.copy_within(from, to.start);
            return Ok(());
        }

        let (dst_array, src_array) = self
            .heap_mut()
            .array_pair_mut(dst_ref, src_ref)
            .ok_or_else(|| NativeError::InvalidArgument("blit operands are not arrays".to_string()))?;
        // Slots keep the meaning, and the collector kind, of their element type
        if !same_layout(src_array, dst_array) {
            return Err(NativeError::InvalidArgument(format!(
                "blit from {} array into {} array",
                describe(src_array),
                describe(dst_array)
            )));
        }
        let from = src_array.window(src_pos, length).ok_or_else(out_of_range)?;
        let to = dst_array.window(dst_pos, length).ok_or_else(out_of_range)?;
        dst_array.bytes[to].copy_from_slice(&src_array.bytes[from]);
        Ok(())
    }

    /// Number of elements in an array
    pub fn array_len(&self, array: &Value) -> NativeResult<usize> {
        self.array_data(array).map(|(_, data)| data.len())
    }

    /// Read one element
    ///
    /// Elements of inline arrays come back as element pointers typed with the
    /// element type.
    pub fn array_get(&self, array: &Value, index: i64) -> NativeResult<Value> {
        let (r, data) = self.array_data(array)?;
        let index = element_index(index, data.len())?;
        let offset = index * data.element_size;
        let element = Arc::clone(&data.element);
        if data.inline {
            return Ok(Value::new(element, Payload::Ptr(Some(r.with_offset(offset)))));
        }
        Ok(self.read_slot(r, offset, &element))
    }

    /// Overwrite one element of a slot array
    pub fn array_set(&mut self, array: &Value, index: i64, value: &Value) -> NativeResult<()> {
        let (r, data) = self.array_data(array)?;
        if data.inline {
            return Err(NativeError::InvalidArgument(format!(
                "cannot assign whole elements of an inline {} array",
                data.element
            )));
        }
        let index = element_index(index, data.len())?;
        let offset = index * data.element_size;
        let element = Arc::clone(&data.element);
        self.write_slot(r, offset, &element, value)
    }
}

fn same_layout(a: &ArrayData, b: &ArrayData) -> bool {
    a.element.index() == b.element.index()
        && a.inline == b.inline
        && a.element_size == b.element_size
}

fn describe(array: &ArrayData) -> String {
    if array.inline {
        format!("inline {}", array.element)
    } else {
        array.element.to_string()
    }
}

fn element_index(index: i64, length: usize) -> NativeResult<usize> {
    usize::try_from(index)
        .ok()
        .filter(|&i| i < length)
        .ok_or(NativeError::IndexOutOfBounds { index, length })
}
