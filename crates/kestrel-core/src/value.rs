//! Dynamic values
//!
//! A [`Value`] pairs a type descriptor with a payload. It is how fixed-layout
//! data crosses into the dynamic world: field reads, array element reads,
//! primitive arguments and closure bound values are all `Value`s.
//!
//! # Slot Encoding
//!
//! Fields and array elements are raw little-endian slots sized by their
//! declared kind:
//!
//! ```text
//! i8/bool: 1 byte   i16: 2 bytes   i32/f32: 4 bytes   i64/f64/guid: 8 bytes
//! pointer kinds: 8 bytes, 0 = null, bit 63 set = function index, else GcRef
//! ```
//!
//! Dynamic and nullable slots hold a pointer to a boxed value; the boxing
//! itself needs the heap and lives in `field.rs`.

use crate::gc::GcRef;
use kestrel_types::{FunctionIndex, TypeKind, TypeRef, TypeRegistry};
use std::fmt;
use std::sync::Arc;

/// Tag marking a pointer slot that holds a function index instead of a heap ref
pub const CODE_TAG: u64 = 1 << 63;

/// Raw payload of a dynamic value
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Any integer kind (and guids)
    Int(i64),
    /// `f32` (widened) or `f64`
    Float(f64),
    /// Boolean
    Bool(bool),
    /// Heap pointer; `None` is null
    Ptr(Option<GcRef>),
    /// Raw function pointer
    Code(FunctionIndex),
    /// Host-owned bytes (strings handed in or out of the VM)
    Raw(Arc<[u8]>),
}

/// Tagged dynamic value: (type, payload)
///
/// Immutable once constructed; equality is type identity plus payload.
#[derive(Clone)]
pub struct Value {
    ty: TypeRef,
    payload: Payload,
}

impl Value {
    /// Create a value from its parts
    pub fn new(ty: TypeRef, payload: Payload) -> Self {
        Self { ty, payload }
    }

    /// The null value
    pub fn null(registry: &TypeRegistry) -> Self {
        Self::new(registry.dynamic(), Payload::Ptr(None))
    }

    /// The value returned by void primitives
    pub fn void(registry: &TypeRegistry) -> Self {
        Self::new(registry.void(), Payload::Ptr(None))
    }

    /// An `i32` value
    pub fn i32(registry: &TypeRegistry, value: i32) -> Self {
        Self::new(registry.i32(), Payload::Int(i64::from(value)))
    }

    /// An `i64` value
    pub fn i64(registry: &TypeRegistry, value: i64) -> Self {
        Self::new(registry.i64(), Payload::Int(value))
    }

    /// An `f64` value
    pub fn f64(registry: &TypeRegistry, value: f64) -> Self {
        Self::new(registry.f64(), Payload::Float(value))
    }

    /// A `bool` value
    pub fn bool(registry: &TypeRegistry, value: bool) -> Self {
        Self::new(registry.bool(), Payload::Bool(value))
    }

    /// Host-owned UTF-8 text
    pub fn string(registry: &TypeRegistry, text: &str) -> Self {
        Self::new(registry.bytes(), Payload::Raw(Arc::from(text.as_bytes())))
    }

    /// Declared type
    #[inline]
    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    /// Kind tag of the declared type
    #[inline]
    pub fn kind(&self) -> TypeKind {
        self.ty.kind()
    }

    /// Raw payload
    #[inline]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self.payload, Payload::Ptr(None))
    }

    /// Extract an integer payload
    pub fn as_i64(&self) -> Option<i64> {
        match self.payload {
            Payload::Int(i) => Some(i),
            _ => None,
        }
    }

    /// Extract a numeric payload as a float
    pub fn as_f64(&self) -> Option<f64> {
        match self.payload {
            Payload::Float(f) => Some(f),
            Payload::Int(i) => Some(i as f64),
            _ => None,
        }
    }

    /// Extract a boolean payload
    pub fn as_bool(&self) -> Option<bool> {
        match self.payload {
            Payload::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// Extract a non-null heap pointer
    pub fn as_gc_ref(&self) -> Option<GcRef> {
        match self.payload {
            Payload::Ptr(r) => r,
            _ => None,
        }
    }

    /// Extract a raw function pointer
    pub fn as_function(&self) -> Option<FunctionIndex> {
        match self.payload {
            Payload::Code(f) => Some(f),
            _ => None,
        }
    }

    /// Extract host-owned bytes
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::Raw(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Whether the payload is a traceable heap pointer
    pub fn holds_pointer(&self) -> bool {
        matches!(self.payload, Payload::Ptr(Some(_)))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty && self.payload == other.payload
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Payload::Int(i) => write!(f, "{}({})", self.ty, i),
            Payload::Float(x) => write!(f, "{}({})", self.ty, x),
            Payload::Bool(b) => write!(f, "{}({})", self.ty, b),
            Payload::Ptr(None) => write!(f, "{}(null)", self.ty),
            Payload::Ptr(Some(r)) => write!(f, "{}(@{})", self.ty, r),
            Payload::Code(func) => write!(f, "{}(fn#{})", self.ty, func.as_u32()),
            Payload::Raw(bytes) => write!(f, "{}({:?})", self.ty, String::from_utf8_lossy(bytes)),
        }
    }
}

/// Whether a payload may be written into a slot of `kind`
pub(crate) fn is_assignable(kind: TypeKind, payload: &Payload) -> bool {
    match kind {
        TypeKind::Void | TypeKind::Dyn | TypeKind::Null => true,
        TypeKind::I8
        | TypeKind::I16
        | TypeKind::I32
        | TypeKind::I64
        | TypeKind::F32
        | TypeKind::F64
        | TypeKind::Bool
        | TypeKind::Guid => matches!(
            payload,
            Payload::Int(_) | Payload::Float(_) | Payload::Bool(_)
        ),
        TypeKind::Bytes
        | TypeKind::Fun
        | TypeKind::Obj
        | TypeKind::Array
        | TypeKind::Abstract
        | TypeKind::Ref
        | TypeKind::Struct => !matches!(payload, Payload::Float(_)),
    }
}

fn le_bytes<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

/// Decode the payload of a pointer slot
pub(crate) fn decode_pointer(bits: u64) -> Payload {
    if bits == 0 {
        Payload::Ptr(None)
    } else if bits & CODE_TAG != 0 {
        Payload::Code(FunctionIndex::new(bits as u32))
    } else {
        Payload::Ptr(GcRef::from_bits(bits))
    }
}

/// Encode a payload for a pointer slot
pub(crate) fn encode_pointer(payload: &Payload) -> u64 {
    match payload {
        Payload::Ptr(None) => 0,
        Payload::Ptr(Some(r)) => r.to_bits(),
        Payload::Code(f) => CODE_TAG | u64::from(f.as_u32()),
        Payload::Int(i) => *i as u64,
        Payload::Float(x) => x.to_bits(),
        Payload::Bool(b) => u64::from(*b),
        Payload::Raw(bytes) => {
            let mut out = [0u8; 8];
            let n = bytes.len().min(8);
            out[..n].copy_from_slice(&bytes[..n]);
            u64::from_le_bytes(out)
        }
    }
}

fn payload_int(payload: &Payload) -> i64 {
    match payload {
        Payload::Int(i) => *i,
        Payload::Float(x) => *x as i64,
        Payload::Bool(b) => i64::from(*b),
        other => encode_pointer(other) as i64,
    }
}

fn payload_float(payload: &Payload) -> f64 {
    match payload {
        Payload::Float(x) => *x,
        Payload::Int(i) => *i as f64,
        Payload::Bool(b) => f64::from(u8::from(*b)),
        _ => 0.0,
    }
}

/// Read an unboxed slot of `kind` from the start of `bytes`
pub(crate) fn decode_slot(bytes: &[u8], kind: TypeKind) -> Payload {
    match kind {
        TypeKind::Void => Payload::Ptr(None),
        TypeKind::I8 => Payload::Int(i64::from(bytes[0] as i8)),
        TypeKind::I16 => Payload::Int(i64::from(i16::from_le_bytes(le_bytes(bytes)))),
        TypeKind::I32 => Payload::Int(i64::from(i32::from_le_bytes(le_bytes(bytes)))),
        TypeKind::I64 | TypeKind::Guid => Payload::Int(i64::from_le_bytes(le_bytes(bytes))),
        TypeKind::F32 => Payload::Float(f64::from(f32::from_le_bytes(le_bytes(bytes)))),
        TypeKind::F64 => Payload::Float(f64::from_le_bytes(le_bytes(bytes))),
        TypeKind::Bool => Payload::Bool(bytes[0] != 0),
        TypeKind::Bytes
        | TypeKind::Dyn
        | TypeKind::Fun
        | TypeKind::Obj
        | TypeKind::Array
        | TypeKind::Abstract
        | TypeKind::Ref
        | TypeKind::Struct
        | TypeKind::Null => decode_pointer(u64::from_le_bytes(le_bytes(bytes))),
    }
}

/// Write `payload` into a slot of `kind` at the start of `bytes`
pub(crate) fn encode_slot(bytes: &mut [u8], kind: TypeKind, payload: &Payload) {
    let size = kind.slot_size();
    match kind {
        TypeKind::Void => {}
        TypeKind::I8 | TypeKind::I16 | TypeKind::I32 | TypeKind::I64 | TypeKind::Guid => {
            bytes[..size].copy_from_slice(&payload_int(payload).to_le_bytes()[..size]);
        }
        TypeKind::F32 => {
            bytes[..size].copy_from_slice(&(payload_float(payload) as f32).to_le_bytes());
        }
        TypeKind::F64 => {
            bytes[..size].copy_from_slice(&payload_float(payload).to_le_bytes());
        }
        TypeKind::Bool => bytes[0] = u8::from(payload_int(payload) != 0),
        TypeKind::Bytes
        | TypeKind::Dyn
        | TypeKind::Fun
        | TypeKind::Obj
        | TypeKind::Array
        | TypeKind::Abstract
        | TypeKind::Ref
        | TypeKind::Struct
        | TypeKind::Null => {
            bytes[..size].copy_from_slice(&encode_pointer(payload).to_le_bytes());
        }
    }
}
