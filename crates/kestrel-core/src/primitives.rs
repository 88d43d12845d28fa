//! Primitive table
//!
//! Every native operation the bytecode dispatcher can reach is registered
//! here under a fixed signature string. The dispatcher binds each primitive
//! once, at load time, by name and the signature it was compiled against; a
//! mismatch fails the bind. After binding, dispatch is a direct indexed call.
//!
//! Type descriptors travel as abstract `type` handles
//! (see [`Runtime::type_value`]); field ids travel as `i32`.

use crate::runtime::Runtime;
use crate::value::Value;
use crate::{NativeError, NativeResult};
use kestrel_types::{FieldId, FunctionIndex, Signature, TypeError, TypeRegistry};
use rustc_hash::FxHashMap;
use std::fmt;
use thiserror::Error;

/// Implementation of a primitive
pub type PrimitiveFn = fn(&mut Runtime, &[Value]) -> NativeResult<Value>;

/// Handle returned by [`PrimitiveTable::bind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrimitiveId(u32);

impl PrimitiveId {
    /// Raw table index
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// Bind-time failure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindError {
    /// No primitive has this name
    #[error("Unknown primitive: {0}")]
    UnknownPrimitive(String),

    /// The requested signature string is malformed
    #[error(transparent)]
    Signature(#[from] TypeError),

    /// The requested signature differs from the primitive's own
    #[error("Signature mismatch for {name}: expected {expected}, found {found}")]
    Mismatch {
        /// Primitive name
        name: String,
        /// Signature the primitive is registered with
        expected: String,
        /// Signature the caller asked for
        found: String,
    },
}

struct Primitive {
    name: &'static str,
    signature: Signature,
    func: PrimitiveFn,
}

/// Named primitives with their signatures
pub struct PrimitiveTable {
    primitives: Vec<Primitive>,
    by_name: FxHashMap<&'static str, PrimitiveId>,
}

impl fmt::Debug for PrimitiveTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimitiveTable")
            .field("count", &self.primitives.len())
            .finish()
    }
}

impl PrimitiveTable {
    /// Table holding every native support primitive
    pub fn standard() -> Self {
        let mut table = Self {
            primitives: Vec::new(),
            by_name: FxHashMap::default(),
        };
        table.add("alloc_array", "Xtype_i_A", prim_alloc_array);
        table.add("alloc_struct_array", "Xtype_i_A", prim_alloc_struct_array);
        table.add("alloc_object", "Xtype__O", prim_alloc_object);
        table.add("blit", "AiAii_v", prim_blit);
        table.add("array_length", "A_i", prim_array_length);
        table.add("make_closure", "Xtype_F_F", prim_make_closure);
        table.add("make_bound_closure", "Xtype_FD_F", prim_make_bound_closure);
        table.add("unbind", "F_F", prim_unbind);
        table.add("get_field", "Oi_D", prim_get_field);
        table.add("set_field", "OiD_v", prim_set_field);
        table.add("has_field", "Oi_b", prim_has_field);
        table.add("delete_field", "Oi_b", prim_delete_field);
        table.add("list_fields", "O_A", prim_list_fields);
        table.add("to_string", "D_B", prim_to_string);
        table.add("log", "D_v", prim_log);
        table
    }

    fn add(&mut self, name: &'static str, signature: &str, func: PrimitiveFn) {
        let signature = match Signature::parse(signature) {
            Ok(signature) => signature,
            Err(err) => panic!("primitive {} has a malformed signature: {}", name, err),
        };
        let id = PrimitiveId(self.primitives.len() as u32);
        self.by_name.insert(name, id);
        self.primitives.push(Primitive {
            name,
            signature,
            func,
        });
    }

    /// Resolve a primitive, checking the caller's signature
    pub fn bind(&self, name: &str, signature: &str) -> Result<PrimitiveId, BindError> {
        let id = *self
            .by_name
            .get(name)
            .ok_or_else(|| BindError::UnknownPrimitive(name.to_string()))?;
        let requested = Signature::parse(signature)?;
        let primitive = &self.primitives[id.0 as usize];
        if primitive.signature != requested {
            return Err(BindError::Mismatch {
                name: name.to_string(),
                expected: primitive.signature.to_string(),
                found: requested.to_string(),
            });
        }
        tracing::debug!(name, %requested, id = id.0, "bind primitive");
        Ok(id)
    }

    /// Run a bound primitive
    ///
    /// # Panics
    ///
    /// Panics if `id` did not come from this table or `args` has the wrong
    /// arity.
    pub fn invoke(&self, rt: &mut Runtime, id: PrimitiveId, args: &[Value]) -> NativeResult<Value> {
        let primitive = match self.primitives.get(id.0 as usize) {
            Some(primitive) => primitive,
            None => panic!("invalid primitive id {}", id.0),
        };
        assert_eq!(
            args.len(),
            primitive.signature.args.len(),
            "primitive {} ({}) called with {} arguments",
            primitive.name,
            primitive.signature,
            args.len()
        );
        (primitive.func)(rt, args)
    }

    /// Registered signature of a primitive
    pub fn signature(&self, name: &str) -> Option<&Signature> {
        let id = self.by_name.get(name)?;
        Some(&self.primitives[id.0 as usize].signature)
    }

    /// Primitive names in registration order
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.primitives.iter().map(|primitive| primitive.name)
    }

    /// Number of primitives
    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }
}

fn int_arg(args: &[Value], index: usize) -> NativeResult<i64> {
    args[index]
        .as_i64()
        .ok_or_else(|| NativeError::InvalidArgument(format!("argument {} must be an integer", index)))
}

fn field_arg(args: &[Value], index: usize) -> NativeResult<FieldId> {
    let raw = int_arg(args, index)?;
    i32::try_from(raw)
        .map(FieldId::from_raw)
        .map_err(|_| NativeError::InvalidArgument(format!("field id {} out of range", raw)))
}

fn function_arg(args: &[Value], index: usize) -> NativeResult<FunctionIndex> {
    args[index].as_function().ok_or_else(|| {
        NativeError::InvalidArgument(format!("argument {} must be a function pointer", index))
    })
}

fn prim_alloc_array(rt: &mut Runtime, args: &[Value]) -> NativeResult<Value> {
    let ty = rt.type_from_value(&args[0])?;
    rt.alloc_array(&ty, int_arg(args, 1)?)
}

fn prim_alloc_struct_array(rt: &mut Runtime, args: &[Value]) -> NativeResult<Value> {
    let ty = rt.type_from_value(&args[0])?;
    rt.alloc_struct_array(&ty, int_arg(args, 1)?)
}

fn prim_alloc_object(rt: &mut Runtime, args: &[Value]) -> NativeResult<Value> {
    let ty = rt.type_from_value(&args[0])?;
    rt.alloc_object(&ty)
}

fn prim_blit(rt: &mut Runtime, args: &[Value]) -> NativeResult<Value> {
    rt.blit(
        &args[0],
        int_arg(args, 1)?,
        &args[2],
        int_arg(args, 3)?,
        int_arg(args, 4)?,
    )?;
    Ok(Value::void(rt.registry()))
}

fn prim_array_length(rt: &mut Runtime, args: &[Value]) -> NativeResult<Value> {
    let length = rt.array_len(&args[0])?;
    length_value(rt.registry(), length)
}

fn length_value(registry: &TypeRegistry, length: usize) -> NativeResult<Value> {
    let length = i32::try_from(length).map_err(|_| {
        NativeError::InvalidArgument(format!("array length {} does not fit in i32", length))
    })?;
    Ok(Value::i32(registry, length))
}

fn prim_make_closure(rt: &mut Runtime, args: &[Value]) -> NativeResult<Value> {
    let ty = rt.type_from_value(&args[0])?;
    rt.make_closure(&ty, function_arg(args, 1)?)
}

fn prim_make_bound_closure(rt: &mut Runtime, args: &[Value]) -> NativeResult<Value> {
    let ty = rt.type_from_value(&args[0])?;
    rt.make_bound_closure(&ty, function_arg(args, 1)?, args[2].clone())
}

fn prim_unbind(rt: &mut Runtime, args: &[Value]) -> NativeResult<Value> {
    rt.unbind(&args[0])
}

fn prim_get_field(rt: &mut Runtime, args: &[Value]) -> NativeResult<Value> {
    rt.get_field(&args[0], field_arg(args, 1)?)
}

fn prim_set_field(rt: &mut Runtime, args: &[Value]) -> NativeResult<Value> {
    rt.set_field(&args[0], field_arg(args, 1)?, &args[2])?;
    Ok(Value::void(rt.registry()))
}

fn prim_has_field(rt: &mut Runtime, args: &[Value]) -> NativeResult<Value> {
    let present = rt.has_field(&args[0], field_arg(args, 1)?)?;
    Ok(Value::bool(rt.registry(), present))
}

fn prim_delete_field(rt: &mut Runtime, args: &[Value]) -> NativeResult<Value> {
    let deleted = rt.delete_field(&args[0], field_arg(args, 1)?)?;
    Ok(Value::bool(rt.registry(), deleted))
}

fn prim_list_fields(rt: &mut Runtime, args: &[Value]) -> NativeResult<Value> {
    rt.list_fields(&args[0])
}

fn prim_to_string(rt: &mut Runtime, args: &[Value]) -> NativeResult<Value> {
    let text = rt.stringify(&args[0]);
    Ok(Value::string(rt.registry(), &text))
}

fn prim_log(rt: &mut Runtime, args: &[Value]) -> NativeResult<Value> {
    rt.log_value(&args[0]);
    Ok(Value::void(rt.registry()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table() {
        let table = PrimitiveTable::standard();
        assert_eq!(table.len(), 15);
        assert!(table.names().any(|name| name == "make_bound_closure"));
        assert_eq!(table.signature("blit").unwrap().to_string(), "AiAii_v");
        assert!(table.signature("nope").is_none());
    }

    #[test]
    fn test_bind_checks_signature() {
        let table = PrimitiveTable::standard();
        assert!(table.bind("alloc_array", "Xtype_i_A").is_ok());

        assert!(matches!(
            table.bind("alloc_array", "Xtype_l_A"),
            Err(BindError::Mismatch { .. })
        ));
        assert!(matches!(
            table.bind("alloc_array", "Xtype_i"),
            Err(BindError::Signature(_))
        ));
        assert_eq!(
            table.bind("resize", "A_v").unwrap_err(),
            BindError::UnknownPrimitive("resize".to_string())
        );
    }

    #[test]
    fn test_invoke_alloc_and_length() {
        let table = PrimitiveTable::standard();
        let mut rt = Runtime::default();
        let alloc = table.bind("alloc_array", "Xtype_i_A").unwrap();
        let length = table.bind("array_length", "A_i").unwrap();

        let handle = rt.type_value(&rt.registry().i64());
        let count = Value::i32(rt.registry(), 6);
        let array = table.invoke(&mut rt, alloc, &[handle, count]).unwrap();
        let result = table.invoke(&mut rt, length, &[array]).unwrap();
        assert_eq!(result, Value::i32(rt.registry(), 6));
    }

    #[test]
    fn test_length_beyond_i32_is_rejected() {
        let registry = TypeRegistry::new();
        let max = i32::MAX as usize;
        assert_eq!(length_value(&registry, max).unwrap(), Value::i32(&registry, i32::MAX));
        assert!(matches!(
            length_value(&registry, max + 1),
            Err(NativeError::InvalidArgument(_))
        ));
        assert!(length_value(&registry, usize::MAX).is_err());
    }

    #[test]
    fn test_invoke_to_string() {
        let table = PrimitiveTable::standard();
        let mut rt = Runtime::default();
        let id = table.bind("to_string", "D_B").unwrap();
        let value = Value::f64(rt.registry(), 0.5);

        let text = table.invoke(&mut rt, id, &[value]).unwrap();
        assert_eq!(text.as_bytes(), Some(&b"0.5"[..]));
    }

    #[test]
    fn test_invoke_rejects_bad_handle() {
        let table = PrimitiveTable::standard();
        let mut rt = Runtime::default();
        let id = table.bind("alloc_object", "Xtype__O").unwrap();
        let not_a_type = Value::i32(rt.registry(), 1);
        assert!(matches!(
            table.invoke(&mut rt, id, &[not_a_type]),
            Err(NativeError::InvalidArgument(_))
        ));
    }

    #[test]
    #[should_panic(expected = "called with 0 arguments")]
    fn test_invoke_arity_mismatch_panics() {
        let table = PrimitiveTable::standard();
        let mut rt = Runtime::default();
        let id = table.bind("log", "D_v").unwrap();
        let _ = table.invoke(&mut rt, id, &[]);
    }
}
