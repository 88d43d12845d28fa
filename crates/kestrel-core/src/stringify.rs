//! Value stringification and logging
//!
//! `stringify` is total: every value renders to some text.
//!
//! ```text
//! integers, guids   42
//! floats            3.5, 1e+16, 1.5e-05, NaN, Infinity
//! booleans          true
//! null              null
//! bytes             the bytes as (lossy) UTF-8
//! objects           user string conversion, else the pointer form
//! other pointers    #<kind[:Name] block:offset>
//! function pointers #<fun @index>
//! ```

use crate::gc::GcRef;
use crate::runtime::Runtime;
use crate::value::{Payload, Value};
use kestrel_types::TypeKind;
use std::io::{self, Write};

/// Significant digits of a rendered float
const FLOAT_PRECISION: i32 = 16;

/// Render a float like C's `%.16g`
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        let text = if value > 0.0 { "Infinity" } else { "-Infinity" };
        return text.to_string();
    }
    if value == 0.0 {
        let text = if value.is_sign_negative() { "-0" } else { "0" };
        return text.to_string();
    }

    // Rounding to the target precision first fixes the decimal exponent
    let scientific = format!("{:.*e}", (FLOAT_PRECISION - 1) as usize, value);
    let (mantissa, exponent) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= FLOAT_PRECISION {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", strip_fraction_zeros(mantissa), sign, exponent.abs())
    } else {
        let decimals = (FLOAT_PRECISION - 1 - exponent) as usize;
        strip_fraction_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn strip_fraction_zeros(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

impl Runtime {
    /// Render a value as text
    pub fn stringify(&mut self, value: &Value) -> String {
        match value.payload() {
            Payload::Raw(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            _ if value.kind() == TypeKind::Void => "void".to_string(),
            Payload::Ptr(None) => "null".to_string(),
            Payload::Int(i) => i.to_string(),
            Payload::Float(x) => format_float(*x),
            Payload::Bool(b) => b.to_string(),
            Payload::Code(function) => format!("#<fun @{}>", function.as_u32()),
            Payload::Ptr(Some(at)) => self.stringify_pointer(value, *at),
        }
    }

    fn stringify_pointer(&mut self, value: &Value, at: GcRef) -> String {
        match value.kind() {
            TypeKind::Bytes => match self.heap().bytes(at) {
                Some(bytes) => String::from_utf8_lossy(bytes).into_owned(),
                None => pointer_form(value, at),
            },
            TypeKind::Obj | TypeKind::Struct => self.stringify_object(value, at),
            TypeKind::Void
            | TypeKind::I8
            | TypeKind::I16
            | TypeKind::I32
            | TypeKind::I64
            | TypeKind::F32
            | TypeKind::F64
            | TypeKind::Bool
            | TypeKind::Dyn
            | TypeKind::Fun
            | TypeKind::Array
            | TypeKind::Abstract
            | TypeKind::Ref
            | TypeKind::Null
            | TypeKind::Guid => pointer_form(value, at),
        }
    }

    fn stringify_object(&mut self, value: &Value, at: GcRef) -> String {
        let ty = self.receiver_type(value.ty(), at);
        let method = ty.as_object().and_then(|layout| layout.to_string_method());
        let Some(method) = method else {
            return pointer_form(&Value::new(ty, value.payload().clone()), at);
        };

        let receiver = Value::new(ty, value.payload().clone());
        match self.call_function(method, std::slice::from_ref(&receiver)) {
            Ok(text) => self.stringify(&text),
            Err(err) => {
                tracing::warn!(object = %at, %err, "string conversion failed");
                pointer_form(&receiver, at)
            }
        }
    }

    /// Write the rendered value and a newline to stdout
    ///
    /// Output errors are ignored.
    pub fn log_value(&mut self, value: &Value) {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.log_value_to(&mut out, value);
    }

    /// Write the rendered value and a newline to `writer`, ignoring errors
    pub fn log_value_to<W: Write>(&mut self, writer: &mut W, value: &Value) {
        let text = self.stringify(value);
        let _ = writeln!(writer, "{}", text);
    }
}

fn pointer_form(value: &Value, at: GcRef) -> String {
    let ty = value.ty();
    let name = ty
        .as_object()
        .map(|layout| layout.name())
        .or_else(|| ty.abstract_name());
    match name {
        Some(name) => format!("#<{}:{} {}>", ty.kind(), name, at),
        None => format!("#<{} {}>", ty.kind(), at),
    }
}
