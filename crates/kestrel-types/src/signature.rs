//! Primitive signature strings
//!
//! A signature is the argument codes followed by `_` and a single return
//! code:
//!
//! ```text
//! v void    c i8     s i16    i i32    l i64    f f32    d f64
//! b bool    B bytes  D dyn    F fun    O obj    A array  S struct
//! g guid    X<name>_ abstract          R<code> ref      ?<code> nullable
//! ```
//!
//! `Xtype_i_A` takes an abstract `type` handle and an `i32` and returns an
//! array. The dispatcher compares signatures when a primitive is bound, so a
//! mismatch never reaches a call.

use crate::error::{TypeError, TypeResult};
use crate::kind::TypeKind;
use crate::ty::{TypeDescriptor, TypeDetail};
use std::fmt;
use std::iter::Peekable;
use std::str::{Chars, FromStr};

/// One argument or return slot in a signature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SigKind {
    /// Any kind spelled with a single character
    Plain(TypeKind),
    /// `X<name>_`
    Abstract(String),
    /// `R<code>`
    Ref(Box<SigKind>),
    /// `?<code>`
    Nullable(Box<SigKind>),
}

impl SigKind {
    /// Signature slot describing a registered type
    pub fn of(ty: &TypeDescriptor) -> Self {
        match (ty.kind(), ty.detail()) {
            (TypeKind::Abstract, TypeDetail::Abstract(name)) => SigKind::Abstract(name.clone()),
            (TypeKind::Ref, TypeDetail::Inner(inner)) => SigKind::Ref(Box::new(SigKind::of(inner))),
            (TypeKind::Null, TypeDetail::Inner(inner)) => {
                SigKind::Nullable(Box::new(SigKind::of(inner)))
            }
            (kind, _) => SigKind::Plain(kind),
        }
    }

    /// Kind tag of the slot
    pub fn kind(&self) -> TypeKind {
        match self {
            SigKind::Plain(kind) => *kind,
            SigKind::Abstract(_) => TypeKind::Abstract,
            SigKind::Ref(_) => TypeKind::Ref,
            SigKind::Nullable(_) => TypeKind::Null,
        }
    }
}

impl fmt::Display for SigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigKind::Plain(kind) => write!(f, "{}", kind.code()),
            SigKind::Abstract(name) => write!(f, "X{}_", name),
            SigKind::Ref(inner) => write!(f, "R{}", inner),
            SigKind::Nullable(inner) => write!(f, "?{}", inner),
        }
    }
}

/// Parsed primitive signature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    /// Argument slots, in order
    pub args: Vec<SigKind>,
    /// Return slot
    pub ret: SigKind,
}

impl Signature {
    /// Build a signature from slots
    pub fn new(args: Vec<SigKind>, ret: SigKind) -> Self {
        Self { args, ret }
    }

    /// Parse a signature string
    pub fn parse(source: &str) -> TypeResult<Self> {
        let invalid = |reason: &str| TypeError::InvalidSignature {
            signature: source.to_string(),
            reason: reason.to_string(),
        };

        let mut chars = source.chars().peekable();
        let mut args = Vec::new();
        loop {
            match chars.peek() {
                None => return Err(invalid("missing '_' before the return code")),
                Some('_') => {
                    chars.next();
                    break;
                }
                Some(_) => args.push(parse_kind(&mut chars).map_err(|r| invalid(&r))?),
            }
        }

        let ret = parse_kind(&mut chars).map_err(|r| invalid(&r))?;
        if chars.next().is_some() {
            return Err(invalid("trailing characters after the return code"));
        }
        Ok(Self { args, ret })
    }
}

fn parse_kind(chars: &mut Peekable<Chars<'_>>) -> Result<SigKind, String> {
    let code = chars.next().ok_or_else(|| "unexpected end".to_string())?;
    let kind = TypeKind::from_code(code).ok_or_else(|| format!("unknown code '{}'", code))?;
    match kind {
        TypeKind::Abstract => {
            let mut name = String::new();
            loop {
                match chars.next() {
                    Some('_') => break,
                    Some(c) => name.push(c),
                    None => return Err("unterminated abstract name".to_string()),
                }
            }
            if name.is_empty() {
                return Err("empty abstract name".to_string());
            }
            Ok(SigKind::Abstract(name))
        }
        TypeKind::Ref => Ok(SigKind::Ref(Box::new(parse_kind(chars)?))),
        TypeKind::Null => Ok(SigKind::Nullable(Box::new(parse_kind(chars)?))),
        other => Ok(SigKind::Plain(other)),
    }
}

impl FromStr for Signature {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Signature::parse(s)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for arg in &self.args {
            write!(f, "{}", arg)?;
        }
        write!(f, "_{}", self.ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TypeRegistry;

    #[test]
    fn test_parse_simple() {
        let sig = Signature::parse("AiAii_v").unwrap();
        assert_eq!(sig.args.len(), 5);
        assert_eq!(sig.args[0], SigKind::Plain(TypeKind::Array));
        assert_eq!(sig.args[1], SigKind::Plain(TypeKind::I32));
        assert_eq!(sig.ret, SigKind::Plain(TypeKind::Void));
    }

    #[test]
    fn test_parse_abstract_and_wrappers() {
        let sig = Signature::parse("Xtype_R?i_A").unwrap();
        assert_eq!(sig.args[0], SigKind::Abstract("type".to_string()));
        assert_eq!(
            sig.args[1],
            SigKind::Ref(Box::new(SigKind::Nullable(Box::new(SigKind::Plain(
                TypeKind::I32
            )))))
        );
        assert_eq!(sig.ret.kind(), TypeKind::Array);
    }

    #[test]
    fn test_no_arguments() {
        let sig = Signature::parse("_D").unwrap();
        assert!(sig.args.is_empty());
        assert_eq!(sig.ret, SigKind::Plain(TypeKind::Dyn));
        // Abstract argument followed by the separator
        let sig = Signature::parse("Xtype__O").unwrap();
        assert_eq!(sig.args.len(), 1);
        assert_eq!(sig.ret, SigKind::Plain(TypeKind::Obj));
    }

    #[test]
    fn test_display_round_trips_text() {
        for text in ["AiAii_v", "Xtype_i_A", "Xtype_FD_F", "_v", "R?d_g"] {
            assert_eq!(Signature::parse(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "ii", "i_", "i_vv", "z_v", "X_v", "Xname", "R_v"] {
            assert!(
                matches!(Signature::parse(bad), Err(TypeError::InvalidSignature { .. })),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_sig_kind_of_type() {
        let registry = TypeRegistry::new();
        assert_eq!(SigKind::of(&registry.i32()), SigKind::Plain(TypeKind::I32));
        assert_eq!(
            SigKind::of(&registry.abstract_type("type")),
            SigKind::Abstract("type".to_string())
        );
        let nullable = registry.wrapper(TypeKind::Null, registry.f64()).unwrap();
        assert_eq!(
            SigKind::of(&nullable),
            SigKind::Nullable(Box::new(SigKind::Plain(TypeKind::F64)))
        );
    }
}
