//! Value Kinds and Calling Signatures
//!
//! Decoded form of the wire [`TypeCode`]s, and the parameter/return shapes
//! built from them.

use std::fmt;

use crate::abi::TypeCode;

/// Parameter and return types a boundary function can use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Void (no value)
    Void,
    /// C `bool` (one byte)
    Bool,
    /// 8-bit signed integer
    I8,
    /// 16-bit signed integer
    I16,
    /// 32-bit signed integer
    I32,
    /// 64-bit signed integer
    I64,
    /// 8-bit unsigned integer
    U8,
    /// 16-bit unsigned integer
    U16,
    /// 32-bit unsigned integer
    U32,
    /// 64-bit unsigned integer
    U64,
    /// 32-bit floating point
    F32,
    /// 64-bit floating point
    F64,
    /// Pointer (usize, platform-dependent)
    Ptr,
    /// Null-terminated C string (const char*)
    CStr,
}

impl ValueKind {
    /// Decode a wire type code
    pub fn from_code(code: TypeCode) -> Option<Self> {
        let kind = match code {
            TypeCode::VOID => ValueKind::Void,
            TypeCode::BOOL => ValueKind::Bool,
            TypeCode::I8 => ValueKind::I8,
            TypeCode::I16 => ValueKind::I16,
            TypeCode::I32 => ValueKind::I32,
            TypeCode::I64 => ValueKind::I64,
            TypeCode::U8 => ValueKind::U8,
            TypeCode::U16 => ValueKind::U16,
            TypeCode::U32 => ValueKind::U32,
            TypeCode::U64 => ValueKind::U64,
            TypeCode::F32 => ValueKind::F32,
            TypeCode::F64 => ValueKind::F64,
            TypeCode::PTR => ValueKind::Ptr,
            TypeCode::CSTR => ValueKind::CStr,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Void => write!(f, "void"),
            ValueKind::Bool => write!(f, "bool"),
            ValueKind::U8 => write!(f, "u8"),
            ValueKind::U16 => write!(f, "u16"),
            ValueKind::U32 => write!(f, "u32"),
            ValueKind::U64 => write!(f, "u64"),
            ValueKind::I8 => write!(f, "i8"),
            ValueKind::I16 => write!(f, "i16"),
            ValueKind::I32 => write!(f, "i32"),
            ValueKind::I64 => write!(f, "i64"),
            ValueKind::F32 => write!(f, "f32"),
            ValueKind::F64 => write!(f, "f64"),
            ValueKind::Ptr => write!(f, "ptr"),
            ValueKind::CStr => write!(f, "cstr"),
        }
    }
}

/// Parameter/return shape of a method or a named calling signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Method or signature-type name
    pub name: String,
    /// Parameter types
    pub params: Vec<ValueKind>,
    /// Return type
    pub ret: ValueKind,
}

impl Signature {
    /// Create a new signature
    pub fn new(name: impl Into<String>, params: Vec<ValueKind>, ret: ValueKind) -> Self {
        Self {
            name: name.into(),
            params,
            ret,
        }
    }

    /// Exact parameter and return match, ignoring names
    pub fn matches_shape(&self, other: &Signature) -> bool {
        self.ret == other.ret && self.params == other.params
    }

    /// Render only the shape, e.g. `(f32, f32) -> f32`
    pub fn shape(&self) -> String {
        let params: Vec<String> = self.params.iter().map(ToString::to_string).collect();
        format!("({}) -> {}", params.join(", "), self.ret)
    }
}
