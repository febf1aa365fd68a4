//! Runtime value exchanged between the host and the script runtime.

use std::fmt;

use crate::object::{HostArray, HostObject};
use crate::{Delegate, ScriptRef, TypeHash, primitives};

/// An enum value tagged with its enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnumValue {
    /// The enum type.
    pub type_hash: TypeHash,
    /// The underlying integral value.
    pub value: i64,
}

impl EnumValue {
    pub fn new(type_hash: TypeHash, value: i64) -> Self {
        Self { type_hash, value }
    }
}

/// A dynamically-typed host value.
///
/// Primitives are carried by value. Objects, arrays and delegates are
/// reference-counted handles whose identity is the allocation. Script
/// values held by the host (tables, functions, foreign userdata) are
/// [`ScriptRef`] handles into the interpreter's reference table.
#[derive(Clone, Default)]
pub enum Dynamic {
    /// Null reference / script `nil`.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Enum(EnumValue),
    /// Instance of a registered class, value type or generated adapter.
    Object(HostObject),
    Array(HostArray),
    /// A host type used as a value (the script-side class proxy).
    Type(TypeHash),
    Delegate(Delegate),
    Table(ScriptRef),
    Function(ScriptRef),
    UserData(ScriptRef),
}

impl Dynamic {
    /// Short human-readable name of the value kind.
    pub fn type_name(&self) -> &'static str {
        match self {
            Dynamic::Null => "null",
            Dynamic::Bool(_) => "bool",
            Dynamic::Int(_) => "int",
            Dynamic::Float(_) => "float",
            Dynamic::String(_) => "string",
            Dynamic::Enum(_) => "enum",
            Dynamic::Object(_) => "object",
            Dynamic::Array(_) => "array",
            Dynamic::Type(_) => "type",
            Dynamic::Delegate(_) => "delegate",
            Dynamic::Table(_) => "table",
            Dynamic::Function(_) => "function",
            Dynamic::UserData(_) => "userdata",
        }
    }

    /// The host type this value is an instance of.
    pub fn runtime_type(&self) -> TypeHash {
        match self {
            Dynamic::Null => primitives::OBJECT,
            Dynamic::Bool(_) => primitives::BOOL,
            Dynamic::Int(_) => primitives::INT64,
            Dynamic::Float(_) => primitives::FLOAT64,
            Dynamic::String(_) => primitives::STRING,
            Dynamic::Enum(e) => e.type_hash,
            Dynamic::Object(o) => o.type_hash(),
            Dynamic::Array(_) => primitives::ARRAY,
            Dynamic::Type(_) => primitives::TYPE,
            Dynamic::Delegate(d) => d.delegate_type(),
            Dynamic::Table(_) => primitives::SCRIPT_TABLE,
            Dynamic::Function(_) => primitives::SCRIPT_FUNCTION,
            Dynamic::UserData(_) => primitives::SCRIPT_USERDATA,
        }
    }

    /// Default value for a parameter or element of the given type.
    pub fn default_of(type_hash: TypeHash) -> Dynamic {
        if primitives::is_integer(type_hash) {
            Dynamic::Int(0)
        } else if primitives::is_float(type_hash) {
            Dynamic::Float(0.0)
        } else if type_hash == primitives::BOOL {
            Dynamic::Bool(false)
        } else {
            Dynamic::Null
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Dynamic::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Dynamic::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Dynamic::Int(v) => Some(*v),
            Dynamic::Enum(e) => Some(e.value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Dynamic::Float(v) => Some(*v),
            Dynamic::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&HostObject> {
        match self {
            Dynamic::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&HostArray> {
        match self {
            Dynamic::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_delegate(&self) -> Option<&Delegate> {
        match self {
            Dynamic::Delegate(d) => Some(d),
            _ => None,
        }
    }

    /// The script reference behind a table, function or userdata value.
    pub fn as_script_ref(&self) -> Option<&ScriptRef> {
        match self {
            Dynamic::Table(r) | Dynamic::Function(r) | Dynamic::UserData(r) => Some(r),
            _ => None,
        }
    }
}

impl PartialEq for Dynamic {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Dynamic::Null, Dynamic::Null) => true,
            (Dynamic::Bool(a), Dynamic::Bool(b)) => a == b,
            (Dynamic::Int(a), Dynamic::Int(b)) => a == b,
            (Dynamic::Float(a), Dynamic::Float(b)) => a == b,
            (Dynamic::Int(a), Dynamic::Float(b)) | (Dynamic::Float(b), Dynamic::Int(a)) => {
                *a as f64 == *b
            }
            (Dynamic::String(a), Dynamic::String(b)) => a == b,
            (Dynamic::Enum(a), Dynamic::Enum(b)) => a == b,
            (Dynamic::Object(a), Dynamic::Object(b)) => a.ptr_eq(b),
            (Dynamic::Array(a), Dynamic::Array(b)) => a.ptr_eq(b),
            (Dynamic::Type(a), Dynamic::Type(b)) => a == b,
            (Dynamic::Delegate(a), Dynamic::Delegate(b)) => a.ptr_eq(b),
            (Dynamic::Table(a), Dynamic::Table(b))
            | (Dynamic::Function(a), Dynamic::Function(b))
            | (Dynamic::UserData(a), Dynamic::UserData(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dynamic::Null => write!(f, "Null"),
            Dynamic::Bool(v) => write!(f, "Bool({v})"),
            Dynamic::Int(v) => write!(f, "Int({v})"),
            Dynamic::Float(v) => write!(f, "Float({v})"),
            Dynamic::String(v) => write!(f, "String({v:?})"),
            Dynamic::Enum(e) => write!(f, "Enum({:?}, {})", e.type_hash, e.value),
            Dynamic::Object(o) => write!(f, "{o:?}"),
            Dynamic::Array(a) => write!(f, "{a:?}"),
            Dynamic::Type(t) => write!(f, "Type({t:?})"),
            Dynamic::Delegate(d) => write!(f, "{d:?}"),
            Dynamic::Table(r) => write!(f, "Table({r:?})"),
            Dynamic::Function(r) => write!(f, "Function({r:?})"),
            Dynamic::UserData(r) => write!(f, "UserData({r:?})"),
        }
    }
}

impl From<bool> for Dynamic {
    fn from(v: bool) -> Self {
        Dynamic::Bool(v)
    }
}

impl From<i64> for Dynamic {
    fn from(v: i64) -> Self {
        Dynamic::Int(v)
    }
}

impl From<i32> for Dynamic {
    fn from(v: i32) -> Self {
        Dynamic::Int(v as i64)
    }
}

impl From<f64> for Dynamic {
    fn from(v: f64) -> Self {
        Dynamic::Float(v)
    }
}

impl From<&str> for Dynamic {
    fn from(v: &str) -> Self {
        Dynamic::String(v.to_string())
    }
}

impl From<String> for Dynamic {
    fn from(v: String) -> Self {
        Dynamic::String(v)
    }
}

impl From<HostObject> for Dynamic {
    fn from(v: HostObject) -> Self {
        Dynamic::Object(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names() {
        assert_eq!(Dynamic::Null.type_name(), "null");
        assert_eq!(Dynamic::Int(0).type_name(), "int");
        assert_eq!(Dynamic::Float(0.0).type_name(), "float");
        assert_eq!(Dynamic::String(String::new()).type_name(), "string");
        assert_eq!(Dynamic::Type(primitives::INT32).type_name(), "type");
    }

    #[test]
    fn numeric_equality_crosses_int_and_float() {
        assert_eq!(Dynamic::Int(3), Dynamic::Float(3.0));
        assert_ne!(Dynamic::Int(3), Dynamic::Float(3.5));
    }

    #[test]
    fn objects_compare_by_identity() {
        let a = HostObject::new(primitives::OBJECT, 1u32);
        let b = HostObject::new(primitives::OBJECT, 1u32);
        assert_eq!(Dynamic::Object(a.clone()), Dynamic::Object(a.clone()));
        assert_ne!(Dynamic::Object(a), Dynamic::Object(b));
    }

    #[test]
    fn defaults_follow_type() {
        assert_eq!(Dynamic::default_of(primitives::INT32), Dynamic::Int(0));
        assert_eq!(Dynamic::default_of(primitives::FLOAT64), Dynamic::Float(0.0));
        assert_eq!(Dynamic::default_of(primitives::BOOL), Dynamic::Bool(false));
        assert!(Dynamic::default_of(primitives::STRING).is_null());
    }

    #[test]
    fn runtime_type_of_enum() {
        let color = TypeHash::from_name("Demo.Color");
        assert_eq!(Dynamic::Enum(EnumValue::new(color, 2)).runtime_type(), color);
    }
}
