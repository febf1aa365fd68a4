//! Deterministic hash-based type identity.
//!
//! [`TypeHash`] is a 64-bit hash computed from a host type's qualified name.
//! The same name always yields the same hash, so identities can be formed
//! before a type is registered and compared across interpreters.
//!
//! # Examples
//!
//! ```
//! use hostbridge_core::TypeHash;
//!
//! let a = TypeHash::from_name("Demo.Calculator");
//! let b = TypeHash::from_name("Demo.Calculator");
//! assert_eq!(a, b);
//! ```

use std::fmt;

use xxhash_rust::const_xxh64::xxh64;

/// Domain-specific mixing constants for hash computation.
///
/// Different entity kinds are seeded differently so a declared type and a
/// generated adapter never collide.
pub mod hash_constants {
    /// Domain marker for type hashes
    pub const TYPE: u64 = 0x2fac10b63a6cc57c;

    /// Domain marker for runtime-generated adapter types
    pub const GENERATED: u64 = 0x9a7f3d5e2b8c4601;
}

/// A deterministic 64-bit hash identifying a host type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Create a type hash from a qualified type name.
    pub const fn from_name(name: &str) -> Self {
        TypeHash(xxh64(name.as_bytes(), hash_constants::TYPE))
    }

    /// Identity of the `sequence`-th runtime-generated adapter type.
    pub fn generated(sequence: u32) -> Self {
        let name = format!("hostbridge.Generated{sequence}");
        TypeHash(xxh64(name.as_bytes(), hash_constants::GENERATED))
    }

    /// Check if this is the empty hash.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Hashes of the built-in host types.
pub mod primitives {
    use super::TypeHash;

    /// Root of every type hierarchy.
    pub const OBJECT: TypeHash = TypeHash::from_name("object");
    /// Return type of methods without a result.
    pub const VOID: TypeHash = TypeHash::from_name("void");
    /// `bool`
    pub const BOOL: TypeHash = TypeHash::from_name("bool");
    /// 8-bit signed integer
    pub const INT8: TypeHash = TypeHash::from_name("int8");
    /// 16-bit signed integer
    pub const INT16: TypeHash = TypeHash::from_name("int16");
    /// 32-bit signed integer
    pub const INT32: TypeHash = TypeHash::from_name("int");
    /// 64-bit signed integer
    pub const INT64: TypeHash = TypeHash::from_name("int64");
    /// 8-bit unsigned integer
    pub const UINT8: TypeHash = TypeHash::from_name("uint8");
    /// 16-bit unsigned integer
    pub const UINT16: TypeHash = TypeHash::from_name("uint16");
    /// 32-bit unsigned integer
    pub const UINT32: TypeHash = TypeHash::from_name("uint");
    /// 64-bit unsigned integer
    pub const UINT64: TypeHash = TypeHash::from_name("uint64");
    /// Unicode scalar, marshalled as an integer
    pub const CHAR: TypeHash = TypeHash::from_name("char");
    /// 32-bit float
    pub const FLOAT32: TypeHash = TypeHash::from_name("float");
    /// 64-bit float
    pub const FLOAT64: TypeHash = TypeHash::from_name("double");
    /// Decimal, marshalled as a 64-bit float
    pub const DECIMAL: TypeHash = TypeHash::from_name("decimal");
    /// UTF-8 string
    pub const STRING: TypeHash = TypeHash::from_name("string");
    /// Runtime type object returned by `ctype`
    pub const TYPE: TypeHash = TypeHash::from_name("type");
    /// Host arrays
    pub const ARRAY: TypeHash = TypeHash::from_name("array");
    /// Base of every delegate type
    pub const DELEGATE: TypeHash = TypeHash::from_name("delegate");
    /// Base of every enum type
    pub const ENUM: TypeHash = TypeHash::from_name("enum");
    /// A script table held by the host
    pub const SCRIPT_TABLE: TypeHash = TypeHash::from_name("script.table");
    /// A script function held by the host
    pub const SCRIPT_FUNCTION: TypeHash = TypeHash::from_name("script.function");
    /// A script userdata that is not a host value
    pub const SCRIPT_USERDATA: TypeHash = TypeHash::from_name("script.userdata");
    /// Helper object pushed when script reads an event member
    pub const EVENT_REGISTRATION: TypeHash = TypeHash::from_name("hostbridge.EventRegistration");

    /// Signed and unsigned integer types, including `char`.
    pub fn is_integer(hash: TypeHash) -> bool {
        [INT8, INT16, INT32, INT64, UINT8, UINT16, UINT32, UINT64, CHAR].contains(&hash)
    }

    /// Floating point types, including `decimal`.
    pub fn is_float(hash: TypeHash) -> bool {
        [FLOAT32, FLOAT64, DECIMAL].contains(&hash)
    }

    /// Any numeric type.
    pub fn is_numeric(hash: TypeHash) -> bool {
        is_integer(hash) || is_float(hash)
    }
}
