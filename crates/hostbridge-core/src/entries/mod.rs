//! Registry entry types describing the host object model.
//!
//! - [`TypeEntry`] - a class, value type, interface, enum or delegate type
//! - [`MethodEntry`] - a method or constructor with its [`ParamDef`]s
//! - [`PropertyEntry`] - a field or property
//! - [`EventEntry`] - an event with add/remove accessors
//!
//! Every entry is plain data plus [`NativeFn`](crate::NativeFn) handles, so
//! the registry can be shared across interpreters.

mod data_type;
mod member;
mod method;
mod type_entry;

pub use data_type::DataType;
pub use member::{EventEntry, PropertyEntry, PropertyKind};
pub use method::{MethodEntry, ParamDef, ParamMode, CONSTRUCTOR_NAME};
pub use type_entry::{TypeEntry, TypeKind};

use bitflags::bitflags;

bitflags! {
    /// Modifiers of a method.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MemberFlags: u8 {
        /// Invoked without a receiver.
        const STATIC = 1 << 0;
        /// May be overridden by a generated adapter.
        const VIRTUAL = 1 << 1;
        /// No base implementation.
        const ABSTRACT = 1 << 2;
        /// Extension method: static, first parameter is the extended type.
        const EXTENSION = 1 << 3;
    }
}
