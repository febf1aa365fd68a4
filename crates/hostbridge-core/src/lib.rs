//! Host-side object model for the hostbridge script interop layer.
//!
//! This crate holds everything that does not depend on a running
//! interpreter:
//!
//! - [`TypeHash`] - deterministic type identity
//! - [`Dynamic`] - values crossing the boundary
//! - [`HostObject`], [`HostArray`], [`Delegate`] - shared host instances
//! - [`ScriptRef`] - host handles to script values
//! - Registry entries ([`TypeEntry`], [`MethodEntry`], ...)
//! - [`NativeFn`] and [`CallContext`] - host callables
//! - [`ScriptHost`] - what an interpreter offers to host callables
//! - [`VTable`], [`CallableShape`] - generated adapter descriptions

mod call_context;
mod convert;
mod delegate;
mod entries;
mod error;
mod event;
mod host;
mod native_fn;
mod object;
mod script_ref;
mod type_hash;
mod value;
mod vtable;

pub use call_context::CallContext;
pub use convert::{FromDynamic, IntoDynamic};
pub use delegate::{Delegate, DelegateTarget};
pub use entries::{
    CONSTRUCTOR_NAME, DataType, EventEntry, MemberFlags, MethodEntry, ParamDef, ParamMode,
    PropertyEntry, PropertyKind, TypeEntry, TypeKind,
};
pub use error::{ConversionError, NativeError, RegistrationError};
pub use event::{EventRegistration, HostEvent, raise_all};
pub use host::{DetachedHost, ScriptHost};
pub use native_fn::{NativeCallable, NativeFn};
pub use object::{HostArray, HostObject, ScriptBinding};
pub use script_ref::{ReleaseQueue, ScriptRef, ScriptRefKind};
pub use type_hash::{TypeHash, hash_constants, primitives};
pub use value::{Dynamic, EnumValue};
pub use vtable::{CallableShape, VTable, VirtualSlot};
