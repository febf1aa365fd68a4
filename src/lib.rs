//! A bridge between a stack-based script runtime and a host object model.
//!
//! Host types are described once in a [`TypeRegistry`] and exposed to every
//! [`Bridge`] that loads their assembly. Scripts see host instances as
//! userdata aliases: member access, overloaded calls, operators, events and
//! arrays go through per-type metatables.
//!
//! The main pieces:
//!
//! - [`ObjectRegistry`] - alias ids for host values, one live alias per instance
//! - [`InvocationPlan`] - overload resolution against the script stack
//! - [`AdapterCache`] - process-wide generated subclass, interface and
//!   delegate adapters that route host calls into script code
//! - [`Bridge`] - metatables, marshalling and the script globals
//!   (`import_type`, `make_object`, `get_method_by_signature`, ...)
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use hostbridge::prelude::*;
//!
//! let mut bridge = Bridge::new(Arc::new(TypeRegistry::new()));
//! bridge
//!     .register_function("twice", |b: &mut Bridge| {
//!         let n = b.state().to_integer(1).unwrap_or_default();
//!         b.state().push_integer(n * 2);
//!         Ok(1)
//!     })
//!     .unwrap();
//! let results = bridge.call_global("twice", &[Dynamic::Int(21)]).unwrap();
//! assert_eq!(results, vec![Dynamic::Int(42)]);
//! ```

mod adapter;
mod bridge;
mod checks;
mod dispatch;
mod error;
mod events;
mod globals;
mod host;
mod method;
mod objects;
mod operator;
mod options;
mod resolver;
mod runtime;
pub mod state;
mod translator;

pub use adapter::{
    AdapterCache, AdapterKey, adapter_cache, call_script, dispatch_virtual, event_handler, interface_instance,
    script_delegate, subclass_instance,
};
pub use bridge::Bridge;
pub use error::{AdapterError, RuntimeFailure, ScriptError, ScriptResult};
pub use objects::{IdentityKey, ObjectRegistry};
pub use operator::Operator;
pub use options::{BridgeOptions, BridgeProperty};
pub use resolver::InvocationPlan;
pub use state::{MemoryState, ScriptState, ScriptType, StackFunction};

pub use hostbridge_core;
pub use hostbridge_registry;

pub mod prelude {
    pub use crate::{Bridge, BridgeOptions, BridgeProperty, ScriptError, ScriptResult, ScriptState, ScriptType};
    pub use hostbridge_core::{
        CallContext, DataType, Delegate, Dynamic, EnumValue, HostArray, HostEvent, HostObject, MethodEntry, NativeFn,
        ParamDef, PropertyEntry, ScriptHost, TypeEntry, TypeHash, TypeKind, primitives,
    };
    pub use hostbridge_registry::{Assembly, TypeRegistry};
}
