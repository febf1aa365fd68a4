//! Assembly and type registry.
//!
//! [`TypeRegistry`] stores every host type by [`TypeHash`](hostbridge_core::TypeHash)
//! and groups them into named [`Assembly`] units that scripts load by name.
//! A fresh registry already contains the built-in `core` assembly.

mod assembly;
mod builtins;
mod registry;

pub use assembly::Assembly;
pub use builtins::{CORE_ASSEMBLY, TypeInfo, core_assembly};
pub use registry::TypeRegistry;
