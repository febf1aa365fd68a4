//! Descriptions of runtime-generated adapter types.

use crate::{DataType, NativeFn, ParamDef, ParamMode, TypeHash};

/// One overridable member of a generated class adapter.
#[derive(Debug, Clone)]
pub struct VirtualSlot {
    pub name: String,
    pub params: Vec<ParamDef>,
    /// Return type followed by the type of each by-ref parameter.
    pub return_types: Vec<DataType>,
    /// Implementation to fall back to when the script table has no override.
    pub base: Option<NativeFn>,
}

impl VirtualSlot {
    /// Number of values the caller supplies.
    pub fn input_count(&self) -> usize {
        self.params.iter().filter(|p| p.mode != ParamMode::Out).count()
    }
}

/// A generated subclass or interface implementation.
#[derive(Debug, Clone)]
pub struct VTable {
    /// Identity of the generated type.
    pub type_hash: TypeHash,
    /// The base class or interface being implemented.
    pub target: TypeHash,
    pub is_interface: bool,
    pub slots: Vec<VirtualSlot>,
}

impl VTable {
    /// Slot for `name` taking `arg_count` declared parameters, else the first slot named `name`.
    pub fn slot(&self, name: &str, arg_count: usize) -> Option<&VirtualSlot> {
        let mut named = self.slots.iter().filter(|s| s.name == name);
        let first = named.clone().next();
        named.find(|s| s.params.len() == arg_count).or(first)
    }

    pub fn has_slot(&self, name: &str) -> bool {
        self.slots.iter().any(|s| s.name == name)
    }
}

/// Generated callable shape for a delegate or event handler type.
#[derive(Debug, Clone)]
pub struct CallableShape {
    /// Identity of the generated handler type.
    pub type_hash: TypeHash,
    /// The delegate type being adapted.
    pub delegate_type: TypeHash,
    pub params: Vec<ParamDef>,
    /// Return type followed by the type of each by-ref parameter.
    pub return_types: Vec<DataType>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives;

    fn slot(name: &str, params: usize) -> VirtualSlot {
        VirtualSlot {
            name: name.to_string(),
            params: (0..params)
                .map(|i| ParamDef::new(format!("p{i}"), primitives::INT32))
                .collect(),
            return_types: vec![DataType::VOID],
            base: None,
        }
    }

    #[test]
    fn slot_prefers_matching_arity() {
        let vtable = VTable {
            type_hash: TypeHash::generated(1),
            target: TypeHash::from_name("Demo.Shape"),
            is_interface: false,
            slots: vec![slot("Draw", 0), slot("Draw", 2)],
        };
        assert_eq!(vtable.slot("Draw", 2).map(|s| s.params.len()), Some(2));
        assert_eq!(vtable.slot("Draw", 5).map(|s| s.params.len()), Some(0));
        assert!(vtable.slot("Erase", 0).is_none());
    }
}
