//! Fields, properties and events.

use crate::{DataType, NativeFn, TypeHash};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Field,
    Property,
}

/// A readable and possibly writable data member.
///
/// The getter receives the receiver as `this` (none when static) and sets
/// its return value. The setter receives the new value as argument 0.
#[derive(Debug, Clone)]
pub struct PropertyEntry {
    pub name: String,
    pub data_type: DataType,
    pub kind: PropertyKind,
    pub is_static: bool,
    pub getter: Option<NativeFn>,
    pub setter: Option<NativeFn>,
}

impl PropertyEntry {
    pub fn field(name: impl Into<String>, data_type: impl Into<DataType>) -> Self {
        Self::with_kind(name, data_type, PropertyKind::Field)
    }

    pub fn property(name: impl Into<String>, data_type: impl Into<DataType>) -> Self {
        Self::with_kind(name, data_type, PropertyKind::Property)
    }

    fn with_kind(name: impl Into<String>, data_type: impl Into<DataType>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            kind,
            is_static: false,
            getter: None,
            setter: None,
        }
    }

    pub fn static_member(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn getter(mut self, getter: NativeFn) -> Self {
        self.getter = Some(getter);
        self
    }

    pub fn setter(mut self, setter: NativeFn) -> Self {
        self.setter = Some(setter);
        self
    }

    pub fn is_read_only(&self) -> bool {
        self.setter.is_none()
    }
}

/// An event: a multicast list of delegates of `handler_type`.
///
/// `add` and `remove` receive the handler delegate as argument 0.
#[derive(Debug, Clone)]
pub struct EventEntry {
    pub name: String,
    pub handler_type: TypeHash,
    pub is_static: bool,
    pub add: NativeFn,
    pub remove: NativeFn,
}

impl EventEntry {
    pub fn new(name: impl Into<String>, handler_type: TypeHash, add: NativeFn, remove: NativeFn) -> Self {
        Self {
            name: name.into(),
            handler_type,
            is_static: false,
            add,
            remove,
        }
    }

    pub fn static_member(mut self) -> Self {
        self.is_static = true;
        self
    }
}
