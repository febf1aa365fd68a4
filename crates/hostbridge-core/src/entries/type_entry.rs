//! Type entries.

use crate::{RegistrationError, TypeHash};

use super::{EventEntry, MethodEntry, PropertyEntry};

/// Kind of host type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Reference type; instances keep identity.
    Class,
    /// Value type; instances are copied and never identity-interned.
    Value,
    Interface,
    Enum,
    /// Callable type described by its `invoke` signature.
    Delegate,
    /// Built-in scalar marshalled natively.
    Primitive,
}

/// Registry entry for a host type.
#[derive(Debug, Clone)]
pub struct TypeEntry {
    /// Qualified name, e.g. `Demo.Calculator` or `Demo.Calculator+Mode` for nested types.
    pub name: String,
    pub type_hash: TypeHash,
    pub kind: TypeKind,
    pub base: Option<TypeHash>,
    pub interfaces: Vec<TypeHash>,
    pub is_abstract: bool,
    pub properties: Vec<PropertyEntry>,
    pub methods: Vec<MethodEntry>,
    pub constructors: Vec<MethodEntry>,
    pub events: Vec<EventEntry>,
    /// Simple name and hash of each nested type.
    pub nested: Vec<(String, TypeHash)>,
    /// Enum members in declaration order.
    pub enum_members: Vec<(String, i64)>,
    /// Signature of a delegate type.
    pub invoke: Option<MethodEntry>,
}

impl TypeEntry {
    fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        let name = name.into();
        Self {
            type_hash: TypeHash::from_name(&name),
            name,
            kind,
            base: None,
            interfaces: Vec::new(),
            is_abstract: false,
            properties: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            events: Vec::new(),
            nested: Vec::new(),
            enum_members: Vec::new(),
            invoke: None,
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Class)
    }

    pub fn value(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Value)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Interface)
    }

    pub fn enumeration(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Enum)
    }

    pub fn primitive(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Primitive)
    }

    /// Delegate type whose callable shape is `invoke`'s parameters and return type.
    pub fn delegate(name: impl Into<String>, invoke: MethodEntry) -> Self {
        let mut entry = Self::new(name, TypeKind::Delegate);
        let mut invoke = invoke;
        invoke.name = "Invoke".to_string();
        invoke.declaring_type = entry.type_hash;
        entry.invoke = Some(invoke);
        entry
    }

    pub fn with_base(mut self, base: TypeHash) -> Self {
        self.base = Some(base);
        self
    }

    pub fn with_interface(mut self, interface: TypeHash) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn as_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn with_property(mut self, property: PropertyEntry) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_method(mut self, method: MethodEntry) -> Self {
        let mut method = method;
        method.declaring_type = self.type_hash;
        self.methods.push(method);
        self
    }

    pub fn with_constructor(mut self, constructor: MethodEntry) -> Self {
        let mut constructor = constructor;
        constructor.declaring_type = self.type_hash;
        self.constructors.push(constructor);
        self
    }

    pub fn with_event(mut self, event: EventEntry) -> Self {
        self.events.push(event);
        self
    }

    /// Record `nested` as a nested type; `nested` must be named `Outer+Inner`.
    pub fn with_nested(mut self, nested: &TypeEntry) -> Self {
        self.nested.push((nested.simple_name().to_string(), nested.type_hash));
        self
    }

    pub fn with_enum_member(mut self, name: impl Into<String>, value: i64) -> Self {
        self.enum_members.push((name.into(), value));
        self
    }

    /// Name without namespace or enclosing type.
    pub fn simple_name(&self) -> &str {
        self.name.rsplit(['.', '+']).next().unwrap_or(&self.name)
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn is_enum(&self) -> bool {
        self.kind == TypeKind::Enum
    }

    pub fn is_delegate(&self) -> bool {
        self.kind == TypeKind::Delegate
    }

    /// Instances are copied, not shared.
    pub fn is_value_type(&self) -> bool {
        matches!(self.kind, TypeKind::Value | TypeKind::Primitive)
    }

    /// Methods declared on this type with the given name, in declaration order.
    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodEntry> + 'a {
        self.methods.iter().filter(move |m| m.name == name)
    }

    pub fn find_property(&self, name: &str, is_static: bool) -> Option<&PropertyEntry> {
        self.properties
            .iter()
            .find(|p| p.name == name && p.is_static == is_static)
    }

    pub fn find_event(&self, name: &str, is_static: bool) -> Option<&EventEntry> {
        self.events
            .iter()
            .find(|e| e.name == name && e.is_static == is_static)
    }

    pub fn find_nested(&self, name: &str) -> Option<TypeHash> {
        self.nested.iter().find(|(n, _)| n == name).map(|(_, h)| *h)
    }

    /// Constructor taking no arguments.
    pub fn default_constructor(&self) -> Option<&MethodEntry> {
        self.constructors.iter().find(|c| c.params.is_empty())
    }

    /// Enum member value by name, ignoring ASCII case.
    pub fn enum_value(&self, name: &str) -> Option<i64> {
        self.enum_members
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }

    /// Enum member name for a value.
    pub fn enum_name(&self, value: i64) -> Option<&str> {
        self.enum_members
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.as_str())
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), RegistrationError> {
        for (i, (name, _)) in self.enum_members.iter().enumerate() {
            if self.enum_members[..i].iter().any(|(n, _)| n == name) {
                return Err(RegistrationError::DuplicateEnumValue {
                    enum_name: self.name.clone(),
                    value_name: name.clone(),
                });
            }
        }
        if self.kind == TypeKind::Delegate && self.invoke.is_none() {
            return Err(RegistrationError::InvalidType {
                type_name: self.name.clone(),
                reason: "delegate type without an invoke signature".to_string(),
            });
        }
        if self.kind == TypeKind::Interface && self.base.is_some() {
            return Err(RegistrationError::InvalidType {
                type_name: self.name.clone(),
                reason: "interfaces cannot have a base class".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives;

    #[test]
    fn simple_name_strips_namespace_and_outer_type() {
        assert_eq!(TypeEntry::class("Demo.Calculator").simple_name(), "Calculator");
        assert_eq!(TypeEntry::enumeration("Demo.Calculator+Mode").simple_name(), "Mode");
        assert_eq!(TypeEntry::class("Plain").simple_name(), "Plain");
    }

    #[test]
    fn methods_get_declaring_type() {
        let entry = TypeEntry::class("Demo.Animal").with_method(MethodEntry::new("Speak"));
        assert_eq!(entry.methods[0].declaring_type, entry.type_hash);
    }

    #[test]
    fn enum_lookup_ignores_case() {
        let color = TypeEntry::enumeration("Demo.Color")
            .with_enum_member("Red", 1)
            .with_enum_member("Green", 2);
        assert_eq!(color.enum_value("green"), Some(2));
        assert_eq!(color.enum_value("Blue"), None);
        assert_eq!(color.enum_name(1), Some("Red"));
    }

    #[test]
    fn validate_rejects_duplicate_enum_members() {
        let color = TypeEntry::enumeration("Demo.Color")
            .with_enum_member("Red", 1)
            .with_enum_member("Red", 2);
        assert!(matches!(
            color.validate(),
            Err(RegistrationError::DuplicateEnumValue { .. })
        ));
    }

    #[test]
    fn delegate_invoke_is_named() {
        let entry = TypeEntry::delegate(
            "Demo.Transform",
            MethodEntry::new("").returns(primitives::INT32),
        );
        let invoke = entry.invoke.as_ref().unwrap();
        assert_eq!(invoke.name, "Invoke");
        assert_eq!(invoke.declaring_type, entry.type_hash);
        assert!(entry.validate().is_ok());
    }
}
