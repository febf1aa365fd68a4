//! Named units of host types.

use hostbridge_core::{MemberFlags, MethodEntry, TypeEntry};

/// A named group of types, loaded into an interpreter as a unit.
#[derive(Debug, Clone)]
pub struct Assembly {
    name: String,
    types: Vec<TypeEntry>,
    extensions: Vec<MethodEntry>,
}

impl Assembly {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: Vec::new(),
            extensions: Vec::new(),
        }
    }

    pub fn with_type(mut self, entry: TypeEntry) -> Self {
        self.types.push(entry);
        self
    }

    /// Add an extension method. Its first parameter is the extended type.
    pub fn with_extension(mut self, method: MethodEntry) -> Self {
        self.extensions
            .push(method.with_flags(MemberFlags::STATIC | MemberFlags::EXTENSION));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn types(&self) -> &[TypeEntry] {
        &self.types
    }

    pub fn extensions(&self) -> &[MethodEntry] {
        &self.extensions
    }

    pub(crate) fn into_parts(self) -> (String, Vec<TypeEntry>, Vec<MethodEntry>) {
        (self.name, self.types, self.extensions)
    }
}
