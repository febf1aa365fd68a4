//! TypeRegistry - assemblies, types and member lookup.
//!
//! # Storage Model
//!
//! - **Types**: every [`TypeEntry`] is stored once, keyed by its [`TypeHash`].
//! - **Assemblies**: each assembly maps qualified names to hashes in
//!   registration order, plus its extension methods. Name lookup goes
//!   through an ordered list of loaded assemblies, so the first loaded
//!   assembly that defines a name wins.
//!
//! # Thread Safety
//!
//! The registry is populated up front and then shared read-only between
//! interpreters behind an `Arc`. Each registry carries a process-unique
//! [`id`](TypeRegistry::id) so process-wide caches can tell registries apart
//! even when they declare types with the same names.

use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use tracing::debug;

use hostbridge_core::{DataType, MethodEntry, RegistrationError, TypeEntry, TypeHash, TypeKind, primitives};

use crate::{Assembly, core_assembly};

/// Upper bound on inheritance depth, guarding against cyclic definitions.
const MAX_INHERITANCE_DEPTH: usize = 64;

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct AssemblyRecord {
    name: String,
    types: IndexMap<String, TypeHash>,
    extensions: Vec<MethodEntry>,
}

/// Registry of host types grouped into assemblies.
#[derive(Debug)]
pub struct TypeRegistry {
    id: u64,
    types: FxHashMap<TypeHash, TypeEntry>,
    assemblies: Vec<AssemblyRecord>,
    assembly_index: FxHashMap<String, usize>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            types: FxHashMap::default(),
            assemblies: Vec::new(),
            assembly_index: FxHashMap::default(),
        }
    }
}

impl TypeRegistry {
    /// Registry containing the built-in `core` assembly.
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.install(core_assembly());
        registry
    }

    /// Process-unique identity, stable for the registry's lifetime.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Register an assembly and all of its types.
    ///
    /// Fails without modifying the registry when the assembly or one of its
    /// types is a duplicate, a type is inconsistent, or a base type is missing.
    pub fn register_assembly(&mut self, assembly: Assembly) -> Result<(), RegistrationError> {
        if self.assembly_index.contains_key(assembly.name()) {
            return Err(RegistrationError::DuplicateAssembly(assembly.name().to_string()));
        }

        let mut incoming: FxHashMap<TypeHash, &str> = FxHashMap::default();
        for entry in assembly.types() {
            entry.validate()?;
            if self.types.contains_key(&entry.type_hash)
                || incoming.insert(entry.type_hash, &entry.name).is_some()
            {
                return Err(RegistrationError::DuplicateType(entry.name.clone()));
            }
        }

        for entry in assembly.types() {
            let referenced = entry.base.iter().chain(entry.interfaces.iter());
            for hash in referenced {
                if !self.types.contains_key(hash) && !incoming.contains_key(hash) {
                    return Err(RegistrationError::TypeNotFound(format!(
                        "{hash} (referenced by {})",
                        entry.name
                    )));
                }
            }
        }

        self.install(assembly);
        Ok(())
    }

    fn install(&mut self, assembly: Assembly) {
        let (name, types, extensions) = assembly.into_parts();
        let mut names = IndexMap::with_capacity(types.len());
        for entry in types {
            names.insert(entry.name.clone(), entry.type_hash);
            self.types.insert(entry.type_hash, entry);
        }
        debug!(assembly = %name, types = names.len(), extensions = extensions.len(), "registered assembly");
        self.assembly_index.insert(name.clone(), self.assemblies.len());
        self.assemblies.push(AssemblyRecord {
            name,
            types: names,
            extensions,
        });
    }

    pub fn has_assembly(&self, name: &str) -> bool {
        self.assembly_index.contains_key(name)
    }

    pub fn assembly_names(&self) -> impl Iterator<Item = &str> {
        self.assemblies.iter().map(|a| a.name.as_str())
    }

    /// Get a type by hash.
    pub fn get(&self, hash: TypeHash) -> Option<&TypeEntry> {
        self.types.get(&hash)
    }

    /// Get a type by qualified name from any assembly.
    pub fn get_by_name(&self, name: &str) -> Option<&TypeEntry> {
        self.types.get(&TypeHash::from_name(name))
    }

    /// Find a type by qualified name, searching `loaded` assemblies in order.
    pub fn find_type_in<'a, I>(&self, loaded: I, name: &str) -> Option<&TypeEntry>
    where
        I: IntoIterator<Item = &'a str>,
    {
        loaded
            .into_iter()
            .filter_map(|assembly| self.assembly_index.get(assembly))
            .find_map(|&index| self.assemblies[index].types.get(name))
            .and_then(|hash| self.types.get(hash))
    }

    /// Qualified name of a type, for messages.
    pub fn type_name(&self, hash: TypeHash) -> &str {
        self.types.get(&hash).map_or("<unknown>", |t| t.name.as_str())
    }

    /// Instances are copied rather than shared.
    pub fn is_value_type(&self, hash: TypeHash) -> bool {
        self.types.get(&hash).is_some_and(TypeEntry::is_value_type)
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeEntry> {
        self.types.values()
    }

    /// `hash` followed by each base type, ending at the root object type.
    pub fn base_chain(&self, hash: TypeHash) -> Vec<TypeHash> {
        let mut chain = vec![hash];
        let mut current = hash;
        while current != primitives::OBJECT && chain.len() < MAX_INHERITANCE_DEPTH {
            let next = match self.types.get(&current) {
                Some(entry) => match (entry.base, entry.kind) {
                    (Some(base), _) => base,
                    (None, TypeKind::Delegate) => primitives::DELEGATE,
                    (None, TypeKind::Enum) => primitives::ENUM,
                    (None, _) => primitives::OBJECT,
                },
                None => primitives::OBJECT,
            };
            chain.push(next);
            current = next;
        }
        chain
    }

    /// A value of type `from` may be used where `to` is expected.
    pub fn is_assignable(&self, from: TypeHash, to: TypeHash) -> bool {
        if to == primitives::OBJECT || from == to {
            return true;
        }
        self.base_chain(from)
            .into_iter()
            .any(|t| t == to || self.implements(t, to, 0))
    }

    fn implements(&self, ty: TypeHash, interface: TypeHash, depth: usize) -> bool {
        if depth > MAX_INHERITANCE_DEPTH {
            return false;
        }
        self.types.get(&ty).is_some_and(|entry| {
            entry
                .interfaces
                .iter()
                .any(|&i| i == interface || self.implements(i, interface, depth + 1))
        })
    }

    /// Types whose members are visible on `hash`: its base chain, then inherited interfaces.
    fn member_sources(&self, hash: TypeHash) -> Vec<TypeHash> {
        let mut sources = self.base_chain(hash);
        let mut i = 0;
        while i < sources.len() && sources.len() < MAX_INHERITANCE_DEPTH * 4 {
            if let Some(entry) = self.types.get(&sources[i])
                && entry.is_interface()
            {
                for interface in &entry.interfaces {
                    if !sources.contains(interface) {
                        sources.push(*interface);
                    }
                }
            }
            i += 1;
        }
        sources
    }

    /// Methods named `name` on `hash` and its bases, most derived first.
    pub fn methods_recursive(&self, hash: TypeHash, name: &str) -> Vec<MethodEntry> {
        self.member_sources(hash)
            .into_iter()
            .filter_map(|t| self.types.get(&t))
            .flat_map(|entry| entry.methods_named(name).cloned())
            .collect()
    }

    /// Whether `hash` or a base declares a method named `name`.
    pub fn has_method(&self, hash: TypeHash, name: &str) -> bool {
        self.member_sources(hash)
            .into_iter()
            .filter_map(|t| self.types.get(&t))
            .any(|entry| entry.methods_named(name).next().is_some())
    }

    /// Method named `name` with exactly the given parameter types.
    pub fn find_method_by_signature(&self, hash: TypeHash, name: &str, params: &[DataType]) -> Option<MethodEntry> {
        self.methods_recursive(hash, name)
            .into_iter()
            .find(|m| m.has_signature(params))
    }

    /// Extension method named `name` applicable to `target`, from the `loaded` assemblies.
    pub fn extension_method<'a, I>(&self, target: TypeHash, name: &str, loaded: I) -> Option<MethodEntry>
    where
        I: IntoIterator<Item = &'a str>,
    {
        loaded
            .into_iter()
            .filter_map(|assembly| self.assembly_index.get(assembly))
            .flat_map(|&index| self.assemblies[index].extensions.iter())
            .find(|m| {
                m.name == name
                    && m.params
                        .first()
                        .is_some_and(|p| self.is_assignable(target, p.data_type.type_hash))
            })
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CORE_ASSEMBLY;
    use hostbridge_core::ParamDef;

    fn demo() -> Assembly {
        let shape = TypeEntry::interface("Demo.IShape").with_method(MethodEntry::new("Area").abstract_method());
        let drawable = TypeEntry::interface("Demo.IDrawable")
            .with_interface(shape.type_hash)
            .with_method(MethodEntry::new("Draw").abstract_method());
        let base = TypeEntry::class("Demo.Figure")
            .with_method(MethodEntry::new("Name").returns(primitives::STRING))
            .with_method(MethodEntry::new("Scale").param(ParamDef::new("by", primitives::INT32)));
        let square = TypeEntry::class("Demo.Square")
            .with_base(base.type_hash)
            .with_interface(drawable.type_hash)
            .with_method(MethodEntry::new("Scale").param(ParamDef::new("by", primitives::FLOAT64)));
        Assembly::new("Demo")
            .with_type(shape)
            .with_type(drawable)
            .with_type(base)
            .with_type(square)
            .with_extension(
                MethodEntry::new("Describe")
                    .param(ParamDef::new("figure", TypeHash::from_name("Demo.Figure")))
                    .returns(primitives::STRING),
            )
    }

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.register_assembly(demo()).unwrap();
        registry
    }

    #[test]
    fn new_registry_has_core_types() {
        let registry = TypeRegistry::new();
        assert!(registry.has_assembly(CORE_ASSEMBLY));
        assert!(registry.get(primitives::INT32).is_some());
        assert!(registry.get(primitives::EVENT_REGISTRATION).is_some());
    }

    #[test]
    fn registries_have_distinct_ids() {
        let a = registry();
        let b = registry();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.id());
    }

    #[test]
    fn duplicate_assembly_rejected() {
        let mut registry = registry();
        assert!(matches!(
            registry.register_assembly(Assembly::new("Demo")),
            Err(RegistrationError::DuplicateAssembly(_))
        ));
    }

    #[test]
    fn duplicate_type_rejected_atomically() {
        let mut registry = registry();
        let result = registry.register_assembly(
            Assembly::new("Other")
                .with_type(TypeEntry::class("Other.Fresh"))
                .with_type(TypeEntry::class("Demo.Square")),
        );
        assert!(matches!(result, Err(RegistrationError::DuplicateType(_))));
        assert!(!registry.has_assembly("Other"));
        assert!(registry.get_by_name("Other.Fresh").is_none());
    }

    #[test]
    fn missing_base_rejected() {
        let mut registry = TypeRegistry::new();
        let orphan = TypeEntry::class("Other.Orphan").with_base(TypeHash::from_name("Other.Missing"));
        assert!(matches!(
            registry.register_assembly(Assembly::new("Other").with_type(orphan)),
            Err(RegistrationError::TypeNotFound(_))
        ));
    }

    #[test]
    fn find_type_only_searches_loaded() {
        let registry = registry();
        assert!(registry.find_type_in([CORE_ASSEMBLY], "Demo.Square").is_none());
        assert!(registry.find_type_in([CORE_ASSEMBLY, "Demo"], "Demo.Square").is_some());
        assert!(registry.find_type_in(["Demo"], "Demo.Nope").is_none());
    }

    #[test]
    fn base_chain_ends_at_object() {
        let registry = registry();
        let square = TypeHash::from_name("Demo.Square");
        assert_eq!(
            registry.base_chain(square),
            vec![square, TypeHash::from_name("Demo.Figure"), primitives::OBJECT]
        );
        assert_eq!(registry.base_chain(primitives::OBJECT), vec![primitives::OBJECT]);
    }

    #[test]
    fn assignability_follows_bases_and_interfaces() {
        let registry = registry();
        let square = TypeHash::from_name("Demo.Square");
        assert!(registry.is_assignable(square, TypeHash::from_name("Demo.Figure")));
        assert!(registry.is_assignable(square, TypeHash::from_name("Demo.IDrawable")));
        assert!(registry.is_assignable(square, TypeHash::from_name("Demo.IShape")));
        assert!(registry.is_assignable(square, primitives::OBJECT));
        assert!(!registry.is_assignable(TypeHash::from_name("Demo.Figure"), square));
    }

    #[test]
    fn methods_recursive_lists_most_derived_first() {
        let registry = registry();
        let methods = registry.methods_recursive(TypeHash::from_name("Demo.Square"), "Scale");
        assert_eq!(methods.len(), 2);
        assert_eq!(methods[0].params[0].data_type, DataType::simple(primitives::FLOAT64));
        assert_eq!(methods[1].params[0].data_type, DataType::simple(primitives::INT32));
    }

    #[test]
    fn interface_members_include_inherited_interfaces() {
        let registry = registry();
        let drawable = TypeHash::from_name("Demo.IDrawable");
        assert!(registry.has_method(drawable, "Area"));
        assert!(registry.has_method(drawable, "Draw"));
    }

    #[test]
    fn signature_lookup_is_exact() {
        let registry = registry();
        let square = TypeHash::from_name("Demo.Square");
        let found = registry.find_method_by_signature(square, "Scale", &[DataType::simple(primitives::INT32)]);
        assert_eq!(found.map(|m| m.declaring_type), Some(TypeHash::from_name("Demo.Figure")));
        assert!(registry.find_method_by_signature(square, "Scale", &[]).is_none());
    }

    #[test]
    fn extension_methods_need_loaded_assembly() {
        let registry = registry();
        let square = TypeHash::from_name("Demo.Square");
        assert!(registry.extension_method(square, "Describe", [CORE_ASSEMBLY]).is_none());
        let ext = registry.extension_method(square, "Describe", ["Demo"]).unwrap();
        assert!(ext.is_extension());
        assert!(ext.is_static());
    }
}
