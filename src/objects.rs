//! Identity-preserving table of host values aliased by script code.
//!
//! Every host value pushed to script code gets a monotonically increasing
//! id. Reference-like values are also recorded in a reverse index keyed by
//! identity, so pushing the same instance twice yields the same id and the
//! same script-side alias. Value-type instances are copied and never
//! reverse-indexed.

use rustc_hash::FxHashMap;

use hostbridge_core::{Dynamic, EnumValue, TypeHash};
use hostbridge_registry::TypeRegistry;

use crate::{ScriptError, ScriptResult};

/// Identity of a host value for the reverse index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    /// Allocation address of an object, array or delegate.
    Reference(usize),
    /// Enums compare by type and value.
    Enum(EnumValue),
    /// Type proxies compare by type.
    Type(TypeHash),
}

impl IdentityKey {
    /// Key for `value`, or `None` when it must not be reverse-indexed.
    pub fn of(value: &Dynamic, registry: &TypeRegistry) -> Option<IdentityKey> {
        match value {
            Dynamic::Object(obj) if registry.is_value_type(obj.type_hash()) => None,
            Dynamic::Object(obj) => Some(IdentityKey::Reference(obj.identity())),
            Dynamic::Array(array) => Some(IdentityKey::Reference(array.identity())),
            Dynamic::Delegate(delegate) => Some(IdentityKey::Reference(delegate.identity())),
            Dynamic::Enum(e) => Some(IdentityKey::Enum(*e)),
            Dynamic::Type(t) => Some(IdentityKey::Type(*t)),
            _ => None,
        }
    }
}

/// Two-way map between registry ids and host values.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    objects: FxHashMap<i64, Dynamic>,
    ids: FxHashMap<IdentityKey, i64>,
    keys: FxHashMap<i64, IdentityKey>,
    next_id: i64,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id currently recorded for an identity.
    pub fn lookup(&self, key: &IdentityKey) -> Option<i64> {
        self.ids.get(key).copied()
    }

    /// Record `value` under a fresh id, reverse-indexing it under `key`.
    pub fn insert(&mut self, value: Dynamic, key: Option<IdentityKey>) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.insert(id, value);
        if let Some(key) = key {
            self.ids.insert(key, id);
            self.keys.insert(id, key);
        }
        id
    }

    /// Value recorded under `id`.
    pub fn resolve(&self, id: i64) -> ScriptResult<&Dynamic> {
        self.objects.get(&id).ok_or(ScriptError::UnknownReference(id))
    }

    pub fn get(&self, id: i64) -> Option<&Dynamic> {
        self.objects.get(&id)
    }

    /// Forget `id`. Idempotent.
    ///
    /// The reverse entry is dropped only if it still points at `id`, so a
    /// stale release cannot unmap a newer id for the same identity.
    pub fn release(&mut self, id: i64) -> Option<Dynamic> {
        let value = self.objects.remove(&id)?;
        if let Some(key) = self.keys.remove(&id)
            && self.ids.get(&key) == Some(&id)
        {
            self.ids.remove(&key);
        }
        Some(value)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Number of reverse-indexed identities.
    pub fn identity_count(&self) -> usize {
        self.ids.len()
    }
}
