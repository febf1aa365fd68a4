//! Marshalling between the script stack and host values.

use tracing::debug;

use hostbridge_core::{Dynamic, ScriptRef, ScriptRefKind};

use crate::bridge::MetatableKind;
use crate::objects::IdentityKey;
use crate::state::{ScriptState, ScriptType};
use crate::{Bridge, ScriptError, ScriptResult};

impl Bridge {
    /// Push a host value.
    ///
    /// Primitives are copied. Reference-like values are pushed as their
    /// registry alias, reusing the existing alias when the same instance
    /// was pushed before. An adapter instance bound to a script table
    /// pushes the table itself.
    pub fn push(&mut self, value: &Dynamic) -> ScriptResult<()> {
        self.intern(value).map(|_| ())
    }

    pub fn push_values(&mut self, values: &[Dynamic]) -> ScriptResult<()> {
        if !self.state.check_stack(values.len()) {
            return Err(ScriptError::StackOverflow);
        }
        for value in values {
            self.push(value)?;
        }
        Ok(())
    }

    /// Push `value` and return the registry id of its alias, or `None` for
    /// values that are not kept in the registry.
    pub fn intern(&mut self, value: &Dynamic) -> ScriptResult<Option<i64>> {
        if !self.state.check_stack(1) {
            return Err(ScriptError::StackOverflow);
        }
        let kind = match value {
            Dynamic::Null => {
                self.state.push_nil();
                return Ok(None);
            }
            Dynamic::Bool(b) => {
                self.state.push_bool(*b);
                return Ok(None);
            }
            Dynamic::Int(i) => {
                self.state.push_integer(*i);
                return Ok(None);
            }
            Dynamic::Float(f) => {
                self.state.push_number(*f);
                return Ok(None);
            }
            Dynamic::String(s) => {
                self.state.push_string(s);
                return Ok(None);
            }
            Dynamic::Table(r) | Dynamic::Function(r) | Dynamic::UserData(r) => {
                self.push_ref(r)?;
                return Ok(None);
            }
            Dynamic::Object(obj) => {
                if let Some(table) = obj.binding().and_then(|b| b.table()) {
                    self.push_ref(&table)?;
                    return Ok(None);
                }
                MetatableKind::Instance
            }
            Dynamic::Type(_) => MetatableKind::Class,
            Dynamic::Enum(_) | Dynamic::Array(_) | Dynamic::Delegate(_) => MetatableKind::Instance,
        };
        self.push_object(value, kind).map(Some)
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    fn push_object(&mut self, value: &Dynamic, kind: MetatableKind) -> ScriptResult<i64> {
        let key = IdentityKey::of(value, &self.registry);
        if let Some(key) = &key
            && let Some(id) = self.objects.lookup(key)
        {
            if self.state.push_object_slot(id) {
                return Ok(id);
            }
            debug!(id, "script alias collected before release, rebuilding");
            self.collect_object(id);
        }
        self.clean_finalized_references();
        let id = self.objects.insert(value.clone(), key);
        self.push_new_object(value, id, kind);
        Ok(id)
    }

    /// Push a fresh alias for `value` that is not entered in the reverse
    /// index, so it never replaces the instance's regular alias.
    pub(crate) fn push_alias(&mut self, value: &Dynamic, kind: MetatableKind) -> ScriptResult<i64> {
        if !self.state.check_stack(1) {
            return Err(ScriptError::StackOverflow);
        }
        let id = self.objects.insert(value.clone(), None);
        self.push_new_object(value, id, kind);
        Ok(id)
    }

    fn push_new_object(&mut self, value: &Dynamic, id: i64, kind: MetatableKind) {
        self.state.new_userdata(id);
        let type_hash = match value {
            Dynamic::Type(t) => *t,
            other => other.runtime_type(),
        };
        self.push_metatable(kind, type_hash);
        self.state.set_metatable(-2);
        self.state.set_object_slot(-1, id);
    }

    /// Read the value at `index` as a host value.
    pub fn to_dynamic(&mut self, index: i32) -> ScriptResult<Dynamic> {
        Ok(match self.state.type_of(index) {
            ScriptType::None | ScriptType::Nil => Dynamic::Null,
            ScriptType::Boolean => Dynamic::Bool(self.state.to_bool(index)),
            ScriptType::Number => match self.state.to_integer(index) {
                Some(i) if self.state.is_integer(index) => Dynamic::Int(i),
                _ => Dynamic::Float(self.state.to_number(index).unwrap_or_default()),
            },
            ScriptType::String => Dynamic::String(self.state.to_string(index).unwrap_or_default()),
            ScriptType::Table => Dynamic::Table(self.make_ref(index, ScriptRefKind::Table)),
            ScriptType::Function => Dynamic::Function(self.make_ref(index, ScriptRefKind::Function)),
            ScriptType::UserData => match self.state.userdata_id(index) {
                Some(id) => self.objects.resolve(id)?.clone(),
                None => Dynamic::UserData(self.make_ref(index, ScriptRefKind::UserData)),
            },
        })
    }

    /// The registry value aliased by the userdata at `index`.
    pub(crate) fn host_value(&self, index: i32) -> Option<Dynamic> {
        if self.state.type_of(index) != ScriptType::UserData {
            return None;
        }
        self.state
            .userdata_id(index)
            .and_then(|id| self.objects.get(id))
            .cloned()
    }

    /// Pin the value at `index` and return a host handle to it.
    pub fn make_ref(&mut self, index: i32, kind: ScriptRefKind) -> ScriptRef {
        self.clean_finalized_references();
        self.state.push_value(index);
        let handle = self.state.reference();
        ScriptRef::new(kind, handle, self.id(), self.release_queue.clone())
    }

    pub fn push_ref(&mut self, reference: &ScriptRef) -> ScriptResult<()> {
        if reference.owner() != self.id() {
            return Err(ScriptError::ForeignReference);
        }
        self.state.push_reference(reference.handle());
        Ok(())
    }

    /// Pop everything above `old_top` as host values.
    pub fn pop_values(&mut self, old_top: i32) -> ScriptResult<Vec<Dynamic>> {
        let top = self.state.get_top();
        let mut values = Vec::with_capacity((top - old_top).max(0) as usize);
        for index in old_top + 1..=top {
            match self.to_dynamic(index) {
                Ok(value) => values.push(value),
                Err(err) => {
                    self.state.set_top(old_top);
                    return Err(err);
                }
            }
        }
        self.state.set_top(old_top);
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hostbridge_core::{HostObject, TypeHash, primitives};
    use hostbridge_registry::TypeRegistry;

    use super::*;

    fn bridge() -> Bridge {
        Bridge::new(Arc::new(TypeRegistry::new()))
    }

    #[test]
    fn primitives_round_trip() {
        let mut b = bridge();
        for value in [
            Dynamic::Int(42),
            Dynamic::Float(1.5),
            Dynamic::Bool(true),
            Dynamic::String("hi".into()),
            Dynamic::Null,
        ] {
            b.push(&value).unwrap();
            assert_eq!(b.to_dynamic(-1).unwrap(), value);
            b.state().set_top(0);
        }
    }

    #[test]
    fn same_instance_same_alias() {
        let mut b = bridge();
        let obj = Dynamic::Object(HostObject::new(primitives::OBJECT, 7i32));
        let first = b.intern(&obj).unwrap();
        let second = b.intern(&obj).unwrap();
        assert_eq!(first, second);
        assert!(b.state().raw_equal(-1, -2));
        assert_eq!(b.object_count(), 1);
    }

    #[test]
    fn collected_alias_gets_fresh_id() {
        let mut b = bridge();
        let obj = Dynamic::Object(HostObject::new(primitives::OBJECT, 7i32));
        let first = b.intern(&obj).unwrap().unwrap();
        b.state().set_top(0);
        let second = b.intern(&obj).unwrap().unwrap();
        assert_ne!(first, second);
        assert!(!b.objects.contains(first));
        assert_eq!(b.object_count(), 1);
        assert_eq!(b.collect_garbage(), 0);
    }

    #[test]
    fn type_references_resolve() {
        let mut b = bridge();
        let ty = Dynamic::Type(TypeHash::from_name("string"));
        b.push(&ty).unwrap();
        assert_eq!(b.to_dynamic(-1).unwrap(), ty);
    }

    #[test]
    fn foreign_reference_rejected() {
        let mut a = bridge();
        let mut b = bridge();
        a.state().new_table();
        let table = a.to_dynamic(-1).unwrap();
        assert_eq!(b.push(&table), Err(ScriptError::ForeignReference));
    }
}
