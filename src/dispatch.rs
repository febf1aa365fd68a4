//! Metamethods for host values.
//!
//! Member access walks the type's base chain. At each level it tries, in
//! order: declared members (instance before static), `get_Item`-style
//! indexers, `TryGetValue`-style lookups, extension methods, and finally
//! explicitly implemented interface members (`IFoo.Name`). Resolved members
//! are cached per type and name; indexer results are not.
//!
//! Lookups that find nothing return `nil, false` instead of raising. An
//! indexer that fails raises `key '<k>' not found` or
//! `exception indexing '<k>' <cause>`, unless an extension or explicit
//! member on the same level answers the name.

use rustc_hash::FxHashMap;
use tracing::trace;

use hostbridge_core::{
    CallContext, DataType, Dynamic, EnumValue, EventEntry, EventRegistration, HostArray, MethodEntry, NativeError,
    PropertyEntry, ScriptHost, TypeHash, TypeKind, primitives,
};
use hostbridge_registry::TypeRegistry;

use crate::checks::{self, host_value_at};
use crate::method::{MethodWrapper, Receiver, method_group, push_results};
use crate::resolver;
use crate::state::{ScriptState, ScriptType, StackFunction};
use crate::{Bridge, Operator, ScriptError, ScriptResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Scope {
    Instance,
    Static,
    /// Non-virtual wrappers reached through `base`.
    Base,
}

/// A resolved member.
#[derive(Clone)]
pub(crate) enum CachedMember {
    Property(PropertyEntry),
    Event {
        declaring_type: TypeHash,
        event: EventEntry,
    },
    Nested(TypeHash),
    Method(StackFunction),
}

/// Resolved members per type, filled lazily and never evicted.
#[derive(Default)]
pub(crate) struct MemberCache {
    members: FxHashMap<(TypeHash, Scope), FxHashMap<String, CachedMember>>,
}

impl MemberCache {
    fn get(&self, type_hash: TypeHash, scope: Scope, name: &str) -> Option<CachedMember> {
        self.members.get(&(type_hash, scope))?.get(name).cloned()
    }

    fn insert(&mut self, type_hash: TypeHash, scope: Scope, name: &str, member: CachedMember) {
        self.members
            .entry((type_hash, scope))
            .or_default()
            .insert(name.to_string(), member);
    }

    pub(crate) fn len(&self) -> usize {
        self.members.values().map(FxHashMap::len).sum()
    }
}

fn runtime_type(value: &Dynamic) -> TypeHash {
    match value {
        Dynamic::Type(_) => primitives::TYPE,
        other => other.runtime_type(),
    }
}

/// Whether a host value can be passed for `data_type` without conversion.
fn value_fits(registry: &TypeRegistry, value: &Dynamic, data_type: &DataType) -> bool {
    let ty = data_type.type_hash;
    if ty == primitives::OBJECT && !data_type.is_array {
        return true;
    }
    match value {
        Dynamic::Null => !primitives::is_numeric(ty) && ty != primitives::BOOL,
        Dynamic::String(_) => ty == primitives::STRING,
        Dynamic::Int(_) => primitives::is_numeric(ty),
        Dynamic::Float(f) => primitives::is_float(ty) || (primitives::is_integer(ty) && f.fract() == 0.0),
        Dynamic::Bool(_) => ty == primitives::BOOL,
        other => !data_type.is_array && registry.is_assignable(runtime_type(other), ty),
    }
}

/// Member named `name` declared on `level`, callable on values of `owner`.
fn member_at(bridge: &Bridge, owner: TypeHash, level: TypeHash, name: &str, scope: Scope) -> Option<CachedMember> {
    let entry = bridge.registry.get(level)?;
    let statics: &[bool] = match scope {
        Scope::Instance => &[false, true],
        Scope::Static | Scope::Base => &[true],
    };
    for &is_static in statics {
        if let Some(property) = entry.find_property(name, is_static) {
            return Some(CachedMember::Property(property.clone()));
        }
        if let Some(event) = entry.find_event(name, is_static) {
            return Some(CachedMember::Event {
                declaring_type: level,
                event: event.clone(),
            });
        }
        if entry.methods_named(name).any(|m| m.is_static() == is_static) {
            return method_group(bridge, owner, name, is_static).map(|w| CachedMember::Method(w.into_function()));
        }
    }
    entry.find_nested(name).map(CachedMember::Nested)
}

/// Instance method implementing `name` explicitly for an interface.
fn explicit_member(bridge: &Bridge, owner: TypeHash, level: TypeHash, name: &str) -> Option<CachedMember> {
    let entry = bridge.registry.get(level)?;
    let suffix = format!(".{name}");
    let method = entry
        .methods
        .iter()
        .find(|m| !m.is_static() && m.name.ends_with(&suffix))?;
    method_group(bridge, owner, &method.name, false).map(|w| CachedMember::Method(w.into_function()))
}

fn extension_member(bridge: &Bridge, level: TypeHash, name: &str) -> Option<CachedMember> {
    let extension = bridge
        .registry
        .extension_method(level, name, bridge.loaded_names())?;
    let type_name = bridge.registry.type_name(extension.declaring_type).to_string();
    let wrapper = MethodWrapper::new(type_name, name, vec![extension], Receiver::None);
    Some(CachedMember::Method(wrapper.into_function()))
}

/// Push the value of `member` read from `this` (or statically).
fn push_member(bridge: &mut Bridge, this: Option<&Dynamic>, member: CachedMember) -> ScriptResult<()> {
    match member {
        CachedMember::Property(property) => {
            let Some(getter) = &property.getter else {
                return Err(bridge.raise(format!("property '{}' is write-only", property.name)));
            };
            let receiver = if property.is_static { None } else { this };
            let mut ret = Dynamic::Null;
            let result = getter.call(&mut CallContext::new(receiver, &mut [], &mut ret, bridge));
            result.map_err(|err| bridge.raise_native(&err))?;
            bridge.push(&ret)
        }
        CachedMember::Event { declaring_type, event } => {
            let target = if event.is_static { None } else { this.cloned() };
            let registration = EventRegistration {
                target,
                declaring_type,
                event,
            };
            bridge.push(&Dynamic::Object(registration.into_object()))
        }
        CachedMember::Nested(nested) => bridge.push(&Dynamic::Type(nested)),
        CachedMember::Method(function) => {
            bridge.state.push_function(None, function);
            Ok(())
        }
    }
}

fn key_text(key: &Dynamic) -> String {
    match key {
        Dynamic::String(s) => s.clone(),
        Dynamic::Int(i) => i.to_string(),
        Dynamic::Float(f) => f.to_string(),
        Dynamic::Bool(b) => b.to_string(),
        other => other.type_name().to_string(),
    }
}

fn indexing_error(bridge: &Bridge, key: &Dynamic, error: &NativeError) -> ScriptError {
    match error.root_cause() {
        NativeError::KeyNotFound { .. } => bridge.raise(format!("key '{}' not found", key_text(key))),
        cause => bridge.raise(format!("exception indexing '{}' {cause}", key_text(key))),
    }
}

/// Call the first `get_Item` or `TryGetValue` on `level` that accepts `key`.
/// A `TryGetValue` reporting no value is a miss; a failing indexer raises.
fn try_indexers(bridge: &mut Bridge, level: TypeHash, target: &Dynamic, key: &Dynamic) -> ScriptResult<Option<Dynamic>> {
    let registry = bridge.registry.clone();
    let Some(entry) = registry.get(level) else {
        return Ok(None);
    };
    for method in entry.methods_named("get_Item") {
        if method.is_static() || method.params.len() != 1 || !value_fits(&registry, key, &method.params[0].data_type) {
            continue;
        }
        let mut args = [key.clone()];
        let result = bridge.invoke_entry(method, Some(target), &mut args, false);
        return result.map(Some).map_err(|e| indexing_error(bridge, key, &e));
    }
    for method in entry.methods_named("TryGetValue") {
        if method.is_static() || method.params.len() != 2 || !value_fits(&registry, key, &method.params[0].data_type) {
            continue;
        }
        let mut args = [key.clone(), Dynamic::Null];
        return match bridge.invoke_entry(method, Some(target), &mut args, false) {
            Ok(Dynamic::Bool(true)) => Ok(Some(std::mem::take(&mut args[1]))),
            Ok(_) => Ok(None),
            Err(e) => Err(indexing_error(bridge, key, &e)),
        };
    }
    Ok(None)
}

/// Resolve `name` on an instance and push its value.
fn lookup_instance(bridge: &mut Bridge, target: &Dynamic, name: &str) -> ScriptResult<bool> {
    let ty = runtime_type(target);
    if let Some(member) = bridge.members.get(ty, Scope::Instance, name) {
        push_member(bridge, Some(target), member)?;
        return Ok(true);
    }
    let key = Dynamic::String(name.to_string());
    for level in bridge.registry.base_chain(ty) {
        let member = match member_at(bridge, ty, level, name, Scope::Instance) {
            Some(member) => Some(member),
            None => {
                let indexed = try_indexers(bridge, level, target, &key);
                if let Ok(Some(value)) = &indexed {
                    bridge.push(value)?;
                    return Ok(true);
                }
                let member = extension_member(bridge, level, name).or_else(|| explicit_member(bridge, ty, level, name));
                match (member, indexed) {
                    (None, Err(err)) => return Err(err),
                    (member, _) => member,
                }
            }
        };
        if let Some(member) = member {
            trace!(type_name = bridge.registry.type_name(ty), member = name, "member resolved");
            bridge.members.insert(ty, Scope::Instance, name, member.clone());
            push_member(bridge, Some(target), member)?;
            return Ok(true);
        }
    }
    Ok(false)
}

/// Resolve `name` among the static members of `ty` and push its value.
fn lookup_static(bridge: &mut Bridge, ty: TypeHash, name: &str) -> ScriptResult<bool> {
    if let Some(value) = bridge
        .registry
        .get(ty)
        .filter(|entry| entry.is_enum())
        .and_then(|entry| entry.enum_value(name))
    {
        bridge.push(&Dynamic::Enum(EnumValue::new(ty, value)))?;
        return Ok(true);
    }
    if let Some(member) = bridge.members.get(ty, Scope::Static, name) {
        push_member(bridge, None, member)?;
        return Ok(true);
    }
    for level in bridge.registry.base_chain(ty) {
        if let Some(member) = member_at(bridge, ty, level, name, Scope::Static) {
            bridge.members.insert(ty, Scope::Static, name, member.clone());
            push_member(bridge, None, member)?;
            return Ok(true);
        }
    }
    Ok(false)
}

/// Push `value, found`.
fn finish_lookup(bridge: &mut Bridge, found: bool) -> i32 {
    if !found {
        bridge.state.push_nil();
    }
    bridge.state.push_bool(found);
    2
}

fn array_index(bridge: &mut Bridge, index: i32) -> ScriptResult<usize> {
    bridge
        .state
        .to_integer(index)
        .and_then(|i| usize::try_from(i).ok())
        .ok_or_else(|| bridge.raise("array index must be a non-negative integer"))
}

/// `__index` of host instances.
#[cfg_attr(feature = "profiling", profiling::function)]
pub(crate) fn index(bridge: &mut Bridge) -> ScriptResult<i32> {
    let Some(target) = bridge.host_value(1) else {
        return Err(bridge.raise("trying to index an invalid object reference"));
    };
    let found = match bridge.state.type_of(2) {
        ScriptType::String => {
            let name = bridge.state.to_string(2).unwrap_or_default();
            lookup_instance(bridge, &target, &name)?
        }
        ScriptType::Number if matches!(target, Dynamic::Array(_)) => {
            let i = array_index(bridge, 2)?;
            let Some(value) = target.as_array().and_then(|a| a.get(i)) else {
                return Err(bridge.raise(format!("array index out of bounds: {i}")));
            };
            bridge.push(&value)?;
            true
        }
        _ => {
            let key = bridge.to_dynamic(2)?;
            let mut value = None;
            for level in bridge.registry.base_chain(runtime_type(&target)) {
                value = try_indexers(bridge, level, &target, &key)?;
                if value.is_some() {
                    break;
                }
            }
            match value {
                Some(value) => {
                    bridge.push(&value)?;
                    true
                }
                None => false,
            }
        }
    };
    Ok(finish_lookup(bridge, found))
}

/// Assign the value at stack index 3 to property `name`.
fn set_member(bridge: &mut Bridge, ty: TypeHash, this: Option<&Dynamic>, name: &str) -> ScriptResult<bool> {
    let registry = bridge.registry.clone();
    for level in registry.base_chain(ty) {
        let Some(entry) = registry.get(level) else {
            continue;
        };
        let property = match this {
            Some(_) => entry.find_property(name, false).or_else(|| entry.find_property(name, true)),
            None => entry.find_property(name, true),
        };
        let Some(property) = property else {
            continue;
        };
        let Some(setter) = &property.setter else {
            return Err(bridge.raise(format!("property '{name}' is read-only")));
        };
        let Some(extractor) = checks::classify(bridge, 3, &property.data_type) else {
            let actual = bridge.state.type_of(3).name();
            return Err(bridge.raise(format!("invalid value ({actual}) for property '{name}'")));
        };
        let value = extractor.extract(bridge, 3)?;
        let receiver = if property.is_static { None } else { this };
        let mut args = [value];
        let mut ret = Dynamic::Null;
        let result = setter.call(&mut CallContext::new(receiver, &mut args, &mut ret, bridge));
        result.map_err(|err| bridge.raise_native(&err))?;
        return Ok(true);
    }
    Ok(false)
}

/// Call the first `set_Item` that accepts `key` and the value at stack index 3.
fn set_indexer(bridge: &mut Bridge, target: &Dynamic, key: &Dynamic) -> ScriptResult<bool> {
    let registry = bridge.registry.clone();
    for method in registry.methods_recursive(runtime_type(target), "set_Item") {
        if method.is_static() || method.params.len() != 2 || !value_fits(&registry, key, &method.params[0].data_type) {
            continue;
        }
        let Some(extractor) = checks::classify(bridge, 3, &method.params[1].data_type) else {
            continue;
        };
        let mut args = [key.clone(), extractor.extract(bridge, 3)?];
        let result = bridge.invoke_entry(&method, Some(target), &mut args, false);
        result.map_err(|err| bridge.raise_native(&err))?;
        return Ok(true);
    }
    Ok(false)
}

fn set_array_element(bridge: &mut Bridge, array: &HostArray) -> ScriptResult<()> {
    let i = array_index(bridge, 2)?;
    let element = DataType::simple(array.element_type());
    let Some(extractor) = checks::classify(bridge, 3, &element) else {
        let actual = bridge.state.type_of(3).name();
        return Err(bridge.raise(format!("invalid value ({actual}) for array element")));
    };
    let value = extractor.extract(bridge, 3)?;
    if !array.set(i, value) {
        return Err(bridge.raise(format!("array index out of bounds: {i}")));
    }
    Ok(())
}

/// `__newindex` of host instances.
pub(crate) fn new_index(bridge: &mut Bridge) -> ScriptResult<i32> {
    let Some(target) = bridge.host_value(1) else {
        return Err(bridge.raise("trying to index an invalid object reference"));
    };
    let key = match bridge.state.type_of(2) {
        ScriptType::String => {
            let name = bridge.state.to_string(2).unwrap_or_default();
            if set_member(bridge, runtime_type(&target), Some(&target), &name)? {
                return Ok(0);
            }
            Dynamic::String(name)
        }
        ScriptType::Number if matches!(target, Dynamic::Array(_)) => {
            if let Dynamic::Array(array) = &target {
                set_array_element(bridge, array)?;
            }
            return Ok(0);
        }
        _ => bridge.to_dynamic(2)?,
    };
    if set_indexer(bridge, &target, &key)? {
        return Ok(0);
    }
    let shown = match &key {
        Dynamic::String(name) => name.clone(),
        other => format!("{other:?}"),
    };
    Err(bridge.raise(format!("field or property '{shown}' does not exist")))
}

fn type_reference(bridge: &Bridge) -> Option<TypeHash> {
    match bridge.host_value(1)? {
        Dynamic::Type(ty) => Some(ty),
        _ => None,
    }
}

/// `__index` of type references: static members, enum values, nested
/// types, and `Type[n]` array creation.
pub(crate) fn class_index(bridge: &mut Bridge) -> ScriptResult<i32> {
    let Some(ty) = type_reference(bridge) else {
        return Err(bridge.raise("trying to index an invalid type reference"));
    };
    let found = match bridge.state.type_of(2) {
        ScriptType::Number => {
            let len = array_index(bridge, 2)?;
            let array = HostArray::with_len(ty, len);
            let array = array.map_err(|e| bridge.raise_native(&e))?;
            bridge.push(&Dynamic::Array(array))?;
            true
        }
        ScriptType::String => {
            let name = bridge.state.to_string(2).unwrap_or_default();
            lookup_static(bridge, ty, &name)?
        }
        _ => false,
    };
    Ok(finish_lookup(bridge, found))
}

/// `__newindex` of type references: static properties.
pub(crate) fn class_new_index(bridge: &mut Bridge) -> ScriptResult<i32> {
    let Some(ty) = type_reference(bridge) else {
        return Err(bridge.raise("trying to index an invalid type reference"));
    };
    let name = bridge.state.to_string(2).unwrap_or_default();
    if set_member(bridge, ty, None, &name)? {
        return Ok(0);
    }
    Err(bridge.raise(format!("field or property '{name}' does not exist")))
}

/// `__call` of type references: the first constructor accepting the arguments.
pub(crate) fn call_constructor(bridge: &mut Bridge) -> ScriptResult<i32> {
    let Some(ty) = type_reference(bridge) else {
        return Err(bridge.raise("trying to call an invalid type reference"));
    };
    let registry = bridge.registry.clone();
    let Some(entry) = registry.get(ty) else {
        return Err(bridge.raise(format!("unknown type {ty}")));
    };
    if let Some(plan) = resolver::resolve(bridge, &entry.constructors, 2) {
        let constructor = &entry.constructors[plan.candidate];
        let mut args = resolver::build_args(bridge, &plan)?;
        let result = bridge.invoke_entry(constructor, None, &mut args, false);
        let instance = result.map_err(|err| bridge.raise_native(&err))?;
        return push_results(bridge, &plan, instance, &args);
    }
    if bridge.state.get_top() == 1 && entry.kind == TypeKind::Primitive {
        let value = if ty == primitives::STRING {
            Dynamic::String(String::new())
        } else {
            Dynamic::default_of(ty)
        };
        bridge.push(&value)?;
        return Ok(1);
    }
    Err(bridge.raise(format!("{} does not contain constructor argument match", entry.name)))
}

/// `__call` of delegates.
pub(crate) fn call_delegate(bridge: &mut Bridge) -> ScriptResult<i32> {
    let Some(Dynamic::Delegate(delegate)) = bridge.host_value(1) else {
        return Err(bridge.raise("trying to call an invalid delegate"));
    };
    let Some(invoke) = bridge
        .registry
        .get(delegate.delegate_type())
        .and_then(|entry| entry.invoke.clone())
    else {
        return Err(bridge.raise("delegate type has no signature"));
    };
    let candidates = [invoke];
    let Some(plan) = resolver::resolve(bridge, &candidates, 2) else {
        return Err(bridge.raise("Invalid arguments to delegate call"));
    };
    let mut args = resolver::build_args(bridge, &plan)?;
    let result = bridge.invoke_delegate(&delegate, &mut args);
    let ret = result.map_err(|err| bridge.raise_native(&err))?;
    push_results(bridge, &plan, ret, &args)
}

/// Operator metamethods: the first matching `op_*` overload on the left
/// operand's type, then on the right's.
pub(crate) fn match_operator(bridge: &mut Bridge, op: Operator) -> ScriptResult<i32> {
    if op.is_unary() {
        bridge.state.set_top(1);
    }
    let registry = bridge.registry.clone();
    let mut types: Vec<TypeHash> = Vec::with_capacity(2);
    for i in 1..=bridge.state.get_top() {
        if let Some(value) = host_value_at(bridge, i) {
            let ty = runtime_type(&value);
            if !types.contains(&ty) {
                types.push(ty);
            }
        }
    }
    for &ty in &types {
        let candidates: Vec<MethodEntry> = registry
            .methods_recursive(ty, op.method_name())
            .into_iter()
            .filter(MethodEntry::is_static)
            .collect();
        let Some(plan) = resolver::resolve(bridge, &candidates, 1) else {
            continue;
        };
        let mut args = resolver::build_args(bridge, &plan)?;
        let result = bridge.invoke_entry(&candidates[plan.candidate], None, &mut args, false);
        let ret = result.map_err(|err| bridge.raise_native(&err))?;
        bridge.push(&ret)?;
        return Ok(1);
    }
    let names: Vec<&str> = types.iter().map(|&t| registry.type_name(t)).collect();
    Err(bridge.raise(format!(
        "operator {} is not defined for {}",
        op.method_name(),
        names.join(", ")
    )))
}

/// `__tostring`: the `ToString` method when declared, else the type name.
pub(crate) fn to_string(bridge: &mut Bridge) -> ScriptResult<i32> {
    let Some(target) = bridge.host_value(1) else {
        bridge.state.push_string("<invalid reference>");
        return Ok(1);
    };
    let registry = bridge.registry.clone();
    let text = match &target {
        Dynamic::Type(ty) => registry.type_name(*ty).to_string(),
        Dynamic::Enum(e) => registry
            .get(e.type_hash)
            .and_then(|entry| entry.enum_name(e.value))
            .map_or_else(|| e.value.to_string(), str::to_string),
        other => {
            let ty = runtime_type(other);
            let to_string = registry
                .methods_recursive(ty, "ToString")
                .into_iter()
                .find(|m| !m.is_static() && m.params.is_empty());
            match to_string {
                Some(method) => {
                    let result = bridge.invoke_entry(&method, Some(other), &mut [], false);
                    match result.map_err(|err| bridge.raise_native(&err))? {
                        Dynamic::String(s) => s,
                        value => format!("{value:?}"),
                    }
                }
                None => registry.type_name(ty).to_string(),
            }
        }
    };
    bridge.state.push_string(&text);
    Ok(1)
}

/// `__gc`: release the registry entry of a collected alias.
pub(crate) fn gc(bridge: &mut Bridge) -> ScriptResult<i32> {
    if let Some(id) = bridge.state.userdata_id(1) {
        bridge.collect_object(id);
    }
    Ok(0)
}

/// `__index` of `base` aliases: base implementations of virtual members,
/// bypassing script overrides; other members resolve as usual.
pub(crate) fn base_index(bridge: &mut Bridge) -> ScriptResult<i32> {
    let Some(target) = bridge.host_value(1) else {
        return Err(bridge.raise("trying to index an invalid base reference"));
    };
    let Some(name) = bridge.state.to_string(2) else {
        bridge.state.push_nil();
        bridge.state.push_string("base members are accessed by name");
        return Ok(2);
    };
    let ty = runtime_type(&target);
    if let Some(function) = base_method(bridge, &target, ty, &name) {
        bridge.state.push_function(None, function);
        return Ok(1);
    }
    if lookup_instance(bridge, &target, &name)? {
        return Ok(1);
    }
    bridge.state.push_nil();
    bridge.state.push_string(&format!(
        "member '{name}' not found in base of {}",
        bridge.registry.type_name(ty)
    ));
    Ok(2)
}

fn base_method(bridge: &mut Bridge, target: &Dynamic, ty: TypeHash, name: &str) -> Option<StackFunction> {
    if let Some(CachedMember::Method(function)) = bridge.members.get(ty, Scope::Base, name) {
        return Some(function);
    }
    let has_base = target
        .as_object()
        .and_then(|obj| obj.binding())
        .is_some_and(|binding| binding.vtable().slots.iter().any(|s| s.name == name && s.base.is_some()));
    if !has_base {
        return None;
    }
    let function = method_group(bridge, ty, name, false)?.non_virtual().into_function();
    bridge
        .members
        .insert(ty, Scope::Base, name, CachedMember::Method(function.clone()));
    Some(function)
}
