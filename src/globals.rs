//! Global functions every interpreter starts with.

use std::rc::Rc;

use hostbridge_core::{DataType, Dynamic, EnumValue, HostObject, MethodEntry, ScriptRefKind, TypeHash, primitives};
use hostbridge_registry::TypeInfo;
use tracing::debug;

use crate::bridge::MetatableKind;
use crate::method::{MethodWrapper, Receiver};
use crate::state::{ScriptState, ScriptType};
use crate::{Bridge, ScriptResult, adapter};

type GlobalFn = fn(&mut Bridge) -> ScriptResult<i32>;

const GLOBALS: &[(&str, GlobalFn)] = &[
    ("import_type", import_type),
    ("load_assembly", load_assembly),
    ("make_object", make_object),
    ("free_object", free_object),
    ("get_method_by_signature", get_method_by_signature),
    ("get_constructor_by_signature", get_constructor_by_signature),
    ("ctype", ctype),
    ("enum", enum_value),
];

pub(crate) fn install(bridge: &mut Bridge) {
    bridge.state.push_globals();
    for &(name, f) in GLOBALS {
        bridge.state.push_string(name);
        bridge.state.push_function(Some(name), Rc::new(f));
        bridge.state.raw_set(-3);
    }
    bridge.state.set_top(-2);
}

/// Resolve a type name against the loaded assemblies. `T[]` names an array of `T`.
fn find_data_type(bridge: &Bridge, name: &str) -> Option<DataType> {
    let (element, is_array) = match name.strip_suffix("[]") {
        Some(element) => (element, true),
        None => (name, false),
    };
    let entry = bridge.registry.find_type_in(bridge.loaded_names(), element)?;
    Some(if is_array {
        DataType::array_of(entry.type_hash)
    } else {
        DataType::simple(entry.type_hash)
    })
}

fn type_at(bridge: &Bridge, index: i32) -> Option<TypeHash> {
    match bridge.host_value(index)? {
        Dynamic::Type(ty) => Some(ty),
        _ => None,
    }
}

/// Parameter types named by the string arguments from `first` on.
fn signature(bridge: &Bridge, first: i32, caller: &str) -> ScriptResult<Vec<DataType>> {
    let mut params = Vec::new();
    for index in first..=bridge.state.get_top() {
        let Some(name) = bridge.state.to_string(index) else {
            return Err(bridge.raise(format!("{caller}: argument {index} is not a type name")));
        };
        match find_data_type(bridge, &name) {
            Some(data_type) => params.push(data_type),
            None => return Err(bridge.raise(format!("{caller}: unknown type '{name}'"))),
        }
    }
    Ok(params)
}

/// `nil, message`
fn push_failure(bridge: &mut Bridge, message: &str) -> i32 {
    bridge.state.push_nil();
    bridge.state.push_string(message);
    2
}

/// `import_type(name)`: the type reference, or nil.
fn import_type(bridge: &mut Bridge) -> ScriptResult<i32> {
    let Some(name) = bridge.state.to_string(1) else {
        return Err(bridge.raise("import_type: type name expected"));
    };
    match bridge.registry.find_type_in(bridge.loaded_names(), &name).map(|t| t.type_hash) {
        Some(ty) => bridge.push(&Dynamic::Type(ty))?,
        None => bridge.state.push_nil(),
    }
    Ok(1)
}

/// `load_assembly(name)`
fn load_assembly(bridge: &mut Bridge) -> ScriptResult<i32> {
    let Some(name) = bridge.state.to_string(1) else {
        return Err(bridge.raise("load_assembly: assembly name expected"));
    };
    bridge.load_assembly(&name)?;
    Ok(0)
}

/// `make_object(table, superclass)`: bind `table` to a new adapter instance
/// of `superclass`. Script functions in the table override its virtual
/// members; other members resolve through the instance, and `table.base`
/// reaches the base implementations.
fn make_object(bridge: &mut Bridge) -> ScriptResult<i32> {
    if bridge.state.type_of(1) != ScriptType::Table {
        return Err(bridge.raise("make_object: first arg is not a table"));
    }
    let Some(name) = bridge.state.to_string(2).filter(|n| !n.is_empty()) else {
        return Err(bridge.raise("make_object: superclass name can not be null"));
    };
    bridge.state.set_top(2);
    let registry = bridge.registry.clone();
    let Some(entry) = registry.find_type_in(bridge.loaded_names(), &name) else {
        bridge.state.push_nil();
        return Ok(1);
    };
    let table = bridge.make_ref(1, ScriptRefKind::Table);
    let instance = if entry.is_interface() {
        adapter::interface_instance(&registry, entry.type_hash, table)?
    } else {
        adapter::subclass_instance(bridge, &registry, entry.type_hash, table)?
    };
    let value = Dynamic::Object(instance);

    bridge.state.new_table();
    bridge.push_alias(&value, MetatableKind::Instance)?;
    for event in ["__index", "__newindex"] {
        bridge.state.push_string(event);
        bridge.state.push_value(4);
        bridge.state.raw_set(3);
    }
    bridge.state.set_top(3);
    bridge.state.set_metatable(1);

    bridge.state.push_string("base");
    bridge.push_alias(&value, MetatableKind::SearchBase)?;
    bridge.state.raw_set(1);
    debug!(superclass = %name, "bound script table to adapter instance");

    bridge.state.push_value(1);
    Ok(1)
}

/// `free_object(table)`: unbind a table bound by `make_object`.
fn free_object(bridge: &mut Bridge) -> ScriptResult<i32> {
    let bound = match crate::checks::host_value_at(bridge, 1) {
        Some(Dynamic::Object(obj)) if bridge.state.type_of(1) == ScriptType::Table => obj.binding().cloned(),
        _ => None,
    };
    let Some(binding) = bound else {
        return Err(bridge.raise("free_object: arg is not valid table"));
    };
    binding.clear_table();
    bridge.state.push_nil();
    bridge.state.set_metatable(1);
    bridge.state.push_string("base");
    bridge.state.push_nil();
    bridge.state.raw_set(1);
    Ok(0)
}

/// `get_method_by_signature(target, name, types...)`: the overload of `name`
/// with exactly the given parameter types, or nil.
///
/// With a type reference, instance methods take the receiver as their first
/// argument. With an object, the method is bound to it.
fn get_method_by_signature(bridge: &mut Bridge) -> ScriptResult<i32> {
    const CALLER: &str = "get_method_by_signature";
    let (owner, target) = match crate::checks::host_value_at(bridge, 1) {
        Some(Dynamic::Type(ty)) => (ty, None),
        Some(value) => (value.runtime_type(), Some(value)),
        None => return Err(bridge.raise(format!("{CALLER}: first arg is not type or object reference"))),
    };
    let Some(name) = bridge.state.to_string(2) else {
        return Err(bridge.raise(format!("{CALLER}: method name expected")));
    };
    let params = signature(bridge, 3, CALLER)?;
    let Some(method) = bridge.registry.find_method_by_signature(owner, &name, &params) else {
        bridge.state.push_nil();
        return Ok(1);
    };
    let receiver = match target {
        _ if method.is_static() => Receiver::None,
        Some(value) => Receiver::Bound(value),
        None => Receiver::Stack,
    };
    push_wrapper(bridge, owner, &name, method, receiver);
    Ok(1)
}

/// `get_constructor_by_signature(type, types...)`
fn get_constructor_by_signature(bridge: &mut Bridge) -> ScriptResult<i32> {
    const CALLER: &str = "get_constructor_by_signature";
    let Some(ty) = type_at(bridge, 1) else {
        return Err(bridge.raise(format!("{CALLER}: first arg is invalid type reference")));
    };
    let params = signature(bridge, 2, CALLER)?;
    let constructor = bridge
        .registry
        .get(ty)
        .and_then(|entry| entry.constructors.iter().find(|c| c.has_signature(&params)))
        .cloned();
    match constructor {
        Some(constructor) => {
            let name = constructor.name.clone();
            push_wrapper(bridge, ty, &name, constructor, Receiver::None);
        }
        None => bridge.state.push_nil(),
    }
    Ok(1)
}

fn push_wrapper(bridge: &mut Bridge, owner: TypeHash, name: &str, method: MethodEntry, receiver: Receiver) {
    let type_name = bridge.registry.type_name(owner).to_string();
    let wrapper = MethodWrapper::new(type_name, name, vec![method], receiver);
    bridge.state.push_function(Some(name), wrapper.into_function());
}

/// `ctype(typeRef)`: the runtime type object of a type reference.
fn ctype(bridge: &mut Bridge) -> ScriptResult<i32> {
    let Some(ty) = type_at(bridge, 1) else {
        return Ok(push_failure(bridge, "Not a host type"));
    };
    let info = TypeInfo::new(ty, bridge.registry.type_name(ty));
    bridge.push(&Dynamic::Object(HostObject::new(primitives::TYPE, info)))?;
    Ok(1)
}

/// `enum(type, value)`: an enum value from an integer, or from member names
/// (case-insensitive, comma-separated names are or-ed together).
fn enum_value(bridge: &mut Bridge) -> ScriptResult<i32> {
    let registry = bridge.registry.clone();
    let Some(entry) = type_at(bridge, 1).and_then(|ty| registry.get(ty)).filter(|e| e.is_enum()) else {
        return Ok(push_failure(bridge, "Not an enum"));
    };
    let value = match bridge.state.type_of(2) {
        ScriptType::Number => bridge.state.to_number(2).map(|n| n as i64).unwrap_or_default(),
        ScriptType::String => {
            let text = bridge.state.to_string(2).unwrap_or_default();
            match parse_enum(&entry.enum_members, &text) {
                Ok(value) => value,
                Err(message) => return Ok(push_failure(bridge, &message)),
            }
        }
        _ => return Ok(push_failure(bridge, "Second argument must be an integer or a string")),
    };
    bridge.push(&Dynamic::Enum(EnumValue::new(entry.type_hash, value)))?;
    Ok(1)
}

fn parse_enum(members: &[(String, i64)], text: &str) -> Result<i64, String> {
    if let Ok(value) = text.trim().parse::<i64>() {
        return Ok(value);
    }
    let mut value = 0;
    for part in text.split(',') {
        let part = part.trim();
        let Some((_, v)) = members.iter().find(|(name, _)| name.eq_ignore_ascii_case(part)) else {
            return Err(format!("Requested value '{part}' was not found"));
        };
        value |= v;
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members() -> Vec<(String, i64)> {
        vec![("Read".into(), 1), ("Write".into(), 2), ("Exec".into(), 4)]
    }

    #[test]
    fn enum_names_combine() {
        assert_eq!(parse_enum(&members(), "read, EXEC"), Ok(5));
        assert_eq!(parse_enum(&members(), "2"), Ok(2));
        assert_eq!(
            parse_enum(&members(), "Read,Delete"),
            Err("Requested value 'Delete' was not found".to_string())
        );
    }
}
