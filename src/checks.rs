//! Argument checks: whether the value at a stack index can bind to a host
//! parameter type, and how to pull it off the stack once it does.

use hostbridge_core::{DataType, Dynamic, EnumValue, HostArray, ScriptRefKind, TypeHash, TypeKind, primitives};

use crate::state::{ScriptState, ScriptType};
use crate::{Bridge, ScriptResult, adapter};

/// How to extract one argument.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Extractor {
    /// Integral number, range-checked against the target type.
    Integer,
    /// One-character string passed for a `char`.
    Char,
    Float,
    Bool,
    /// String, or a number formatted as one.
    String,
    /// Any value, converted as-is.
    Any,
    /// Host value behind a userdata or a bound table.
    Host,
    /// Script function wrapped in a generated callable adapter.
    Delegate(TypeHash),
    /// Script table wrapped in a generated interface adapter.
    Interface(TypeHash),
    /// Number or member name of an enum type.
    Enum(TypeHash),
    /// Table converted element-wise into a new host array.
    TableArray(DataType),
}

/// Extractor for binding the value at `index` to `param`, or `None` when
/// the value does not fit.
pub(crate) fn classify(bridge: &mut Bridge, index: i32, param: &DataType) -> Option<Extractor> {
    let ty = param.type_hash;
    let value_type = bridge.state.type_of(index);
    if param.is_array {
        return match value_type {
            ScriptType::Nil => Some(Extractor::Any),
            ScriptType::Table if host_value_at(bridge, index).is_none() => {
                table_fits(bridge, index, DataType::simple(ty)).then_some(Extractor::TableArray(DataType::simple(ty)))
            }
            _ => match host_value_at(bridge, index)? {
                Dynamic::Array(array) if bridge.registry.is_assignable(array.element_type(), ty) => Some(Extractor::Host),
                _ => None,
            },
        };
    }
    if ty == primitives::OBJECT {
        return Some(if host_value_at(bridge, index).is_some() {
            Extractor::Host
        } else {
            Extractor::Any
        });
    }
    if primitives::is_integer(ty) {
        return match value_type {
            ScriptType::Number => bridge
                .state
                .to_integer(index)
                .filter(|v| integer_fits(ty, *v))
                .map(|_| Extractor::Integer),
            ScriptType::String if ty == primitives::CHAR => bridge
                .state
                .to_string(index)
                .filter(|s| s.chars().count() == 1)
                .map(|_| Extractor::Char),
            _ => None,
        };
    }
    if primitives::is_float(ty) {
        return (value_type == ScriptType::Number).then_some(Extractor::Float);
    }
    match ty {
        t if t == primitives::BOOL => return (value_type == ScriptType::Boolean).then_some(Extractor::Bool),
        t if t == primitives::STRING => {
            return matches!(value_type, ScriptType::String | ScriptType::Number | ScriptType::Nil)
                .then_some(Extractor::String);
        }
        t if t == primitives::SCRIPT_TABLE => {
            return matches!(value_type, ScriptType::Table | ScriptType::Nil).then_some(Extractor::Any);
        }
        t if t == primitives::SCRIPT_FUNCTION => {
            return matches!(value_type, ScriptType::Function | ScriptType::Nil).then_some(Extractor::Any);
        }
        t if t == primitives::SCRIPT_USERDATA => {
            let foreign = value_type == ScriptType::UserData && bridge.host_value(index).is_none();
            return (foreign || value_type == ScriptType::Nil).then_some(Extractor::Any);
        }
        _ => {}
    }

    let kind = bridge.registry.get(ty).map(|entry| entry.kind);
    if value_type == ScriptType::Nil {
        return (!matches!(kind, Some(TypeKind::Value | TypeKind::Enum))).then_some(Extractor::Any);
    }
    if let Some(host) = host_value_at(bridge, index) {
        let runtime = match &host {
            Dynamic::Type(_) => primitives::TYPE,
            other => other.runtime_type(),
        };
        return bridge.registry.is_assignable(runtime, ty).then_some(Extractor::Host);
    }
    match (kind, value_type) {
        (Some(TypeKind::Delegate), ScriptType::Function) => Some(Extractor::Delegate(ty)),
        (Some(TypeKind::Interface), ScriptType::Table) => Some(Extractor::Interface(ty)),
        (Some(TypeKind::Enum), ScriptType::Number) => bridge.state.to_integer(index).map(|_| Extractor::Enum(ty)),
        (Some(TypeKind::Enum), ScriptType::String) => {
            let name = bridge.state.to_string(index)?;
            let entry = bridge.registry.get(ty)?;
            entry.enum_value(&name).map(|_| Extractor::Enum(ty))
        }
        _ => None,
    }
}

/// Whether every element of the table at `index` binds to `element`.
fn table_fits(bridge: &mut Bridge, index: i32, element: DataType) -> bool {
    let index = bridge.abs_index(index);
    let len = bridge.state.raw_len(index) as i64;
    for n in 1..=len {
        bridge.state.raw_get_index(index, n);
        let fits = classify(bridge, -1, &element).is_some();
        bridge.state.set_top(-2);
        if !fits {
            return false;
        }
    }
    true
}

fn integer_fits(ty: TypeHash, v: i64) -> bool {
    match ty {
        t if t == primitives::INT8 => i8::try_from(v).is_ok(),
        t if t == primitives::INT16 => i16::try_from(v).is_ok(),
        t if t == primitives::INT32 => i32::try_from(v).is_ok(),
        t if t == primitives::UINT8 => u8::try_from(v).is_ok(),
        t if t == primitives::UINT16 => u16::try_from(v).is_ok(),
        t if t == primitives::UINT32 => u32::try_from(v).is_ok(),
        t if t == primitives::CHAR => u32::try_from(v).ok().and_then(char::from_u32).is_some(),
        _ => true,
    }
}

/// The host value at `index`: a registry userdata, or a script table bound
/// to an adapter instance by `make_object`.
pub(crate) fn host_value_at(bridge: &mut Bridge, index: i32) -> Option<Dynamic> {
    match bridge.state.type_of(index) {
        ScriptType::UserData => bridge.host_value(index),
        ScriptType::Table => {
            let index = bridge.abs_index(index);
            if !bridge.state.get_metatable(index) {
                return None;
            }
            bridge.state.push_string("__index");
            bridge.state.raw_get(-2);
            let value = bridge.host_value(-1);
            bridge.state.set_top(-3);
            value
        }
        _ => None,
    }
}

/// Convert the value at `index` to `data_type` where possible, for values
/// flowing back from script code. Nil becomes the type's default.
pub(crate) fn coerce(bridge: &mut Bridge, index: i32, data_type: &DataType) -> ScriptResult<Dynamic> {
    if data_type.is_void() {
        return Ok(Dynamic::Null);
    }
    match classify(bridge, index, data_type) {
        Some(extractor) => extractor.extract(bridge, index),
        None if bridge.state.type_of(index) == ScriptType::Nil => Ok(Dynamic::default_of(data_type.type_hash)),
        None => bridge.to_dynamic(index),
    }
}

impl Extractor {
    /// Pull the value at `index`.
    pub(crate) fn extract(&self, bridge: &mut Bridge, index: i32) -> ScriptResult<Dynamic> {
        Ok(match self {
            Extractor::Integer => Dynamic::Int(bridge.state.to_integer(index).unwrap_or_default()),
            Extractor::Char => {
                let code = bridge
                    .state
                    .to_string(index)
                    .and_then(|s| s.chars().next())
                    .map_or(0, |c| c as i64);
                Dynamic::Int(code)
            }
            Extractor::Float => Dynamic::Float(bridge.state.to_number(index).unwrap_or_default()),
            Extractor::Bool => Dynamic::Bool(bridge.state.to_bool(index)),
            Extractor::String => match bridge.state.to_string(index) {
                Some(s) => Dynamic::String(s),
                None => Dynamic::Null,
            },
            Extractor::Any => bridge.to_dynamic(index)?,
            Extractor::Host => host_value_at(bridge, index).unwrap_or_default(),
            Extractor::Delegate(ty) => {
                let function = bridge.make_ref(index, ScriptRefKind::Function);
                Dynamic::Delegate(adapter::script_delegate(&bridge.registry, *ty, function)?)
            }
            Extractor::Interface(ty) => {
                let table = bridge.make_ref(index, ScriptRefKind::Table);
                Dynamic::Object(adapter::interface_instance(&bridge.registry, *ty, table)?)
            }
            Extractor::Enum(ty) => {
                let value = match bridge.state.type_of(index) {
                    ScriptType::String => bridge
                        .state
                        .to_string(index)
                        .and_then(|name| bridge.registry.get(*ty)?.enum_value(&name)),
                    _ => bridge.state.to_integer(index),
                };
                Dynamic::Enum(EnumValue::new(*ty, value.unwrap_or_default()))
            }
            Extractor::TableArray(element) => {
                let index = bridge.abs_index(index);
                let len = bridge.state.raw_len(index) as i64;
                let mut items = Vec::with_capacity(len as usize);
                for n in 1..=len {
                    bridge.state.raw_get_index(index, n);
                    let item = match classify(bridge, -1, element) {
                        Some(extractor) => extractor.extract(bridge, -1),
                        None => Ok(Dynamic::default_of(element.type_hash)),
                    };
                    bridge.state.set_top(-2);
                    items.push(item?);
                }
                Dynamic::Array(HostArray::new(element.type_hash, items))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hostbridge_core::HostObject;
    use hostbridge_registry::TypeRegistry;

    use super::*;

    fn bridge() -> Bridge {
        Bridge::new(Arc::new(TypeRegistry::new()))
    }

    #[test]
    fn integral_floats_bind_to_int() {
        let mut b = bridge();
        b.state.push_number(3.0);
        b.state.push_number(3.5);
        b.state.push_integer(300);
        let int = DataType::simple(primitives::INT32);
        assert_eq!(classify(&mut b, 1, &int), Some(Extractor::Integer));
        assert_eq!(classify(&mut b, 2, &int), None);
        assert_eq!(classify(&mut b, 3, &DataType::simple(primitives::UINT8)), None);
        assert_eq!(Extractor::Integer.extract(&mut b, 1).unwrap(), Dynamic::Int(3));
    }

    #[test]
    fn nil_binds_to_references_only() {
        let mut b = bridge();
        b.state.push_nil();
        assert_eq!(classify(&mut b, 1, &DataType::simple(primitives::STRING)), Some(Extractor::String));
        assert_eq!(classify(&mut b, 1, &DataType::simple(primitives::INT32)), None);
        assert_eq!(classify(&mut b, 1, &DataType::simple(primitives::OBJECT)), Some(Extractor::Any));
    }

    #[test]
    fn table_converts_to_array() {
        let mut b = bridge();
        b.state.new_table();
        for (n, v) in [(1, 1), (2, 2), (3, 3)] {
            b.state.push_integer(v);
            b.state.raw_set_index(1, n);
        }
        let param = DataType::array_of(primitives::INT32);
        let extractor = classify(&mut b, 1, &param).unwrap();
        let value = extractor.extract(&mut b, 1).unwrap();
        let array = value.as_array().unwrap();
        assert_eq!(array.to_vec(), vec![Dynamic::Int(1), Dynamic::Int(2), Dynamic::Int(3)]);
        assert_eq!(b.state.get_top(), 1);
    }

    #[test]
    fn host_values_check_assignability() {
        let mut b = bridge();
        let obj = Dynamic::Object(HostObject::new(primitives::TYPE, ()));
        b.push(&obj).unwrap();
        assert_eq!(classify(&mut b, 1, &DataType::simple(primitives::TYPE)), Some(Extractor::Host));
        assert_eq!(classify(&mut b, 1, &DataType::simple(primitives::ARRAY)), None);
        assert_eq!(Extractor::Host.extract(&mut b, 1).unwrap(), obj);
    }
}
