//! The built-in `core` assembly.

use hostbridge_core::{
    CallContext, Delegate, Dynamic, EventRegistration, MethodEntry, NativeError, NativeFn, ParamDef,
    PropertyEntry, TypeEntry, TypeHash, primitives,
};

/// Name of the assembly every interpreter starts with.
pub const CORE_ASSEMBLY: &str = "core";

/// Payload of runtime type objects, the host-side view of a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub type_hash: TypeHash,
    /// Qualified name.
    pub name: String,
}

impl TypeInfo {
    pub fn new(type_hash: TypeHash, name: impl Into<String>) -> Self {
        Self {
            type_hash,
            name: name.into(),
        }
    }

    pub fn simple_name(&self) -> &str {
        self.name.rsplit(['.', '+']).next().unwrap_or(&self.name)
    }
}

const PRIMITIVE_NAMES: &[&str] = &[
    "void", "bool", "int8", "int16", "int", "int64", "uint8", "uint16", "uint", "uint64", "char",
    "float", "double", "decimal", "string",
];

/// Built-in types: the root object, primitives, runtime type objects,
/// arrays, the delegate and enum roots, script value types and the event
/// registration helper.
pub fn core_assembly() -> crate::Assembly {
    let mut assembly = crate::Assembly::new(CORE_ASSEMBLY).with_type(TypeEntry::class("object"));
    for name in PRIMITIVE_NAMES {
        assembly = assembly.with_type(TypeEntry::primitive(*name));
    }
    assembly
        .with_type(type_object())
        .with_type(array_type())
        .with_type(TypeEntry::class("delegate"))
        .with_type(TypeEntry::class("enum"))
        .with_type(TypeEntry::class("script.table"))
        .with_type(TypeEntry::class("script.function"))
        .with_type(TypeEntry::class("script.userdata"))
        .with_type(event_registration())
}

fn type_info_getter(f: fn(&TypeInfo) -> String) -> NativeFn {
    NativeFn::new(move |ctx: &mut CallContext<'_>| {
        let value = ctx.with_this(|info: &TypeInfo| f(info))?;
        ctx.set_return(value);
        Ok(())
    })
}

fn type_object() -> TypeEntry {
    TypeEntry::class("type")
        .with_property(
            PropertyEntry::property("Name", primitives::STRING)
                .getter(type_info_getter(|info| info.simple_name().to_string())),
        )
        .with_property(
            PropertyEntry::property("FullName", primitives::STRING)
                .getter(type_info_getter(|info| info.name.clone())),
        )
}

fn array_type() -> TypeEntry {
    TypeEntry::class("array").with_property(PropertyEntry::property("Length", primitives::INT32).getter(
        NativeFn::new(|ctx: &mut CallContext<'_>| {
            let len = match ctx.this_value()? {
                Dynamic::Array(array) => array.len(),
                other => {
                    return Err(NativeError::invalid_this(format!(
                        "expected array, got {}",
                        other.type_name()
                    )));
                }
            };
            ctx.set_return(len);
            Ok(())
        }),
    ))
}

fn event_registration() -> TypeEntry {
    let add = MethodEntry::new("Add")
        .param(ParamDef::new("handler", primitives::OBJECT))
        .returns(primitives::DELEGATE)
        .native(NativeFn::new(|ctx: &mut CallContext<'_>| {
            let registration = ctx.this_ref::<EventRegistration>()?.clone();
            let handler = ctx.arg_slot(0)?.clone();
            let delegate = ctx.host().attach_event(&registration, &handler)?;
            ctx.set_return(delegate);
            Ok(())
        }));
    let remove = MethodEntry::new("Remove")
        .param(ParamDef::new("handler", primitives::DELEGATE))
        .native(NativeFn::new(|ctx: &mut CallContext<'_>| {
            let registration = ctx.this_ref::<EventRegistration>()?.clone();
            let handler: Delegate = ctx.arg(0)?;
            ctx.host().detach_event(&registration, &handler)
        }));
    TypeEntry::class("hostbridge.EventRegistration")
        .with_method(add)
        .with_method(remove)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostbridge_core::{DetachedHost, HostArray, HostObject};

    #[test]
    fn primitive_names_match_constants() {
        let assembly = core_assembly();
        let hashes: Vec<TypeHash> = assembly.types().iter().map(|t| t.type_hash).collect();
        for expected in [
            primitives::OBJECT,
            primitives::INT32,
            primitives::FLOAT64,
            primitives::STRING,
            primitives::TYPE,
            primitives::ARRAY,
            primitives::DELEGATE,
            primitives::ENUM,
            primitives::SCRIPT_TABLE,
            primitives::EVENT_REGISTRATION,
        ] {
            assert!(hashes.contains(&expected), "missing {expected:?}");
        }
    }

    #[test]
    fn type_object_names() {
        let entry = type_object();
        let this = Dynamic::Object(HostObject::new(
            primitives::TYPE,
            TypeInfo::new(TypeHash::from_name("Demo.Calculator+Mode"), "Demo.Calculator+Mode"),
        ));
        let getter = entry.find_property("Name", false).unwrap().getter.clone().unwrap();
        let mut ret = Dynamic::Null;
        getter
            .call(&mut CallContext::new(Some(&this), &mut [], &mut ret, &mut DetachedHost))
            .unwrap();
        assert_eq!(ret, Dynamic::String("Mode".into()));
    }

    #[test]
    fn array_length() {
        let entry = array_type();
        let this = Dynamic::Array(HostArray::with_len(primitives::INT32, 4).unwrap());
        let getter = entry.find_property("Length", false).unwrap().getter.clone().unwrap();
        let mut ret = Dynamic::Null;
        getter
            .call(&mut CallContext::new(Some(&this), &mut [], &mut ret, &mut DetachedHost))
            .unwrap();
        assert_eq!(ret, Dynamic::Int(4));
    }
}
