//! Generated adapters: host-side types whose behaviour lives in script
//! tables and functions.
//!
//! An adapter type is data, not code: a [`VTable`] listing the virtual
//! members a script table may override (with the base implementation to
//! fall back to), or a [`CallableShape`] describing how to call a script
//! function as a delegate. Both are generated once per registry and key and
//! cached for the lifetime of the process, shared by every interpreter over
//! that registry.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, LazyLock};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use hostbridge_core::{
    CallContext, CallableShape, DataType, Delegate, Dynamic, HostObject, NativeError, ParamMode, ScriptBinding,
    ScriptHost, ScriptRef, TypeHash, TypeKind, VTable, VirtualSlot,
};
use hostbridge_registry::TypeRegistry;

use crate::{AdapterError, ScriptResult};

/// What an adapter is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterKey {
    /// Interface implementation or subclass of a host type.
    Class(TypeHash),
    /// Script function called through a delegate type.
    Callable(TypeHash),
    /// Script function attached as an event handler of a delegate type.
    Event(TypeHash),
}

#[derive(Debug, Clone)]
enum Generated {
    Class(Arc<VTable>),
    Callable(Arc<CallableShape>),
}

/// Process-wide cache of generated adapter types.
///
/// Lookups take a read lock only. Generation is serialized under a single
/// mutex and re-checks the cache, so concurrent first requests for one key
/// observe the same adapter.
#[derive(Debug, Default)]
pub struct AdapterCache {
    generated: RwLock<FxHashMap<(u64, AdapterKey), Generated>>,
    generation: Mutex<()>,
    sequence: AtomicU32,
}

static ADAPTERS: LazyLock<AdapterCache> = LazyLock::new(AdapterCache::default);

/// The shared adapter cache.
pub fn adapter_cache() -> &'static AdapterCache {
    &ADAPTERS
}

impl AdapterCache {
    fn get_or_generate(
        &self,
        registry: &TypeRegistry,
        key: AdapterKey,
        generate: impl FnOnce(TypeHash) -> Result<Generated, AdapterError>,
    ) -> Result<Generated, AdapterError> {
        // Slots capture base implementations, so adapters never cross registries.
        let key = (registry.id(), key);
        if let Some(existing) = self.generated.read().get(&key) {
            trace!(?key, "adapter cache hit");
            return Ok(existing.clone());
        }
        let _guard = self.generation.lock();
        if let Some(existing) = self.generated.read().get(&key) {
            return Ok(existing.clone());
        }
        let type_hash = TypeHash::generated(self.sequence.fetch_add(1, Ordering::Relaxed));
        let adapter = generate(type_hash)?;
        debug!(?key, adapter = %type_hash, "generated adapter type");
        self.generated.write().insert(key, adapter.clone());
        Ok(adapter)
    }

    /// Adapter implementing interface `target`, or subclassing class `target`.
    pub fn class_adapter(&self, registry: &TypeRegistry, target: TypeHash) -> Result<Arc<VTable>, AdapterError> {
        match self.get_or_generate(registry, AdapterKey::Class(target), |hash| {
            generate_class(registry, target, hash).map(|v| Generated::Class(Arc::new(v)))
        })? {
            Generated::Class(vtable) => Ok(vtable),
            Generated::Callable(_) => Err(AdapterError::UnknownType(registry.type_name(target).to_string())),
        }
    }

    /// Adapter calling a script function through `delegate_type`.
    pub fn callable_adapter(&self, registry: &TypeRegistry, delegate_type: TypeHash) -> Result<Arc<CallableShape>, AdapterError> {
        self.callable(registry, AdapterKey::Callable(delegate_type), delegate_type)
    }

    /// Adapter for script functions attached to events of `handler_type`.
    pub fn event_adapter(&self, registry: &TypeRegistry, handler_type: TypeHash) -> Result<Arc<CallableShape>, AdapterError> {
        self.callable(registry, AdapterKey::Event(handler_type), handler_type)
    }

    fn callable(&self, registry: &TypeRegistry, key: AdapterKey, delegate_type: TypeHash) -> Result<Arc<CallableShape>, AdapterError> {
        match self.get_or_generate(registry, key, |hash| {
            generate_callable(registry, delegate_type, hash).map(|s| Generated::Callable(Arc::new(s)))
        })? {
            Generated::Callable(shape) => Ok(shape),
            Generated::Class(_) => Err(AdapterError::NotDelegate {
                type_name: registry.type_name(delegate_type).to_string(),
            }),
        }
    }

    pub fn contains(&self, registry: &TypeRegistry, key: AdapterKey) -> bool {
        self.generated.read().contains_key(&(registry.id(), key))
    }

    pub fn len(&self) -> usize {
        self.generated.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.generated.read().is_empty()
    }
}

fn generate_class(registry: &TypeRegistry, target: TypeHash, type_hash: TypeHash) -> Result<VTable, AdapterError> {
    let entry = registry
        .get(target)
        .ok_or_else(|| AdapterError::UnknownType(target.to_string()))?;
    if matches!(
        entry.kind,
        TypeKind::Value | TypeKind::Enum | TypeKind::Delegate | TypeKind::Primitive
    ) {
        return Err(AdapterError::NotExtensible {
            type_name: entry.name.clone(),
            reason: format!("{:?} types cannot be subclassed", entry.kind).to_lowercase(),
        });
    }
    let is_interface = entry.is_interface();
    if !is_interface && entry.default_constructor().is_none() {
        return Err(AdapterError::NoDefaultConstructor {
            type_name: entry.name.clone(),
        });
    }

    let sources = if is_interface {
        interface_closure(registry, target)
    } else {
        registry.base_chain(target)
    };
    let mut slots: Vec<VirtualSlot> = Vec::new();
    for source in sources {
        let Some(source_entry) = registry.get(source) else {
            continue;
        };
        for method in &source_entry.methods {
            let overridable = source_entry.is_interface() || method.is_virtual() || method.is_abstract();
            if !overridable || method.is_static() {
                continue;
            }
            // The most derived declaration of a signature wins.
            let shadowed = slots
                .iter()
                .any(|s| s.name == method.name && s.params.len() == method.params.len());
            if shadowed {
                continue;
            }
            slots.push(VirtualSlot {
                name: method.name.clone(),
                params: method.params.clone(),
                return_types: method.result_types(),
                base: if method.is_abstract() { None } else { method.native.clone() },
            });
        }
    }
    Ok(VTable {
        type_hash,
        target,
        is_interface,
        slots,
    })
}

/// `interface` followed by every interface it inherits.
fn interface_closure(registry: &TypeRegistry, interface: TypeHash) -> Vec<TypeHash> {
    let mut found = vec![interface];
    let mut i = 0;
    while i < found.len() {
        if let Some(entry) = registry.get(found[i]) {
            for inherited in &entry.interfaces {
                if !found.contains(inherited) {
                    found.push(*inherited);
                }
            }
        }
        i += 1;
    }
    found
}

fn generate_callable(registry: &TypeRegistry, delegate_type: TypeHash, type_hash: TypeHash) -> Result<CallableShape, AdapterError> {
    let invoke = registry
        .get(delegate_type)
        .filter(|entry| entry.is_delegate())
        .and_then(|entry| entry.invoke.as_ref())
        .ok_or_else(|| AdapterError::NotDelegate {
            type_name: registry.type_name(delegate_type).to_string(),
        })?;
    Ok(CallableShape {
        type_hash,
        delegate_type,
        params: invoke.params.clone(),
        return_types: invoke.result_types(),
    })
}

/// Instance of the interface adapter for `interface`, backed by `table`.
pub fn interface_instance(registry: &TypeRegistry, interface: TypeHash, table: ScriptRef) -> ScriptResult<HostObject> {
    let vtable = adapter_cache().class_adapter(registry, interface)?;
    let binding = Arc::new(ScriptBinding::new(vtable, table));
    Ok(HostObject::with_binding(interface, Box::new(()), binding))
}

/// Instance of the subclass adapter for `base`, backed by `table`. The base
/// part is built by the parameterless constructor.
pub fn subclass_instance(
    host: &mut dyn ScriptHost,
    registry: &TypeRegistry,
    base: TypeHash,
    table: ScriptRef,
) -> ScriptResult<HostObject> {
    let vtable = adapter_cache().class_adapter(registry, base)?;
    if vtable.is_interface {
        let binding = Arc::new(ScriptBinding::new(vtable, table));
        return Ok(HostObject::with_binding(base, Box::new(()), binding));
    }
    let type_name = registry.type_name(base).to_string();
    let construction = |source: NativeError| AdapterError::Construction {
        type_name: type_name.clone(),
        source,
    };
    let constructor = registry
        .get(base)
        .and_then(|entry| entry.default_constructor())
        .and_then(|ctor| ctor.native.clone())
        .ok_or_else(|| AdapterError::NoDefaultConstructor {
            type_name: type_name.clone(),
        })?;
    let mut ret = Dynamic::Null;
    constructor
        .call(&mut CallContext::new(None, &mut [], &mut ret, host))
        .map_err(construction)?;
    let Dynamic::Object(instance) = ret else {
        return Err(construction(NativeError::failed("constructor returned no object")).into());
    };
    let payload = instance
        .into_payload()
        .map_err(|_| construction(NativeError::failed("constructed instance is already shared")))?;
    let binding = Arc::new(ScriptBinding::new(vtable, table));
    Ok(HostObject::with_binding(base, payload, binding))
}

/// Delegate of type `delegate_type` calling the script `function`.
pub fn script_delegate(registry: &TypeRegistry, delegate_type: TypeHash, function: ScriptRef) -> ScriptResult<Delegate> {
    let shape = adapter_cache().callable_adapter(registry, delegate_type)?;
    Ok(Delegate::script(delegate_type, shape, function))
}

/// Delegate for attaching the script `function` to an event of `handler_type`.
pub fn event_handler(registry: &TypeRegistry, handler_type: TypeHash, function: ScriptRef) -> ScriptResult<Delegate> {
    let shape = adapter_cache().event_adapter(registry, handler_type)?;
    Ok(Delegate::script(handler_type, shape, function))
}

/// Virtual call on an adapter instance: the script override when the bound
/// table has one, else the base implementation.
pub fn dispatch_virtual(
    host: &mut dyn ScriptHost,
    this: &HostObject,
    binding: &ScriptBinding,
    name: &str,
    args: &mut [Dynamic],
) -> Result<Dynamic, NativeError> {
    let vtable = binding.vtable();
    let slot = vtable.slot(name, args.len()).ok_or_else(|| NativeError::NotImplemented {
        name: name.to_string(),
    })?;
    if let Some(table) = binding.table()
        && let Some(function) = host.table_function(&table, name)?
    {
        return call_script(
            host,
            &function,
            Some(Dynamic::Table(table)),
            &slot.params,
            &slot.return_types,
            args,
        );
    }
    match &slot.base {
        Some(base) => {
            let receiver = Dynamic::Object(this.clone());
            let mut ret = Dynamic::Null;
            base.call(&mut CallContext::new(Some(&receiver), args, &mut ret, host))?;
            Ok(ret)
        }
        None => Err(NativeError::NotImplemented {
            name: name.to_string(),
        }),
    }
}

/// Call a script function with the input arguments of a host signature and
/// map its results back: the first is the return value, the rest fill the
/// by-ref and out parameters in order. `return_types` must start with the
/// declared return type; for a void return the by-ref values are taken from
/// the first script result.
pub fn call_script(
    host: &mut dyn ScriptHost,
    function: &ScriptRef,
    receiver: Option<Dynamic>,
    params: &[hostbridge_core::ParamDef],
    return_types: &[DataType],
    args: &mut [Dynamic],
) -> Result<Dynamic, NativeError> {
    let mut inputs: Vec<Dynamic> = receiver.into_iter().collect();
    inputs.extend(
        params
            .iter()
            .zip(args.iter())
            .filter(|(p, _)| p.mode != ParamMode::Out)
            .map(|(_, a)| a.clone()),
    );
    let mut results = host.call_function(function, &inputs, return_types)?.into_iter();
    let ret = results.next().unwrap_or_default();
    for (param, arg) in params.iter().zip(args.iter_mut()) {
        if param.is_by_ref()
            && let Some(value) = results.next()
        {
            *arg = value;
        }
    }
    Ok(ret)
}
