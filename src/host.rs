//! Callbacks from host code into the interpreter.

use hostbridge_core::{
    CallContext, DataType, Delegate, DelegateTarget, Dynamic, EventRegistration, MethodEntry, NativeError, ScriptHost,
    ScriptRef, ScriptRefKind, TypeHash,
};
use tracing::trace;

use crate::state::{ScriptState, ScriptType};
use crate::{Bridge, ScriptError, adapter, checks};

fn script_failure(err: ScriptError) -> NativeError {
    NativeError::Script {
        message: err.to_string(),
    }
}

impl Bridge {
    /// Invoke a host method. Virtual members of adapter instances go to the
    /// script override unless `non_virtual` is set.
    pub(crate) fn invoke_entry(
        &mut self,
        method: &MethodEntry,
        this: Option<&Dynamic>,
        args: &mut [Dynamic],
        non_virtual: bool,
    ) -> Result<Dynamic, NativeError> {
        if !non_virtual
            && let Some(Dynamic::Object(obj)) = this
            && let Some(binding) = obj.binding()
            && (method.is_virtual() || method.is_abstract() || binding.vtable().is_interface)
        {
            let binding = binding.clone();
            return adapter::dispatch_virtual(self, obj, &binding, &method.name, args);
        }
        let Some(native) = &method.native else {
            return Err(NativeError::NotImplemented {
                name: method.name.clone(),
            });
        };
        let mut ret = Dynamic::Null;
        native.call(&mut CallContext::new(this, args, &mut ret, self))?;
        Ok(ret)
    }

    fn coerce_results(&mut self, old_top: i32, result_types: &[DataType]) -> Result<Vec<Dynamic>, ScriptError> {
        if result_types.is_empty() {
            return self.pop_values(old_top);
        }
        let count = self.state.get_top() - old_top;
        let mut values = Vec::with_capacity(result_types.len());
        // A void return occupies no script result; by-ref values start at the first one.
        let skip = usize::from(result_types[0].is_void());
        values.extend(std::iter::repeat_n(Dynamic::Null, skip));
        for (i, data_type) in result_types[skip..].iter().enumerate() {
            let index = old_top + 1 + i as i32;
            let value = if i as i32 >= count {
                Ok(if data_type.is_void() {
                    Dynamic::Null
                } else {
                    Dynamic::default_of(data_type.type_hash)
                })
            } else {
                checks::coerce(self, index, data_type)
            };
            match value {
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

impl ScriptHost for Bridge {
    fn call_function(
        &mut self,
        function: &ScriptRef,
        args: &[Dynamic],
        result_types: &[DataType],
    ) -> Result<Vec<Dynamic>, NativeError> {
        let old_top = self.state.get_top();
        self.push_ref(function).map_err(script_failure)?;
        if let Err(err) = self.push_values(args) {
            self.state.set_top(old_top);
            return Err(script_failure(err));
        }
        match self.pcall(args.len() as i32, None) {
            Ok(Ok(_)) => {}
            Ok(Err(err)) | Err(err) => return Err(script_failure(err)),
        }
        self.coerce_results(old_top, result_types).map_err(script_failure)
    }

    fn table_function(&mut self, table: &ScriptRef, name: &str) -> Result<Option<ScriptRef>, NativeError> {
        self.push_ref(table).map_err(script_failure)?;
        self.state.push_string(name);
        self.state.raw_get(-2);
        let function = (self.state.type_of(-1) == ScriptType::Function)
            .then(|| self.make_ref(-1, ScriptRefKind::Function));
        self.state.set_top(-3);
        Ok(function)
    }

    fn invoke_method(&mut self, target: &Dynamic, name: &str, args: &mut [Dynamic]) -> Result<Dynamic, NativeError> {
        let type_hash = target.runtime_type();
        let method = self
            .registry
            .methods_recursive(type_hash, name)
            .into_iter()
            .find(|m| !m.is_static() && m.params.len() == args.len())
            .ok_or_else(|| NativeError::KeyNotFound {
                key: format!("{}.{}", self.registry.type_name(type_hash), name),
            })?;
        self.invoke_entry(&method, Some(target), args, false)
    }

    fn invoke_delegate(&mut self, delegate: &Delegate, args: &mut [Dynamic]) -> Result<Dynamic, NativeError> {
        match delegate.target() {
            DelegateTarget::Native(native) => {
                let mut ret = Dynamic::Null;
                native.call(&mut CallContext::new(None, args, &mut ret, self))?;
                Ok(ret)
            }
            DelegateTarget::Script { shape, function } => {
                adapter::call_script(self, function, None, &shape.params, &shape.return_types, args)
            }
        }
    }

    fn make_delegate(&mut self, delegate_type: TypeHash, function: &ScriptRef) -> Result<Delegate, NativeError> {
        adapter::script_delegate(&self.registry, delegate_type, function.clone()).map_err(script_failure)
    }

    fn attach_event(&mut self, registration: &EventRegistration, handler: &Dynamic) -> Result<Delegate, NativeError> {
        let delegate = match handler {
            Dynamic::Delegate(delegate) => delegate.clone(),
            Dynamic::Function(function) => {
                adapter::event_handler(&self.registry, registration.event.handler_type, function.clone())
                    .map_err(script_failure)?
            }
            other => {
                return Err(NativeError::failed(format!(
                    "event handler must be a function or delegate, got {}",
                    other.type_name()
                )));
            }
        };
        registration.add(self, &delegate)?;
        if !self.is_closed() {
            self.pending_events.insert(delegate.clone(), registration.clone());
        }
        trace!(event = %registration.event.name, "event handler attached");
        Ok(delegate)
    }

    fn detach_event(&mut self, registration: &EventRegistration, handler: &Delegate) -> Result<(), NativeError> {
        registration.remove(self, handler)?;
        self.pending_events.remove(handler);
        trace!(event = %registration.event.name, "event handler detached");
        Ok(())
    }
}
