//! The interpreter as seen from host code.

use crate::{DataType, Delegate, Dynamic, EventRegistration, NativeError, ScriptRef, TypeHash};

/// Services an interpreter offers to native functions it invokes.
///
/// Host code never holds an interpreter directly; it receives one through
/// [`CallContext::host`](crate::CallContext::host) for the duration of a call.
pub trait ScriptHost {
    /// Call a script function.
    ///
    /// When `result_types` is non-empty, results are converted to those
    /// types in order and missing results become defaults.
    fn call_function(
        &mut self,
        function: &ScriptRef,
        args: &[Dynamic],
        result_types: &[DataType],
    ) -> Result<Vec<Dynamic>, NativeError>;

    /// A function stored directly in `table` under `name`, ignoring metatables.
    fn table_function(&mut self, table: &ScriptRef, name: &str) -> Result<Option<ScriptRef>, NativeError>;

    /// Call a method on a host value.
    ///
    /// Virtual members of generated adapter instances are routed to their
    /// script implementation. By-ref arguments are written back into `args`.
    fn invoke_method(&mut self, target: &Dynamic, name: &str, args: &mut [Dynamic]) -> Result<Dynamic, NativeError>;

    /// Invoke a delegate.
    fn invoke_delegate(&mut self, delegate: &Delegate, args: &mut [Dynamic]) -> Result<Dynamic, NativeError>;

    /// Wrap a script function as a delegate of `delegate_type`.
    fn make_delegate(&mut self, delegate_type: TypeHash, function: &ScriptRef) -> Result<Delegate, NativeError>;

    /// Subscribe `handler` (a delegate or a script function) to an event.
    fn attach_event(&mut self, registration: &EventRegistration, handler: &Dynamic) -> Result<Delegate, NativeError>;

    /// Unsubscribe a handler previously returned by [`ScriptHost::attach_event`].
    fn detach_event(&mut self, registration: &EventRegistration, handler: &Delegate) -> Result<(), NativeError>;
}

/// Host for calls made outside any interpreter.
///
/// Operations that need script access fail with [`NativeError::NoScriptHost`].
/// Native delegates still run.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedHost;

impl ScriptHost for DetachedHost {
    fn call_function(&mut self, _: &ScriptRef, _: &[Dynamic], _: &[DataType]) -> Result<Vec<Dynamic>, NativeError> {
        Err(NativeError::NoScriptHost)
    }

    fn table_function(&mut self, _: &ScriptRef, _: &str) -> Result<Option<ScriptRef>, NativeError> {
        Err(NativeError::NoScriptHost)
    }

    fn invoke_method(&mut self, _: &Dynamic, _: &str, _: &mut [Dynamic]) -> Result<Dynamic, NativeError> {
        Err(NativeError::NoScriptHost)
    }

    fn invoke_delegate(&mut self, delegate: &Delegate, args: &mut [Dynamic]) -> Result<Dynamic, NativeError> {
        match delegate.native_fn() {
            Some(native) => {
                let mut ret = Dynamic::Null;
                native.call(&mut crate::CallContext::new(None, args, &mut ret, self))?;
                Ok(ret)
            }
            None => Err(NativeError::NoScriptHost),
        }
    }

    fn make_delegate(&mut self, _: TypeHash, _: &ScriptRef) -> Result<Delegate, NativeError> {
        Err(NativeError::NoScriptHost)
    }

    fn attach_event(&mut self, _: &EventRegistration, _: &Dynamic) -> Result<Delegate, NativeError> {
        Err(NativeError::NoScriptHost)
    }

    fn detach_event(&mut self, _: &EventRegistration, _: &Delegate) -> Result<(), NativeError> {
        Err(NativeError::NoScriptHost)
    }
}
