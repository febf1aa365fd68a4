//! Event plumbing shared by host types and the interpreter.

use crate::{Delegate, Dynamic, EventEntry, HostObject, NativeError, ScriptHost, TypeHash};

/// An event member bound to its receiver.
///
/// This is the payload of the helper object scripts get when they read an
/// event member; its `Add` and `Remove` methods subscribe handlers.
#[derive(Debug, Clone)]
pub struct EventRegistration {
    /// Receiver; `None` for static events.
    pub target: Option<Dynamic>,
    pub declaring_type: TypeHash,
    pub event: EventEntry,
}

impl EventRegistration {
    /// Call the event's add accessor.
    pub fn add(&self, host: &mut dyn ScriptHost, handler: &Delegate) -> Result<(), NativeError> {
        self.accessor(host, handler, true)
    }

    /// Call the event's remove accessor.
    pub fn remove(&self, host: &mut dyn ScriptHost, handler: &Delegate) -> Result<(), NativeError> {
        self.accessor(host, handler, false)
    }

    fn accessor(&self, host: &mut dyn ScriptHost, handler: &Delegate, add: bool) -> Result<(), NativeError> {
        let native = if add { &self.event.add } else { &self.event.remove };
        let mut args = [Dynamic::Delegate(handler.clone())];
        let mut ret = Dynamic::Null;
        native.call(&mut crate::CallContext::new(
            self.target.as_ref(),
            &mut args,
            &mut ret,
            host,
        ))
    }

    /// The registration as a host object of the built-in registration type.
    pub fn into_object(self) -> HostObject {
        HostObject::new(crate::primitives::EVENT_REGISTRATION, self)
    }
}

/// Handler list backing an event on a host type.
#[derive(Debug, Clone, Default)]
pub struct HostEvent {
    handlers: Vec<Delegate>,
}

impl HostEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, handler: Delegate) {
        self.handlers.push(handler);
    }

    /// Remove the most recent subscription of `handler`. Returns whether one was found.
    pub fn unsubscribe(&mut self, handler: &Delegate) -> bool {
        match self.handlers.iter().rposition(|h| h.ptr_eq(handler)) {
            Some(index) => {
                self.handlers.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Snapshot of the handlers, so raising does not hold a lock on the owner.
    pub fn handlers(&self) -> Vec<Delegate> {
        self.handlers.clone()
    }

    /// Invoke every handler with a copy of `args`.
    pub fn raise(&self, host: &mut dyn ScriptHost, args: &[Dynamic]) -> Result<(), NativeError> {
        raise_all(&self.handlers, host, args)
    }
}

/// Invoke each handler in order, stopping at the first failure.
pub fn raise_all(handlers: &[Delegate], host: &mut dyn ScriptHost, args: &[Dynamic]) -> Result<(), NativeError> {
    for handler in handlers {
        let mut call_args = args.to_vec();
        host.invoke_delegate(handler, &mut call_args)?;
    }
    Ok(())
}
