//! Event subscriptions made by script code.

use rustc_hash::FxHashMap;

use hostbridge_core::{Delegate, EventRegistration};

/// Handlers attached from script code, keyed by handler identity, with the
/// event they were attached to. Lets the bridge detach them later without
/// re-deriving the event.
#[derive(Debug, Default)]
pub(crate) struct PendingEvents {
    entries: FxHashMap<usize, (Delegate, EventRegistration)>,
}

impl PendingEvents {
    pub(crate) fn insert(&mut self, handler: Delegate, registration: EventRegistration) {
        self.entries.insert(handler.identity(), (handler, registration));
    }

    pub(crate) fn remove(&mut self, handler: &Delegate) -> Option<EventRegistration> {
        self.entries.remove(&handler.identity()).map(|(_, registration)| registration)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn drain(&mut self) -> Vec<(Delegate, EventRegistration)> {
        self.entries.drain().map(|(_, entry)| entry).collect()
    }
}
