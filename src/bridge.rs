//! The interpreter facade.
//!
//! A [`Bridge`] owns one script state and everything that ties it to the
//! host: the object registry, the member cache, the loaded assemblies and
//! the event subscriptions made by scripts. It is bound to the thread that
//! created it; only the type registry and generated adapters are shared.

use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashSet;
use tracing::{debug, trace, warn};

use hostbridge_core::{NativeError, ReleaseQueue, TypeHash};
use hostbridge_registry::{CORE_ASSEMBLY, TypeRegistry};

use crate::dispatch::{self, MemberCache};
use crate::error::RuntimeFailure;
use crate::events::PendingEvents;
use crate::objects::ObjectRegistry;
use crate::state::{MemoryState, ScriptState};
use crate::{BridgeOptions, BridgeProperty, Operator, ScriptError, ScriptResult, globals};

pub(crate) const CLASS_METATABLE: &str = "hostbridge.class";
pub(crate) const SEARCHBASE_METATABLE: &str = "hostbridge.searchbase";

static NEXT_BRIDGE_ID: AtomicU64 = AtomicU64::new(1);

/// Which metatable a pushed host value gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MetatableKind {
    /// Per-type instance metatable.
    Instance,
    /// Static-member proxy for a type.
    Class,
    /// `base` alias of a script-implemented subclass instance.
    SearchBase,
}

type MetaFn = fn(&mut Bridge) -> ScriptResult<i32>;

/// A script interpreter bridged to the host object model.
pub struct Bridge {
    pub(crate) state: Box<dyn ScriptState>,
    pub(crate) registry: Arc<TypeRegistry>,
    pub(crate) options: BridgeOptions,
    pub(crate) objects: ObjectRegistry,
    pub(crate) members: MemberCache,
    pub(crate) loaded: Vec<String>,
    pub(crate) pending_events: PendingEvents,
    pub(crate) release_queue: ReleaseQueue,
    installed_metatables: FxHashSet<TypeHash>,
    id: u64,
    closed: bool,
}

impl Bridge {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self::with_options(registry, BridgeOptions::default())
    }

    pub fn with_options(registry: Arc<TypeRegistry>, options: BridgeOptions) -> Self {
        let state = MemoryState::with_max_stack(options.get(BridgeProperty::MaxStackSize));
        Self::with_state(registry, options, Box::new(state))
    }

    /// Bridge over an existing script state.
    pub fn with_state(registry: Arc<TypeRegistry>, options: BridgeOptions, state: Box<dyn ScriptState>) -> Self {
        let mut bridge = Self {
            state,
            registry,
            options,
            objects: ObjectRegistry::new(),
            members: MemberCache::default(),
            loaded: vec![CORE_ASSEMBLY.to_string()],
            pending_events: PendingEvents::default(),
            release_queue: ReleaseQueue::new(),
            installed_metatables: FxHashSet::default(),
            id: NEXT_BRIDGE_ID.fetch_add(1, Ordering::Relaxed),
            closed: false,
        };
        bridge.install_base_metatables();
        globals::install(&mut bridge);
        debug!(bridge = bridge.id, "bridge created");
        bridge
    }

    /// Identity used to tag script references created by this bridge.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn state(&mut self) -> &mut dyn ScriptState {
        &mut *self.state
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    pub fn set_property(&mut self, property: BridgeProperty, value: usize) {
        self.options.set(property, value);
    }

    pub fn get_property(&self, property: BridgeProperty) -> usize {
        self.options.get(property)
    }

    /// Assemblies searched by name lookups, in load order.
    pub fn loaded_assemblies(&self) -> &[String] {
        &self.loaded
    }

    pub(crate) fn loaded_names(&self) -> impl Iterator<Item = &str> {
        self.loaded.iter().map(String::as_str)
    }

    /// Make an assembly's types visible to name lookups. Loading twice is a no-op.
    pub fn load_assembly(&mut self, name: &str) -> ScriptResult<()> {
        if !self.registry.has_assembly(name) {
            return Err(ScriptError::runtime(format!("assembly '{name}' not found")));
        }
        if !self.loaded.iter().any(|n| n == name) {
            debug!(bridge = self.id, assembly = name, "assembly loaded");
            self.loaded.push(name.to_string());
        }
        Ok(())
    }

    /// Number of live registry entries.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Number of event subscriptions made by script code and not yet removed.
    pub fn pending_event_count(&self) -> usize {
        self.pending_events.len()
    }

    /// Release every script-made event subscription. Further use of the
    /// bridge is allowed but subscriptions will not be tracked.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for (handler, registration) in self.pending_events.drain() {
            if let Err(err) = registration.remove(self, &handler) {
                warn!(event = %registration.event.name, error = %err, "failed to detach pending event handler");
            }
        }
        debug!(bridge = self.id, "bridge closed");
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    /// Run pending finalizers: release script references dropped by the
    /// host and registry entries whose script aliases were collected.
    /// Returns the number of registry entries released.
    pub fn collect_garbage(&mut self) -> usize {
        self.clean_finalized_references();
        let ids = self.state.take_finalized();
        let mut released = 0;
        for id in ids {
            if self.collect_object(id) {
                released += 1;
            }
        }
        released
    }

    /// Drop the registry entry for `id`. Idempotent.
    pub fn collect_object(&mut self, id: i64) -> bool {
        match self.objects.release(id) {
            Some(_) => {
                trace!(id, "collected host object");
                true
            }
            None => false,
        }
    }

    /// Release script references whose host handles were dropped.
    pub(crate) fn clean_finalized_references(&mut self) {
        let handles = self.release_queue.drain();
        if !handles.is_empty() {
            trace!(count = handles.len(), "releasing finalized script references");
        }
        for handle in handles {
            self.state.unreference(handle);
        }
    }

    /// A runtime error located at the script code that called the current host function.
    pub fn raise(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::Runtime(RuntimeFailure {
            message: message.into(),
            location: self.state.location(1),
            traceback: self.options.use_traceback().then(|| self.state.traceback()),
        })
    }

    /// Runtime error for a failed host invocation, reporting its innermost cause.
    pub(crate) fn raise_native(&self, error: &NativeError) -> ScriptError {
        self.raise(error.root_cause().to_string())
    }

    fn install_base_metatables(&mut self) {
        self.state.new_metatable(CLASS_METATABLE);
        self.set_meta_fn("__index", dispatch::class_index);
        self.set_meta_fn("__newindex", dispatch::class_new_index);
        self.set_meta_fn("__call", dispatch::call_constructor);
        self.set_meta_fn("__gc", dispatch::gc);
        self.set_meta_fn("__tostring", dispatch::to_string);
        self.state.set_top(-2);

        self.state.new_metatable(SEARCHBASE_METATABLE);
        self.set_meta_fn("__index", dispatch::base_index);
        self.set_meta_fn("__newindex", dispatch::new_index);
        self.set_meta_fn("__gc", dispatch::gc);
        self.set_meta_fn("__tostring", dispatch::to_string);
        self.state.set_top(-2);
    }

    /// Set `mt[name] = f` on the metatable at the top of the stack.
    fn set_meta_fn(&mut self, name: &str, f: MetaFn) {
        self.state.push_string(name);
        self.state.push_function(None, Rc::new(f));
        self.state.raw_set(-3);
    }

    /// Push the metatable for `kind`, creating the per-type metatable on first use.
    pub(crate) fn push_metatable(&mut self, kind: MetatableKind, type_hash: TypeHash) {
        match kind {
            MetatableKind::Class => {
                self.state.get_named_metatable(CLASS_METATABLE);
            }
            MetatableKind::SearchBase => {
                self.state.get_named_metatable(SEARCHBASE_METATABLE);
            }
            MetatableKind::Instance => self.push_type_metatable(type_hash),
        }
    }

    fn push_type_metatable(&mut self, type_hash: TypeHash) {
        let name = format!("hostbridge.type:{type_hash}");
        if self.installed_metatables.contains(&type_hash) {
            self.state.get_named_metatable(&name);
            return;
        }
        self.state.new_metatable(&name);
        self.set_meta_fn("__index", dispatch::index);
        self.set_meta_fn("__newindex", dispatch::new_index);
        self.set_meta_fn("__gc", dispatch::gc);
        self.set_meta_fn("__tostring", dispatch::to_string);
        for op in Operator::ALL {
            if self.registry.has_method(type_hash, op.method_name()) {
                self.state.push_string(op.metamethod());
                self.state
                    .push_function(None, Rc::new(move |b: &mut Bridge| dispatch::match_operator(b, op)));
                self.state.raw_set(-3);
            }
        }
        if self.registry.get(type_hash).is_some_and(|t| t.is_delegate()) {
            self.set_meta_fn("__call", dispatch::call_delegate);
        }
        trace!(type_name = self.registry.type_name(type_hash), "installed type metatable");
        self.installed_metatables.insert(type_hash);
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.close();
    }
}
