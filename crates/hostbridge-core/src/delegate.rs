//! Delegates: host callables with a declared delegate type.

use std::fmt;
use std::sync::Arc;

use crate::{CallableShape, NativeFn, ScriptRef, TypeHash};

/// What a delegate invokes.
#[derive(Clone)]
pub enum DelegateTarget {
    /// A host function.
    Native(NativeFn),
    /// A script function adapted to the delegate's callable shape.
    Script {
        shape: Arc<CallableShape>,
        function: ScriptRef,
    },
}

struct DelegateInner {
    delegate_type: TypeHash,
    target: DelegateTarget,
}

/// Shared handle to a delegate. Identity is the allocation.
#[derive(Clone)]
pub struct Delegate {
    inner: Arc<DelegateInner>,
}

impl Delegate {
    pub fn native(delegate_type: TypeHash, f: NativeFn) -> Self {
        Self::with_target(delegate_type, DelegateTarget::Native(f))
    }

    pub fn script(delegate_type: TypeHash, shape: Arc<CallableShape>, function: ScriptRef) -> Self {
        Self::with_target(delegate_type, DelegateTarget::Script { shape, function })
    }

    fn with_target(delegate_type: TypeHash, target: DelegateTarget) -> Self {
        Self {
            inner: Arc::new(DelegateInner { delegate_type, target }),
        }
    }

    pub fn delegate_type(&self) -> TypeHash {
        self.inner.delegate_type
    }

    pub fn target(&self) -> &DelegateTarget {
        &self.inner.target
    }

    /// The host function, for native delegates.
    pub fn native_fn(&self) -> Option<&NativeFn> {
        match &self.inner.target {
            DelegateTarget::Native(f) => Some(f),
            DelegateTarget::Script { .. } => None,
        }
    }

    /// The generated callable shape, for script-backed delegates.
    pub fn shape(&self) -> Option<&Arc<CallableShape>> {
        match &self.inner.target {
            DelegateTarget::Script { shape, .. } => Some(shape),
            DelegateTarget::Native(_) => None,
        }
    }

    pub fn ptr_eq(&self, other: &Delegate) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }
}

impl fmt::Debug for Delegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.inner.target {
            DelegateTarget::Native(_) => "native",
            DelegateTarget::Script { .. } => "script",
        };
        f.debug_struct("Delegate")
            .field("type", &self.inner.delegate_type)
            .field("target", &kind)
            .finish()
    }
}
