//! Native function storage and callable trait.

use std::fmt;
use std::sync::Arc;

use crate::{CallContext, NativeError};

/// Type-erased host callable.
///
/// The inner callable is shared, so cloning is cheap and clones compare
/// equal under [`NativeFn::ptr_eq`].
#[derive(Clone)]
pub struct NativeFn {
    inner: Arc<dyn NativeCallable + Send + Sync>,
}

impl NativeFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<(), NativeError> + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Wrap a custom [`NativeCallable`] implementation.
    pub fn from_callable<C>(callable: C) -> Self
    where
        C: NativeCallable + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(callable),
        }
    }

    /// Call this native function with the given context.
    pub fn call(&self, ctx: &mut CallContext<'_>) -> Result<(), NativeError> {
        self.inner.call(ctx)
    }

    pub fn ptr_eq(&self, other: &NativeFn) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn").finish_non_exhaustive()
    }
}

/// Trait for callable native functions.
pub trait NativeCallable {
    fn call(&self, ctx: &mut CallContext<'_>) -> Result<(), NativeError>;
}

impl<F> NativeCallable for F
where
    F: Fn(&mut CallContext<'_>) -> Result<(), NativeError>,
{
    fn call(&self, ctx: &mut CallContext<'_>) -> Result<(), NativeError> {
        (self)(ctx)
    }
}
