//! Reference-counted host objects and arrays.
//!
//! A [`HostObject`] is a shared handle to a type-erased payload. Two handles
//! are the same object iff they share the allocation, which is what the
//! interpreter's reverse index keys on.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{Dynamic, NativeError, ScriptRef, TypeHash, VTable};

type Payload = Box<dyn Any + Send + Sync>;

struct ObjectCell {
    type_hash: TypeHash,
    payload: RwLock<Payload>,
    binding: Option<Arc<ScriptBinding>>,
}

/// Shared handle to an instance of a host type.
#[derive(Clone)]
pub struct HostObject {
    inner: Arc<ObjectCell>,
}

impl HostObject {
    /// Wrap `value` as an instance of `type_hash`.
    pub fn new<T: Any + Send + Sync>(type_hash: TypeHash, value: T) -> Self {
        Self::from_payload(type_hash, Box::new(value), None)
    }

    /// Instance of a generated adapter type whose virtual members route
    /// through `binding`.
    pub fn with_binding(type_hash: TypeHash, payload: Payload, binding: Arc<ScriptBinding>) -> Self {
        Self::from_payload(type_hash, payload, Some(binding))
    }

    fn from_payload(type_hash: TypeHash, payload: Payload, binding: Option<Arc<ScriptBinding>>) -> Self {
        Self {
            inner: Arc::new(ObjectCell {
                type_hash,
                payload: RwLock::new(payload),
                binding,
            }),
        }
    }

    /// The host type of this instance.
    pub fn type_hash(&self) -> TypeHash {
        self.inner.type_hash
    }

    /// Script binding, present only on generated adapter instances.
    pub fn binding(&self) -> Option<&Arc<ScriptBinding>> {
        self.inner.binding.as_ref()
    }

    /// Same allocation.
    pub fn ptr_eq(&self, other: &HostObject) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Address of the allocation, stable for the life of the object.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }

    /// Whether the payload is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        (**self.inner.payload.read()).is::<T>()
    }

    /// Borrow the payload as `T`.
    ///
    /// Holding the guard across a call back into script code that touches
    /// the same object for writing will deadlock.
    pub fn read<T: Any>(&self) -> Option<MappedRwLockReadGuard<'_, T>> {
        RwLockReadGuard::try_map(self.inner.payload.read(), |p| (**p).downcast_ref::<T>()).ok()
    }

    /// Mutably borrow the payload as `T`.
    pub fn write<T: Any>(&self) -> Option<MappedRwLockWriteGuard<'_, T>> {
        RwLockWriteGuard::try_map(self.inner.payload.write(), |p| (**p).downcast_mut::<T>()).ok()
    }

    /// Run `f` against the payload.
    pub fn with<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.read::<T>().map(|guard| f(&guard))
    }

    /// Run `f` against the mutable payload.
    pub fn with_mut<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.write::<T>().map(|mut guard| f(&mut guard))
    }

    /// Take the payload out of a uniquely owned object.
    ///
    /// Returns the handle unchanged when other handles still exist.
    pub fn into_payload(self) -> Result<Payload, HostObject> {
        match Arc::try_unwrap(self.inner) {
            Ok(cell) => Ok(cell.payload.into_inner()),
            Err(inner) => Err(HostObject { inner }),
        }
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostObject")
            .field("type_hash", &self.inner.type_hash)
            .field("identity", &format_args!("{:#x}", self.identity()))
            .field("bound", &self.inner.binding.is_some())
            .finish()
    }
}

/// Link between a generated adapter instance and the script table that
/// implements its virtual members.
pub struct ScriptBinding {
    vtable: Arc<VTable>,
    table: RwLock<Option<ScriptRef>>,
}

impl ScriptBinding {
    pub fn new(vtable: Arc<VTable>, table: ScriptRef) -> Self {
        Self {
            vtable,
            table: RwLock::new(Some(table)),
        }
    }

    /// The generated type description.
    pub fn vtable(&self) -> &Arc<VTable> {
        &self.vtable
    }

    /// The backing script table, if still attached.
    pub fn table(&self) -> Option<ScriptRef> {
        self.table.read().clone()
    }

    /// Detach the backing table; later virtual calls fall back to the base.
    pub fn clear_table(&self) -> Option<ScriptRef> {
        self.table.write().take()
    }
}

impl fmt::Debug for ScriptBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptBinding")
            .field("vtable", &self.vtable.type_hash)
            .field("attached", &self.table.read().is_some())
            .finish()
    }
}

struct ArrayCell {
    element: TypeHash,
    items: RwLock<Vec<Dynamic>>,
}

/// Shared, fixed-length host array.
#[derive(Clone)]
pub struct HostArray {
    inner: Arc<ArrayCell>,
}

impl HostArray {
    pub fn new(element: TypeHash, items: Vec<Dynamic>) -> Self {
        Self {
            inner: Arc::new(ArrayCell {
                element,
                items: RwLock::new(items),
            }),
        }
    }

    /// Largest length [`with_len`](Self::with_len) accepts.
    pub const MAX_LEN: usize = i32::MAX as usize;

    /// Array of `len` default values of `element`. Fails instead of aborting
    /// when `len` is out of range or cannot be allocated.
    pub fn with_len(element: TypeHash, len: usize) -> Result<Self, NativeError> {
        if len > Self::MAX_LEN {
            return Err(NativeError::failed(format!("array length {len} out of range")));
        }
        let mut items = Vec::new();
        items
            .try_reserve_exact(len)
            .map_err(|_| NativeError::failed(format!("cannot allocate an array of length {len}")))?;
        items.resize(len, Dynamic::default_of(element));
        Ok(Self::new(element, items))
    }

    pub fn element_type(&self) -> TypeHash {
        self.inner.element
    }

    pub fn len(&self) -> usize {
        self.inner.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at zero-based `index`.
    pub fn get(&self, index: usize) -> Option<Dynamic> {
        self.inner.items.read().get(index).cloned()
    }

    /// Replace the element at zero-based `index`. Returns false when out of range.
    pub fn set(&self, index: usize, value: Dynamic) -> bool {
        match self.inner.items.write().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Snapshot of all elements.
    pub fn to_vec(&self) -> Vec<Dynamic> {
        self.inner.items.read().clone()
    }

    pub fn ptr_eq(&self, other: &HostArray) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }
}

impl fmt::Debug for HostArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostArray")
            .field("element", &self.inner.element)
            .field("len", &self.len())
            .finish()
    }
}
