//! Host-side handles to script values.
//!
//! A [`ScriptRef`] pins a script table, function or userdata in the
//! interpreter's reference table. Dropping the last clone may happen on any
//! thread, so it never touches the interpreter: the handle is pushed onto a
//! [`ReleaseQueue`] that the owning interpreter drains before it next
//! creates a reference.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Kind of script value a [`ScriptRef`] points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptRefKind {
    Table,
    Function,
    UserData,
}

/// Reference handles whose host owners were dropped, awaiting release.
#[derive(Clone, Default)]
pub struct ReleaseQueue {
    pending: Arc<Mutex<Vec<i32>>>,
}

impl ReleaseQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, handle: i32) {
        self.pending.lock().push(handle);
    }

    /// Take every queued handle.
    pub fn drain(&self) -> Vec<i32> {
        std::mem::take(&mut *self.pending.lock())
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ReleaseQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseQueue").field("pending", &self.len()).finish()
    }
}

struct RefInner {
    kind: ScriptRefKind,
    handle: i32,
    owner: u64,
    queue: ReleaseQueue,
}

impl Drop for RefInner {
    fn drop(&mut self) {
        self.queue.push(self.handle);
    }
}

/// Shared handle to a script value pinned in an interpreter.
#[derive(Clone)]
pub struct ScriptRef {
    inner: Arc<RefInner>,
}

impl ScriptRef {
    /// Wrap `handle`, created by interpreter `owner`, releasing it through `queue`.
    pub fn new(kind: ScriptRefKind, handle: i32, owner: u64, queue: ReleaseQueue) -> Self {
        Self {
            inner: Arc::new(RefInner {
                kind,
                handle,
                owner,
                queue,
            }),
        }
    }

    pub fn kind(&self) -> ScriptRefKind {
        self.inner.kind
    }

    /// Slot in the owner's reference table.
    pub fn handle(&self) -> i32 {
        self.inner.handle
    }

    /// Identity of the interpreter that created the reference.
    pub fn owner(&self) -> u64 {
        self.inner.owner
    }
}

impl PartialEq for ScriptRef {
    fn eq(&self, other: &Self) -> bool {
        self.inner.owner == other.inner.owner && self.inner.handle == other.inner.handle
    }
}

impl Eq for ScriptRef {}

impl fmt::Debug for ScriptRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}@{}", self.inner.kind, self.inner.handle, self.inner.owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_after_last_clone() {
        let queue = ReleaseQueue::new();
        let r = ScriptRef::new(ScriptRefKind::Table, 12, 1, queue.clone());
        let r2 = r.clone();
        drop(r);
        assert!(queue.is_empty());
        drop(r2);
        assert_eq!(queue.drain(), vec![12]);
        assert!(queue.is_empty());
    }

    #[test]
    fn release_from_another_thread() {
        let queue = ReleaseQueue::new();
        let r = ScriptRef::new(ScriptRefKind::Function, 3, 1, queue.clone());
        std::thread::spawn(move || drop(r)).join().unwrap();
        assert_eq!(queue.drain(), vec![3]);
    }

    #[test]
    fn equality_uses_owner_and_handle() {
        let queue = ReleaseQueue::new();
        let a = ScriptRef::new(ScriptRefKind::Table, 1, 1, queue.clone());
        let b = ScriptRef::new(ScriptRefKind::Table, 1, 2, queue.clone());
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }
}
