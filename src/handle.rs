//! Dense integer-ID allocator: `register`/`release`/`validate` over a
//! vector-plus-free-list, with `0` reserved to mean "invalid".
//!
//! This is the process-wide table used to hand queue identifiers to
//! external callers without ever giving them a pointer or reference into
//! a `Queue`'s internals. IDs are not required to be stable across
//! destroy/recreate cycles; a released slot is simply recycled.

use std::sync::Mutex;

enum Slot<T> {
    Occupied(T),
    Free { next_free: Option<usize> },
}

struct Inner<T> {
    slots: Vec<Slot<T>>,
    first_free: Option<usize>,
}

/// A handle table mapping `u64` IDs (`id = index + 1`, so `0` is never a
/// valid handle) to stored values of type `T`.
pub struct HandleTable<T> {
    inner: Mutex<Inner<T>>,
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        HandleTable {
            inner: Mutex::new(Inner {
                slots: Vec::new(),
                first_free: None,
            }),
        }
    }

    /// Register a value, returning a nonzero handle. Registration cannot
    /// fail in safe Rust (the backing `Vec` either grows or the process is
    /// already out of memory), but callers still treat `0` as the
    /// universal "didn't work" sentinel for consistency with every other
    /// entry point.
    pub fn register(&self, value: T) -> u64 {
        let mut inner = self.inner.lock().unwrap();
        let index = match inner.first_free {
            Some(i) => {
                let next_free = match &inner.slots[i] {
                    Slot::Free { next_free } => *next_free,
                    Slot::Occupied(_) => unreachable!("free list points at an occupied slot"),
                };
                inner.first_free = next_free;
                inner.slots[i] = Slot::Occupied(value);
                i
            }
            None => {
                inner.slots.push(Slot::Occupied(value));
                inner.slots.len() - 1
            }
        };
        (index as u64) + 1
    }

    /// Release a handle, returning the stored value if the handle was
    /// live. Idempotent: releasing an already-released or never-allocated
    /// handle is a no-op that returns `None` rather than panicking, which
    /// avoids a footgun for callers racing `destroy` against itself.
    pub fn release(&self, id: u64) -> Option<T> {
        if id == 0 {
            return None;
        }
        let index = (id - 1) as usize;
        let mut inner = self.inner.lock().unwrap();
        if index >= inner.slots.len() {
            return None;
        }
        let next_free = inner.first_free;
        match std::mem::replace(&mut inner.slots[index], Slot::Free { next_free }) {
            Slot::Occupied(value) => {
                inner.first_free = Some(index);
                Some(value)
            }
            freed @ Slot::Free { .. } => {
                // Wasn't occupied; put it back exactly as it was.
                inner.slots[index] = freed;
                None
            }
        }
    }

    /// Validate a handle and hand back a clone of the stored value.
    pub fn validate(&self, id: u64) -> Option<T>
    where
        T: Clone,
    {
        if id == 0 {
            return None;
        }
        let index = (id - 1) as usize;
        let inner = self.inner.lock().unwrap();
        match inner.slots.get(index) {
            Some(Slot::Occupied(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Run `f` with a reference to the stored value, without cloning.
    pub fn with<R>(&self, id: u64, f: impl FnOnce(&T) -> R) -> Option<R> {
        if id == 0 {
            return None;
        }
        let index = (id - 1) as usize;
        let inner = self.inner.lock().unwrap();
        match inner.slots.get(index) {
            Some(Slot::Occupied(value)) => Some(f(value)),
            _ => None,
        }
    }
}
