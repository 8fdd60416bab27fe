//! The growable work-unit pool: a `Vec<Slot>` plus the three cursors
//! (`first_pending`, `last_pending`, `first_free`) that implement the
//! pending FIFO and the free list.
//!
//! Every cross-mutex-release reference into this pool is an index, never
//! a pointer or borrow, so growing the backing `Vec` never invalidates
//! anything another thread might be holding onto.

use std::sync::Arc;

use crate::error::{QueueError, Result};
use crate::sync::Semaphore;

/// The callable a work unit runs. The queue takes ownership of it at
/// `submit` and drops it once it has run, regardless of whether the
/// result is ever reaped.
pub type WorkFn = Box<dyn FnOnce() -> i64 + Send>;

pub struct Slot {
    pub in_use: bool,
    pub started: bool,
    pub completed: bool,
    pub function: Option<WorkFn>,
    pub result: i64,
    /// Owned by whichever thread is blocked in `wait` on this unit, if any.
    pub semaphore: Option<Arc<Semaphore>>,
    /// Intrusive link shared between the pending FIFO and the free list,
    /// disambiguated by `in_use`.
    pub next: Option<usize>,
}

impl Slot {
    fn vacant(next: Option<usize>) -> Self {
        Slot {
            in_use: false,
            started: false,
            completed: false,
            function: None,
            result: 0,
            semaphore: None,
            next,
        }
    }
}

pub struct Pool {
    pub slots: Vec<Slot>,
    pub first_pending: Option<usize>,
    pub last_pending: Option<usize>,
    pub first_free: Option<usize>,
    /// Test-only hook: when `true`, the next call to `grow` fails as if
    /// the allocator were exhausted, then resets itself. Exercises the
    /// growth-failure path without needing to actually exhaust memory.
    pub(crate) fail_next_growth: bool,
}

impl Pool {
    pub fn new() -> Self {
        Pool {
            slots: Vec::new(),
            first_pending: None,
            last_pending: None,
            first_free: None,
            fail_next_growth: false,
        }
    }

    /// Grow by `max(ceil((size+4)/5), max_concurrency)` new slots, linked
    /// into the free list tail. Roughly 20% geometric growth with a floor
    /// of one new slot per worker, so a freshly grown pool can always
    /// accept at least `max_concurrency` more units without growing twice
    /// in a row.
    fn grow(&mut self, max_concurrency: usize) -> Result<()> {
        if self.fail_next_growth {
            self.fail_next_growth = false;
            return Err(QueueError::OutOfMemory);
        }
        let size = self.slots.len();
        let growth = std::cmp::max((size + 4) / 5, max_concurrency);
        let start = self.slots.len();
        // Link the new slots into the free list, tail of the new range
        // pointing at whatever was previously the free list head.
        let mut next = self.first_free;
        for _ in 0..growth {
            self.slots.push(Slot::vacant(next));
            next = Some(self.slots.len() - 1);
        }
        self.first_free = Some(start + growth - 1);
        Ok(())
    }

    /// Allocate a free slot, growing the pool first if necessary. Returns
    /// `Err(OutOfMemory)` with no state change if growth was required and
    /// failed.
    pub fn alloc(&mut self, max_concurrency: usize) -> Result<usize> {
        if self.first_free.is_none() {
            self.grow(max_concurrency)?;
        }
        let index = self.first_free.expect("grow() must populate the free list");
        self.first_free = self.slots[index].next;
        self.slots[index].next = None;
        Ok(index)
    }

    /// Append `index` to the tail of the pending FIFO.
    pub fn push_pending(&mut self, index: usize) {
        self.slots[index].next = None;
        match self.last_pending {
            Some(tail) => {
                self.slots[tail].next = Some(index);
                self.last_pending = Some(index);
            }
            None => {
                self.first_pending = Some(index);
                self.last_pending = Some(index);
            }
        }
    }

    /// Pop the head of the pending FIFO, if any.
    pub fn pop_pending(&mut self) -> Option<usize> {
        let head = self.first_pending?;
        let next = self.slots[head].next;
        self.first_pending = next;
        if next.is_none() {
            self.last_pending = None;
        }
        self.slots[head].next = None;
        Some(head)
    }

    /// Remove `index` from the pending FIFO wherever it is (head, middle,
    /// or tail), fixing up `last_pending` if it was the tail. Returns
    /// `false` if `index` was not found on the pending list: either the
    /// list was malformed, or the slot genuinely wasn't pending. Either
    /// way the caller (`cancel`) treats it as "not cancellable", never
    /// panics.
    pub fn remove_pending(&mut self, index: usize) -> bool {
        let mut prev: Option<usize> = None;
        let mut cur = self.first_pending;
        while let Some(i) = cur {
            if i == index {
                let next = self.slots[i].next;
                match prev {
                    Some(p) => self.slots[p].next = next,
                    None => self.first_pending = next,
                }
                if self.last_pending == Some(i) {
                    self.last_pending = prev;
                }
                self.slots[i].next = None;
                return true;
            }
            prev = Some(i);
            cur = self.slots[i].next;
        }
        false
    }

    /// Return a slot to the free list. Clears all payload fields so a
    /// reused slot never leaks a stale function/result/semaphore.
    pub fn free(&mut self, index: usize) {
        let next_free = self.first_free;
        let slot = &mut self.slots[index];
        slot.in_use = false;
        slot.started = false;
        slot.completed = false;
        slot.function = None;
        slot.result = 0;
        slot.semaphore = None;
        slot.next = next_free;
        self.first_free = Some(index);
    }

    /// Sweep every `in_use && completed` slot back to the free list.
    /// Used by `wait_all`'s reap pass; deliberately leaves newly submitted
    /// (not yet completed) slots alone.
    pub fn sweep_completed(&mut self) {
        let indices: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.in_use && s.completed)
            .map(|(i, _)| i)
            .collect();
        for i in indices {
            self.free(i);
        }
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}
