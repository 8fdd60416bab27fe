//! A counting semaphore built on a Linux `eventfd`. `write(n)` atomically
//! adds `n` to the kernel-held counter and `read` blocks while it is
//! zero; see [`Semaphore::wait`] for why this deliberately does not use
//! the kernel's `EFD_SEMAPHORE` mode. This ties the module to Linux.

use nix::sys::eventfd::{EfdFlags, EventFd};

use crate::error::{QueueError, Result};

/// A counting semaphore. `wait` blocks until the count is positive, then
/// decrements it by one; `signal` increments it by one and never blocks.
pub struct Semaphore {
    fd: EventFd,
}

impl Semaphore {
    /// Create a semaphore with the given initial count.
    pub fn new(initial: u32) -> Result<Self> {
        let fd = EventFd::from_value_and_flags(initial, EfdFlags::EFD_CLOEXEC).map_err(|_| {
            QueueError::PrimitiveCreationFailure("semaphore (eventfd)")
        })?;
        Ok(Semaphore { fd })
    }

    /// A semaphore that starts at zero: the common case for "signal me
    /// when something happens" semaphores (dispatcher wake, idle barrier,
    /// per-unit wait, per-worker inbox-ready).
    pub fn new_empty() -> Result<Self> {
        Self::new(0)
    }

    /// Block until the count is positive, then decrement it by one.
    pub fn wait(&self) {
        // A blocking read on an EFD_SEMAPHORE-less eventfd returns the
        // *entire* accumulated count and resets it to zero, which is not
        // what a semaphore needs; we open without EFD_SEMAPHORE and
        // instead decrement ourselves by re-depositing any surplus. This
        // keeps signal() coalescing-safe: N signals followed by N waits
        // always unblock exactly N times, without ever losing a genuine
        // wakeup.
        let count = self.fd.read().expect("eventfd read failed");
        if count > 1 {
            self.fd.write(count - 1).expect("eventfd write failed");
        }
    }

    /// Increment the count by one. Never blocks, makes a single syscall.
    pub fn signal(&self) {
        self.fd.write(1).expect("eventfd write failed");
    }
}
