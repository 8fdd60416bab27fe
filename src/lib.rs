/*! A handle-based work-queue dispatcher with a bounded pool of long-lived
worker threads, plus a lock-free coalescing input-event ring buffer.

The target use-case is a game (or game-adjacent) system interface: any
thread can hand off a unit of work (load a texture, decompress a level
chunk, run a pathfinding query) without blocking, and later poll, wait
on, or cancel it via a small integer handle. A single dispatcher thread
owns the bookkeeping; `max_concurrency` long-lived worker threads actually
run the work.

```
use workqueue_core::{config::QueueConfig, WorkQueue};

let queue = WorkQueue::new(QueueConfig::new(2)).unwrap();
let unit = queue.submit(|| 123);
assert_eq!(queue.wait(unit), 123);
```

Submitters may be any thread; the queue itself owns exactly one dispatcher
thread and `max_concurrency` worker threads, created at
[`queue::create`]/[`WorkQueue::new`] and joined at
[`queue::destroy`]/drop.

## Concurrency model

A producer calls `submit`, which takes the queue's mutex, allocates a
work-unit slot (growing the pool if needed), links it to the pending
FIFO's tail, and signals the dispatcher. The dispatcher wakes, assigns
pending units to idle workers in a fixed order, and signals each newly
assigned worker. Workers run their assigned unit's function without
holding the queue mutex, then re-take it to publish the result and signal
completion. `wait` blocks on a per-unit semaphore; `wait_all` is an idle
barrier that also reaps every completed-and-unreaped slot.

## Platform

The queue and input ring buffer's semaphores are built on Linux
`eventfd`s, which ties this crate to Linux.
*/

pub mod config;
pub mod error;
pub mod input;
pub mod queue;

mod dispatcher;
mod handle;
mod pool;
mod sync;
mod worker;

pub use queue::{cancel, create, destroy, is_busy, poll, submit, wait, wait_all, WorkQueue};

/// Initializes `env_logger` exactly once, for this crate's own test
/// binaries. Never called by library code itself: initialization is the
/// application's job.
#[cfg(test)]
pub(crate) fn init_logging_for_tests() {
    use std::sync::OnceLock;
    static INIT: OnceLock<()> = OnceLock::new();
    INIT.get_or_init(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}
