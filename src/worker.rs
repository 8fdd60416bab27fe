//! The worker thread loop.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::queue::QueueInner;

/// Runs until `inner.worker_terminate[worker_idx]` is set. Never touches
/// the pending list, `busy`, or `first_free`; those belong to the
/// dispatcher.
pub(crate) fn run(inner: Arc<QueueInner>, worker_idx: usize) {
    loop {
        inner.worker_sems[worker_idx].wait();
        if inner.worker_terminate[worker_idx].load(Ordering::Acquire) {
            return;
        }

        // Copy the assigned unit's function into a stack local under the
        // mutex, then release it before running user code: the mutex must
        // never be held while a caller-supplied function runs.
        let (index, function) = {
            let mut state = inner.state.lock().unwrap();
            match state.workers[worker_idx].wu_index {
                Some(i) => {
                    let f = state.pool.slots[i].function.take();
                    (Some(i), f)
                }
                None => (None, None),
            }
        };
        let Some(index) = index else {
            // Spurious wakeup with no assignment: only expected to race
            // with a termination signal, which we've already checked for
            // above, so just go back to sleep.
            continue;
        };

        let result = match function {
            Some(f) => f(),
            None => 0,
        };

        let sem = {
            let mut state = inner.state.lock().unwrap();
            let slot = &mut state.pool.slots[index];
            slot.result = result;
            slot.completed = true;
            let sem = slot.semaphore.clone();
            state.workers[worker_idx].wu_index = None;
            sem
        };
        if let Some(sem) = sem {
            sem.signal();
        }
        inner.concurrency.signal();
        inner.dispatcher_sem.signal();
    }
}
