//! The dispatcher thread loop: one dispatch pass per wakeup, assigning
//! pending units to idle workers in a fixed order and publishing `busy`.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::queue::QueueInner;

pub(crate) fn run(inner: Arc<QueueInner>) {
    loop {
        inner.dispatcher_sem.wait();
        if inner.dispatcher_terminate.load(Ordering::Acquire) {
            return;
        }

        let mut state = inner.state.lock().unwrap();
        let mut busy_local = false;

        for w in 0..inner.max_concurrency {
            if state.workers[w].wu_index.is_some() {
                busy_local = true;
                continue;
            }
            if let Some(index) = state.pool.pop_pending() {
                // Never blocks in practice: a permit is always available
                // here, since at most one unit is ever assigned per
                // worker and each assignment is matched by a release in
                // `worker::run` once that unit completes.
                inner.concurrency.wait();
                state.pool.slots[index].started = true;
                state.workers[w].wu_index = Some(index);
                inner.worker_sems[w].signal();
                busy_local = true;
            }
        }

        inner.busy.store(busy_local, Ordering::Release);

        if !busy_local && state.send_idle_signal {
            inner.idle_sem.signal();
            state.send_idle_signal = false;
        }
    }
}
