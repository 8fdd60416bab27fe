//! The queue front-end: `create`/`destroy`/`submit`/`poll`/`wait`/
//! `cancel`/`wait_all`/`is_busy`, plus the shared queue state those
//! operations and the dispatcher/worker threads all touch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, JoinHandle};

use crate::dispatcher;
use crate::handle::HandleTable;
use crate::pool::{Pool, WorkFn};
use crate::sync::Semaphore;
use crate::worker;

/// Process-wide table of live queues, keyed by the `u64` handle returned
/// from `create`. Unit handles are addressed directly by pool index, so
/// there's no second table for those.
fn queues() -> &'static HandleTable<Arc<QueueInner>> {
    static QUEUES: OnceLock<HandleTable<Arc<QueueInner>>> = OnceLock::new();
    QUEUES.get_or_init(HandleTable::new)
}

pub(crate) struct WorkerSlot {
    /// `None` when idle, else the pool index of the unit this worker is
    /// currently executing. Single-writer (dispatcher) / single-reader
    /// (that worker), both under `QueueInner::state`'s mutex.
    pub wu_index: Option<usize>,
}

pub(crate) struct QueueState {
    pub pool: Pool,
    pub workers: Vec<WorkerSlot>,
    pub send_idle_signal: bool,
}

pub(crate) struct QueueInner {
    pub max_concurrency: usize,
    pub state: Mutex<QueueState>,
    /// Published value of `busy`; read without locking by `is_busy`.
    /// Written under `state`'s mutex by the dispatcher so every other
    /// mutation of `state` happens-before the publish.
    pub busy: AtomicBool,
    /// Starts at `max_concurrency`. The dispatcher acquires one permit
    /// when it assigns a unit to a worker; the worker releases it back
    /// after the unit completes. Held at `max_concurrency` minus however
    /// many units are currently assigned.
    pub concurrency: Semaphore,
    pub dispatcher_sem: Semaphore,
    pub idle_sem: Semaphore,
    pub worker_sems: Vec<Semaphore>,
    pub dispatcher_terminate: AtomicBool,
    pub worker_terminate: Vec<AtomicBool>,
    pub dispatcher_thread: Mutex<Option<JoinHandle<()>>>,
    pub worker_threads: Mutex<Vec<JoinHandle<()>>>,
}

/// Create a queue backed by `max_concurrency` worker threads plus one
/// dispatcher thread, all running by the time this returns.
///
/// `max_concurrency` is signed so that `create(0)` and `create(-1)` are
/// both representable invalid-argument calls, rather than forcing
/// callers to the edge of `usize` to express "negative".
///
/// Returns `0` on invalid argument or any allocation/thread-creation
/// failure, after unwinding any partial state.
pub fn create(max_concurrency: i64) -> u64 {
    if max_concurrency < 1 {
        log::warn!("create: max_concurrency must be >= 1, got {max_concurrency}");
        return 0;
    }
    let max_concurrency = max_concurrency as usize;

    let concurrency = match Semaphore::new(max_concurrency as u32) {
        Ok(s) => s,
        Err(e) => {
            log::error!("create: {e}");
            return 0;
        }
    };
    let dispatcher_sem = match Semaphore::new_empty() {
        Ok(s) => s,
        Err(e) => {
            log::error!("create: {e}");
            return 0;
        }
    };
    let idle_sem = match Semaphore::new_empty() {
        Ok(s) => s,
        Err(e) => {
            log::error!("create: {e}");
            return 0;
        }
    };
    let mut worker_sems = Vec::with_capacity(max_concurrency);
    for _ in 0..max_concurrency {
        match Semaphore::new_empty() {
            Ok(s) => worker_sems.push(s),
            Err(e) => {
                log::error!("create: {e}");
                return 0; // worker_sems dropped here, nothing else allocated yet
            }
        }
    }

    let state = Mutex::new(QueueState {
        pool: Pool::new(),
        workers: (0..max_concurrency).map(|_| WorkerSlot { wu_index: None }).collect(),
        send_idle_signal: false,
    });

    let inner = Arc::new(QueueInner {
        max_concurrency,
        state,
        busy: AtomicBool::new(false),
        concurrency,
        dispatcher_sem,
        idle_sem,
        worker_sems,
        dispatcher_terminate: AtomicBool::new(false),
        worker_terminate: (0..max_concurrency).map(|_| AtomicBool::new(false)).collect(),
        dispatcher_thread: Mutex::new(None),
        worker_threads: Mutex::new(Vec::new()),
    });

    let mut worker_handles = Vec::with_capacity(max_concurrency);
    for idx in 0..max_concurrency {
        let worker_inner = inner.clone();
        match thread::Builder::new()
            .name(format!("workqueue-worker-{idx}"))
            .spawn(move || worker::run(worker_inner, idx))
        {
            Ok(h) => worker_handles.push(h),
            Err(e) => {
                log::error!("create: failed to spawn worker {idx}: {e}");
                // Unwind: tell every worker spawned so far to exit, join them.
                for (i, h) in worker_handles.into_iter().enumerate() {
                    inner.worker_terminate[i].store(true, Ordering::Release);
                    inner.worker_sems[i].signal();
                    let _ = h.join();
                }
                return 0;
            }
        }
    }
    *inner.worker_threads.lock().unwrap() = worker_handles;

    let dispatcher_inner = inner.clone();
    match thread::Builder::new()
        .name("workqueue-dispatcher".into())
        .spawn(move || dispatcher::run(dispatcher_inner))
    {
        Ok(h) => *inner.dispatcher_thread.lock().unwrap() = Some(h),
        Err(e) => {
            log::error!("create: failed to spawn dispatcher: {e}");
            for i in 0..max_concurrency {
                inner.worker_terminate[i].store(true, Ordering::Release);
                inner.worker_sems[i].signal();
            }
            for h in std::mem::take(&mut *inner.worker_threads.lock().unwrap()) {
                let _ = h.join();
            }
            return 0;
        }
    }

    queues().register(inner)
}

/// Tear down a queue: stop the dispatcher and every worker, join all
/// threads, drop the pool. `id == 0` is a no-op. Never fails.
pub fn destroy(id: u64) {
    if id == 0 {
        return;
    }
    let inner = match queues().release(id) {
        Some(inner) => inner,
        None => return,
    };

    // Barrier: any in-flight call that already validated `id` holds an
    // `Arc` clone and will finish against it; this lock/unlock pair just
    // ensures nobody is mid-critical-section under our feet before we
    // start tearing down threads.
    {
        let _barrier = inner.state.lock().unwrap();
    }

    inner.dispatcher_terminate.store(true, Ordering::Release);
    inner.dispatcher_sem.signal();
    if let Some(h) = inner.dispatcher_thread.lock().unwrap().take() {
        let _ = h.join();
    }

    for i in 0..inner.max_concurrency {
        inner.worker_terminate[i].store(true, Ordering::Release);
        inner.worker_sems[i].signal();
    }
    for h in std::mem::take(&mut *inner.worker_threads.lock().unwrap()) {
        let _ = h.join();
    }
    // `inner`'s Arc drops here; pool, semaphores, and state go with it.
}

/// The last-published value of `busy`. Returns `false` on an invalid id.
pub fn is_busy(id: u64) -> bool {
    queues()
        .with(id, |inner| inner.busy.load(Ordering::Acquire))
        .unwrap_or(false)
}

/// Submit a unit of work, returning its handle (`pool_index + 1`), or `0`
/// on an invalid queue id or pool-growth allocation failure (in which case
/// the pool is left unchanged).
pub fn submit<F>(id: u64, f: F) -> u64
where
    F: FnOnce() -> i64 + Send + 'static,
{
    submit_boxed(id, Box::new(f))
}

pub fn submit_boxed(id: u64, f: WorkFn) -> u64 {
    let inner = match queues().validate(id) {
        Some(inner) => inner,
        None => return 0,
    };
    let mut state = inner.state.lock().unwrap();
    let index = match state.pool.alloc(inner.max_concurrency) {
        Ok(index) => index,
        Err(e) => {
            log::warn!("submit: {e}");
            return 0;
        }
    };
    {
        let slot = &mut state.pool.slots[index];
        slot.in_use = true;
        slot.started = false;
        slot.completed = false;
        slot.function = Some(f);
        slot.result = 0;
        slot.semaphore = None;
    }
    state.pool.push_pending(index);
    inner.busy.store(true, Ordering::Release);
    drop(state);
    inner.dispatcher_sem.signal();
    (index as u64) + 1
}

/// Never blocks. `true` means completed, not-in-use, or the id/unit was
/// invalid: "unknown" folds into "completed" here.
pub fn poll(id: u64, unit: u64) -> bool {
    let inner = match queues().validate(id) {
        Some(inner) => inner,
        None => return true,
    };
    if unit == 0 {
        return true;
    }
    let index = (unit - 1) as usize;
    let state = inner.state.lock().unwrap();
    match state.pool.slots.get(index) {
        Some(slot) if slot.in_use => slot.completed,
        _ => true,
    }
}

/// Block until `unit` completes, then reap its slot and return its
/// result. Returns `0` on an invalid id/unit or an already-reaped unit,
/// the same sentinel a unit whose work function legitimately returned `0`
/// would produce; see DESIGN.md for why this ambiguity is kept rather
/// than papered over.
pub fn wait(id: u64, unit: u64) -> i64 {
    let inner = match queues().validate(id) {
        Some(inner) => inner,
        None => return 0,
    };
    if unit == 0 {
        return 0;
    }
    let index = (unit - 1) as usize;

    let mut state = inner.state.lock().unwrap();
    if let Some(result) = reap_if_done(&mut state.pool, index) {
        return result;
    }
    match state.pool.slots.get(index) {
        Some(slot) if slot.in_use => {}
        _ => return 0,
    }

    let sem = match Semaphore::new_empty() {
        Ok(sem) => {
            let sem = Arc::new(sem);
            state.pool.slots[index].semaphore = Some(sem.clone());
            Some(sem)
        }
        Err(e) => {
            log::warn!("wait: {e}, falling back to a busy-yield loop");
            None
        }
    };
    drop(state);

    loop {
        match &sem {
            Some(sem) => sem.wait(),
            None => thread::yield_now(),
        }
        let mut state = inner.state.lock().unwrap();
        match state.pool.slots.get(index) {
            None => return 0,
            Some(slot) if !slot.in_use => return 0,
            Some(slot) if slot.completed => {
                let result = slot.result;
                state.pool.slots[index].semaphore = None;
                state.pool.free(index);
                return result;
            }
            _ => {}
        }
    }
}

/// Reap `index` if it is `in_use && completed`, returning its result.
fn reap_if_done(pool: &mut Pool, index: usize) -> Option<i64> {
    match pool.slots.get(index) {
        Some(slot) if slot.in_use && slot.completed => {
            let result = slot.result;
            pool.free(index);
            Some(result)
        }
        _ => None,
    }
}

/// Cancel a unit that is still pending (not yet started). Returns `true`
/// if it was cancelled, `false` if it had already started, was already
/// reaped, or the id/unit was invalid.
pub fn cancel(id: u64, unit: u64) -> bool {
    let inner = match queues().validate(id) {
        Some(inner) => inner,
        None => return false,
    };
    if unit == 0 {
        return false;
    }
    let index = (unit - 1) as usize;
    let mut state = inner.state.lock().unwrap();
    match state.pool.slots.get(index) {
        Some(slot) if slot.in_use && !slot.started => {
            if state.pool.remove_pending(index) {
                state.pool.free(index);
                true
            } else {
                log::warn!(
                    "cancel: unit {unit} was pending-and-unstarted but not found on the pending list"
                );
                false
            }
        }
        _ => false,
    }
}

/// Block until the queue is idle (no pending units, no assigned units),
/// then reap every completed-and-unreaped slot. Never fails.
pub fn wait_all(id: u64) {
    let inner = match queues().validate(id) {
        Some(inner) => inner,
        None => return,
    };
    {
        let mut state = inner.state.lock().unwrap();
        state.send_idle_signal = true;
    }
    inner.dispatcher_sem.signal();
    inner.idle_sem.wait();
    let mut state = inner.state.lock().unwrap();
    state.pool.sweep_completed();
}

/// Number of unreaped, `in_use` slots. Used by tests to check for leaks.
#[cfg(test)]
pub(crate) fn live_unit_count(id: u64) -> usize {
    queues()
        .with(id, |inner| {
            let state = inner.state.lock().unwrap();
            state.pool.slots.iter().filter(|s| s.in_use).count()
        })
        .unwrap_or(0)
}

#[cfg(test)]
pub(crate) fn inject_growth_failure(id: u64) {
    queues().with(id, |inner| {
        inner.state.lock().unwrap().pool.fail_next_growth = true;
    });
}

/// An RAII handle around the raw `u64` queue id: `destroy` runs
/// automatically when this is dropped, on top of the same free functions
/// used directly elsewhere in this module.
pub struct WorkQueue {
    id: u64,
}

impl WorkQueue {
    /// Returns `None` under the same conditions `create` returns `0`.
    pub fn new(config: crate::config::QueueConfig) -> Option<Self> {
        let id = create(config.max_concurrency as i64);
        if id == 0 {
            None
        } else {
            Some(WorkQueue { id })
        }
    }

    pub fn is_busy(&self) -> bool {
        is_busy(self.id)
    }

    pub fn submit<F>(&self, f: F) -> u64
    where
        F: FnOnce() -> i64 + Send + 'static,
    {
        submit(self.id, f)
    }

    pub fn poll(&self, unit: u64) -> bool {
        poll(self.id, unit)
    }

    pub fn wait(&self, unit: u64) -> i64 {
        wait(self.id, unit)
    }

    pub fn cancel(&self, unit: u64) -> bool {
        cancel(self.id, unit)
    }

    pub fn wait_all(&self) {
        wait_all(self.id)
    }

    /// The raw handle, for interop with the free-function API or tests
    /// that want to exercise `id == 0` / already-destroyed behaviour.
    pub fn raw_id(&self) -> u64 {
        self.id
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        destroy(self.id);
    }
}
