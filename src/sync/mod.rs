//! The counting semaphore and mutex the core is built on.
//!
//! This is not a general-purpose concurrency library for arbitrary
//! backends; it simply needs *a* semaphore and *a* mutex. The mutex is
//! just `std::sync::Mutex`, so there's no wrapper module for it: queue
//! state lives directly behind one.

mod semaphore;

pub use semaphore::Semaphore;
