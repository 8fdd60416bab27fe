//! The error taxonomy used internally for logging and for the handful of
//! operations that have a genuine local failure mode.
//!
//! None of this is threaded through the public work-queue API: `submit`,
//! `wait`, `cancel` and friends keep the sentinel-return contract their
//! callers are tested against (`0`/`false`/`None` on failure). `QueueError`
//! exists so that the *reason* for a sentinel return can still be logged
//! at the point of failure.

/// A condition the work queue or input subsystem recovered from locally.
///
/// Constructing one of these never aborts the process; it's either
/// logged and converted to a sentinel return, or (for `OutOfMemory` during
/// `wait`'s semaphore allocation) used to pick a degraded fallback path.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("invalid handle")]
    InvalidHandle,

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("allocation failed while growing the work-unit pool")]
    OutOfMemory,

    #[error("failed to create {0}")]
    PrimitiveCreationFailure(&'static str),
}

pub type Result<T> = std::result::Result<T, QueueError>;
