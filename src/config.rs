//! Construction-time configuration. No environment variables, no config
//! files: the core has no configuration surface of its own.
//! `QueueConfig` exists only to give [`crate::WorkQueue::new`] a named,
//! `Default`-able argument instead of a bare integer.

/// Configuration for a [`crate::WorkQueue`].
#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    pub max_concurrency: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig { max_concurrency: 4 }
    }
}

impl QueueConfig {
    pub fn new(max_concurrency: usize) -> Self {
        QueueConfig { max_concurrency }
    }
}
