//! Typed error type for the queue crate.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The worker pool was shut down while a task waited for a slot.
    #[error("worker pool is closed")]
    PoolClosed,

    /// The receiving side of a completion queue is gone.
    #[error("completion queue receiver dropped")]
    ReceiverDropped,
}
