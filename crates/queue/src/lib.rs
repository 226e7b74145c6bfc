//! `queue` crate — process-wide scheduling primitives used by the engine.
//!
//! - [`WorkerPool`] bounds how many node executions run at once across
//!   every workflow execution in the process.
//! - [`CompletionQueue`] carries finished node results back to the
//!   dispatch loop that owns an execution.
//! - [`TimerWheel`] holds deadlines (retry back-off, `delay` wake-ups)
//!   owned by the scheduler instead of sleeping inside node tasks.

pub mod completion;
pub mod error;
pub mod pool;
pub mod timer;

pub use completion::{CompletionQueue, CompletionSender};
pub use error::QueueError;
pub use pool::WorkerPool;
pub use timer::TimerWheel;
