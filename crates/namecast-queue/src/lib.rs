//! In-process job store and FIFO render queue.
//!
//! This crate provides:
//! - A job registry with snapshot reads and atomic record updates
//! - A FIFO queue of job ids that rejects duplicates and wakes the worker

pub mod error;
pub mod queue;
pub mod store;

pub use error::{QueueError, QueueResult};
pub use queue::JobQueue;
pub use store::JobStore;
