//! Drive-aware task queue for filecommander.
//!
//! [`TaskQueue`] accepts copy, move and delete [`Job`](filecommander_core::Job)s,
//! rejects ones that would collide with pending work, and runs the rest on a
//! background dispatch loop:
//!
//! - **Admission** is checked and recorded atomically per source path
//! - **Drive-pair lanes** run jobs on the same pair of storage roots one at
//!   a time, in the order drawn, while unrelated pairs run in parallel
//! - **Pause** stops new dispatch without touching running jobs
//! - **Cancellation** is cooperative through per-job tokens
//! - **Events** are broadcast to any number of subscribers
//!
//! [`execute_sync`] feeds a directory comparison into a queue.

mod error;
mod event;
mod lane;
mod queue;
mod sync;
mod tracking;

pub use error::{ConflictReason, QueueError};
pub use event::QueueEvent;
pub use queue::TaskQueue;
pub use sync::{SyncReport, execute_sync, execute_sync_with};
