//! File operation executor for filecommander.
//!
//! The [`Executor`] performs exactly one job: a streaming copy, an atomic
//! rename, or a recursive delete. Work runs on tokio's blocking pool and
//! polls a [`CancellationToken`](tokio_util::sync::CancellationToken)
//! between files and directories (and between buffer chunks while
//! copying). Status text and percent progress flow to a [`ProgressSink`];
//! an `mpsc::UnboundedSender<ExecutorEvent>` works as a sink directly.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use filecommander_core::Job;
//! use filecommander_ops::{Executor, ExecutorEvent};
//! use tokio::sync::mpsc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() {
//! let (tx, mut rx) = mpsc::unbounded_channel::<ExecutorEvent>();
//! let executor = Executor::new(Arc::new(tx));
//!
//! let job = Job::copy("/tmp/src/doc.txt", "/tmp/dst/doc.txt");
//! let result = executor.execute(&job, &CancellationToken::new()).await;
//!
//! while let Ok(event) = rx.try_recv() {
//!     println!("{event:?}");
//! }
//! println!("{result:?}");
//! # }
//! ```

mod copy;
mod delete;
mod executor;
mod move_op;
mod progress;

pub use executor::{Executor, ExecutorOptions};
pub use progress::{ExecutorEvent, ProgressSink};
