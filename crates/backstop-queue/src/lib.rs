//! Bounded-concurrency dispatch for backstop.
//!
//! A [`DispatchQueue`] admits at most `max_concurrent` jobs at a time and
//! parks the rest. Two disciplines share the same contract:
//!
//! - [`Discipline::Fifo`] - strict insertion order
//! - [`Discipline::Priority`] - four fixed tiers
//!   (critical > high > normal > low), FIFO within a tier
//!
//! Whenever a running job finishes, the queue immediately pulls from the
//! front of the highest non-empty tier until the budget is full again.
//! Raising `max_concurrent` at runtime drains the newly available budget
//! on the spot.
//!
//! Jobs are spawned as Tokio tasks, so the queue must be used from within
//! a Tokio runtime.
//!
//! ```
//! use backstop_queue::{Discipline, DispatchQueue, Priority};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let queue = DispatchQueue::new(Discipline::Fifo, 2);
//! queue.enqueue(Priority::Normal, async {
//!     // do the work
//! });
//! # }
//! ```

mod queue;

pub use queue::{Discipline, DispatchQueue, Priority};
