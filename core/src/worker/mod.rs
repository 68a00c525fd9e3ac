//! Worker pool for executing probes
//!
//! Each worker is a tokio task running the loop:
//! **pop job -> probe -> classify -> push result -> delay -> repeat**.
//!
//! Workers share the run's [`JobQueue`](crate::channel::JobQueue), probe
//! executor and cancellation token, and each owns a clone of the results
//! sender. A worker exits when the job queue is closed, when the run is
//! cancelled, or when the results channel goes away.
//!
//! # Example
//!
//! ```ignore
//! use stress_bench_core::worker::{WorkerBuilder, WorkerPool};
//!
//! let worker = WorkerBuilder::new(0)
//!     .probe(probe)
//!     .request(config.probe_request())
//!     .jobs(queue)
//!     .results(results_tx)
//!     .cancel(token)
//!     .sink(sink)
//!     .build()?;
//!
//! let pool = WorkerPool::spawn(vec![worker]);
//! let stats = pool.join().await;
//! ```

mod builder;
mod executor;
mod pool;
mod stats;

pub use builder::WorkerBuilder;
pub use executor::{classify, Classification, Outcome, Worker};
pub use pool::WorkerPool;
pub use stats::{FailureLogGate, WorkerStats};
