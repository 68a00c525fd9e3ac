//! Run controller
//!
//! The controller owns the single run state and drives one run at a time:
//! - Validating the config and flipping `Idle -> Running` under the state lock
//! - Spawning the feeder, the worker pool and a shutdown coordinator
//! - Counting results and publishing periodic status snapshots
//! - Joining everything and returning to `Idle` exactly once per run
//!
//! # Example
//!
//! ```ignore
//! use stress_bench_core::{ControllerBuilder, RunConfig};
//!
//! let controller = ControllerBuilder::new()
//!     .probe(probe)
//!     .sink(sink)
//!     .build()?;
//!
//! controller.start(RunConfig::new("http://localhost:8080").with_requests(100))?;
//! controller.wait_idle().await;
//! println!("{:?}", controller.status().stats);
//! ```

mod aggregator;
mod builder;
mod executor;

pub use aggregator::{aggregate_worker_stats, RunSummary};
pub use builder::ControllerBuilder;
pub use executor::Controller;
