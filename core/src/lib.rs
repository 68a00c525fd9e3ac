//! stress-bench-core: engine for concurrent endpoint load runs
//!
//! This crate provides the run engine used by the stress-bench binary:
//!
//! - Run configuration and validation
//! - A job feeder and a fixed-size worker pool connected by bounded queues
//! - A run controller owning the single run state (`start`, `stop`, `status`)
//! - Outbound log/status events and the built-in sinks
//! - The [`ProbeExecutor`] trait through which every attempt is made
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use stress_bench_core::{ControllerBuilder, RunConfig};
//!
//! let controller = ControllerBuilder::new().probe(Arc::new(probe)).build()?;
//! controller.start(RunConfig::new("http://localhost:8080").with_requests(1000))?;
//! controller.wait_idle().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod feeder;
pub mod state;
pub mod traits;
pub mod worker;

pub use channel::{ChannelConfig, Job, JobQueue, PushError};
pub use config::{ConfigError, ControllerConfig, RunConfig};
pub use controller::{Controller, ControllerBuilder, RunSummary};
pub use error::*;
pub use events::{BroadcastSink, Event, FanoutSink, TracingSink};
pub use state::{Budget, CancelHandle, Counters, StatusSnapshot};
pub use traits::*;

/// Re-exported so probe implementations share the engine's token type
pub use tokio_util::sync::CancellationToken;
