//! Builder pattern for Worker construction

use crate::channel::JobQueue;
use crate::error::{EngineError, EngineResult};
use crate::traits::{EventSink, ProbeExecutor, ProbeRequest};

use super::executor::{Outcome, Worker};
use super::stats::FailureLogGate;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Builder for creating Worker instances
///
/// Provides ergonomic construction with validation.
///
/// # Example
/// ```ignore
/// let worker = WorkerBuilder::new(0)
///     .probe(probe)
///     .request(config.probe_request())
///     .jobs(queue)
///     .results(results_tx)
///     .cancel(token)
///     .sink(sink)
///     .delay(config.delay())
///     .build()?;
/// ```
pub struct WorkerBuilder {
    id: usize,
    probe: Option<Arc<dyn ProbeExecutor>>,
    request: Option<ProbeRequest>,
    jobs: Option<Arc<JobQueue>>,
    results: Option<mpsc::Sender<Outcome>>,
    cancel: Option<CancellationToken>,
    sink: Option<Arc<dyn EventSink>>,
    delay: Duration,
    failure_log_every: u64,
}

impl WorkerBuilder {
    /// Create a new builder with the given worker ID
    pub fn new(id: usize) -> Self {
        Self {
            id,
            probe: None,
            request: None,
            jobs: None,
            results: None,
            cancel: None,
            sink: None,
            delay: Duration::ZERO,
            failure_log_every: 10,
        }
    }

    /// Set the probe executor
    pub fn probe(mut self, probe: Arc<dyn ProbeExecutor>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Set the request issued for every job
    pub fn request(mut self, request: ProbeRequest) -> Self {
        self.request = Some(request);
        self
    }

    /// Set the shared job queue
    pub fn jobs(mut self, jobs: Arc<JobQueue>) -> Self {
        self.jobs = Some(jobs);
        self
    }

    /// Set the results sender
    pub fn results(mut self, tx: mpsc::Sender<Outcome>) -> Self {
        self.results = Some(tx);
        self
    }

    /// Set the run cancellation token
    pub fn cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Set the diagnostic event sink
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set the inter-attempt delay
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Log one in every `every` failures
    pub fn failure_log_every(mut self, every: u64) -> Self {
        self.failure_log_every = every;
        self
    }

    /// Build the Worker
    ///
    /// # Errors
    /// Returns an error if any required field is missing.
    pub fn build(self) -> EngineResult<Worker> {
        let probe = self.probe.ok_or(EngineError::missing_config("probe"))?;
        let request = self.request.ok_or(EngineError::missing_config("request"))?;
        let jobs = self.jobs.ok_or(EngineError::missing_config("jobs"))?;
        let results = self.results.ok_or(EngineError::missing_config("results"))?;
        let cancel = self.cancel.ok_or(EngineError::missing_config("cancel"))?;
        let sink = self.sink.ok_or(EngineError::missing_config("sink"))?;

        Ok(Worker::new(
            self.id,
            probe,
            request,
            jobs,
            results,
            cancel,
            sink,
            self.delay,
            FailureLogGate::new(self.failure_log_every),
        ))
    }
}
