//! Worker execution loop

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::channel::JobQueue;
use crate::events::Event;
use crate::traits::{EventSink, ProbeError, ProbeExecutor, ProbeRequest, ProbeStatus};

use super::stats::{FailureLogGate, WorkerStats};

/// One probe result, sent from a worker to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// Worker that produced the result
    pub worker_id: usize,
    /// Sequence number of the job
    pub seq: u64,
    /// Whether the attempt succeeded
    pub success: bool,
}

/// How a single attempt is accounted for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Counted as a success
    Success,
    /// Counted as a failure, with detail for diagnostics
    Failure(String),
    /// Aborted by cancellation; not counted at all
    Abandoned,
}

/// Classify a probe result
///
/// Errors are failures unless they stem from cancellation, either reported
/// as such by the executor or observed on the run's token.
pub fn classify(result: Result<ProbeStatus, ProbeError>, cancelled: bool) -> Classification {
    match result {
        Ok(ProbeStatus::Success) => Classification::Success,
        Ok(ProbeStatus::Failure { detail }) => Classification::Failure(detail),
        Err(e) if e.is_cancellation() || cancelled => Classification::Abandoned,
        Err(e) => Classification::Failure(e.to_string()),
    }
}

/// Worker pulls jobs and probes the target until told to stop
///
/// Workers are managed by the [`WorkerPool`](super::WorkerPool). They share
/// the probe executor and job queue via `Arc` and send outcomes through an
/// mpsc channel.
pub struct Worker {
    /// Unique worker identifier
    id: usize,

    /// Probe executor (shared across workers)
    probe: Arc<dyn ProbeExecutor>,

    /// The attempt to issue for every job
    request: ProbeRequest,

    /// Shared job queue
    jobs: Arc<JobQueue>,

    /// Results sender (one clone per worker)
    results: mpsc::Sender<Outcome>,

    /// Run cancellation token
    cancel: CancellationToken,

    /// Diagnostic event sink
    sink: Arc<dyn EventSink>,

    /// Pause after each attempt
    delay: Duration,

    /// Failure log throttle
    failure_log: FailureLogGate,
}

impl Worker {
    /// Create a new worker
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        probe: Arc<dyn ProbeExecutor>,
        request: ProbeRequest,
        jobs: Arc<JobQueue>,
        results: mpsc::Sender<Outcome>,
        cancel: CancellationToken,
        sink: Arc<dyn EventSink>,
        delay: Duration,
        failure_log: FailureLogGate,
    ) -> Self {
        Self {
            id,
            probe,
            request,
            jobs,
            results,
            cancel,
            sink,
            delay,
            failure_log,
        }
    }

    /// Run the worker loop
    ///
    /// Returns the worker's local statistics once it exits.
    pub async fn run(mut self) -> WorkerStats {
        let mut stats = WorkerStats::new(self.id);
        stats.start();

        tracing::debug!(worker_id = self.id, "Worker started");

        while let Some(job) = self.jobs.pop().await {
            if self.cancel.is_cancelled() {
                stats.record_abandoned();
                break;
            }

            let result = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => Err(ProbeError::Cancelled),
                result = self.probe.probe(&self.request, &self.cancel) => result,
            };

            let (success, failure) = match classify(result, self.cancel.is_cancelled()) {
                Classification::Abandoned => {
                    stats.record_abandoned();
                    break;
                }
                Classification::Success => (true, None),
                Classification::Failure(detail) => (false, Some(detail)),
            };

            let outcome = Outcome {
                worker_id: self.id,
                seq: job.seq,
                success,
            };

            let delivered = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => false,
                sent = self.results.send(outcome) => sent.is_ok(),
            };
            if !delivered {
                // Never counted by the controller, so not counted here either
                stats.record_abandoned();
                tracing::debug!(worker_id = self.id, "Results channel unavailable, worker stopping");
                break;
            }
            stats.record(success);
            stats.record_delivered();

            if let Some(detail) = failure {
                if self.failure_log.should_log() {
                    self.log_failure(&detail);
                }
            }

            if !self.delay.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.delay) => {}
                }
            }
        }

        stats.stop();
        tracing::debug!(
            worker_id = self.id,
            succeeded = stats.succeeded,
            failed = stats.failed,
            abandoned = stats.abandoned,
            elapsed_ms = ?stats.elapsed().map(|d| d.as_millis()),
            "Worker finished"
        );

        stats
    }

    fn log_failure(&self, detail: &str) {
        let message = format!(
            "ERROR (worker {}): probe {} {} failed: {}",
            self.id, self.request.method, self.request.target, detail
        );
        tracing::warn!(
            worker_id = self.id,
            failures = self.failure_log.seen(),
            %detail,
            "Probe failed"
        );
        self.sink.publish(Event::log(message));
    }

    /// Get the worker ID
    pub fn id(&self) -> usize {
        self.id
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("probe", &self.probe.name())
            .field("target", &self.request.target)
            .field("delay", &self.delay)
            .finish()
    }
}
