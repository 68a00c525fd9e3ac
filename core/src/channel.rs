//! Job queue and channel configuration
//!
//! # Closing protocol
//!
//! - The job queue is multi-consumer: one feeder pushes, every worker pops.
//!   Exactly one owner, the run's shutdown coordinator, calls
//!   [`JobQueue::close`]. The feeder never closes it.
//! - After `close`, pushes fail and pops return `None`. Jobs still buffered
//!   at that point are discarded; they were never started.
//! - The results channel is a plain `mpsc` channel whose senders are owned by
//!   the workers alone, so it closes exactly when the last worker has exited.

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Channel buffer configuration for a run
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Job queue capacity (feeder -> workers); small values keep the feeder
    /// in lock-step with the workers
    pub job_buffer: usize,

    /// Results channel capacity (workers -> controller)
    pub result_buffer: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            job_buffer: 1,
            result_buffer: 1024,
        }
    }
}

impl ChannelConfig {
    /// Set the job queue capacity
    pub fn with_job_buffer(mut self, size: usize) -> Self {
        self.job_buffer = size;
        self
    }

    /// Set the results channel capacity
    pub fn with_result_buffer(mut self, size: usize) -> Self {
        self.result_buffer = size;
        self
    }
}

/// A single "perform one probe" signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Job {
    /// Zero-based emission order
    pub seq: u64,
}

/// Returned by [`JobQueue::push`] when the job was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    /// The queue has been closed
    #[error("job queue closed")]
    Closed,
    /// The caller's cancellation token fired first
    #[error("push cancelled")]
    Cancelled,
}

/// Bounded multi-consumer job queue with an explicit close
pub struct JobQueue {
    tx: mpsc::Sender<Job>,
    rx: Mutex<mpsc::Receiver<Job>>,
    closed: CancellationToken,
}

impl JobQueue {
    /// Create a queue holding at most `capacity` pending jobs (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Mutex::new(rx),
            closed: CancellationToken::new(),
        }
    }

    /// Push a job, waiting for room
    ///
    /// Never panics on a closed or draining queue; the failure is reported
    /// instead.
    pub async fn push(&self, job: Job, cancel: &CancellationToken) -> Result<(), PushError> {
        tokio::select! {
            biased;

            _ = self.closed.cancelled() => Err(PushError::Closed),
            _ = cancel.cancelled() => Err(PushError::Cancelled),
            sent = self.tx.send(job) => sent.map_err(|_| PushError::Closed),
        }
    }

    /// Pop the next job, or `None` once the queue is closed
    pub async fn pop(&self) -> Option<Job> {
        if self.closed.is_cancelled() {
            return None;
        }

        let mut rx = self.rx.lock().await;
        tokio::select! {
            biased;

            _ = self.closed.cancelled() => None,
            job = rx.recv() => job,
        }
    }

    /// Close the queue; idempotent
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Whether [`JobQueue::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("capacity", &self.tx.max_capacity())
            .field("closed", &self.is_closed())
            .finish()
    }
}
