//! Worker statistics and failure-log throttling

use std::time::{Duration, Instant};

/// Statistics tracked locally by each worker
#[derive(Debug, Default, Clone)]
pub struct WorkerStats {
    /// Worker identifier
    pub worker_id: usize,

    /// Attempts whose result reached the controller
    pub delivered: usize,

    /// Successful attempts whose result was delivered
    pub succeeded: usize,

    /// Failed attempts whose result was delivered
    pub failed: usize,

    /// Attempts dropped because the run was cancelled
    pub abandoned: usize,

    /// Worker start time
    pub started_at: Option<Instant>,

    /// Worker end time
    pub ended_at: Option<Instant>,
}

impl WorkerStats {
    /// Create new empty stats for a worker
    pub fn new(worker_id: usize) -> Self {
        Self {
            worker_id,
            ..Default::default()
        }
    }

    /// Start tracking (records start time)
    pub fn start(&mut self) {
        self.started_at = Some(Instant::now());
    }

    /// Stop tracking (records end time)
    pub fn stop(&mut self) {
        self.ended_at = Some(Instant::now());
    }

    /// Attempts that completed with an outcome
    pub fn attempts(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Record a completed attempt
    pub fn record(&mut self, success: bool) {
        if success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    /// Record that a result was accepted by the results channel
    pub fn record_delivered(&mut self) {
        self.delivered += 1;
    }

    /// Record an attempt dropped due to cancellation
    pub fn record_abandoned(&mut self) {
        self.abandoned += 1;
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|start| {
            self.ended_at
                .map(|end| end.duration_since(start))
                .unwrap_or_else(|| start.elapsed())
        })
    }
}

/// Decides which failures get a diagnostic log line
///
/// Fires on the 1st failure and then on every `every`-th one after it, so
/// a failure storm yields one line per `every` failures.
#[derive(Debug, Clone)]
pub struct FailureLogGate {
    every: u64,
    seen: u64,
}

impl FailureLogGate {
    /// Create a gate; an `every` of 0 is treated as 1 (log all)
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            seen: 0,
        }
    }

    /// Count one failure and report whether it should be logged
    pub fn should_log(&mut self) -> bool {
        let fire = self.seen % self.every == 0;
        self.seen += 1;
        fire
    }

    /// Failures counted so far
    pub fn seen(&self) -> u64 {
        self.seen
    }
}

impl Default for FailureLogGate {
    fn default() -> Self {
        Self::new(10)
    }
}
