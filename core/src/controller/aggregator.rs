//! Result aggregation from multiple workers

use std::time::Duration;

use crate::worker::WorkerStats;

/// End-of-run summary built from the workers' local statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Number of workers that were joined
    pub total_workers: usize,

    /// Jobs the feeder handed out
    pub jobs_emitted: u64,

    /// Successful attempts
    pub total_succeeded: usize,

    /// Failed attempts
    pub total_failed: usize,

    /// Attempts dropped because the run was cancelled
    pub total_abandoned: usize,

    /// Wall-clock duration of the run
    pub total_duration: Duration,

    /// Completed attempts per second
    pub requests_per_second: f64,
}

impl RunSummary {
    /// Attempts that produced a result (succeeded + failed)
    pub fn total_attempts(&self) -> usize {
        self.total_succeeded + self.total_failed
    }

    /// Get the success rate (0.0 - 1.0)
    pub fn success_rate(&self) -> f64 {
        let total = self.total_attempts();
        if total > 0 {
            self.total_succeeded as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Attach the feeder's emission count
    pub fn with_jobs_emitted(mut self, emitted: u64) -> Self {
        self.jobs_emitted = emitted;
        self
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} attempts ({} ok, {} failed) by {} workers in {:.2}s, {:.1} req/s",
            self.total_attempts(),
            self.total_succeeded,
            self.total_failed,
            self.total_workers,
            self.total_duration.as_secs_f64(),
            self.requests_per_second
        )
    }
}

/// Aggregate statistics from multiple workers
///
/// `elapsed` is the run's wall-clock time; the throughput is computed over
/// it rather than over any single worker's lifetime.
pub fn aggregate_worker_stats(stats: &[WorkerStats], elapsed: Duration) -> RunSummary {
    let total_succeeded: usize = stats.iter().map(|s| s.succeeded).sum();
    let total_failed: usize = stats.iter().map(|s| s.failed).sum();
    let total_abandoned: usize = stats.iter().map(|s| s.abandoned).sum();

    let secs = elapsed.as_secs_f64();
    let requests_per_second = if secs > 0.0 {
        (total_succeeded + total_failed) as f64 / secs
    } else {
        0.0
    };

    RunSummary {
        total_workers: stats.len(),
        jobs_emitted: 0,
        total_succeeded,
        total_failed,
        total_abandoned,
        total_duration: elapsed,
        requests_per_second,
    }
}
