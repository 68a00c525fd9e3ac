//! Worker pool spawning and joining

use tokio::task::JoinHandle;

use super::executor::Worker;
use super::stats::WorkerStats;

/// A set of running worker tasks
///
/// Joining the pool is how the run's shutdown coordinator learns that every
/// worker has exited, and therefore that every results sender is gone.
#[derive(Debug)]
pub struct WorkerPool {
    handles: Vec<(usize, JoinHandle<WorkerStats>)>,
}

impl WorkerPool {
    /// Spawn each worker as its own tokio task
    pub fn spawn(workers: Vec<Worker>) -> Self {
        let handles = workers
            .into_iter()
            .map(|worker| (worker.id(), tokio::spawn(worker.run())))
            .collect();
        Self { handles }
    }

    /// Number of workers in the pool
    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker to exit
    ///
    /// A worker that panicked is logged and skipped; the others are still
    /// joined.
    pub async fn join(self) -> Vec<WorkerStats> {
        let mut results = Vec::with_capacity(self.handles.len());
        for (worker_id, handle) in self.handles {
            match handle.await {
                Ok(stats) => {
                    tracing::debug!(
                        worker_id,
                        succeeded = stats.succeeded,
                        failed = stats.failed,
                        abandoned = stats.abandoned,
                        "Worker joined"
                    );
                    results.push(stats);
                }
                Err(e) => {
                    tracing::error!(worker_id, error = %e, "Worker task panicked");
                }
            }
        }
        results
    }
}
