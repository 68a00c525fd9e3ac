//! Job feeder
//!
//! Emits one [`Job`] per permitted request onto the run's [`JobQueue`],
//! waiting for a free slot before each emission so the feeder never runs
//! ahead of the workers.

mod rate_limiter;

pub use rate_limiter::RequestRateLimiter;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::channel::{Job, JobQueue, PushError};
use crate::state::Budget;

/// Produces the job stream for one run
#[derive(Debug)]
pub struct Feeder {
    budget: Budget,
    limiter: RequestRateLimiter,
}

impl Feeder {
    /// Create a feeder for the given budget
    pub fn new(budget: Budget) -> Self {
        Self {
            budget,
            limiter: RequestRateLimiter::unlimited(),
        }
    }

    /// Pace emissions through a rate limiter
    pub fn with_rate_limiter(mut self, limiter: RequestRateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// Emit jobs until the budget is spent, the run is cancelled, or the
    /// queue is closed. Returns the number of jobs accepted by the queue.
    ///
    /// The feeder never closes the queue itself.
    pub async fn run(self, queue: Arc<JobQueue>, cancel: CancellationToken) -> u64 {
        let mut emitted = 0u64;

        loop {
            if self.budget.limit().is_some_and(|limit| emitted >= limit) {
                tracing::debug!(emitted, "Feeder exhausted budget");
                break;
            }

            if !self.limiter.acquire(&cancel).await {
                tracing::debug!(emitted, "Feeder cancelled while rate limited");
                break;
            }

            match queue.push(Job { seq: emitted }, &cancel).await {
                Ok(()) => emitted += 1,
                Err(PushError::Cancelled) => {
                    tracing::debug!(emitted, "Feeder cancelled");
                    break;
                }
                Err(PushError::Closed) => {
                    tracing::debug!(emitted, "Job queue closed under feeder");
                    break;
                }
            }
        }

        emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Drain `queue` until it has been idle for a short while
    async fn drain(queue: &JobQueue) -> Vec<u64> {
        let mut seen = Vec::new();
        while let Ok(Some(job)) = tokio::time::timeout(Duration::from_millis(50), queue.pop()).await
        {
            seen.push(job.seq);
        }
        seen
    }

    #[tokio::test]
    async fn test_bounded_feeder_emits_exact_budget() {
        let queue = Arc::new(JobQueue::new(1));
        let cancel = CancellationToken::new();

        let feeder = tokio::spawn(Feeder::new(Budget::Bounded(5)).run(queue.clone(), cancel));
        let seen = drain(&queue).await;

        assert_eq!(feeder.await.unwrap(), 5);
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert!(!queue.is_closed(), "feeder must not close the queue");
    }

    #[tokio::test]
    async fn test_unbounded_feeder_runs_until_cancelled() {
        let queue = Arc::new(JobQueue::new(1));
        let cancel = CancellationToken::new();

        let feeder = tokio::spawn(Feeder::new(Budget::Unbounded).run(queue.clone(), cancel.clone()));
        for _ in 0..25 {
            assert!(queue.pop().await.is_some());
        }
        cancel.cancel();

        let emitted = tokio::time::timeout(Duration::from_secs(1), feeder)
            .await
            .expect("feeder should stop on cancel")
            .unwrap();
        // 25 consumed, at most one more sitting in the buffer
        assert!((25..=26).contains(&emitted));
    }

    #[tokio::test]
    async fn test_cancelled_bounded_feeder_stops_early() {
        let queue = Arc::new(JobQueue::new(1));
        let cancel = CancellationToken::new();

        let feeder = tokio::spawn(Feeder::new(Budget::Bounded(100)).run(queue.clone(), cancel.clone()));
        queue.pop().await;
        queue.pop().await;
        cancel.cancel();

        let emitted = feeder.await.unwrap();
        assert!(emitted < 100);
        assert!(emitted >= 2);
    }

    #[tokio::test]
    async fn test_feeder_stops_when_queue_closed() {
        let queue = Arc::new(JobQueue::new(1));
        let cancel = CancellationToken::new();

        let feeder = tokio::spawn(Feeder::new(Budget::Unbounded).run(queue.clone(), cancel));
        queue.pop().await;
        queue.close();

        let emitted = tokio::time::timeout(Duration::from_secs(1), feeder)
            .await
            .expect("feeder should stop on close")
            .unwrap();
        assert!(emitted >= 1);
    }

    #[tokio::test]
    async fn test_feeder_with_rate_limit() {
        let queue = Arc::new(JobQueue::new(16));
        let cancel = CancellationToken::new();

        let feeder = Feeder::new(Budget::Bounded(3))
            .with_rate_limiter(RequestRateLimiter::new(Some(1000.0)));
        assert_eq!(feeder.run(queue.clone(), cancel).await, 3);
        assert_eq!(drain(&queue).await, vec![0, 1, 2]);
    }
}
