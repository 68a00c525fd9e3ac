//! Controller execution logic

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::channel::JobQueue;
use crate::config::{ControllerConfig, RunConfig};
use crate::error::ControlError;
use crate::events::Event;
use crate::feeder::{Feeder, RequestRateLimiter};
use crate::state::{CancelHandle, RunState, StatusSnapshot};
use crate::traits::{EventSink, ProbeExecutor};
use crate::worker::{Outcome, Worker, WorkerBuilder, WorkerPool, WorkerStats};

use super::aggregator::aggregate_worker_stats;

/// Smallest tick accepted by the status ticker
const MIN_STATUS_INTERVAL: Duration = Duration::from_millis(1);

/// Controller manages the run lifecycle
///
/// Cheap to clone; all clones drive the same state. Use
/// [`ControllerBuilder`](super::ControllerBuilder) to construct one.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<Shared>,
}

struct Shared {
    /// The only mutable run state; never held across an await
    state: Mutex<RunState>,

    /// Probe executor (shared across workers)
    probe: Arc<dyn ProbeExecutor>,

    /// Outbound event sink
    sink: Arc<dyn EventSink>,

    /// Engine tunables
    settings: ControllerConfig,

    /// `true` from `start` until the final events of the run are out
    running: watch::Sender<bool>,

    /// Runtime that hosts the run tasks
    runtime: Handle,
}

impl Controller {
    pub(crate) fn new(
        probe: Arc<dyn ProbeExecutor>,
        sink: Arc<dyn EventSink>,
        settings: ControllerConfig,
        runtime: Handle,
    ) -> Self {
        let (running, _) = watch::channel(false);
        Self {
            inner: Arc::new(Shared {
                state: Mutex::new(RunState::default()),
                probe,
                sink,
                settings,
                running,
                runtime,
            }),
        }
    }

    /// Start a run
    ///
    /// Returns as soon as the run has been launched; the run proceeds in the
    /// background until its budget is spent or [`Controller::stop`] is called.
    ///
    /// # Errors
    ///
    /// - [`ControlError::AlreadyRunning`] while a run is in progress or
    ///   still draining
    /// - [`ControlError::InvalidConfig`] if `config` fails validation; no
    ///   state is changed in that case
    pub fn start(&self, config: RunConfig) -> Result<(), ControlError> {
        let cancel = CancelHandle::new();

        let snapshot = {
            let mut state = self.inner.state.lock();
            if state.is_busy() {
                return Err(ControlError::AlreadyRunning);
            }
            config.validate()?;

            state.begin(config.clone(), cancel.clone());
            self.inner.running.send_replace(true);
            state.snapshot()
        };

        tracing::info!(
            url = %config.url,
            method = %config.method,
            threads = config.threads,
            requests = ?snapshot.stats.total,
            rate_limit = ?config.rate_limit,
            probe = self.inner.probe.name(),
            "Starting run"
        );
        self.inner.sink.publish(Event::log(format!(
            "INFO: starting run against {} with {} threads",
            config.url, config.threads
        )));
        self.inner.sink.publish(Event::Status(snapshot));

        let shared = Arc::clone(&self.inner);
        self.inner.runtime.spawn(drive(shared, config, cancel));

        Ok(())
    }

    /// Ask the running run to stop
    ///
    /// Returns before the workers have drained; use
    /// [`Controller::wait_idle`] to wait for the return to idle.
    ///
    /// # Errors
    ///
    /// [`ControlError::NotRunning`] when idle, or when this run has already
    /// been told to stop (by a previous call or by reaching its budget).
    pub fn stop(&self) -> Result<(), ControlError> {
        {
            let state = self.inner.state.lock();
            match state.cancel_handle() {
                Some(cancel) if !cancel.is_cancelled() => cancel.cancel(),
                _ => return Err(ControlError::NotRunning),
            }
        }

        tracing::info!("Stop requested");
        self.inner
            .sink
            .publish(Event::log("INFO: stop requested, draining workers"));
        Ok(())
    }

    /// Consistent copy of the current run state
    pub fn status(&self) -> StatusSnapshot {
        self.inner.state.lock().snapshot()
    }

    /// Whether a run is in progress (including draining and cleanup)
    pub fn is_running(&self) -> bool {
        self.inner.state.lock().is_busy()
    }

    /// Wait until no run is in progress
    ///
    /// Resolves after the final status event of the current run has been
    /// published; resolves immediately when already idle.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.running.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(|running| !*running).await;
    }

    /// Name of the configured probe executor
    pub fn probe_name(&self) -> &str {
        self.inner.probe.name()
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("probe", &self.inner.probe.name())
            .field("settings", &self.inner.settings)
            .field("running", &self.is_running())
            .finish()
    }
}

fn build_workers(
    shared: &Shared,
    config: &RunConfig,
    queue: &Arc<JobQueue>,
    results: &mpsc::Sender<Outcome>,
    cancel: &CancelHandle,
) -> crate::error::EngineResult<Vec<Worker>> {
    let request = config.probe_request();
    (0..config.threads)
        .map(|worker_id| {
            WorkerBuilder::new(worker_id)
                .probe(Arc::clone(&shared.probe))
                .request(request.clone())
                .jobs(Arc::clone(queue))
                .results(results.clone())
                .cancel(cancel.token().clone())
                .sink(Arc::clone(&shared.sink))
                .delay(config.delay())
                .failure_log_every(shared.settings.failure_log_every)
                .build()
        })
        .collect()
}

/// One run, from launch to the return to idle
async fn drive(shared: Arc<Shared>, config: RunConfig, cancel: CancelHandle) {
    let started = Instant::now();
    let token = cancel.token().clone();
    let channels = &shared.settings.channels;

    let queue = Arc::new(JobQueue::new(channels.job_buffer));
    let (results_tx, mut results_rx) = mpsc::channel(channels.result_buffer.max(1));

    let workers = match build_workers(&shared, &config, &queue, &results_tx, &cancel) {
        Ok(workers) => workers,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build workers");
            shared
                .sink
                .publish(Event::log(format!("ERROR: failed to build workers: {e}")));
            cancel.cancel();
            Vec::new()
        }
    };
    // Workers now own every results sender
    drop(results_tx);

    let pool = WorkerPool::spawn(workers);
    tracing::debug!(workers = pool.size(), "Worker pool started");

    let feeder = tokio::spawn(
        Feeder::new(config.budget())
            .with_rate_limiter(RequestRateLimiter::new(config.rate_limit))
            .run(Arc::clone(&queue), token.clone()),
    );

    // Sole owner of the job queue's close
    let coordinator = tokio::spawn({
        let queue = Arc::clone(&queue);
        let token = token.clone();
        async move {
            token.cancelled().await;
            queue.close();
            pool.join().await
        }
    });

    let interval = shared.settings.status_interval.max(MIN_STATUS_INTERVAL);
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = ticker.tick() => {
                let snapshot = shared.state.lock().snapshot();
                shared.sink.publish(Event::Status(snapshot));
            }
            outcome = results_rx.recv() => {
                let Some(outcome) = outcome else {
                    break;
                };
                record_outcome(&shared, &cancel, outcome);
            }
        }
    }

    // Results closed: every worker is gone. Make sure the feeder and the
    // coordinator are released too.
    cancel.cancel();

    let worker_stats: Vec<WorkerStats> = match coordinator.await {
        Ok(stats) => stats,
        Err(e) => {
            tracing::error!(error = %e, "Shutdown coordinator failed");
            Vec::new()
        }
    };
    let emitted = match feeder.await {
        Ok(emitted) => emitted,
        Err(e) => {
            tracing::error!(error = %e, "Feeder task failed");
            0
        }
    };

    let summary = aggregate_worker_stats(&worker_stats, started.elapsed()).with_jobs_emitted(emitted);

    let snapshot = {
        let mut state = shared.state.lock();
        state.finish();
        state.snapshot()
    };

    tracing::info!(
        sent = snapshot.stats.sent,
        success = snapshot.stats.success,
        failed = snapshot.stats.failed,
        abandoned = summary.total_abandoned,
        jobs_emitted = summary.jobs_emitted,
        elapsed_secs = summary.total_duration.as_secs_f64(),
        rps = summary.requests_per_second,
        "Run stopped"
    );
    shared.sink.publish(Event::log("INFO: run stopped"));
    shared
        .sink
        .publish(Event::log(format!("INFO: run summary: {summary}")));
    shared.sink.publish(Event::Status(snapshot));

    // Only now may the next run begin
    let mut state = shared.state.lock();
    state.settle();
    shared.running.send_replace(false);
}

/// Count one result; cancels the run when a bounded budget is used up
fn record_outcome(shared: &Shared, cancel: &CancelHandle, outcome: Outcome) {
    let (recorded, complete) = {
        let mut state = shared.state.lock();
        let counters = state.counters_mut();
        let recorded = counters.record(outcome.success);
        (recorded, counters.is_complete())
    };

    if !recorded {
        tracing::trace!(
            worker_id = outcome.worker_id,
            seq = outcome.seq,
            "Result past budget ignored"
        );
        return;
    }

    if complete {
        tracing::info!("Request budget reached");
        shared
            .sink
            .publish(Event::log("INFO: request budget reached, run complete"));
        cancel.cancel();
    }
}
