//! Run state, counters and status snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tokio_util::sync::CancellationToken;

use crate::config::RunConfig;

/// Marker used on the wire for an unbounded budget
pub const UNBOUNDED_MARKER: &str = "∞";

/// Total number of requests a run may issue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
    /// Run until stopped
    Unbounded,
    /// Run exactly this many requests
    Bounded(u64),
}

impl Budget {
    /// Map the `requests` config field to a budget (0 = unbounded)
    pub fn from_requests(requests: u64) -> Self {
        if requests == 0 {
            Budget::Unbounded
        } else {
            Budget::Bounded(requests)
        }
    }

    /// The bound, if any
    pub fn limit(&self) -> Option<u64> {
        match self {
            Budget::Unbounded => None,
            Budget::Bounded(n) => Some(*n),
        }
    }
}

impl Default for Budget {
    fn default() -> Self {
        Budget::Bounded(0)
    }
}

impl Serialize for Budget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Budget::Unbounded => serializer.serialize_str(UNBOUNDED_MARKER),
            Budget::Bounded(n) => serializer.serialize_u64(*n),
        }
    }
}

impl<'de> Deserialize<'de> for Budget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Count(u64),
            Marker(String),
        }

        match Wire::deserialize(deserializer)? {
            Wire::Count(n) => Ok(Budget::Bounded(n)),
            Wire::Marker(s) if s == UNBOUNDED_MARKER => Ok(Budget::Unbounded),
            Wire::Marker(s) => Err(serde::de::Error::custom(format!(
                "expected a request count or {UNBOUNDED_MARKER:?}, got {s:?}"
            ))),
        }
    }
}

/// Outcome counters of a run
///
/// `sent == success + failed` holds at every point; all three only grow
/// during a run and are reset when the next run starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    /// Request budget
    pub total: Budget,
    /// Attempts that produced a result
    pub sent: u64,
    /// Successful attempts
    pub success: u64,
    /// Failed attempts
    pub failed: u64,
}

impl Counters {
    /// Zeroed counters for a run with the given budget
    pub fn new(total: Budget) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// Whether a bounded budget has been used up
    pub fn is_complete(&self) -> bool {
        self.total.limit().is_some_and(|limit| self.sent >= limit)
    }

    /// Record one result
    ///
    /// Returns `false` (and records nothing) once a bounded budget is
    /// complete, so `sent` can never exceed `total`.
    pub fn record(&mut self, success: bool) -> bool {
        if self.is_complete() {
            return false;
        }
        self.sent += 1;
        if success {
            self.success += 1;
        } else {
            self.failed += 1;
        }
        true
    }

    /// Fraction of results that succeeded (0.0 - 1.0)
    pub fn success_rate(&self) -> f64 {
        if self.sent == 0 {
            0.0
        } else {
            self.success as f64 / self.sent as f64
        }
    }
}

/// Cooperative shutdown capability for one run
///
/// Cloning shares the same underlying token; cancelling any clone cancels
/// the run. Cancelling more than once is a no-op.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    /// Create a fresh, uncancelled handle
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Request shutdown
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has been requested
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The token handed to feeder, workers and probes
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the run state, safe to hand out without locking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Whether a run is in progress
    pub running: bool,
    /// Counters of the current (or most recent) run
    pub stats: Counters,
    /// Config of the run in progress, `None` when idle
    pub config: Option<RunConfig>,
    /// Wall-clock start of the run in progress
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

/// The controller's single mutable state object
///
/// Counters survive the return to idle so the last run's totals stay
/// visible until the next run starts.
///
/// Between [`RunState::finish`] and [`RunState::settle`] the run is over
/// (snapshots report `running = false`) but its final events are still being
/// published, and no new run may begin.
#[derive(Debug, Default)]
pub(crate) struct RunState {
    active: Option<ActiveRun>,
    draining: bool,
    counters: Counters,
}

#[derive(Debug)]
struct ActiveRun {
    config: RunConfig,
    cancel: CancelHandle,
    started_at: DateTime<Utc>,
}

impl RunState {
    pub(crate) fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Running, or finished with cleanup still in progress
    pub(crate) fn is_busy(&self) -> bool {
        self.active.is_some() || self.draining
    }

    /// Idle -> Running
    pub(crate) fn begin(&mut self, config: RunConfig, cancel: CancelHandle) {
        self.counters = Counters::new(config.budget());
        self.active = Some(ActiveRun {
            config,
            cancel,
            started_at: Utc::now(),
        });
    }

    /// Running -> finished; `start` stays rejected until `settle`
    pub(crate) fn finish(&mut self) {
        self.active = None;
        self.draining = true;
    }

    /// Cleanup done; a new run may begin
    pub(crate) fn settle(&mut self) {
        self.draining = false;
    }

    pub(crate) fn cancel_handle(&self) -> Option<&CancelHandle> {
        self.active.as_ref().map(|run| &run.cancel)
    }

    pub(crate) fn counters_mut(&mut self) -> &mut Counters {
        &mut self.counters
    }

    pub(crate) fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            running: self.is_running(),
            stats: self.counters,
            config: self.active.as_ref().map(|run| run.config.clone()),
            started_at: self.active.as_ref().map(|run| run.started_at),
        }
    }
}
