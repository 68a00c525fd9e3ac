//! Core traits for probe executors and event sinks
//!
//! These are the two seams the engine talks through. Concrete probe
//! implementations live in `stress-bench-probes`; sinks live in
//! [`crate::events`].

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::events::Event;

// ============================================================================
// Probe Executor Trait
// ============================================================================

/// One request attempt, as issued by every worker of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    /// Target URL
    pub target: String,

    /// HTTP method
    pub method: String,

    /// User-Agent header value
    pub user_agent: String,

    /// Per-attempt deadline, `None` for no deadline
    pub timeout: Option<Duration>,
}

/// Outcome of an attempt that ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    /// The target answered the way the executor considers successful
    Success,

    /// The attempt completed but did not succeed
    Failure {
        /// Human-readable detail, used for diagnostic logging
        detail: String,
    },
}

impl ProbeStatus {
    /// Build a failure with the given detail
    pub fn failure(detail: impl Into<String>) -> Self {
        Self::Failure {
            detail: detail.into(),
        }
    }

    /// Whether this is [`ProbeStatus::Success`]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Errors a probe executor may return
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The attempt was abandoned because the run is being cancelled
    #[error("probe cancelled")]
    Cancelled,

    /// The per-attempt deadline elapsed
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    /// Connection, protocol or other transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// The executor could not be started (e.g. missing binary)
    #[error("failed to launch probe: {0}")]
    Launch(#[from] std::io::Error),
}

impl ProbeError {
    /// Whether this error only reflects run cancellation
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Performs one request attempt against a target
///
/// Implementations must observe `cancel` and return promptly (typically
/// with [`ProbeError::Cancelled`]) once it fires. Any implementation
/// satisfying this contract is substitutable: native HTTP, an external
/// process, or a mock.
#[async_trait]
pub trait ProbeExecutor: Send + Sync {
    /// Executor identifier (e.g. "http", "curl")
    fn name(&self) -> &str;

    /// Perform a single attempt
    async fn probe(
        &self,
        request: &ProbeRequest,
        cancel: &CancellationToken,
    ) -> Result<ProbeStatus, ProbeError>;
}

// ============================================================================
// Event Sink Trait
// ============================================================================

/// Receives engine events for delivery to observers
///
/// `publish` is called from engine tasks and must not block; sinks that
/// need I/O should hand the event off (e.g. to a channel).
pub trait EventSink: Send + Sync {
    /// Deliver one event
    fn publish(&self, event: Event);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_status_helpers() {
        assert!(ProbeStatus::Success.is_success());
        let failure = ProbeStatus::failure("HTTP 503");
        assert!(!failure.is_success());
        assert_eq!(
            failure,
            ProbeStatus::Failure {
                detail: "HTTP 503".into()
            }
        );
    }

    #[test]
    fn test_probe_error_cancellation() {
        assert!(ProbeError::Cancelled.is_cancellation());
        assert!(!ProbeError::Timeout(Duration::from_secs(1)).is_cancellation());
        assert!(!ProbeError::Transport("reset".into()).is_cancellation());
    }

    #[test]
    fn test_probe_error_display() {
        let err = ProbeError::Timeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "probe timed out after 5s");
        let err: ProbeError = std::io::Error::new(std::io::ErrorKind::NotFound, "curl").into();
        assert!(err.to_string().starts_with("failed to launch probe"));
    }
}
