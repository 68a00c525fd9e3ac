//! Builder pattern for Controller construction

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::config::ControllerConfig;
use crate::error::{EngineError, EngineResult};
use crate::events::TracingSink;
use crate::traits::{EventSink, ProbeExecutor};

use super::executor::Controller;

/// Builder for creating a Controller
///
/// # Example
///
/// ```ignore
/// let controller = ControllerBuilder::new()
///     .probe(Arc::new(CurlProbe::new()))
///     .sink(Arc::new(BroadcastSink::default()))
///     .status_interval(Duration::from_millis(250))
///     .build()?;
/// ```
pub struct ControllerBuilder {
    probe: Option<Arc<dyn ProbeExecutor>>,
    sink: Option<Arc<dyn EventSink>>,
    settings: ControllerConfig,
    runtime: Option<Handle>,
}

impl ControllerBuilder {
    /// Create a new controller builder with default settings
    pub fn new() -> Self {
        Self {
            probe: None,
            sink: None,
            settings: ControllerConfig::default(),
            runtime: None,
        }
    }

    /// Set the probe executor (required)
    pub fn probe(mut self, probe: Arc<dyn ProbeExecutor>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Set the event sink; defaults to [`TracingSink`]
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Replace all engine tunables
    pub fn settings(mut self, settings: ControllerConfig) -> Self {
        self.settings = settings;
        self
    }

    /// Set the periodic status interval
    pub fn status_interval(mut self, interval: std::time::Duration) -> Self {
        self.settings = self.settings.with_status_interval(interval);
        self
    }

    /// Run tasks on this runtime instead of the current one
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Build the controller
    ///
    /// # Errors
    ///
    /// Returns an error if no probe executor is set, or if no runtime was
    /// given and the builder is not called from within a Tokio runtime.
    pub fn build(self) -> EngineResult<Controller> {
        let probe = self
            .probe
            .ok_or_else(|| EngineError::missing_config("probe"))?;

        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingSink));

        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|e| EngineError::NoRuntime(e.to_string()))?,
        };

        Ok(Controller::new(probe, sink, self.settings, runtime))
    }
}

impl Default for ControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
