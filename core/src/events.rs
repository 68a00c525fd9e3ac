//! Outbound events and the built-in sinks
//!
//! The engine emits two kinds of events: free-text `log` lines and `status`
//! snapshots. On the wire they are `{"type": "log" | "status", "payload": ...}`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::state::StatusSnapshot;
use crate::traits::EventSink;

/// An event published by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum Event {
    /// Diagnostic line
    Log(String),
    /// Status snapshot
    Status(StatusSnapshot),
}

impl Event {
    /// Build a log event
    pub fn log(message: impl Into<String>) -> Self {
        Self::Log(message.into())
    }

    /// Serialize to a single JSON line
    pub fn to_json(&self) -> String {
        // Only plain strings, integers and timestamps are serialized here
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Mirrors events into `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, event: Event) {
        match event {
            Event::Log(message) => tracing::info!(target: "stress_bench::events", "{message}"),
            Event::Status(snapshot) => tracing::debug!(
                target: "stress_bench::events",
                running = snapshot.running,
                sent = snapshot.stats.sent,
                success = snapshot.stats.success,
                failed = snapshot.stats.failed,
                "status"
            ),
        }
    }
}

/// Fans events out to any number of subscribers over a broadcast channel
///
/// Slow subscribers lag and lose old events rather than stalling the engine.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<Event>,
}

impl BroadcastSink {
    /// Create a sink buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to future events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventSink for BroadcastSink {
    fn publish(&self, event: Event) {
        // No subscribers is fine
        let _ = self.tx.send(event);
    }
}

/// Publishes every event to each inner sink in order
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    /// Create an empty fan-out
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Number of inner sinks
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether there are no inner sinks
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for FanoutSink {
    fn publish(&self, event: Event) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.publish(event.clone());
            }
            last.publish(event);
        }
    }
}

impl std::fmt::Debug for FanoutSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Budget, Counters};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Event>>);

    impl EventSink for Recorder {
        fn publish(&self, event: Event) {
            self.0.lock().push(event);
        }
    }

    fn idle_snapshot() -> StatusSnapshot {
        StatusSnapshot {
            running: false,
            stats: Counters::new(Budget::Unbounded),
            config: None,
            started_at: None,
        }
    }

    #[test]
    fn test_log_event_json_format() {
        let json = Event::log("INFO: hello").to_json();
        assert_eq!(json, r#"{"type":"log","payload":"INFO: hello"}"#);
    }

    #[test]
    fn test_status_event_json_format() {
        let value = serde_json::to_value(Event::Status(idle_snapshot())).unwrap();
        assert_eq!(value["type"], "status");
        assert_eq!(value["payload"]["running"], false);
        assert_eq!(value["payload"]["stats"]["total"], "∞");
        assert!(value["payload"]["config"].is_null());
        assert!(value["payload"].get("startedAt").is_none());
    }

    #[test]
    fn test_event_roundtrip() {
        let event = Event::Status(idle_snapshot());
        let parsed: Event = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(parsed, event);
    }

    #[tokio::test]
    async fn test_broadcast_sink_delivers_to_subscribers() {
        let sink = BroadcastSink::new(8);
        let mut rx1 = sink.subscribe();
        let mut rx2 = sink.subscribe();
        assert_eq!(sink.subscriber_count(), 2);

        sink.publish(Event::log("one"));

        assert_eq!(rx1.recv().await.unwrap(), Event::log("one"));
        assert_eq!(rx2.recv().await.unwrap(), Event::log("one"));
    }

    #[test]
    fn test_broadcast_sink_without_subscribers() {
        let sink = BroadcastSink::default();
        sink.publish(Event::log("dropped"));
        assert_eq!(sink.subscriber_count(), 0);
    }

    #[test]
    fn test_fanout_sink() {
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        let fanout = FanoutSink::new().with(a.clone()).with(b.clone());
        assert_eq!(fanout.len(), 2);

        fanout.publish(Event::log("x"));
        fanout.publish(Event::log("y"));

        assert_eq!(a.0.lock().len(), 2);
        assert_eq!(b.0.lock().as_slice(), &[Event::log("x"), Event::log("y")]);
    }

    #[test]
    fn test_fanout_sink_empty() {
        let fanout = FanoutSink::new();
        assert!(fanout.is_empty());
        fanout.publish(Event::log("nowhere"));
    }
}
