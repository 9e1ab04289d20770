//! Event store: append-only, time-queryable record of envelopes, results
//! and outbound messages, consumed read-only by the dashboard collaborator.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{
    CommandEnvelope, EventEnvelope, HandlerResult, Incoming, LifecycleOutcome, LifecycleResult,
};
use crate::listener::AutomationEventListener;
use crate::message::OutboundMessageEnvelope;

/// One point of a per-minute activity series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub count: usize,
}

/// Append-only store the dispatcher writes to. All queries are read-only
/// and time-windowed.
pub trait EventStore: Send + Sync {
    fn record_command(&self, envelope: &CommandEnvelope);
    fn record_event(&self, envelope: &EventEnvelope);
    fn record_message(&self, envelope: &OutboundMessageEnvelope);
    fn record_result(&self, result: &LifecycleResult);

    /// Commands received at or after `from`.
    fn commands(&self, from: DateTime<Utc>) -> Vec<CommandEnvelope>;
    /// Events received at or after `from`.
    fn events(&self, from: DateTime<Utc>) -> Vec<EventEnvelope>;
    /// Messages sent at or after `from`.
    fn messages(&self, from: DateTime<Utc>) -> Vec<OutboundMessageEnvelope>;

    /// Per-minute command volume.
    fn command_series(&self) -> Vec<SeriesPoint>;
    /// Per-minute event volume.
    fn event_series(&self) -> Vec<SeriesPoint>;
}

#[derive(Default)]
struct StoreInner {
    commands: Vec<(DateTime<Utc>, CommandEnvelope)>,
    events: Vec<(DateTime<Utc>, EventEnvelope)>,
    messages: Vec<(DateTime<Utc>, OutboundMessageEnvelope)>,
    results: Vec<(DateTime<Utc>, LifecycleResult)>,
}

/// Reference in-memory implementation backing tests and the demo binary.
#[derive(Default)]
pub struct InMemoryEventStore {
    inner: Mutex<StoreInner>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<LifecycleResult> {
        let inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.results.iter().map(|(_, r)| r.clone()).collect()
    }
}

fn series_of<T>(records: &[(DateTime<Utc>, T)]) -> Vec<SeriesPoint> {
    let mut points: Vec<SeriesPoint> = Vec::new();
    for (timestamp, _) in records {
        let bucket = timestamp
            .duration_trunc(Duration::minutes(1))
            .unwrap_or(*timestamp);
        match points.last_mut() {
            Some(last) if last.timestamp == bucket => last.count += 1,
            _ => points.push(SeriesPoint {
                timestamp: bucket,
                count: 1,
            }),
        }
    }
    points
}

impl EventStore for InMemoryEventStore {
    fn record_command(&self, envelope: &CommandEnvelope) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.commands.push((Utc::now(), envelope.clone()));
    }

    fn record_event(&self, envelope: &EventEnvelope) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.events.push((Utc::now(), envelope.clone()));
    }

    fn record_message(&self, envelope: &OutboundMessageEnvelope) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.messages.push((Utc::now(), envelope.clone()));
    }

    fn record_result(&self, result: &LifecycleResult) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.results.push((Utc::now(), result.clone()));
    }

    fn commands(&self, from: DateTime<Utc>) -> Vec<CommandEnvelope> {
        let inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inner
            .commands
            .iter()
            .filter(|(at, _)| *at >= from)
            .map(|(_, e)| e.clone())
            .collect()
    }

    fn events(&self, from: DateTime<Utc>) -> Vec<EventEnvelope> {
        let inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inner
            .events
            .iter()
            .filter(|(at, _)| *at >= from)
            .map(|(_, e)| e.clone())
            .collect()
    }

    fn messages(&self, from: DateTime<Utc>) -> Vec<OutboundMessageEnvelope> {
        let inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inner
            .messages
            .iter()
            .filter(|(at, _)| *at >= from)
            .map(|(_, e)| e.clone())
            .collect()
    }

    fn command_series(&self) -> Vec<SeriesPoint> {
        let inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        series_of(&inner.commands)
    }

    fn event_series(&self) -> Vec<SeriesPoint> {
        let inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        series_of(&inner.events)
    }
}

/// Adapter feeding the event store from the listener bus, so every
/// lifecycle transition leaves an audit record.
pub struct StoreListener {
    store: Arc<dyn EventStore>,
}

impl StoreListener {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }
}

impl AutomationEventListener for StoreListener {
    fn command_starting(&self, envelope: &CommandEnvelope) {
        self.store.record_command(envelope);
    }

    fn command_successful(&self, envelope: &CommandEnvelope, result: &HandlerResult) {
        self.store.record_result(&LifecycleResult {
            envelope: Incoming::Command(envelope.clone()),
            outcome: LifecycleOutcome::Succeeded {
                result: result.clone(),
            },
        });
    }

    fn command_failed(&self, envelope: &CommandEnvelope, error: &str) {
        self.store.record_result(&LifecycleResult {
            envelope: Incoming::Command(envelope.clone()),
            outcome: LifecycleOutcome::Failed {
                error: error.to_string(),
            },
        });
    }

    fn event_starting(&self, envelope: &EventEnvelope) {
        self.store.record_event(envelope);
    }

    fn event_successful(&self, envelope: &EventEnvelope, result: &HandlerResult) {
        self.store.record_result(&LifecycleResult {
            envelope: Incoming::Event(envelope.clone()),
            outcome: LifecycleOutcome::Succeeded {
                result: result.clone(),
            },
        });
    }

    fn event_failed(&self, envelope: &EventEnvelope, error: &str) {
        self.store.record_result(&LifecycleResult {
            envelope: Incoming::Event(envelope.clone()),
            outcome: LifecycleOutcome::Failed {
                error: error.to_string(),
            },
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_window_excludes_older_records() {
        let store = InMemoryEventStore::new();
        store.record_command(&CommandEnvelope::new("HelloWorld", "T1"));

        assert_eq!(store.commands(Utc::now() - Duration::minutes(1)).len(), 1);
        assert_eq!(store.commands(Utc::now() + Duration::minutes(1)).len(), 0);
    }

    #[test]
    fn series_buckets_by_minute() {
        let store = InMemoryEventStore::new();
        store.record_command(&CommandEnvelope::new("HelloWorld", "T1"));
        store.record_command(&CommandEnvelope::new("HelloWorld", "T1"));

        let series = store.command_series();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].count, 2);
    }
}
