use keyscope_core::TelemetrySink;
use serde_json::Value;
use std::sync::{Arc, Mutex};

use crate::mutex_lock;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub name: String,
    pub data: Value,
}

/// Sink that keeps every event for later assertions.
#[derive(Clone, Default)]
pub struct RecordingTelemetry {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        mutex_lock(&self.events).clone()
    }

    pub fn names(&self) -> Vec<String> {
        mutex_lock(&self.events)
            .iter()
            .map(|event| event.name.clone())
            .collect()
    }

    pub fn last(&self) -> Option<RecordedEvent> {
        mutex_lock(&self.events).last().cloned()
    }

    pub fn clear(&self) {
        mutex_lock(&self.events).clear();
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn emit(&self, event: &str, data: Value) {
        mutex_lock(&self.events).push(RecordedEvent {
            name: event.to_string(),
            data,
        });
    }
}
