use serde_json::{Value, json};

use crate::config::ViewType;
use crate::context::BrowserContext;

/// Fire-and-forget sink for usage events. Nothing reads a result back.
pub trait TelemetrySink: Send + Sync {
    fn emit(&self, event: &str, data: Value);
}

/// Reports events through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTelemetry;

impl TelemetrySink for LogTelemetry {
    fn emit(&self, event: &str, data: Value) {
        log::info!("[TELEMETRY] {} {}", event, data);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn emit(&self, _event: &str, _data: Value) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryEvent {
    KeyValueRemoved,
    KeyValueRemoveClicked,
    KeyValueFiltered,
    KeyFieldValueExpanded,
    KeyFieldValueCollapsed,
}

impl TelemetryEvent {
    /// Event name, prefixed by the view the key was opened from.
    pub fn name(&self, view_type: ViewType) -> String {
        let prefix = match view_type {
            ViewType::Browser => "BROWSER",
            ViewType::Tree => "TREE_VIEW",
        };
        let suffix = match self {
            TelemetryEvent::KeyValueRemoved => "KEY_VALUE_REMOVED",
            TelemetryEvent::KeyValueRemoveClicked => "KEY_VALUE_REMOVE_CLICKED",
            TelemetryEvent::KeyValueFiltered => "KEY_VALUE_FILTERED",
            TelemetryEvent::KeyFieldValueExpanded => "KEY_FIELD_VALUE_EXPANDED",
            TelemetryEvent::KeyFieldValueCollapsed => "KEY_FIELD_VALUE_COLLAPSED",
        };
        format!("{}_{}", prefix, suffix)
    }
}

/// Emits `event` with the context's `databaseId` and `keyType` merged into `extra`.
pub fn emit_for(
    sink: &dyn TelemetrySink,
    context: &BrowserContext,
    event: TelemetryEvent,
    extra: Value,
) {
    let mut data = json!({
        "databaseId": context.database_id,
        "keyType": context.key_type.label(),
    });

    if let (Some(target), Value::Object(fields)) = (data.as_object_mut(), extra) {
        target.extend(fields);
    }

    sink.emit(&event.name(context.view_type), data);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::KeyType;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Captured(Mutex<Vec<(String, Value)>>);

    impl TelemetrySink for Captured {
        fn emit(&self, event: &str, data: Value) {
            if let Ok(mut events) = self.0.lock() {
                events.push((event.to_string(), data));
            }
        }
    }

    #[test]
    fn names_follow_the_view_type() {
        assert_eq!(
            TelemetryEvent::KeyValueRemoved.name(ViewType::Browser),
            "BROWSER_KEY_VALUE_REMOVED"
        );
        assert_eq!(
            TelemetryEvent::KeyFieldValueCollapsed.name(ViewType::Tree),
            "TREE_VIEW_KEY_FIELD_VALUE_COLLAPSED"
        );
    }

    #[test]
    fn payload_carries_database_and_key_type() {
        let sink = Captured::default();
        let context = BrowserContext::new("db-1", "scores", KeyType::SortedSet, 2);

        emit_for(
            &sink,
            &context,
            TelemetryEvent::KeyValueRemoved,
            json!({ "numberOfRemoved": 1 }),
        );

        let events = sink.0.lock().expect("lock");
        assert_eq!(events[0].0, "BROWSER_KEY_VALUE_REMOVED");
        assert_eq!(
            events[0].1,
            json!({ "databaseId": "db-1", "keyType": "zset", "numberOfRemoved": 1 })
        );
    }
}
