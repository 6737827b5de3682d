use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::DbError;
use crate::error::ValidationError;
use crate::notification::{Notification, Notifications};
use crate::table::ColumnSpec;
use crate::task::{TaskKind, TaskManager};

// --- Model ---

/// Stream entry id `<milliseconds>-<sequence>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StreamEntryId {
    pub ms: u64,
    pub seq: u64,
}

impl StreamEntryId {
    pub fn new(ms: u64, seq: u64) -> Self {
        Self { ms, seq }
    }

    /// Wall-clock time encoded in the id.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.ms)
            .ok()
            .and_then(DateTime::from_timestamp_millis)
    }
}

impl fmt::Display for StreamEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

impl FromStr for StreamEntryId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::Invalid(format!("Invalid stream entry id: {}", s));
        let trimmed = s.trim();

        let (ms, seq) = match trimmed.split_once('-') {
            Some((ms, seq)) => (ms, seq),
            None => (trimmed, "0"),
        };

        Ok(Self {
            ms: ms.parse().map_err(|_| invalid())?,
            seq: seq.parse().map_err(|_| invalid())?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerGroup {
    pub name: String,
    pub consumers: u64,
    pub pending: u64,
    pub last_delivered_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consumer {
    pub name: String,
    pub pending: u64,
    pub idle_ms: u64,
}

/// Entry delivered to a consumer but not yet acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    pub id: StreamEntryId,
    pub consumer: String,
    pub idle_ms: u64,
    pub delivered_count: u64,
}

impl PendingMessage {
    pub fn last_delivered_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        i64::try_from(self.idle_ms)
            .ok()
            .and_then(Duration::try_milliseconds)
            .and_then(|idle| now.checked_sub_signed(idle))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

// --- Views ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamTab {
    #[default]
    Groups,
    Consumers,
    Pending,
}

impl StreamTab {
    pub fn columns(&self) -> Vec<ColumnSpec> {
        match self {
            StreamTab::Groups => vec![
                ColumnSpec::new("name", "Group Name").sortable().truncated(),
                ColumnSpec::new("consumers", "Consumers").sortable(),
                ColumnSpec::new("pending", "Pending").sortable(),
                ColumnSpec::new("lastDeliveredId", "Last Delivered ID").sortable(),
            ],
            StreamTab::Consumers => vec![
                ColumnSpec::new("name", "Consumer Name").sortable().truncated(),
                ColumnSpec::new("pending", "Pending").sortable(),
                ColumnSpec::new("idle", "Idle Time, msec").sortable(),
            ],
            StreamTab::Pending => vec![
                ColumnSpec::new("id", "Entry ID").truncated(),
                ColumnSpec::new("idle", "Last Message Delivered"),
                ColumnSpec::new("delivered", "Times Message Delivered"),
            ],
        }
    }
}

/// How the optional idle value of a claim is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdleTimeFormat {
    /// Milliseconds of idle time to set (`IDLE`).
    #[default]
    RelativeTime,
    /// Unix time in milliseconds of the last delivery (`TIME`).
    Timestamp,
}

impl IdleTimeFormat {
    pub fn label(&self) -> &'static str {
        match self {
            IdleTimeFormat::RelativeTime => "Relative Time",
            IdleTimeFormat::Timestamp => "Timestamp",
        }
    }

    pub fn all() -> [IdleTimeFormat; 2] {
        [IdleTimeFormat::RelativeTime, IdleTimeFormat::Timestamp]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub key_name: String,
    pub group_name: String,
    pub consumer_name: String,
    pub count: u32,
}

/// Transfer of pending entries to another consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRequest {
    pub key_name: String,
    pub group_name: String,
    pub consumer_name: String,
    pub min_idle_time: u64,
    pub entries: Vec<StreamEntryId>,
    pub idle: Option<u64>,
    pub time_format: IdleTimeFormat,
    pub retry_count: Option<u64>,
    pub force: bool,
}

impl ClaimRequest {
    pub fn new(
        key_name: impl Into<String>,
        group_name: impl Into<String>,
        consumer_name: impl Into<String>,
        min_idle_time: u64,
        entries: Vec<StreamEntryId>,
    ) -> Self {
        Self {
            key_name: key_name.into(),
            group_name: group_name.into(),
            consumer_name: consumer_name.into(),
            min_idle_time,
            entries,
            idle: None,
            time_format: IdleTimeFormat::default(),
            retry_count: None,
            force: false,
        }
    }

    pub fn with_idle(mut self, idle: u64, format: IdleTimeFormat) -> Self {
        self.idle = Some(idle);
        self.time_format = format;
        self
    }

    pub fn with_retry_count(mut self, retry_count: u64) -> Self {
        self.retry_count = Some(retry_count);
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.consumer_name.trim().is_empty() {
            return Err(ValidationError::Required { field: "consumer" });
        }
        if self.group_name.trim().is_empty() {
            return Err(ValidationError::Required { field: "group" });
        }
        if self.entries.is_empty() {
            return Err(ValidationError::Required { field: "entries" });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimOutcome {
    pub affected: Vec<StreamEntryId>,
}

/// Consumer-group side of a stream key.
pub trait StreamApi: Send + Sync {
    fn groups(&self, key_name: &str) -> Result<Vec<ConsumerGroup>, DbError>;

    fn consumers(&self, key_name: &str, group_name: &str) -> Result<Vec<Consumer>, DbError>;

    fn pending(&self, request: &PendingRequest) -> Result<Vec<PendingMessage>, DbError>;

    fn claim(&self, request: &ClaimRequest) -> Result<ClaimOutcome, DbError>;
}

/// Consumers a message can be claimed for: everyone but its current owner.
pub fn claim_destinations<'a>(consumers: &'a [Consumer], current: &str) -> Vec<&'a str> {
    consumers
        .iter()
        .map(|c| c.name.as_str())
        .filter(|name| *name != current)
        .collect()
}

pub const NO_MESSAGES_CLAIMED: &str = "No messages claimed";

/// Groups, consumers and pending entries of one stream key.
///
/// The table shows whatever the server returns; claims never filter rows locally.
pub struct PendingView<A: StreamApi> {
    api: A,
    key_name: String,
    count: u32,
    tab: StreamTab,
    groups: Vec<ConsumerGroup>,
    consumers: Vec<Consumer>,
    messages: Vec<PendingMessage>,
    selected_group: Option<String>,
    selected_consumer: Option<String>,
    notifications: Notifications,
    last_error: Option<String>,
    tasks: TaskManager,
}

impl<A: StreamApi> PendingView<A> {
    pub fn new(api: A, key_name: impl Into<String>, count: u32) -> Self {
        Self {
            api,
            key_name: key_name.into(),
            count,
            tab: StreamTab::Groups,
            groups: Vec::new(),
            consumers: Vec::new(),
            messages: Vec::new(),
            selected_group: None,
            selected_consumer: None,
            notifications: Notifications::default(),
            last_error: None,
            tasks: TaskManager::new(),
        }
    }

    pub fn tab(&self) -> StreamTab {
        self.tab
    }

    pub fn columns(&self) -> Vec<ColumnSpec> {
        self.tab.columns()
    }

    pub fn groups(&self) -> &[ConsumerGroup] {
        &self.groups
    }

    pub fn consumers(&self) -> &[Consumer] {
        &self.consumers
    }

    pub fn messages(&self) -> &[PendingMessage] {
        &self.messages
    }

    pub fn selected_group(&self) -> Option<&str> {
        self.selected_group.as_deref()
    }

    pub fn selected_consumer(&self) -> Option<&str> {
        self.selected_consumer.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        self.notifications.take()
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn tasks(&self) -> &TaskManager {
        &self.tasks
    }

    pub fn open(&mut self) -> bool {
        self.tab = StreamTab::Groups;
        match self.api.groups(&self.key_name) {
            Ok(groups) => {
                self.groups = groups;
                true
            }
            Err(e) => {
                self.report(e);
                false
            }
        }
    }

    pub fn show_groups(&mut self) {
        self.tab = StreamTab::Groups;
        self.selected_group = None;
        self.selected_consumer = None;
    }

    pub fn select_group(&mut self, group_name: &str) -> bool {
        match self.api.consumers(&self.key_name, group_name) {
            Ok(consumers) => {
                self.consumers = consumers;
                self.selected_group = Some(group_name.to_string());
                self.selected_consumer = None;
                self.tab = StreamTab::Consumers;
                true
            }
            Err(e) => {
                self.report(e);
                false
            }
        }
    }

    pub fn select_consumer(&mut self, consumer_name: &str) -> bool {
        self.selected_consumer = Some(consumer_name.to_string());
        self.tab = StreamTab::Pending;
        self.reload_pending()
    }

    pub fn reload_pending(&mut self) -> bool {
        let (Some(group), Some(consumer)) = (&self.selected_group, &self.selected_consumer) else {
            return false;
        };

        let request = PendingRequest {
            key_name: self.key_name.clone(),
            group_name: group.clone(),
            consumer_name: consumer.clone(),
            count: self.count,
        };

        let description = format!("XPENDING {} {}", request.key_name, request.group_name);
        let task_id = self.tasks.start(TaskKind::FetchPending, description);

        match self.api.pending(&request) {
            Ok(messages) => {
                self.tasks.complete(task_id);
                self.messages = messages;
                true
            }
            Err(e) => {
                self.tasks.fail(task_id, e.to_string());
                self.report(e);
                false
            }
        }
    }

    /// Claim targets for the selected consumer's messages.
    pub fn claim_destinations(&self) -> Vec<&str> {
        claim_destinations(
            &self.consumers,
            self.selected_consumer.as_deref().unwrap_or_default(),
        )
    }

    /// Claims `entries` of the selected consumer for `destination`.
    pub fn claim_request(
        &self,
        destination: &str,
        min_idle_time: u64,
        entries: Vec<StreamEntryId>,
    ) -> ClaimRequest {
        ClaimRequest::new(
            self.key_name.clone(),
            self.selected_group.clone().unwrap_or_default(),
            destination,
            min_idle_time,
            entries,
        )
    }

    /// Dispatches a claim. Rows change only through the reload that follows a
    /// non-empty outcome.
    pub fn claim(&mut self, request: &ClaimRequest) -> Option<ClaimOutcome> {
        if let Err(e) = request.validate() {
            self.notifications
                .push(Notification::error("Claim failed", e.to_string()));
            return None;
        }

        let description = format!(
            "XCLAIM {} {} for {}",
            request.key_name, request.group_name, request.consumer_name
        );
        let task_id = self.tasks.start(TaskKind::ClaimMessages, description);

        match self.api.claim(request) {
            Ok(outcome) => {
                self.tasks.complete(task_id);
                if outcome.affected.is_empty() {
                    self.notifications.push(Notification::info(
                        NO_MESSAGES_CLAIMED,
                        "No messages exceed the minimum idle time.",
                    ));
                } else {
                    self.notifications.push(Notification::success(
                        "Success",
                        format!("{} message(s) claimed.", outcome.affected.len()),
                    ));
                    self.reload_pending();
                }
                Some(outcome)
            }
            Err(e) => {
                self.tasks.fail(task_id, e.to_string());
                self.report(e);
                None
            }
        }
    }

    fn report(&mut self, error: DbError) {
        let message = error.to_string();
        self.notifications
            .push(Notification::error("Stream request failed", message.clone()));
        self.last_error = Some(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_ids_parse_and_display() {
        let id: StreamEntryId = "1700000000000-3".parse().expect("valid id");
        assert_eq!(id, StreamEntryId::new(1_700_000_000_000, 3));
        assert_eq!(id.to_string(), "1700000000000-3");
        assert_eq!("42".parse::<StreamEntryId>(), Ok(StreamEntryId::new(42, 0)));
        assert!("abc-1".parse::<StreamEntryId>().is_err());
    }

    #[test]
    fn entry_id_timestamp_uses_the_millisecond_part() {
        let id = StreamEntryId::new(1_000, 0);
        let ts = id.timestamp().expect("in range");
        assert_eq!(ts.timestamp_millis(), 1_000);
    }

    #[test]
    fn destinations_exclude_the_current_consumer() {
        let consumers = vec![
            Consumer {
                name: "Alice".to_string(),
                pending: 1,
                idle_ms: 10,
            },
            Consumer {
                name: "Bob".to_string(),
                pending: 1,
                idle_ms: 10,
            },
        ];

        assert_eq!(claim_destinations(&consumers, "Alice"), vec!["Bob"]);
    }

    #[test]
    fn claim_requires_entries_and_consumer() {
        let request = ClaimRequest::new("s", "g", "Bob", 0, Vec::new());
        assert_eq!(
            request.validate(),
            Err(ValidationError::Required { field: "entries" })
        );

        let request = ClaimRequest::new("s", "g", " ", 0, vec![StreamEntryId::new(1, 0)]);
        assert!(request.validate().is_err());
    }

    #[test]
    fn pending_columns_and_tab_labels() {
        let labels: Vec<String> = StreamTab::Pending
            .columns()
            .into_iter()
            .map(|c| c.label)
            .collect();
        assert_eq!(
            labels,
            vec!["Entry ID", "Last Message Delivered", "Times Message Delivered"]
        );
        assert_eq!(StreamTab::Consumers.columns()[0].label, "Consumer Name");
        assert_eq!(StreamTab::Groups.columns()[0].label, "Group Name");
        assert_eq!(
            IdleTimeFormat::all().map(|f| f.label()),
            ["Relative Time", "Timestamp"]
        );
    }

    #[test]
    fn last_delivery_is_now_minus_idle() {
        let message = PendingMessage {
            id: StreamEntryId::new(1, 0),
            consumer: "Alice".to_string(),
            idle_ms: 1_500,
            delivered_count: 1,
        };
        let now = DateTime::from_timestamp_millis(10_000).expect("valid");

        assert_eq!(message.last_delivered_at(now).timestamp_millis(), 8_500);
    }
}
