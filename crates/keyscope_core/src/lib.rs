mod browser;
mod config;
mod context;
mod error;
mod member;
mod mutation;
mod notification;
mod paging;
mod pattern;
mod source;
mod stream;
mod task;
mod telemetry;

pub mod table;

pub use browser::MemberBrowser;
pub use config::{BrowserConfig, ConfigStore, SCAN_COUNT_DEFAULT, ViewType};
pub use context::BrowserContext;
pub use error::{DbError, ValidationError};
pub use member::{
    CollectionMember, HashField, KeyInfo, KeyType, ZSetMember, format_score, validate_score,
};
pub use mutation::{DeletePrompt, MutationCoordinator, remove_last_element_info};
pub use notification::{Notification, NotificationKind, Notifications};
pub use paging::{
    ApplyOutcome, FetchTicket, FetchWindow, ListMode, PagedListState, PagedSlice, PaginationKind,
    ScanCursor, SortDirection, SortSpec,
};
pub use pattern::{MatchType, is_glob_pattern, match_type, unescape_glob};
pub use source::{
    DeleteMembersRequest, FetchRequest, MemberSource, PageRequest, SearchRequest,
    UpdateMembersRequest,
};
pub use stream::{
    ClaimOutcome, ClaimRequest, Consumer, ConsumerGroup, IdleTimeFormat, NO_MESSAGES_CLAIMED,
    PendingMessage, PendingRequest, PendingView, StreamApi, StreamEntryId, StreamTab,
    claim_destinations,
};
pub use task::{
    CancelToken, FinishedTask, TaskId, TaskKind, TaskManager, TaskSlot, TaskStatus,
};
pub use telemetry::{LogTelemetry, NoopTelemetry, TelemetryEvent, TelemetrySink, emit_for};
