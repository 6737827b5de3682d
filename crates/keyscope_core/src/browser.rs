use std::ops::Range;
use std::sync::Arc;

use serde_json::json;

use crate::DbError;
use crate::config::BrowserConfig;
use crate::context::BrowserContext;
use crate::error::ValidationError;
use crate::member::CollectionMember;
use crate::mutation::{DeletePrompt, MutationCoordinator};
use crate::notification::{Notification, Notifications};
use crate::paging::{ApplyOutcome, FetchTicket, PagedListState, PagedSlice, SortDirection, SortSpec};
use crate::pattern::match_type;
use crate::source::{FetchRequest, MemberSource};
use crate::table::{ColumnSearchState, ColumnSpec, LoadRange, TableEvent, VirtualTableState};
use crate::task::{TaskKind, TaskManager};
use crate::telemetry::{TelemetryEvent, TelemetrySink, emit_for};

/// One open collection key: its member list, the table over it, and the
/// edit/delete flow, all driven through a [`MemberSource`].
///
/// Backend calls run synchronously. Failures become notifications and leave
/// the loaded members as they were.
pub struct MemberBrowser<S: MemberSource> {
    context: BrowserContext,
    config: BrowserConfig,
    source: S,
    telemetry: Arc<dyn TelemetrySink>,
    list: PagedListState<S::Member>,
    table: VirtualTableState,
    mutations: MutationCoordinator,
    tasks: TaskManager,
    notifications: Notifications,
    last_error: Option<String>,
    match_pattern: String,
    key_length: u64,
}

impl<S: MemberSource> MemberBrowser<S> {
    pub fn new(
        context: BrowserContext,
        config: BrowserConfig,
        source: S,
        telemetry: Arc<dyn TelemetrySink>,
        columns: Vec<ColumnSpec>,
        default_sort: SortSpec,
    ) -> Self {
        let list = PagedListState::new(source.pagination(), default_sort.clone());
        let mut table = VirtualTableState::new(context.key_type, columns, &config);
        table.set_sorted_column(Some(default_sort));
        let mutations = MutationCoordinator::new(context.clone(), telemetry.clone());
        let key_length = context.key_length;

        Self {
            context,
            config,
            source,
            telemetry,
            list,
            table,
            mutations,
            tasks: TaskManager::new(),
            notifications: Notifications::default(),
            last_error: None,
            match_pattern: String::new(),
            key_length,
        }
    }

    // --- Accessors ---

    pub fn context(&self) -> &BrowserContext {
        &self.context
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn list(&self) -> &PagedListState<S::Member> {
        &self.list
    }

    pub fn members(&self) -> &[S::Member] {
        self.list.members()
    }

    pub fn table(&self) -> &VirtualTableState {
        &self.table
    }

    pub fn mutations(&self) -> &MutationCoordinator {
        &self.mutations
    }

    pub fn tasks(&self) -> &TaskManager {
        &self.tasks
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn match_pattern(&self) -> &str {
        &self.match_pattern
    }

    pub fn key_length(&self) -> u64 {
        self.key_length
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        self.notifications.take()
    }

    pub fn visible_range(&self) -> Range<usize> {
        let range = self.table.visible_range();
        range.start.min(self.list.len())..range.end.min(self.list.len())
    }

    pub fn visible_members(&self) -> &[S::Member] {
        &self.list.members()[self.visible_range()]
    }

    pub fn set_table_height(&mut self, height: f32) {
        self.table.set_table_height(height);
    }

    pub fn set_viewport_rows(&mut self, rows: usize) {
        self.table.set_viewport_rows(rows);
    }

    pub fn measure_row(&mut self, row: usize, height: f32) -> bool {
        self.table.measure_row(row, height)
    }

    // --- Loading ---

    /// First load of the key under the default sort.
    pub fn open(&mut self) -> bool {
        let sort = self.list.sort().clone();
        let ticket = self.list.load_page(0, self.config.scan_count, sort);
        self.sync_table(true);
        self.run(ticket).is_some()
    }

    /// Reloads whatever the table is showing, from the top.
    pub fn refresh(&mut self) -> bool {
        if self.list.is_searching() {
            let pattern = self.match_pattern.clone();
            return self.search(&pattern);
        }
        self.open()
    }

    pub fn change_sorting(&mut self, column: &str, order: SortDirection) -> bool {
        let Some(TableEvent::SortChanged(sort)) = self.table.change_sorting(column, order) else {
            return false;
        };

        let ticket = self.list.change_sort(sort, self.config.scan_count);
        self.sync_table(true);
        self.run(ticket).is_some()
    }

    /// Commits the column search fields.
    pub fn on_search(&mut self, states: Vec<ColumnSearchState>) -> bool {
        match self.table.commit_search(states) {
            Some(TableEvent::SearchCommitted { value, .. }) => self.search(&value),
            _ => false,
        }
    }

    /// Filters members by `pattern`; an empty pattern goes back to browsing.
    pub fn search(&mut self, pattern: &str) -> bool {
        self.match_pattern = pattern.to_string();
        self.mutations.close_delete();

        let ticket = self.list.search(pattern, self.config.scan_count);
        self.sync_table(true);

        match self.run(ticket) {
            Some(ApplyOutcome::Replaced { .. }) if !pattern.is_empty() => {
                emit_for(
                    self.telemetry.as_ref(),
                    &self.context,
                    TelemetryEvent::KeyValueFiltered,
                    json!({
                        "match": match_type(pattern).as_str(),
                        "length": self.list.total(),
                    }),
                );
                true
            }
            Some(ApplyOutcome::Stale) | None => false,
            Some(_) => true,
        }
    }

    /// Scrolls the row area. Scrolling closes an open delete popover.
    pub fn scroll_to(&mut self, offset: f32) -> bool {
        self.mutations.close_delete();

        match self.table.scroll_to(offset) {
            Some(TableEvent::LoadMore(range)) => self.load_more_items(range),
            _ => false,
        }
    }

    /// Fetches rows for `range`: by offset while browsing, from the search
    /// cursor while filtering.
    pub fn load_more_items(&mut self, range: LoadRange) -> bool {
        let Some(TableEvent::LoadMore(range)) = self.table.load_more_items(range) else {
            return false;
        };

        let count = u32::try_from(range.count()).unwrap_or(u32::MAX);
        let start = range.start_index as u64;
        let Some(ticket) = self.list.load_more(start, count, self.config.scan_count) else {
            return false;
        };

        matches!(self.run(ticket), Some(ApplyOutcome::Merged { .. }))
    }

    // --- Row state ---

    pub fn toggle_row(&mut self, row: usize) -> bool {
        let largest = self
            .list
            .member(row)
            .map(|m| m.largest_cell_length())
            .unwrap_or(0);

        let Some(TableEvent::RowToggled {
            expanded,
            largest_cell_length,
            ..
        }) = self.table.toggle_row(row, largest)
        else {
            return false;
        };

        let event = if expanded {
            TelemetryEvent::KeyFieldValueExpanded
        } else {
            TelemetryEvent::KeyFieldValueCollapsed
        };
        emit_for(
            self.telemetry.as_ref(),
            &self.context,
            event,
            json!({ "largestCellLength": largest_cell_length }),
        );
        true
    }

    pub fn begin_edit(&mut self, member_key: &str) {
        let stale = self.mutations.begin_edit(member_key, self.list.members());
        for row in stale {
            self.table.invalidate_row(row);
        }
    }

    pub fn cancel_edit(&mut self, member_key: &str) {
        let stale = self.mutations.cancel_edit(member_key, self.list.members());
        for row in stale {
            self.table.invalidate_row(row);
        }
    }

    /// Validates and sends an edit. `Ok(false)` means the server rejected it.
    pub fn apply_edit(&mut self, member_key: &str, raw: &str) -> Result<bool, ValidationError> {
        let member = self
            .list
            .index_of(member_key)
            .and_then(|index| self.list.member(index))
            .ok_or_else(|| ValidationError::Invalid(format!("{} is not loaded", member_key)))?;

        let request = self.mutations.apply_edit(member, raw)?;

        let description = format!("Update {} in {}", member_key, self.context.key_name);
        let task_id = self.tasks.start(TaskKind::UpdateMembers, description);

        match self.source.update_members(&request) {
            Ok(()) => {
                self.tasks.complete(task_id);
                for edited in request.members {
                    self.list.update_confirmed(edited);
                }
                self.mutations.on_edit_success(member_key);
                if let Some(row) = self.list.index_of(member_key) {
                    self.table.invalidate_row(row);
                }
                Ok(true)
            }
            Err(e) => {
                self.tasks.fail(task_id, e.to_string());
                self.report("Failed to update member", e);
                Ok(false)
            }
        }
    }

    pub fn show_delete(&mut self, member_key: &str) {
        self.mutations.show_delete(member_key);
    }

    pub fn close_delete(&mut self) {
        self.mutations.close_delete();
    }

    pub fn delete_prompt(&self, member_key: &str) -> DeletePrompt {
        self.mutations.delete_prompt(member_key, self.key_length)
    }

    /// Removes one member once the server confirms it.
    pub fn delete_member(&mut self, member_key: &str) -> bool {
        let request = self.mutations.confirm_delete(member_key);

        let description = format!("Remove {} from {}", member_key, self.context.key_name);
        let task_id = self.tasks.start(TaskKind::DeleteMembers, description);

        match self.source.delete_members(&request) {
            Ok(removed) => {
                self.tasks.complete(task_id);
                self.list.remove_confirmed(&request.member_keys);
                self.key_length = self.key_length.saturating_sub(removed);
                self.mutations.on_delete_success(removed);
                self.sync_table(true);
                true
            }
            Err(e) => {
                self.tasks.fail(task_id, e.to_string());
                self.report("Failed to remove member", e);
                false
            }
        }
    }

    // --- Internals ---

    fn run(&mut self, ticket: FetchTicket) -> Option<ApplyOutcome> {
        let request = FetchRequest::for_ticket(&self.context.key_name, &ticket);
        let task_id = self
            .tasks
            .start(ticket.kind, ticket.description(&self.context.key_name));

        self.table.set_loading(true);
        let result = self.source.fetch(&request);

        let outcome = match result {
            Ok(slice) => {
                self.tasks.complete(task_id);
                Some(self.complete_fetch(&ticket, slice))
            }
            Err(e) => {
                self.tasks.fail(task_id, e.to_string());
                if self.list.fail(&ticket, &e.to_string()) {
                    self.report("Failed to load members", e);
                }
                None
            }
        };

        self.table.set_loading(self.list.is_loading());
        outcome
    }

    fn complete_fetch(&mut self, ticket: &FetchTicket, slice: PagedSlice<S::Member>) -> ApplyOutcome {
        let outcome = self.list.apply(ticket, slice);

        match outcome {
            ApplyOutcome::Replaced { .. } => {
                if !self.list.is_searching() {
                    self.key_length = self.list.total();
                }
                self.last_error = None;
                self.sync_table(true);
            }
            ApplyOutcome::Merged { .. } => self.sync_table(false),
            ApplyOutcome::Stale => {}
        }

        outcome
    }

    fn sync_table(&mut self, identity_changed: bool) {
        self.table
            .set_items(self.list.len(), self.list.total(), identity_changed);
        self.table.set_searching(self.list.is_searching());
        self.table
            .set_scan_pending(!self.list.next_cursor().is_exhausted());
        self.table.set_loading(self.list.is_loading());
        self.table.set_sorted_column(Some(self.list.sort().clone()));
    }

    fn report(&mut self, title: &str, error: DbError) {
        let message = error.to_string();
        self.notifications.push(Notification::error(title, message.clone()));
        self.last_error = Some(message);
    }
}
