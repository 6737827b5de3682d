use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::member::CollectionMember;
use crate::task::{CancelToken, TaskId, TaskKind, TaskSlot};

/// SCAN-style cursor. Zero both starts a scan and marks it as exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ScanCursor(pub u64);

impl ScanCursor {
    pub const START: ScanCursor = ScanCursor(0);

    pub fn is_exhausted(&self) -> bool {
        self.0 == 0
    }
}

/// Sort direction for ordered collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggled(&self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: String,
    pub order: SortDirection,
}

impl SortSpec {
    pub fn new(column: impl Into<String>, order: SortDirection) -> Self {
        Self {
            column: column.into(),
            order,
        }
    }

    pub fn ascending(column: impl Into<String>) -> Self {
        Self::new(column, SortDirection::Ascending)
    }

    pub fn descending(column: impl Into<String>) -> Self {
        Self::new(column, SortDirection::Descending)
    }
}

/// A page of members returned by the fetch layer.
#[derive(Debug, Clone, PartialEq)]
pub struct PagedSlice<M> {
    pub total: u64,
    pub next_cursor: ScanCursor,
    pub members: Vec<M>,
}

impl<M> PagedSlice<M> {
    pub fn new(total: u64, next_cursor: ScanCursor, members: Vec<M>) -> Self {
        Self {
            total,
            next_cursor,
            members,
        }
    }

    pub fn empty() -> Self {
        Self {
            total: 0,
            next_cursor: ScanCursor::START,
            members: Vec::new(),
        }
    }
}

/// How a source walks its members outside of search mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaginationKind {
    /// Random access by offset (sorted sets, lists).
    #[default]
    Offset,
    /// Only SCAN cursors (hashes, sets); browsing is a search for `*`.
    Cursor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListMode {
    Browse,
    Search { pattern: String },
}

/// The slice of the collection a ticket asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchWindow {
    Offset {
        offset: u64,
        limit: u32,
    },
    Cursor {
        cursor: ScanCursor,
        limit: u32,
        pattern: String,
    },
}

impl FetchWindow {
    fn pattern(&self) -> Option<&str> {
        match self {
            FetchWindow::Offset { .. } => None,
            FetchWindow::Cursor { pattern, .. } => Some(pattern),
        }
    }

    /// Windows starting at the same place are the same request, whatever their length.
    fn same_origin(&self, other: &FetchWindow) -> bool {
        match (self, other) {
            (FetchWindow::Offset { offset: a, .. }, FetchWindow::Offset { offset: b, .. }) => {
                a == b
            }
            (
                FetchWindow::Cursor {
                    cursor: a,
                    pattern: pa,
                    ..
                },
                FetchWindow::Cursor {
                    cursor: b,
                    pattern: pb,
                    ..
                },
            ) => a == b && pa == pb,
            _ => false,
        }
    }
}

/// A fetch handed out by [`PagedListState`]; its response must come back through `apply` or `fail`.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    pub id: TaskId,
    pub kind: TaskKind,
    pub generation: u64,
    pub sort: SortSpec,
    pub window: FetchWindow,
    token: CancelToken,
}

impl FetchTicket {
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.token
    }

    /// Whether a successful response replaces the slice instead of extending it.
    pub fn replaces_slice(&self) -> bool {
        matches!(self.kind, TaskKind::FetchPage | TaskKind::Search)
    }

    pub fn description(&self, key_name: &str) -> String {
        match &self.window {
            FetchWindow::Offset { offset, limit } => format!(
                "{} {} [{}..{}) {}",
                self.kind.label(),
                key_name,
                offset,
                offset + u64::from(*limit),
                self.sort.order.as_str()
            ),
            FetchWindow::Cursor {
                cursor, pattern, ..
            } => format!(
                "{} {} cursor {} match {}",
                self.kind.label(),
                key_name,
                cursor.0,
                pattern
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Replaced { count: usize },
    Merged { added: usize },
    /// The response no longer matches the current sort/search state and was dropped.
    Stale,
}

struct InFlight {
    kind: TaskKind,
    window: FetchWindow,
    token: CancelToken,
}

/// The loaded window of one collection key plus its pagination cursors.
///
/// Only the operations below mutate `members`; responses are merged by the
/// request's offset or cursor, never by arrival order.
pub struct PagedListState<M: CollectionMember> {
    pagination: PaginationKind,
    members: Vec<M>,
    keys: HashSet<String>,
    total: u64,
    next_cursor: ScanCursor,
    sort: SortSpec,
    mode: ListMode,
    generation: u64,
    primary: TaskSlot,
    in_flight: HashMap<TaskId, InFlight>,
    parked: BTreeMap<u64, Vec<M>>,
}

impl<M: CollectionMember> PagedListState<M> {
    pub fn new(pagination: PaginationKind, sort: SortSpec) -> Self {
        Self {
            pagination,
            members: Vec::new(),
            keys: HashSet::new(),
            total: 0,
            next_cursor: ScanCursor::START,
            sort,
            mode: ListMode::Browse,
            generation: 0,
            primary: TaskSlot::new(),
            in_flight: HashMap::new(),
            parked: BTreeMap::new(),
        }
    }

    // --- Accessors ---

    pub fn members(&self) -> &[M] {
        &self.members
    }

    pub fn member(&self, index: usize) -> Option<&M> {
        self.members.get(index)
    }

    pub fn index_of(&self, member_key: &str) -> Option<usize> {
        self.members.iter().position(|m| m.member_key() == member_key)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn next_cursor(&self) -> ScanCursor {
        self.next_cursor
    }

    pub fn sort(&self) -> &SortSpec {
        &self.sort
    }

    pub fn mode(&self) -> &ListMode {
        &self.mode
    }

    pub fn pagination(&self) -> PaginationKind {
        self.pagination
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_searching(&self) -> bool {
        matches!(self.mode, ListMode::Search { .. })
    }

    pub fn is_loading(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Pattern the current mode scans with, if it scans at all.
    pub fn active_pattern(&self) -> Option<&str> {
        match (&self.mode, self.pagination) {
            (ListMode::Search { pattern }, _) => Some(pattern),
            (ListMode::Browse, PaginationKind::Cursor) => Some("*"),
            (ListMode::Browse, PaginationKind::Offset) => None,
        }
    }

    // --- Requests ---

    /// Starts a fresh load that will replace the slice. Supersedes everything in flight.
    pub fn load_page(&mut self, offset: u64, limit: u32, sort: SortSpec) -> FetchTicket {
        self.reset_in_flight();
        self.sort = sort;
        self.mode = ListMode::Browse;

        match self.pagination {
            PaginationKind::Offset => {
                self.issue(TaskKind::FetchPage, FetchWindow::Offset { offset, limit })
            }
            PaginationKind::Cursor => self.issue(
                TaskKind::FetchPage,
                FetchWindow::Cursor {
                    cursor: ScanCursor::START,
                    limit,
                    pattern: "*".to_string(),
                },
            ),
        }
    }

    /// Discards the loaded window and reloads from offset zero under `sort`.
    pub fn change_sort(&mut self, sort: SortSpec, limit: u32) -> FetchTicket {
        self.clear_members();
        self.total = 0;
        self.next_cursor = ScanCursor::START;
        self.load_page(0, limit, sort)
    }

    /// Switches to search mode, or back to browsing when `pattern` is empty.
    pub fn search(&mut self, pattern: &str, limit: u32) -> FetchTicket {
        if pattern.is_empty() {
            let sort = self.sort.clone();
            return self.load_page(0, limit, sort);
        }

        self.reset_in_flight();
        self.mode = ListMode::Search {
            pattern: pattern.to_string(),
        };

        self.issue(
            TaskKind::Search,
            FetchWindow::Cursor {
                cursor: ScanCursor::START,
                limit,
                pattern: pattern.to_string(),
            },
        )
    }

    /// Requests the next contiguous window. `None` when there is nothing to fetch
    /// or the same window is already being fetched.
    pub fn load_more(&mut self, start: u64, count: u32, scan_count: u32) -> Option<FetchTicket> {
        if self.primary.is_active() {
            log::debug!("load_more ignored: a full reload is in flight");
            return None;
        }

        let window = match self.active_pattern() {
            None => {
                if count == 0 {
                    return None;
                }
                FetchWindow::Offset {
                    offset: start,
                    limit: count,
                }
            }
            Some(pattern) => {
                if self.next_cursor.is_exhausted() {
                    return None;
                }
                FetchWindow::Cursor {
                    cursor: self.next_cursor,
                    limit: scan_count,
                    pattern: pattern.to_string(),
                }
            }
        };

        let duplicate = self
            .in_flight
            .values()
            .any(|pending| pending.window.same_origin(&window));
        if duplicate {
            log::debug!("load_more ignored: window {:?} already in flight", window);
            return None;
        }

        let kind = match window {
            FetchWindow::Offset { .. } => TaskKind::FetchMore,
            FetchWindow::Cursor { .. } => TaskKind::SearchMore,
        };

        Some(self.issue(kind, window))
    }

    // --- Responses ---

    pub fn apply(&mut self, ticket: &FetchTicket, slice: PagedSlice<M>) -> ApplyOutcome {
        let was_in_flight = self.in_flight.remove(&ticket.id).is_some();
        self.primary.take_if(ticket.id);

        if !was_in_flight || !self.is_current(ticket) {
            log::warn!(
                "Dropping stale {} response (generation {}, current {})",
                ticket.kind.label(),
                ticket.generation,
                self.generation
            );
            return ApplyOutcome::Stale;
        }

        self.total = slice.total;

        if ticket.replaces_slice() {
            self.clear_members();
            self.next_cursor = slice.next_cursor;
            self.append_from(0, slice.members);
            return ApplyOutcome::Replaced {
                count: self.members.len(),
            };
        }

        let added = match &ticket.window {
            FetchWindow::Offset { offset, .. } => self.merge_at(*offset, slice.members),
            FetchWindow::Cursor { .. } => {
                self.next_cursor = slice.next_cursor;
                let start = self.members.len() as u64;
                self.append_from(start, slice.members)
            }
        };

        ApplyOutcome::Merged { added }
    }

    /// Records a failed fetch. Members are never touched; returns whether the ticket was current.
    pub fn fail(&mut self, ticket: &FetchTicket, error: &str) -> bool {
        let was_in_flight = self.in_flight.remove(&ticket.id).is_some();
        self.primary.take_if(ticket.id);

        let current = was_in_flight && self.is_current(ticket);
        if current {
            log::warn!("{} failed: {}", ticket.kind.label(), error);
        } else {
            log::debug!("Ignoring failure of stale {}: {}", ticket.kind.label(), error);
        }
        current
    }

    // --- Confirmed mutations ---

    /// Replaces a member in place after the server accepted an update.
    pub fn update_confirmed(&mut self, member: M) -> bool {
        match self.index_of(member.member_key()) {
            Some(index) => {
                self.members[index] = member;
                true
            }
            None => false,
        }
    }

    /// Drops members the server confirmed as removed.
    pub fn remove_confirmed(&mut self, member_keys: &[String]) -> usize {
        let before = self.members.len();
        self.members
            .retain(|m| !member_keys.iter().any(|k| k == m.member_key()));
        for key in member_keys {
            self.keys.remove(key);
        }

        let removed = before - self.members.len();
        self.total = self.total.saturating_sub(removed as u64);
        removed
    }

    // --- Internals ---

    fn issue(&mut self, kind: TaskKind, window: FetchWindow) -> FetchTicket {
        let id = TaskId::new_v4();
        let token = CancelToken::new();

        if matches!(kind, TaskKind::FetchPage | TaskKind::Search) {
            self.primary.start(id, token.clone());
        }

        self.in_flight.insert(
            id,
            InFlight {
                kind,
                window: window.clone(),
                token: token.clone(),
            },
        );

        FetchTicket {
            id,
            kind,
            generation: self.generation,
            sort: self.sort.clone(),
            window,
            token,
        }
    }

    fn reset_in_flight(&mut self) {
        self.generation += 1;
        self.primary.cancel();
        for (_, pending) in self.in_flight.drain() {
            log::debug!("Superseding in-flight {}", pending.kind.label());
            pending.token.cancel();
        }
        self.parked.clear();
    }

    fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.generation == self.generation
            && !ticket.is_cancelled()
            && ticket.sort == self.sort
            && ticket.window.pattern() == self.active_pattern()
    }

    fn clear_members(&mut self) {
        self.members.clear();
        self.keys.clear();
        self.parked.clear();
    }

    /// Offset merge: pages ahead of a gap wait in `parked` until the gap closes.
    fn merge_at(&mut self, offset: u64, page: Vec<M>) -> usize {
        if offset > self.members.len() as u64 {
            log::debug!(
                "Parking page at offset {} (loaded {})",
                offset,
                self.members.len()
            );
            self.parked.insert(offset, page);
            return 0;
        }

        let mut added = self.append_from(offset, page);

        while let Some(entry) = self.parked.first_entry() {
            let parked_offset = *entry.key();
            if parked_offset > self.members.len() as u64 {
                break;
            }
            let parked_page = entry.remove();
            added += self.append_from(parked_offset, parked_page);
        }

        added
    }

    fn append_from(&mut self, offset: u64, page: Vec<M>) -> usize {
        let mut added = 0;

        for (i, member) in page.into_iter().enumerate() {
            let index = offset + i as u64;
            if index < self.members.len() as u64 {
                continue;
            }
            if !self.keys.insert(member.member_key().to_string()) {
                continue;
            }
            self.members.push(member);
            added += 1;
        }

        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::{HashField, ZSetMember};

    fn zset(names: &[&str]) -> Vec<ZSetMember> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| ZSetMember::new(*name, i as f64))
            .collect()
    }

    fn names(state: &PagedListState<ZSetMember>) -> Vec<&str> {
        state.members().iter().map(|m| m.name.as_str()).collect()
    }

    fn loaded(names: &[&str], total: u64) -> PagedListState<ZSetMember> {
        let mut state = PagedListState::new(PaginationKind::Offset, SortSpec::ascending("score"));
        let ticket = state.load_page(0, names.len() as u32, SortSpec::ascending("score"));
        state.apply(&ticket, PagedSlice::new(total, ScanCursor::START, zset(names)));
        state
    }

    #[test]
    fn load_page_replaces_the_slice() {
        let mut state = loaded(&["a", "b"], 4);
        let ticket = state.load_page(0, 2, SortSpec::ascending("score"));

        let outcome = state.apply(&ticket, PagedSlice::new(4, ScanCursor::START, zset(&["x", "y"])));

        assert_eq!(outcome, ApplyOutcome::Replaced { count: 2 });
        assert_eq!(names(&state), vec!["x", "y"]);
        assert!(!state.is_loading());
    }

    #[test]
    fn load_more_appends_without_duplicate_keys() {
        let mut state = loaded(&["a", "b"], 5);

        let ticket = state.load_more(2, 3, 500).expect("offset ticket");
        let outcome = state.apply(
            &ticket,
            PagedSlice::new(5, ScanCursor::START, zset(&["b", "c", "d"])),
        );

        assert_eq!(outcome, ApplyOutcome::Merged { added: 2 });
        assert_eq!(names(&state), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn overlapping_window_keeps_loaded_indices() {
        let mut state = loaded(&["a", "b", "c"], 5);

        let ticket = state.load_more(1, 3, 500).expect("offset ticket");
        state.apply(
            &ticket,
            PagedSlice::new(5, ScanCursor::START, zset(&["B", "C", "d"])),
        );

        assert_eq!(names(&state), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn out_of_order_pages_merge_by_offset() {
        let mut state = loaded(&["a", "b"], 6);

        let first = state.load_more(2, 2, 500).expect("first window");
        let second = state.load_more(4, 2, 500).expect("second window");

        assert_eq!(
            state.apply(&second, PagedSlice::new(6, ScanCursor::START, zset(&["e", "f"]))),
            ApplyOutcome::Merged { added: 0 }
        );
        assert_eq!(names(&state), vec!["a", "b"]);

        assert_eq!(
            state.apply(&first, PagedSlice::new(6, ScanCursor::START, zset(&["c", "d"]))),
            ApplyOutcome::Merged { added: 4 }
        );
        assert_eq!(names(&state), vec!["a", "b", "c", "d", "e", "f"]);
    }

    #[test]
    fn duplicate_window_is_not_requested_twice() {
        let mut state = loaded(&["a", "b"], 10);

        assert!(state.load_more(2, 4, 500).is_some());
        assert!(state.load_more(2, 4, 500).is_none());
        assert!(state.load_more(6, 4, 500).is_some());
    }

    #[test]
    fn sort_change_rejects_late_pages_from_the_old_sort() {
        let mut state = loaded(&["a", "b"], 4);
        let stale = state.load_more(2, 2, 500).expect("offset ticket");

        let reload = state.change_sort(SortSpec::descending("score"), 2);
        assert!(state.is_empty());
        assert!(stale.is_cancelled());

        state.apply(&reload, PagedSlice::new(4, ScanCursor::START, zset(&["d", "c"])));
        let outcome = state.apply(&stale, PagedSlice::new(4, ScanCursor::START, zset(&["c", "d"])));

        assert_eq!(outcome, ApplyOutcome::Stale);
        assert_eq!(names(&state), vec!["d", "c"]);
        assert_eq!(state.sort(), &SortSpec::descending("score"));
    }

    #[test]
    fn search_uses_its_own_cursor() {
        let mut state = loaded(&["a", "b"], 4);

        let search = state.search("b*", 500);
        assert!(state.is_searching());
        assert!(state.load_more(2, 2, 500).is_none());

        state.apply(&search, PagedSlice::new(4, ScanCursor(17), zset(&["b1", "b2"])));
        let more = state.load_more(2, 2, 500).expect("search cursor ticket");
        assert_eq!(
            more.window,
            FetchWindow::Cursor {
                cursor: ScanCursor(17),
                limit: 500,
                pattern: "b*".to_string()
            }
        );

        state.apply(&more, PagedSlice::new(4, ScanCursor::START, zset(&["b3"])));
        assert_eq!(names(&state), vec!["b1", "b2", "b3"]);
        assert!(state.load_more(3, 2, 500).is_none());
    }

    #[test]
    fn clearing_search_returns_to_offset_paging() {
        let mut state = loaded(&["a"], 1);
        let search = state.search("zz", 500);
        let browse = state.search("", 500);

        assert!(!state.is_searching());
        assert!(matches!(browse.window, FetchWindow::Offset { offset: 0, .. }));
        assert_eq!(
            state.apply(&search, PagedSlice::new(1, ScanCursor::START, Vec::new())),
            ApplyOutcome::Stale
        );
    }

    #[test]
    fn failure_leaves_members_untouched() {
        let mut state = loaded(&["a", "b"], 4);
        let ticket = state.load_more(2, 2, 500).expect("offset ticket");

        assert!(state.fail(&ticket, "connection reset"));
        assert_eq!(names(&state), vec!["a", "b"]);
        assert!(!state.is_loading());
        assert!(state.load_more(2, 2, 500).is_some());
    }

    #[test]
    fn confirmed_removal_shrinks_total() {
        let mut state = loaded(&["a", "b"], 2);
        assert_eq!(state.remove_confirmed(&["a".to_string()]), 1);
        assert_eq!(state.total(), 1);
        assert_eq!(names(&state), vec!["b"]);
    }

    #[test]
    fn cursor_sources_browse_through_the_scan_path() {
        let mut state: PagedListState<HashField> =
            PagedListState::new(PaginationKind::Cursor, SortSpec::ascending("field"));
        let ticket = state.load_page(0, 500, SortSpec::ascending("field"));

        assert!(matches!(
            &ticket.window,
            FetchWindow::Cursor { pattern, .. } if pattern == "*"
        ));
        assert!(!state.is_searching());

        state.apply(
            &ticket,
            PagedSlice::new(3, ScanCursor(9), vec![HashField::new("f1", "v1")]),
        );
        let more = state.load_more(1, 10, 500).expect("scan continues");
        assert_eq!(more.kind, TaskKind::SearchMore);
    }
}
