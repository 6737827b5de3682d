use std::collections::BTreeSet;
use std::ops::Range;

use crate::config::BrowserConfig;
use crate::member::KeyType;
use crate::paging::{SortDirection, SortSpec};

use super::columns::ColumnSpec;
use super::display::NO_RESULTS_FOUND_TEXT;
use super::events::{ColumnSearchState, TableEvent};
use super::height_cache::HeightCache;
use super::window::{LoadRange, VirtualWindow};

/// Windowed view over a member list.
///
/// The table never holds members itself. It tracks how many are loaded, how
/// many exist, and the per-row view state (expansion and measured heights),
/// and it answers user input with [`TableEvent`]s for its owner to act on.
pub struct VirtualTableState {
    key_type: KeyType,
    columns: Vec<ColumnSpec>,
    items_count: usize,
    total_items_count: u64,
    sorted_column: Option<SortSpec>,
    loading: bool,
    searching: bool,
    scan_pending: bool,
    expanded_rows: BTreeSet<usize>,
    heights: HeightCache,
    window: VirtualWindow,
    search_state: Vec<ColumnSearchState>,
    header_height: f32,
    load_threshold: usize,
    minimum_batch_size: usize,
}

impl VirtualTableState {
    pub fn new(key_type: KeyType, columns: Vec<ColumnSpec>, config: &BrowserConfig) -> Self {
        let search_state = columns
            .iter()
            .filter(|c| c.searchable)
            .map(|c| {
                ColumnSearchState::new(
                    c.id.clone(),
                    c.initial_search_value.clone().unwrap_or_default(),
                )
            })
            .collect();

        Self {
            key_type,
            columns,
            items_count: 0,
            total_items_count: 0,
            sorted_column: None,
            loading: false,
            searching: false,
            scan_pending: false,
            expanded_rows: BTreeSet::new(),
            heights: HeightCache::new(config.row_height),
            window: VirtualWindow::new(0.0, config.overscan_rows),
            search_state,
            header_height: config.header_height,
            load_threshold: config.load_threshold,
            minimum_batch_size: config.minimum_batch_size,
        }
    }

    // --- Inputs ---

    /// Sizes the table; the header is excluded from the row viewport.
    pub fn set_table_height(&mut self, height: f32) {
        self.window.set_viewport_height(height - self.header_height);
    }

    pub fn set_viewport_rows(&mut self, rows: usize) {
        self.window
            .set_viewport_height(rows as f32 * self.heights.min_height());
    }

    /// Syncs with the member list. A new list identity drops all row view state.
    pub fn set_items(&mut self, items_count: usize, total_items_count: u64, identity_changed: bool) {
        if identity_changed {
            self.expanded_rows.clear();
            self.heights.clear_all();
        } else {
            self.expanded_rows.retain(|row| *row < items_count);
        }

        self.items_count = items_count;
        self.total_items_count = total_items_count;

        let content = self.content_height();
        let offset = self.window.scroll_offset();
        self.window.scroll_to(offset, content);
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub fn set_searching(&mut self, searching: bool) {
        self.searching = searching;
    }

    /// The search cursor has not wrapped around yet, so more members may match.
    pub fn set_scan_pending(&mut self, scan_pending: bool) {
        self.scan_pending = scan_pending;
    }

    pub fn set_sorted_column(&mut self, sort: Option<SortSpec>) {
        self.sorted_column = sort;
    }

    // --- Accessors ---

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn items_count(&self) -> usize {
        self.items_count
    }

    pub fn total_items_count(&self) -> u64 {
        self.total_items_count
    }

    pub fn sorted_column(&self) -> Option<&SortSpec> {
        self.sorted_column.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_searching(&self) -> bool {
        self.searching
    }

    pub fn is_expanded(&self, row: usize) -> bool {
        self.expanded_rows.contains(&row)
    }

    pub fn expanded_rows(&self) -> &BTreeSet<usize> {
        &self.expanded_rows
    }

    pub fn heights(&self) -> &HeightCache {
        &self.heights
    }

    pub fn window(&self) -> &VirtualWindow {
        &self.window
    }

    pub fn search_state(&self) -> &[ColumnSearchState] {
        &self.search_state
    }

    pub fn content_height(&self) -> f32 {
        self.heights.total_height(self.items_count)
    }

    pub fn visible_range(&self) -> Range<usize> {
        self.window.visible_range(self.items_count, &self.heights)
    }

    pub fn is_exhausted(&self) -> bool {
        self.items_count as u64 >= self.total_items_count
    }

    /// Empty-state text, shown only once loading has settled with nothing to
    /// show and no search cursor is left to follow.
    pub fn empty_message(&self) -> Option<&'static str> {
        if self.items_count == 0 && !self.loading && !(self.searching && self.scan_pending) {
            Some(NO_RESULTS_FOUND_TEXT)
        } else {
            None
        }
    }

    // --- User input ---

    pub fn scroll_to(&mut self, offset: f32) -> Option<TableEvent> {
        let content = self.content_height();
        self.window.scroll_to(offset, content);
        self.pending_load().map(TableEvent::LoadMore)
    }

    /// Rows the current window needs that are not loaded yet.
    pub fn pending_load(&self) -> Option<LoadRange> {
        if self.loading || self.is_exhausted() {
            return None;
        }

        self.window.unloaded_range(
            &self.visible_range(),
            self.items_count,
            self.total_items_count,
            self.load_threshold,
            self.minimum_batch_size,
        )
    }

    /// Vets a load request coming from outside the scroll path.
    pub fn load_more_items(&self, range: LoadRange) -> Option<TableEvent> {
        if self.loading || self.is_exhausted() {
            log::debug!(
                "load_more_items skipped (loading: {}, loaded {}/{})",
                self.loading,
                self.items_count,
                self.total_items_count
            );
            return None;
        }

        if range.stop_index < range.start_index || range.start_index as u64 >= self.total_items_count
        {
            return None;
        }

        let last = usize::try_from(self.total_items_count - 1).unwrap_or(usize::MAX);
        Some(TableEvent::LoadMore(LoadRange::new(
            range.start_index,
            range.stop_index.min(last),
        )))
    }

    /// Header click. The old window is thrown away and the view returns to the top.
    pub fn change_sorting(&mut self, column: &str, order: SortDirection) -> Option<TableEvent> {
        let sortable = self.columns.iter().any(|c| c.id == column && c.sortable);
        if !sortable {
            return None;
        }

        let sort = SortSpec::new(column, order);
        self.sorted_column = Some(sort.clone());
        self.expanded_rows.clear();
        self.heights.clear_all();
        self.window.scroll_to_top();

        Some(TableEvent::SortChanged(sort))
    }

    /// Commits search fields; the first searchable column in `states` wins.
    pub fn commit_search(&mut self, states: Vec<ColumnSearchState>) -> Option<TableEvent> {
        let committed = states.into_iter().find(|state| {
            self.columns
                .iter()
                .any(|c| c.searchable && c.id == state.id)
        })?;

        if let Some(existing) = self.search_state.iter_mut().find(|s| s.id == committed.id) {
            existing.value = committed.value.clone();
        }

        self.window.scroll_to_top();

        Some(TableEvent::SearchCommitted {
            column: committed.id,
            value: committed.value,
        })
    }

    pub fn toggle_row(&mut self, row: usize, largest_cell_length: usize) -> Option<TableEvent> {
        if row >= self.items_count {
            return None;
        }

        let expanded = if self.expanded_rows.remove(&row) {
            false
        } else {
            self.expanded_rows.insert(row);
            true
        };
        self.heights.invalidate(row);

        Some(TableEvent::RowToggled {
            row,
            expanded,
            largest_cell_length,
        })
    }

    pub fn invalidate_row(&mut self, row: usize) {
        self.heights.invalidate(row);
    }

    pub fn measure_row(&mut self, row: usize, height: f32) -> bool {
        self.heights.measure(row, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::columns::zset_columns;

    fn table(items: usize, total: u64) -> VirtualTableState {
        let config = BrowserConfig {
            row_height: 10.0,
            header_height: 0.0,
            overscan_rows: 0,
            load_threshold: 2,
            minimum_batch_size: 5,
            ..BrowserConfig::default()
        };
        let mut table = VirtualTableState::new(KeyType::SortedSet, zset_columns(80.0), &config);
        table.set_table_height(50.0);
        table.set_items(items, total, true);
        table
    }

    #[test]
    fn scrolling_near_the_end_requests_the_next_rows() {
        let mut table = table(10, 40);

        assert_eq!(table.scroll_to(0.0), None);
        assert_eq!(
            table.scroll_to(50.0),
            Some(TableEvent::LoadMore(LoadRange::new(10, 14)))
        );
    }

    #[test]
    fn no_load_while_loading_or_exhausted() {
        let mut table = table(10, 40);
        table.set_loading(true);
        assert_eq!(table.scroll_to(50.0), None);

        let exhausted = self::table(10, 10);
        assert_eq!(exhausted.pending_load(), None);
        assert_eq!(exhausted.load_more_items(LoadRange::new(10, 19)), None);
    }

    #[test]
    fn deleting_the_sole_member_does_not_load_more() {
        let mut table = table(1, 1);
        table.set_items(0, 0, true);

        assert_eq!(table.pending_load(), None);
        assert_eq!(table.scroll_to(0.0), None);
        assert_eq!(table.empty_message(), Some(NO_RESULTS_FOUND_TEXT));
    }

    #[test]
    fn open_search_cursor_is_not_an_empty_result() {
        let mut table = table(0, 600);
        table.set_searching(true);
        table.set_scan_pending(true);
        assert_eq!(table.empty_message(), None);

        table.set_scan_pending(false);
        assert_eq!(table.empty_message(), Some(NO_RESULTS_FOUND_TEXT));
    }

    #[test]
    fn unbounded_load_requests_are_clamped_to_the_total() {
        let table = table(10, 40);

        assert_eq!(
            table.load_more_items(LoadRange::new(10, usize::MAX)),
            Some(TableEvent::LoadMore(LoadRange::new(10, 39)))
        );
        assert_eq!(LoadRange::new(0, usize::MAX).count(), usize::MAX);
    }

    #[test]
    fn sorting_only_fires_for_sortable_columns() {
        let mut table = table(10, 40);
        table.toggle_row(1, 3);

        assert_eq!(table.change_sorting("name", SortDirection::Descending), None);
        assert!(table.is_expanded(1));

        assert_eq!(
            table.change_sorting("score", SortDirection::Descending),
            Some(TableEvent::SortChanged(SortSpec::descending("score")))
        );
        assert!(table.expanded_rows().is_empty());
        assert_eq!(table.window().scroll_offset(), 0.0);
    }

    #[test]
    fn toggling_invalidates_the_row_height() {
        let mut table = table(10, 40);
        table.measure_row(3, 90.0);

        let event = table.toggle_row(3, 42);
        assert_eq!(
            event,
            Some(TableEvent::RowToggled {
                row: 3,
                expanded: true,
                largest_cell_length: 42
            })
        );
        assert!(!table.heights().is_measured(3));

        assert!(matches!(
            table.toggle_row(3, 42),
            Some(TableEvent::RowToggled { expanded: false, .. })
        ));
        assert_eq!(table.toggle_row(10, 1), None);
    }

    #[test]
    fn new_member_list_resets_row_view_state() {
        let mut table = table(10, 40);
        table.toggle_row(2, 1);
        table.measure_row(4, 70.0);

        table.set_items(12, 40, false);
        assert!(table.is_expanded(2));

        table.set_items(12, 40, true);
        assert!(table.expanded_rows().is_empty());
        assert_eq!(table.heights().measured_count(), 0);
    }

    #[test]
    fn search_commit_targets_searchable_column() {
        let mut table = table(10, 40);

        let event = table.commit_search(vec![
            ColumnSearchState::new("score", "1"),
            ColumnSearchState::new("name", "b"),
        ]);

        assert_eq!(
            event,
            Some(TableEvent::SearchCommitted {
                column: "name".to_string(),
                value: "b".to_string()
            })
        );
        assert_eq!(table.search_state()[0].value, "b");
    }
}
